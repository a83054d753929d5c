//! Install orchestration: source acquisition, database provisioning,
//! site installation, and post-install fixups.

use super::DrupalManager;
use crate::exec::{expand, CommandRunner};
use crate::hardening::{self, HardeningLevel};
use crate::options::InstallOptions;
use crate::site::{split_host, SiteLocation};
use crate::versioning::{at_least, parse_loose, validate_version};
use crate::{Error, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Extra site-install option suppressing the update-status module prompt.
const UPDATE_STATUS_SUPPRESS: &str =
    "install_configure_form.update_status_module='array(FALSE,FALSE)'";

/// Result of a successful install.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// Final resolved location (document root may have been remapped to
    /// the `web/` subdirectory).
    pub location: SiteLocation,
    /// Admin email the confirmation was sent to.
    pub admin_email: String,
    /// Autogenerated admin password, when the caller supplied none.
    pub generated_password: Option<String>,
    /// Name of the provisioned database.
    pub database: String,
}

impl<R: CommandRunner> DrupalManager<R> {
    /// Install the application into a location.
    ///
    /// The full sequence is: precondition checks, default merging, source
    /// acquisition (Composer scaffold for 9.0+, drush download otherwise),
    /// site-email synthesis, database provisioning, `site-install`,
    /// post-install fixups, hardening, and operator notification. A
    /// site-install failure, including a runner-level one, deletes the
    /// downloaded tree and rolls the database back together before
    /// surfacing the error. Once site-install has committed, fixup
    /// trouble only warns.
    pub async fn install(
        &self,
        hostname: &str,
        path: &str,
        options: InstallOptions,
    ) -> Result<InstallOutcome> {
        if let Some(version) = &options.version {
            // charset first, so garbage input is reported as garbage
            validate_version(version, false)?;
            if parse_loose(version).map_or(true, |v| v < self.profile.min_version) {
                return Err(Error::validation(format!(
                    "Minimum {} version is {}",
                    self.profile.app_name, self.profile.min_version
                )));
            }
        }
        if !self.services.database.enabled() {
            return Err(Error::MissingPrerequisite {
                name: "MySQL".to_string(),
            });
        }

        let mut options = options.finalize()?;
        let mut location = self.location(hostname, path);

        // pinned 9.0+ goes through Composer; everything else (including
        // unpinned installs) through the drush download path
        let composer_epoch = options
            .version
            .as_deref()
            .map_or(false, |v| at_least(v, &self.profile.epoch_boundary));

        if composer_epoch {
            location = self.scaffold_composer_project(location, &options).await?;
        } else {
            self.download_release(&location, &options).await?;
        }

        let site_email = match &options.site_email {
            Some(address) => address.clone(),
            None => self.synthesize_site_email(hostname, &options.email),
        };

        let credentials = self.services.database.create(hostname)?;
        let proto = match options.version.as_deref() {
            Some(v) if !at_least(v, &semver::Version::new(7, 0, 0)) => "mysqli",
            _ => "mysql",
        };
        let db_uri = credentials.uri(proto);

        let generated_password = match &options.password {
            Some(_) => None,
            None => {
                let password = self.services.passwords.generate();
                info!("autogenerated password for `{}'", options.user);
                Some(password)
            }
        };
        let password = options
            .password
            .clone()
            .or_else(|| generated_password.clone())
            .unwrap_or_default();
        // the confirmation email must carry usable credentials
        if options.password.is_none() {
            options.password = Some(password.clone());
        }

        info!("setting admin user to `{}'", options.user);

        let args = expand(
            "site-install {profile} -q --db-url={dburi} --account-name={user} \
             --account-pass={password} -y --account-mail={email} --site-mail={site_email} \
             --site-name={title} --locale={locale} {xtraopts}",
            &[
                ("profile", options.profile.as_deref().unwrap_or("standard")),
                ("dburi", &db_uri),
                ("user", &options.user),
                ("password", &password),
                ("email", &options.email),
                ("site_email", &site_email),
                ("title", options.title.as_deref().unwrap_or_default()),
                ("locale", options.locale.as_deref().unwrap_or("us")),
                ("xtraopts", UPDATE_STATUS_SUPPRESS),
            ],
        );

        let install_error = match self.invoker().drush(&location, &args).await {
            Ok(result) if result.success => None,
            Ok(result) => Some(Error::command(
                format!("failed to install {}", self.profile.app_name),
                result.error_text().to_string(),
            )),
            // a runner failure (spawn error, timeout) compensates too
            Err(e) => Some(e),
        };
        if let Some(error) = install_error {
            // compensate: files and database go together, never one alone
            info!("removing temporary files");
            let _ = fs::remove_dir_all(&location.app_root);
            if self.services.database.rollback(&credentials).is_err() {
                warn!("failed to roll back database `{}'", credentials.database);
            }
            return Err(error);
        }

        // the site is live from here on; fixup trouble must not fail it
        if let Err(e) = self.post_install_fixups(&location, &options) {
            warn!(error = %e, "post-install fixups incomplete");
        }

        hardening::harden(&location, HardeningLevel::Max)?;

        self.services
            .tracker
            .notify_installed(hostname, path, &options);
        info!(
            "{} installed - confirmation email with login info sent to {}",
            self.profile.app_name, options.email
        );

        Ok(InstallOutcome {
            admin_email: options.email.clone(),
            generated_password,
            database: credentials.database,
            location,
        })
    }

    /// Scaffold a Composer-epoch project directly in the target directory
    /// and remap the document root to its `web/` subdirectory.
    async fn scaffold_composer_project(
        &self,
        location: SiteLocation,
        options: &InstallOptions,
    ) -> Result<SiteLocation> {
        let version = options.version.as_deref().unwrap_or_default();
        fs::create_dir_all(&location.app_root)?;

        let invoker = self.invoker();
        let create = expand(
            "create-project drupal/recommended-project:{version} .",
            &[("version", version)],
        );
        let result = invoker.composer(&location.app_root, &create).await?;
        if !result.success {
            return Err(Error::command(
                format!("Failed to install {}", self.profile.app_name),
                result.error_text().to_string(),
            ));
        }

        let require = expand("require drush/drush", &[]);
        let result = invoker.composer(&location.app_root, &require).await?;
        if !result.success {
            return Err(Error::command(
                format!("Failed to install {}", self.profile.app_name),
                result.error_text().to_string(),
            ));
        }

        // packaging relocated the public files; recompute the split
        let remapped = SiteLocation::resolve(&self.webroot, &location.hostname, &location.path);
        if remapped.doc_root == remapped.app_root {
            return Err(Error::command(
                format!(
                    "Failed to remap {} to web/, manually remap from `{}'",
                    self.profile.app_name,
                    location.doc_root.display()
                ),
                "setup is incomplete".to_string(),
            ));
        }
        Ok(remapped)
    }

    /// Download a legacy release through drush into a scratch directory
    /// and move it into the document root.
    async fn download_release(
        &self,
        location: &SiteLocation,
        options: &InstallOptions,
    ) -> Result<()> {
        let dist = options.dist.as_deref().unwrap_or("drupal");
        let scratch = scratch_dir();
        fs::create_dir_all(&scratch)?;

        // drush expects the destination to exist; download under the
        // scratch directory and move <scratch>/drupal into place instead
        // of shuffling everything down a level inside the docroot
        let scratch_location = SiteLocation {
            hostname: location.hostname.clone(),
            path: location.path.clone(),
            doc_root: scratch.clone(),
            app_root: scratch.clone(),
        };
        let args = expand(
            "dl {dist} --drupal-project-rename --destination={tempdir} -q",
            &[("dist", dist), ("tempdir", &scratch.to_string_lossy())],
        );
        let result = self.invoker().drush(&scratch_location, &args).await?;
        if !result.success {
            let _ = fs::remove_dir_all(&scratch);
            return Err(Error::command(
                format!(
                    "failed to download {} - out of space?",
                    self.profile.app_name
                ),
                result.error_text().to_string(),
            ));
        }

        if location.doc_root.exists() {
            fs::remove_dir_all(&location.doc_root)?;
        }
        if let Some(parent) = location.doc_root.parent() {
            fs::create_dir_all(parent)?;
        }
        let moved = fs::rename(scratch.join("drupal"), &location.doc_root);
        let _ = fs::remove_dir_all(&scratch);
        moved.map_err(|_| {
            Error::command(
                format!("failed to move {} install", self.profile.app_name),
                format!("to `{}'", location.doc_root.display()),
            )
        })?;
        Ok(())
    }

    /// Derive a postmaster address for the owning domain, creating a
    /// forwarding alias when possible. Best-effort: failures only warn.
    fn synthesize_site_email(&self, hostname: &str, admin_email: &str) -> String {
        let qualified = if hostname.contains('.') {
            hostname.to_string()
        } else {
            format!("{hostname}.{}", self.primary_domain)
        };
        let (_, domain) = split_host(&qualified);

        if !self.services.mail.address_exists("postmaster", &domain) {
            if !self.services.mail.transport_exists(&domain) {
                warn!(
                    "email is not configured for domain `{domain}', messages sent from \
                     installation may be unrespondable"
                );
            } else if self
                .services
                .mail
                .add_alias("postmaster", &domain, admin_email)
                .is_ok()
            {
                info!(
                    "created `postmaster@{domain}' address for mailings that will forward \
                     to `{admin_email}'"
                );
            } else {
                warn!(
                    "failed to create postmaster address `postmaster@{domain}', messages \
                     sent from installation may be unrespondable"
                );
            }
        }
        format!("postmaster@{domain}")
    }

    /// Post-install configuration fixups on the freshly installed tree.
    fn post_install_fixups(
        &self,
        location: &SiteLocation,
        options: &InstallOptions,
    ) -> Result<()> {
        // make sure the file exists before the rewrite-base pass
        if !location.htaccess().exists() {
            fs::write(location.htaccess(), "")?;
        }
        hardening::remove_invalid_directives(&location.doc_root, "sites/default/files/")?;
        hardening::fix_rewrite_base(&location.doc_root, &location.path)?;
        hardening::append_trusted_hosts(
            location,
            options.version.as_deref().unwrap_or_default(),
        )?;

        if options.ssl {
            // TODO: force redirect to HTTPS once the panel exposes
            // per-vhost redirect control
        }
        Ok(())
    }
}

/// Unique scratch directory for a release download.
fn scratch_dir() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let serial = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("drupal{}-{serial}", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dirs_are_distinct() {
        assert_ne!(scratch_dir(), scratch_dir());
    }

    #[test]
    fn test_update_status_suppression_shape() {
        // passed as one argv entry; quoting inside is drush's business
        assert!(UPDATE_STATUS_SUPPRESS.starts_with("install_configure_form"));
        assert!(!UPDATE_STATUS_SUPPRESS.contains(' '));
    }
}
