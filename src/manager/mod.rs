//! The management facade tying profile, invoker, and collaborators
//! together.
//!
//! One [`DrupalManager`] serves one panel account: it resolves site
//! locations under the account's web root, shells out through the
//! configured [`CommandRunner`], and delegates panel concerns to the
//! injected [`Services`]. Every public entry point re-resolves its
//! location; nothing is cached across calls.

mod install;
mod plugins;
mod update;

pub use install::InstallOutcome;
pub use plugins::{PluginInfo, PluginListing, PluginState};
pub use update::PluginPin;

use crate::exec::{CommandRunner, Invoker};
use crate::profile::AppProfile;
use crate::services::Services;
use crate::site::SiteLocation;
use crate::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Manages the Drupal installs of one hosting account.
pub struct DrupalManager<R> {
    profile: AppProfile,
    webroot: PathBuf,
    primary_domain: String,
    runner: R,
    services: Services,
}

/// Fields accepted by [`DrupalManager::change_admin`].
///
/// Password is the only supported field today.
#[derive(Debug, Clone, Default)]
pub struct AdminUpdate {
    pub password: Option<String>,
}

/// Database connection details read back from the site settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub username: String,
    pub password: String,
    pub database: String,
    pub prefix: String,
    pub host: String,
}

/// drush `status --format=json` fields this crate consumes.
#[derive(Debug, Deserialize)]
struct StatusReport {
    #[serde(rename = "drupal-version")]
    drupal_version: Option<String>,
}

impl<R: CommandRunner> DrupalManager<R> {
    /// Build a manager for one account.
    ///
    /// `webroot` is the base directory holding per-hostname document
    /// roots; `primary_domain` is the account's main domain, used to
    /// qualify bare hostnames during postmaster synthesis.
    pub fn new(
        profile: AppProfile,
        webroot: impl Into<PathBuf>,
        primary_domain: impl Into<String>,
        runner: R,
        services: Services,
    ) -> Self {
        Self {
            profile,
            webroot: webroot.into(),
            primary_domain: primary_domain.into(),
            runner,
            services,
        }
    }

    pub fn profile(&self) -> &AppProfile {
        &self.profile
    }

    /// Resolve the location for a hostname and optional sub-path.
    pub fn location(&self, hostname: &str, path: &str) -> SiteLocation {
        SiteLocation::resolve(&self.webroot, hostname, path)
    }

    pub(crate) fn invoker(&self) -> Invoker<'_, R> {
        Invoker::new(&self.profile, &self.runner)
    }

    /// Whether the location holds a recognizable install.
    pub fn valid(&self, hostname: &str, path: &str) -> bool {
        self.location(hostname, path).valid()
    }

    /// Require a valid install at the location, or fail fast.
    pub(crate) fn valid_location(&self, hostname: &str, path: &str) -> Result<SiteLocation> {
        let location = self.location(hostname, path);
        if location.valid() {
            Ok(location)
        } else {
            Err(Error::validation(format!(
                "invalid {} location",
                self.profile.app_name
            )))
        }
    }

    /// Installed version at an exact location, from `drush status`.
    pub(crate) async fn installed_version(&self, location: &SiteLocation) -> Option<String> {
        let result = self
            .invoker()
            .drush(location, &["status".to_string(), "--format=json".to_string()])
            .await
            .ok()?;
        if !result.success {
            return None;
        }
        let report: StatusReport = serde_json::from_str(&result.stdout).ok()?;
        report.drupal_version
    }

    /// Installed version for a hostname/path, `None` when the location is
    /// not a recognizable install or the probe fails.
    pub async fn get_version(&self, hostname: &str, path: &str) -> Option<String> {
        let location = self.location(hostname, path);
        if !location.valid() {
            return None;
        }
        self.installed_version(&location).await
    }

    /// All available upstream release versions, via the injected feed.
    pub fn available_versions(&self) -> Result<Vec<String>> {
        self.services.feed.fetch()
    }

    /// Primary administrative account name (uid 1).
    pub async fn get_admin(&self, hostname: &str, path: &str) -> Option<String> {
        let location = self.location(hostname, path);
        let result = self
            .invoker()
            .drush(
                &location,
                &[
                    "user-information".to_string(),
                    "1".to_string(),
                    "--format=json".to_string(),
                ],
            )
            .await
            .ok()?;
        if !result.success {
            warn!("failed to enumerate administrative users");
            return None;
        }

        #[derive(Deserialize)]
        struct UserRecord {
            name: String,
        }
        let users: std::collections::BTreeMap<String, UserRecord> =
            serde_json::from_str(&result.stdout).ok()?;
        users.into_values().next_back().map(|u| u.name)
    }

    /// Change administrative credentials.
    pub async fn change_admin(
        &self,
        hostname: &str,
        path: &str,
        update: AdminUpdate,
    ) -> Result<()> {
        let location = self.valid_location(hostname, path)?;
        let admin = self
            .get_admin(hostname, path)
            .await
            .ok_or_else(|| Error::command(
                "cannot determine admin",
                format!("no administrative user found for `{hostname}'"),
            ))?;

        if let Some(password) = &update.password {
            let args = crate::exec::expand(
                "user-password --password={password} {user}",
                &[("password", password), ("user", &admin)],
            );
            let result = self.invoker().drush(&location, &args).await?;
            if !result.success {
                return Err(Error::command(
                    format!("failed to update password for user `{admin}'"),
                    result.error_text().to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Database connection details, parsed out of the settings file.
    pub fn db_config(&self, hostname: &str, path: &str) -> Result<DbConfig> {
        let location = self.valid_location(hostname, path)?;
        let settings = location.settings_file();
        let content = fs::read_to_string(&settings).map_err(|_| {
            Error::command(
                "failed to obtain configuration",
                format!("cannot read `{}'", settings.display()),
            )
        })?;

        parse_db_settings(&content).ok_or_else(|| {
            Error::command(
                "failed to obtain configuration",
                format!("no database settings found in `{}'", settings.display()),
            )
        })
    }

    /// Recovery entry point: disable every plugin so a broken site can
    /// bootstrap again.
    pub async fn recover(&self, hostname: &str, path: &str) -> Result<Vec<String>> {
        self.disable_all_plugins(hostname, path).await
    }

    /// Keep the bundled legacy CLI phar in sync with the panel's
    /// storehouse copy.
    ///
    /// Copies when the destination is missing or its digest differs;
    /// returns whether a copy happened.
    pub fn ensure_legacy_cli(&self, storehouse: &Path) -> Result<bool> {
        let dest = &self.profile.legacy_cli;
        let name = dest
            .file_name()
            .ok_or_else(|| Error::validation("profile has no legacy CLI path"))?;
        let src = storehouse.join(name);

        if dest.exists() && digest(&src)? == digest(dest)? {
            return Ok(false);
        }

        fs::copy(&src, dest)?;
        fs::set_permissions(dest, fs::Permissions::from_mode(0o755))?;
        info!(src = %src.display(), dest = %dest.display(), "copied legacy CLI");
        Ok(true)
    }
}

fn digest(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().to_vec())
}

/// Extract the default database connection from settings-file text.
fn parse_db_settings(content: &str) -> Option<DbConfig> {
    let re = Regex::new(r"'(username|password|database|prefix|host)'\s*=>\s*'([^']*)'")
        .expect("settings regex");
    let mut config = DbConfig {
        username: String::new(),
        password: String::new(),
        database: String::new(),
        prefix: String::new(),
        host: String::new(),
    };
    for caps in re.captures_iter(content) {
        let value = caps[2].to_string();
        match &caps[1] {
            "username" => config.username = value,
            "password" => config.password = value,
            "database" => config.database = value,
            "prefix" => config.prefix = value,
            "host" => config.host = value,
            _ => {}
        }
    }
    if config.database.is_empty() {
        None
    } else {
        Some(config)
    }
}
