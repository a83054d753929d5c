//! Update orchestration with maintenance-mode bracketing.

use super::DrupalManager;
use crate::exec::{expand, CommandRunner, ExecResult};
use crate::hardening;
use crate::maintenance::set_maintenance;
use crate::services::SiteInfo;
use crate::versioning::{at_least, branch_of, next_version, validate_version};
use crate::{Error, Result};
use std::fs;
use tracing::{debug, info, warn};

/// A plugin pin for batch plugin updates.
#[derive(Debug, Clone)]
pub struct PluginPin {
    pub name: String,
    pub version: Option<String>,
}

impl PluginPin {
    fn argument(&self) -> String {
        match &self.version {
            Some(version) => format!("{}-{version}", self.name),
            None => self.name.clone(),
        }
    }
}

impl<R: CommandRunner> DrupalManager<R> {
    /// Update core and plugins, persisting combined metadata regardless
    /// of outcome.
    pub async fn update_all(
        &self,
        hostname: &str,
        path: &str,
        version: Option<&str>,
    ) -> Result<()> {
        let result = match self.update(hostname, path, version).await {
            Ok(()) => self.update_plugins(hostname, path, &[]).await,
            Err(e) => Err(e),
        };

        let location = self.location(hostname, path);
        let current = self.get_version(hostname, path).await;
        self.services.tracker.set_info(
            &location.app_root,
            SiteInfo {
                version: current,
                failed: result.is_err(),
            },
        );
        result
    }

    /// Update core to a pinned version, or to the next available release.
    ///
    /// Maintenance mode brackets the mutating step best-effort; the
    /// `.htaccess` is saved aside before any mutation and restored after
    /// (restore failure only warns). Version/failure metadata is persisted
    /// and hardening re-applied regardless of outcome.
    pub async fn update(&self, hostname: &str, path: &str, version: Option<&str>) -> Result<()> {
        let location = self.valid_location(hostname, path).map_err(|_| {
            Error::validation("update failed: cannot determine application root")
        })?;
        if location.is_locked() {
            return Err(Error::Locked {
                app_root: location.app_root.display().to_string(),
            });
        }

        let old_version = self
            .installed_version(&location)
            .await
            .ok_or_else(|| Error::command(
                "update failed",
                "cannot determine installed version".to_string(),
            ))?;

        let (target, branch) = match version {
            Some(pinned) => {
                validate_version(pinned, true)?;
                (pinned.to_string(), branch_of(pinned))
            }
            None => {
                let available = self.services.feed.fetch()?;
                match next_version(&available, &old_version) {
                    Some(next) => (next.to_string(), branch_of(&old_version)),
                    None => {
                        info!(host = hostname, version = %old_version, "already current");
                        return Ok(());
                    }
                }
            }
        };

        // drush moves to a Composer package at 9.0; a tarball-managed
        // tree cannot be carried across that boundary in place
        let boundary = &self.profile.epoch_boundary;
        if !at_least(&old_version, boundary) && at_least(&target, boundary) {
            return Err(Error::Unsupported {
                message: "No automatic upgrade path exists from pre-9.0 to 9.0+".to_string(),
            });
        }

        let htaccess = location.htaccess();
        let backup = htaccess.with_extension("bak");
        if htaccess.exists() {
            fs::rename(&htaccess, &backup).map_err(|_| {
                Error::command(
                    "upgrade failure",
                    "failed to save copy of original .htaccess".to_string(),
                )
            })?;
        }

        let invoker = self.invoker();
        set_maintenance(&invoker, &location, true, &branch).await;

        let update_result = if !at_least(&target, boundary) {
            self.legacy_core_update(&location, &target).await
        } else {
            self.composer_core_update(&location, &target).await
        };
        // a runner-level error still unwinds: maintenance off, .htaccess
        // restore, metadata, re-hardening
        let outcome = update_result.unwrap_or_else(|e| ExecResult {
            success: false,
            stdout: String::new(),
            stderr: e.to_string(),
        });

        set_maintenance(&invoker, &location, false, &branch).await;

        if backup.exists() && fs::rename(&backup, &htaccess).is_err() {
            warn!(
                "failed to rename backup `{}' to .htaccess",
                backup.display()
            );
        }

        let current = self.installed_version(&location).await.or(Some(target));
        self.services.tracker.set_info(
            &location.app_root,
            SiteInfo {
                version: current,
                failed: !outcome.success,
            },
        );

        let level = self
            .services
            .tracker
            .hardening_level(&location.app_root)
            .unwrap_or_default();
        if let Err(e) = hardening::harden(&location, level) {
            warn!(error = %e, "failed to re-apply hardening after update");
        }

        if !outcome.success {
            return Err(Error::command(
                format!("failed to update {}", self.profile.app_name),
                outcome.error_text().to_string(),
            ));
        }
        Ok(())
    }

    /// Pinned tarball-epoch core update through drush.
    async fn legacy_core_update(
        &self,
        location: &crate::site::SiteLocation,
        target: &str,
    ) -> Result<ExecResult> {
        let args = expand("pm-update drupal-{version} -y", &[("version", target)]);
        let result = self.invoker().drush(location, &args).await?;
        if result.success {
            let _ = self
                .invoker()
                .drush(location, &["cache-build".to_string()])
                .await;
        }
        Ok(result)
    }

    /// Composer-epoch core update: package update, schema update, cache
    /// rebuild, each gated on the previous step.
    async fn composer_core_update(
        &self,
        location: &crate::site::SiteLocation,
        target: &str,
    ) -> Result<ExecResult> {
        let args = expand(
            "update drupal/core-* -W --with=drupal/core-recommended:{version}",
            &[("version", target)],
        );
        let mut result = self.invoker().composer(&location.app_root, &args).await?;
        if result.success {
            result = self
                .invoker()
                .drush(location, &["updatedb".to_string()])
                .await?;
        }
        if result.success {
            let _ = self
                .invoker()
                .drush(location, &["cache:rebuild".to_string()])
                .await;
        }
        Ok(result)
    }

    /// Update contributed plugins (tarball epoch only).
    ///
    /// On 9.0+ individual plugin updates are no longer supported; the
    /// call is a quiet no-op there.
    pub async fn update_plugins(
        &self,
        hostname: &str,
        path: &str,
        pins: &[PluginPin],
    ) -> Result<()> {
        if let Some(current) = self.get_version(hostname, path).await {
            if at_least(&current, &self.profile.epoch_boundary) {
                debug!("individual plugin updates no longer supported");
                return Ok(());
            }
        }
        let location = self.valid_location(hostname, path).map_err(|_| {
            Error::validation("update failed: cannot determine application root")
        })?;

        let mut args = vec![
            "pm-update".to_string(),
            "-y".to_string(),
            "--check-disabled".to_string(),
            "--no-core".to_string(),
        ];
        args.extend(pins.iter().map(PluginPin::argument));

        let result = self.invoker().drush(&location, &args).await?;
        if !result.success {
            // "pm-update needs a higher bootstrap level" here means the
            // site must first be brought current with the older CLI
            return Err(Error::command(
                "plugin update failed",
                result.error_text().to_string(),
            ));
        }
        Ok(())
    }

    /// Theme updates have no managed path.
    pub fn update_themes(&self, _hostname: &str, _path: &str) -> Result<()> {
        Err(Error::Unsupported {
            message: "theme updates are not supported".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_pin_argument() {
        let bare = PluginPin {
            name: "views".to_string(),
            version: None,
        };
        assert_eq!(bare.argument(), "views");

        let pinned = PluginPin {
            name: "views".to_string(),
            version: Some("7.x-3.24".to_string()),
        };
        assert_eq!(pinned.argument(), "views-7.x-3.24");
    }
}
