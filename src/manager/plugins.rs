//! Plugin lifecycle operations.
//!
//! These are uniform thin wrappers around the drush invoker: build one
//! command line, execute, translate failure output into an error. The only
//! stateful behavior is uninstall's active-plugin guard.

use super::DrupalManager;
use crate::exec::CommandRunner;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use strum::{Display, EnumString};
use tracing::{info, warn};

/// Activation state reported by drush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum PluginState {
    #[strum(serialize = "enabled")]
    Enabled,
    #[strum(serialize = "disabled")]
    Disabled,
    #[strum(serialize = "not installed")]
    NotInstalled,
}

/// Version metadata for one installed plugin.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    /// Installed version.
    pub version: String,
    /// Next available version, when an upgrade is known.
    pub next: Option<String>,
    /// Whether the installed version is current.
    pub current: bool,
    /// Newest version known upstream.
    pub max: String,
    /// Activation state.
    pub state: PluginState,
}

/// drush `pm-info --format=json` fields this crate consumes.
#[derive(Debug, Deserialize)]
struct PluginMeta {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// drush `pm-list --format=json` row.
#[derive(Debug, Deserialize)]
pub struct PluginListing {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl<R: CommandRunner> DrupalManager<R> {
    /// Download and activate a plugin, optionally pinned to a version.
    ///
    /// Bare versions get the `-x` branch suffix appended (upstream's
    /// `<major>-x` naming convention). A download failure is an error; an
    /// activation failure after a successful download only warns.
    pub async fn install_plugin(
        &self,
        hostname: &str,
        path: &str,
        plugin: &str,
        version: Option<&str>,
    ) -> Result<()> {
        let location = self.valid_location(hostname, path)?;

        let pinned = match version {
            Some(v) if !v.contains('-') => format!("{plugin}-{v}-x"),
            Some(v) => format!("{plugin}-{v}"),
            None => plugin.to_string(),
        };

        let result = self
            .invoker()
            .drush(
                &location,
                &["pm-download".to_string(), "-y".to_string(), pinned],
            )
            .await?;
        if !result.success {
            return Err(Error::command(
                format!("failed to install plugin `{plugin}'"),
                result.error_text().to_string(),
            ));
        }

        if let Err(e) = self.enable_plugin(hostname, path, plugin).await {
            warn!(error = %e, "downloaded plugin `{plugin}' but failed to activate");
            return Ok(());
        }
        info!("installed plugin `{plugin}'");
        Ok(())
    }

    /// Activate a downloaded plugin.
    pub async fn enable_plugin(&self, hostname: &str, path: &str, plugin: &str) -> Result<()> {
        let location = self.valid_location(hostname, path)?;
        let result = self
            .invoker()
            .drush(
                &location,
                &[
                    "pm-enable".to_string(),
                    "-y".to_string(),
                    plugin.to_string(),
                ],
            )
            .await?;
        if !result.success {
            return Err(Error::command(
                format!("failed to enable plugin `{plugin}'"),
                result.error_text().to_string(),
            ));
        }
        Ok(())
    }

    /// Deactivate a plugin.
    pub async fn disable_plugin(&self, hostname: &str, path: &str, plugin: &str) -> Result<()> {
        let location = self.valid_location(hostname, path)?;
        let result = self
            .invoker()
            .drush(
                &location,
                &[
                    "pm-disable".to_string(),
                    "-y".to_string(),
                    plugin.to_string(),
                ],
            )
            .await?;
        if !result.success {
            return Err(Error::command(
                format!("failed to disable plugin `{plugin}'"),
                result.error_text().to_string(),
            ));
        }
        info!("disabled plugin `{plugin}'");
        Ok(())
    }

    /// Remove a plugin.
    ///
    /// Active plugins are rejected unless `force`, which disables first.
    /// drush reports uninstall refusals with a `Warning:` prefix on
    /// stdout; empty output likewise means nothing happened.
    pub async fn uninstall_plugin(
        &self,
        hostname: &str,
        path: &str,
        plugin: &str,
        force: bool,
    ) -> Result<()> {
        let location = self.valid_location(hostname, path)?;

        if self.plugin_active(hostname, path, plugin).await {
            if !force {
                return Err(Error::validation(format!(
                    "plugin `{plugin}' is active, disable first"
                )));
            }
            self.disable_plugin(hostname, path, plugin).await?;
        }

        let result = self
            .invoker()
            .drush(
                &location,
                &["pm-uninstall".to_string(), plugin.to_string()],
            )
            .await?;
        if result.stdout.is_empty() || result.stdout.starts_with("Warning:") {
            return Err(Error::command(
                format!("failed to uninstall plugin `{plugin}'"),
                result.error_text().to_string(),
            ));
        }
        info!("uninstalled plugin `{plugin}'");
        Ok(())
    }

    /// Whether a plugin is currently enabled.
    pub async fn plugin_active(&self, hostname: &str, path: &str, plugin: &str) -> bool {
        matches!(
            self.plugin_status(hostname, path, plugin).await,
            Ok(Some(info)) if info.state == PluginState::Enabled
        )
    }

    /// Version/state metadata for one plugin, `None` when unknown to the
    /// site.
    pub async fn plugin_status(
        &self,
        hostname: &str,
        path: &str,
        plugin: &str,
    ) -> Result<Option<PluginInfo>> {
        let location = self.valid_location(hostname, path)?;
        let args = crate::exec::expand(
            "pm-info --format=json {plugin}",
            &[("plugin", plugin)],
        );
        let result = self.invoker().drush(&location, &args).await?;
        if !result.success {
            return Ok(None);
        }

        let metas: BTreeMap<String, PluginMeta> = serde_json::from_str(&result.stdout)?;
        Ok(metas.into_values().next_back().map(|meta| {
            let version = meta.version.unwrap_or_default();
            let state = meta
                .status
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(PluginState::NotInstalled);
            PluginInfo {
                next: None,
                current: true,
                max: version.clone(),
                version,
                state,
            }
        }))
    }

    /// Enumerate non-core plugins, optionally filtered by state.
    pub async fn list_plugins(
        &self,
        hostname: &str,
        path: &str,
        status: Option<PluginState>,
    ) -> Result<BTreeMap<String, PluginListing>> {
        let location = self.valid_location(hostname, path)?;
        let mut args = vec![
            "pm-list".to_string(),
            "--format=json".to_string(),
            "--no-core".to_string(),
        ];
        if let Some(state) = status {
            args.push(format!("--status={state}"));
        }
        let result = self.invoker().drush(&location, &args).await?;
        if !result.success {
            return Err(Error::command(
                "failed to enumerate plugins",
                result.error_text().to_string(),
            ));
        }
        Ok(serde_json::from_str(&result.stdout)?)
    }

    /// Recovery sweep: disable every enabled plugin.
    ///
    /// Individual disable failures only warn; the sweep continues and the
    /// successfully disabled plugin names are returned.
    pub async fn disable_all_plugins(&self, hostname: &str, path: &str) -> Result<Vec<String>> {
        let installed = match self.list_plugins(hostname, path, None).await {
            Ok(listing) => listing,
            Err(_) => return Ok(Vec::new()),
        };

        let mut disabled = Vec::new();
        for (key, listing) in installed {
            let enabled = listing
                .status
                .as_deref()
                .map_or(false, |s| s.eq_ignore_ascii_case("enabled"));
            if !enabled {
                continue;
            }
            match self.disable_plugin(hostname, path, &key).await {
                Ok(()) => disabled.push(listing.name.unwrap_or(key)),
                Err(e) => warn!(error = %e, "failed to disable plugin `{key}'"),
            }
        }
        if !disabled.is_empty() {
            info!("disabled plugins: `{}'", disabled.join(","));
        }
        Ok(disabled)
    }
}
