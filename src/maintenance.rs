//! Maintenance-mode bracketing around mutating operations.

use crate::exec::{CommandRunner, Invoker};
use crate::site::SiteLocation;
use crate::versioning::major_of;
use tracing::warn;

/// Toggle maintenance mode and rebuild the cache.
///
/// Versions 8 and later use the state API (`sset system.maintenance_mode`
/// plus `cr`); older releases use the variable API (`vset --exact
/// maintenance_mode` plus `cache-clear all`). Both the mode-set and the
/// cache command are always attempted; a failure of either is logged as a
/// warning and never aborts the caller, so an update proceeds even when
/// the holding page could not be raised.
///
/// Always returns `true`. Callers must not treat the return value as a
/// success signal; this mirrors the long-standing observable contract.
pub async fn set_maintenance<R: CommandRunner>(
    invoker: &Invoker<'_, R>,
    location: &SiteLocation,
    enabled: bool,
    branch: &str,
) -> bool {
    let mode = if enabled { "1" } else { "0" };
    let (mode_args, cache_args): (Vec<String>, Vec<String>) = if major_of(branch) >= 8 {
        (
            vec![
                "sset".to_string(),
                "system.maintenance_mode".to_string(),
                mode.to_string(),
            ],
            vec!["cr".to_string()],
        )
    } else {
        (
            vec![
                "vset".to_string(),
                "--exact".to_string(),
                "maintenance_mode".to_string(),
                mode.to_string(),
            ],
            vec!["cache-clear".to_string(), "all".to_string()],
        )
    };

    match invoker.drush(location, &mode_args).await {
        Ok(result) if result.success => {}
        _ => warn!(host = %location.hostname, "failed to set maintenance mode"),
    }
    match invoker.drush(location, &cache_args).await {
        Ok(result) if result.success => {}
        _ => warn!(host = %location.hostname, "failed to rebuild cache"),
    }

    true
}
