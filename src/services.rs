//! Collaborator traits for hosting-panel primitives.
//!
//! Database provisioning, email alias management, password generation, and
//! installation-metadata persistence live in the panel, not in this crate.
//! They are consumed through the narrow traits below; tests substitute
//! in-memory fakes.

use crate::hardening::HardeningLevel;
use crate::options::InstallOptions;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Credentials for a freshly provisioned database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub database: String,
}

impl DatabaseCredentials {
    /// Connection URI for the site-install command.
    ///
    /// `proto` is `mysql` normally, `mysqli` for ancient releases.
    pub fn uri(&self, proto: &str) -> String {
        format!(
            "{proto}://{}:{}@{}/{}",
            self.username, self.password, self.hostname, self.database
        )
    }
}

/// Provisions and rolls back site databases.
pub trait DatabaseProvisioner: Send + Sync {
    /// Whether the backing database service is enabled for this account.
    fn enabled(&self) -> bool;

    /// Create a database and credentials for a site.
    fn create(&self, hostname: &str) -> Result<DatabaseCredentials>;

    /// Drop a previously provisioned database.
    fn rollback(&self, credentials: &DatabaseCredentials) -> Result<()>;
}

/// Email alias checks and creation for postmaster synthesis.
pub trait MailGateway: Send + Sync {
    /// Whether `user@domain` already exists.
    fn address_exists(&self, user: &str, domain: &str) -> bool;

    /// Whether the domain has a configured mail transport at all.
    fn transport_exists(&self, domain: &str) -> bool;

    /// Create a forwarding alias `user@domain` -> `forward_to`.
    fn add_alias(&self, user: &str, domain: &str, forward_to: &str) -> Result<()>;
}

/// Version and failure metadata persisted after install/update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteInfo {
    /// Last known application version, when determinable.
    pub version: Option<String>,
    /// Whether the most recent operation failed.
    pub failed: bool,
}

/// Installation-metadata persistence and operator notification.
pub trait InstallTracker: Send + Sync {
    /// Persist version/failure metadata for an application root.
    fn set_info(&self, app_root: &Path, info: SiteInfo);

    /// Hardening level recorded for an application root, if any.
    fn hardening_level(&self, app_root: &Path) -> Option<HardeningLevel>;

    /// Notify the panel that an install completed; triggers the
    /// confirmation email with login information.
    fn notify_installed(&self, hostname: &str, path: &str, options: &InstallOptions);
}

/// Generates admin passwords when the caller supplies none.
pub trait PasswordSource: Send + Sync {
    fn generate(&self) -> String;
}

/// The full set of injected collaborators.
#[derive(Clone)]
pub struct Services {
    pub database: Arc<dyn DatabaseProvisioner>,
    pub mail: Arc<dyn MailGateway>,
    pub tracker: Arc<dyn InstallTracker>,
    pub passwords: Arc<dyn PasswordSource>,
    pub feed: Arc<dyn crate::feed::VersionFeed>,
}
