//! # drush-webapp
//!
//! Drupal webapp lifecycle management for hosting panels: install,
//! upgrade, plugin lifecycle, administrative recovery, and permission
//! hardening, driven by the application's own `drush` CLI (and `composer`
//! for the 9.0+ packaging epoch).
//!
//! The panel's primitives — database provisioning, email aliases,
//! password generation, installation metadata, upstream release feeds —
//! are injected as [`Services`] traits; subprocess execution goes through
//! the [`CommandRunner`] seam so tests can script tool behavior.
//!
//! ## Example
//!
//! ```rust,no_run
//! use drush_webapp::{AppProfile, DrupalManager, InstallOptions, TokioRunner};
//!
//! # fn services() -> drush_webapp::Services { unimplemented!() }
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> drush_webapp::Result<()> {
//!     let manager = DrupalManager::new(
//!         AppProfile::drupal(),
//!         "/home/account/var/www",
//!         "example.com",
//!         TokioRunner::new(),
//!         services(),
//!     );
//!
//!     let outcome = manager
//!         .install(
//!             "example.com",
//!             "",
//!             InstallOptions {
//!                 version: Some("9.0.0".to_string()),
//!                 user: "admin".to_string(),
//!                 email: "admin@example.com".to_string(),
//!                 ..Default::default()
//!             },
//!         )
//!         .await?;
//!     println!("installed into {:?}", outcome.location.doc_root);
//!     Ok(())
//! }
//! ```

mod error;
mod exec;
mod feed;
mod hardening;
mod maintenance;
mod manager;
mod options;
mod profile;
mod services;
mod site;
mod versioning;

pub use error::{Error, Result};
pub use exec::{
    expand, CommandRunner, ExecResult, Invoker, RawOutput, TokioRunner,
    DEFAULT_COMMAND_TIMEOUT,
};
pub use feed::{CachedFeed, VersionFeed, DEFAULT_FEED_TTL};
pub use hardening::{
    append_trusted_hosts, fix_rewrite_base, harden, remove_invalid_directives, HardeningLevel,
};
pub use maintenance::set_maintenance;
pub use manager::{
    AdminUpdate, DbConfig, DrupalManager, InstallOutcome, PluginInfo, PluginListing, PluginPin,
    PluginState,
};
pub use options::InstallOptions;
pub use profile::{AppProfile, Epoch};
pub use services::{
    DatabaseCredentials, DatabaseProvisioner, InstallTracker, MailGateway, PasswordSource,
    Services, SiteInfo,
};
pub use site::{split_host, SiteLocation, UPDATE_LOCK_FILE};
pub use versioning::{branch_of, major_of, next_version, parse_loose, validate_version};
