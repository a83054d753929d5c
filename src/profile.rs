//! Capability profile selecting per-generation behavior.
//!
//! The panel ships the same management logic for more than one product
//! generation; what differs is a small table of constants: the minimum
//! supported version, where the bundled legacy CLI lives, which release
//! marks the packaging-epoch boundary, and the per-major companion-tool
//! compatibility map. An [`AppProfile`] carries that table and is chosen at
//! construction time instead of duplicating the module per generation.

use semver::Version;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Packaging epoch of a Drupal release.
///
/// Releases below 9.0.0 ship as tarballs fetched by drush itself; 9.0.0
/// and later are Composer projects whose web-servable files live under a
/// `web/` subdirectory and whose drush lives in `vendor/bin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Epoch {
    /// Tarball packaging, managed entirely through the bundled drush phar.
    Legacy,
    /// Composer-project packaging with a relocated web root.
    Composer,
}

/// Capability table for one product generation.
#[derive(Debug, Clone)]
pub struct AppProfile {
    /// Display name used in operator-facing messages.
    pub app_name: String,

    /// Oldest version this profile will install.
    pub min_version: Version,

    /// Bundled drush phar used for legacy sites and old runtimes.
    pub legacy_cli: PathBuf,

    /// First release of the Composer packaging epoch.
    pub epoch_boundary: Version,

    /// Oldest runtime (PHP pool) version able to host the modern drush.
    pub min_modern_runtime: Version,

    /// Runtime version of the pool serving this site, when known.
    ///
    /// `None` means the panel could not resolve the pool; the modern CLI
    /// is assumed usable in that case.
    pub runtime_version: Option<Version>,

    /// Companion-tool branch per application major version.
    pub compatibility: BTreeMap<u64, String>,
}

impl AppProfile {
    /// The stock Drupal profile.
    pub fn drupal() -> Self {
        let mut compatibility = BTreeMap::new();
        compatibility.insert(8, "8.x".to_string());
        compatibility.insert(9, "8.4".to_string());
        compatibility.insert(10, "11".to_string());

        Self {
            app_name: "Drupal".to_string(),
            min_version: Version::new(7, 33, 0),
            legacy_cli: PathBuf::from("/usr/share/pear/drush-8.4.11.phar"),
            epoch_boundary: Version::new(9, 0, 0),
            min_modern_runtime: Version::new(7, 1, 0),
            runtime_version: None,
            compatibility,
        }
    }

    /// Epoch a given release version belongs to.
    pub fn epoch_of(&self, version: &Version) -> Epoch {
        if *version >= self.epoch_boundary {
            Epoch::Composer
        } else {
            Epoch::Legacy
        }
    }

    /// Epoch of an installed tree, probed from its manifest markers.
    ///
    /// Composer-epoch installs carry the scaffold package under `vendor/`
    /// (or a vendored Composer itself). Anything else is treated as legacy.
    pub fn epoch_of_install(&self, app_root: &Path) -> Epoch {
        if app_root.join("vendor/drupal/core-composer-scaffold").exists()
            || app_root.join("Composer/Composer.php").exists()
        {
            Epoch::Composer
        } else {
            Epoch::Legacy
        }
    }

    /// Companion-tool branch for an application major version.
    pub fn companion_branch(&self, major: u64) -> Option<&str> {
        self.compatibility.get(&major).map(String::as_str)
    }

    /// True when the serving runtime is too old for the modern CLI.
    pub fn runtime_requires_legacy_cli(&self) -> bool {
        self.runtime_version
            .as_ref()
            .map_or(false, |v| *v < self.min_modern_runtime)
    }
}
