//! Site location resolution and on-disk install probing.
//!
//! A site is addressed by hostname plus an optional sub-path. The web
//! server's document root and drush's application root usually coincide,
//! but Composer-epoch packaging relocates web-servable files into a `web/`
//! subdirectory; the application root is then the project directory one
//! level up. Locations are recomputed on every public entry point because
//! the filesystem can change between calls (a Composer re-layout does
//! exactly that).

use std::path::{Path, PathBuf};

/// Lock marker left by an interrupted or concurrent core update.
///
/// This crate only ever checks for the marker; drush itself owns writing
/// and clearing it.
pub const UPDATE_LOCK_FILE: &str = ".drush-lock-update";

/// A resolved site location.
#[derive(Debug, Clone)]
pub struct SiteLocation {
    /// Domain or subdomain the site is served from.
    pub hostname: String,
    /// Optional path under the hostname, empty for the root.
    pub path: String,
    /// Directory the web server serves from.
    pub doc_root: PathBuf,
    /// Directory drush treats as the working root.
    pub app_root: PathBuf,
}

impl SiteLocation {
    /// Resolve a location under the panel's web root base directory.
    ///
    /// The panel-facing document root is `<base>/<hostname>[/<path>]`.
    /// When that directory is (or contains) a Composer-epoch layout, the
    /// application root and document root are split around the `web/`
    /// subdirectory.
    pub fn resolve(base: &Path, hostname: &str, path: &str) -> Self {
        let mut candidate = base.join(hostname);
        let trimmed = path.trim_matches('/');
        if !trimmed.is_empty() {
            candidate = candidate.join(trimmed);
        }

        let (doc_root, app_root) = if candidate.file_name().map_or(false, |n| n == "web")
            && candidate.join("index.php").exists()
        {
            // panel already points at the relocated public directory
            let parent = candidate
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| candidate.clone());
            (candidate, parent)
        } else if candidate.join("web/index.php").exists() {
            // scaffolded but not yet remapped
            (candidate.join("web"), candidate.clone())
        } else {
            (candidate.clone(), candidate)
        };

        Self {
            hostname: hostname.to_string(),
            path: trimmed.to_string(),
            doc_root,
            app_root,
        }
    }

    /// Whether the location holds a recognizable install.
    ///
    /// Probes `sites/default`, `sites/all`, and the Composer scaffold
    /// marker under the application root.
    pub fn valid(&self) -> bool {
        self.doc_root.join("sites/default").exists()
            || self.doc_root.join("sites/all").exists()
            || self.app_root.join("vendor/drupal/core-composer-scaffold").exists()
    }

    /// Whether an update lock marker is present in the application root.
    pub fn is_locked(&self) -> bool {
        self.app_root.join(UPDATE_LOCK_FILE).exists()
    }

    /// `.htaccess` path under the document root.
    pub fn htaccess(&self) -> PathBuf {
        self.doc_root.join(".htaccess")
    }

    /// Site settings file under the document root.
    pub fn settings_file(&self) -> PathBuf {
        self.doc_root.join("sites/default/settings.php")
    }
}

/// Split a hostname into its subdomain and registrable-domain parts.
///
/// `"blog.example.com"` -> `("blog", "example.com")`; a bare two-label
/// domain has an empty subdomain part. Used to synthesize the postmaster
/// address when no site email is supplied.
pub fn split_host(hostname: &str) -> (String, String) {
    let labels: Vec<&str> = hostname.split('.').collect();
    if labels.len() <= 2 {
        return (String::new(), hostname.to_string());
    }
    let split = labels.len() - 2;
    (labels[..split].join("."), labels[split..].join("."))
}
