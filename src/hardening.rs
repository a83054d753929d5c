//! Permission lockdown and web-server configuration fixups.
//!
//! After install (and again after every update) write access is restricted
//! to the narrowest directory set the application needs at runtime: the
//! per-site upload directories. The remaining fixups keep the generated
//! `.htaccess` usable under the panel's server configuration and guard the
//! settings file against host-header spoofing.

use crate::site::SiteLocation;
use crate::versioning::parse_loose;
use crate::{Error, Result};
use semver::Version;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use strum::{Display, EnumString};
use tracing::{debug, info};
use walkdir::WalkDir;

/// How aggressively write access is locked down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum HardeningLevel {
    /// Whole tree read-only to the web runtime except `sites/*/files`.
    Max,
    /// Only the settings file is locked.
    Min,
    /// Leave permissions alone.
    None,
}

impl Default for HardeningLevel {
    fn default() -> Self {
        Self::Max
    }
}

/// Directives the panel's server configuration refuses inside `.htaccess`
/// files under upload directories.
const INVALID_DIRECTIVES: &[&str] = &["options", "sethandler"];

/// Apply a hardening level to an installed location.
pub fn harden(location: &SiteLocation, level: HardeningLevel) -> Result<()> {
    match level {
        HardeningLevel::None => Ok(()),
        HardeningLevel::Min => {
            let settings = location.settings_file();
            if settings.exists() {
                set_mode(&settings, 0o444)?;
            }
            Ok(())
        }
        HardeningLevel::Max => {
            lockdown_tree(&location.doc_root)?;
            for files_dir in upload_dirs(&location.doc_root) {
                release_tree(&files_dir)?;
            }
            info!(docroot = %location.doc_root.display(), level = %level, "hardening applied");
            Ok(())
        }
    }
}

/// Expand the `sites/*/files` write-allowed set under a document root.
fn upload_dirs(doc_root: &Path) -> Vec<std::path::PathBuf> {
    let sites = doc_root.join("sites");
    let mut out = Vec::new();
    let entries = match fs::read_dir(&sites) {
        Ok(entries) => entries,
        Err(_) => return out,
    };
    for entry in entries.flatten() {
        let files = entry.path().join("files");
        if files.is_dir() {
            out.push(files);
        }
    }
    out
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

/// Remove the web runtime's write bits from an entire tree.
///
/// The owning panel user keeps write throughout; later updates rename and
/// rewrite files in this tree.
fn lockdown_tree(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let mode = if entry.file_type().is_dir() { 0o755 } else { 0o644 };
        set_mode(entry.path(), mode)?;
    }
    Ok(())
}

/// Restore the web runtime's write bits on an upload tree.
fn release_tree(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let mode = if entry.file_type().is_dir() { 0o775 } else { 0o664 };
        set_mode(entry.path(), mode)?;
    }
    Ok(())
}

/// Strip disallowed server directives from the `.htaccess` under a
/// sub-path of the document root.
///
/// Drupal drops an `.htaccess` into its upload directory whose `Options`
/// and handler overrides the panel's server configuration rejects outright,
/// taking the whole vhost down with a 500. Nothing to do when the file is
/// absent.
pub fn remove_invalid_directives(doc_root: &Path, subpath: &str) -> Result<()> {
    let htaccess = doc_root.join(subpath.trim_matches('/')).join(".htaccess");
    if !htaccess.exists() {
        return Ok(());
    }
    let content = fs::read_to_string(&htaccess)?;
    let total = content.lines().count();
    let kept: Vec<&str> = content
        .lines()
        .filter(|line| {
            let first = line.trim().split_whitespace().next().unwrap_or("");
            !INVALID_DIRECTIVES.contains(&first.to_ascii_lowercase().as_str())
        })
        .collect();
    if kept.len() != total {
        debug!(file = %htaccess.display(), "stripped invalid directives");
        fs::write(&htaccess, kept.join("\n") + "\n")?;
    }
    Ok(())
}

/// Ensure a `RewriteBase` directive is present in the document root's
/// `.htaccess`.
///
/// Inserted after the `RewriteEngine` line when one exists, appended
/// otherwise. An existing `RewriteBase` is left untouched.
pub fn fix_rewrite_base(doc_root: &Path, path: &str) -> Result<()> {
    let htaccess = doc_root.join(".htaccess");
    if !htaccess.exists() {
        return Ok(());
    }
    let content = fs::read_to_string(&htaccess)?;
    if content.lines().any(|l| l.trim_start().starts_with("RewriteBase")) {
        return Ok(());
    }

    let trimmed = path.trim_matches('/');
    let base = if trimmed.is_empty() {
        "RewriteBase /".to_string()
    } else {
        format!("RewriteBase /{trimmed}")
    };

    let mut lines: Vec<String> = Vec::new();
    let mut inserted = false;
    for line in content.lines() {
        lines.push(line.to_string());
        if !inserted && line.trim_start().to_ascii_lowercase().starts_with("rewriteengine") {
            lines.push(base.clone());
            inserted = true;
        }
    }
    if !inserted {
        lines.push(base);
    }
    fs::write(&htaccess, lines.join("\n") + "\n")?;
    Ok(())
}

/// Configuration block appended to the settings file to restrict which
/// `Host` header values the application services. `$_SERVER["DOMAIN"]` is
/// populated by the panel for every vhost.
const TRUSTED_HOST_BLOCK: &str = concat!(
    "\n\n",
    "/** in the event the domain name changes, trust site configuration */\n",
    "$settings[\"trusted_host_patterns\"] = array(\n",
    "\t'^(www\\.)?' . str_replace(\".\", \"\\\\.\", $_SERVER[\"DOMAIN\"]) . '$'\n",
    ");\n",
);

/// Append the trusted-host-patterns block to the settings file.
///
/// Only applies to versions 8.0 and later; older releases have no such
/// setting and are silently skipped.
pub fn append_trusted_hosts(location: &SiteLocation, version: &str) -> Result<()> {
    let floor = Version::new(8, 0, 0);
    match parse_loose(version) {
        Some(v) if v >= floor => {}
        _ => return Ok(()),
    }

    let file = location.settings_file();
    let content = fs::read_to_string(&file).map_err(|_| {
        Error::command(
            "unable to add trusted_host_patterns configuration",
            format!(
                "cannot read site configuration for `{}'",
                location.hostname
            ),
        )
    })?;
    fs::write(&file, content + TRUSTED_HOST_BLOCK)?;
    Ok(())
}
