//! Install options and default merging.

use crate::versioning::validate_version;
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Options for a site install.
///
/// Constructed once per install call; defaults are filled in by
/// [`InstallOptions::finalize`] and the struct is never mutated afterwards.
///
/// # Example
///
/// ```rust
/// use drush_webapp::InstallOptions;
///
/// let opts = InstallOptions {
///     version: Some("9.0.0".to_string()),
///     user: "admin".to_string(),
///     email: "a@b.com".to_string(),
///     ..Default::default()
/// };
/// let opts = opts.finalize().unwrap();
/// assert_eq!(opts.profile.as_deref(), Some("standard"));
/// assert_eq!(opts.dist.as_deref(), Some("drupal-9.0.0"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallOptions {
    /// Pinned version; latest when absent. Charset-validated before use.
    pub version: Option<String>,

    /// Distribution to install; defaults to the stock distribution, with
    /// the pinned version appended.
    pub dist: Option<String>,

    /// Install profile; defaults to `standard`, or to the distribution
    /// name when a custom distribution was chosen.
    pub profile: Option<String>,

    /// Interface locale; defaults to `us`.
    pub locale: Option<String>,

    /// Site title; a placeholder title is used when absent.
    pub title: Option<String>,

    /// Administrative account name.
    pub user: String,

    /// Administrative contact email; install confirmations go here.
    pub email: String,

    /// Administrative password; autogenerated when absent.
    pub password: Option<String>,

    /// From-address for site mailings; a postmaster alias is synthesized
    /// when absent.
    pub site_email: Option<String>,

    /// Whether the site should be served over SSL.
    pub ssl: bool,
}

/// Placeholder title applied when the caller supplies none.
pub const DEFAULT_TITLE: &str = "A Random Drupal Install";

impl InstallOptions {
    /// Validate caller input and fill defaults.
    ///
    /// Rejects malformed version strings and site emails before any side
    /// effect is performed.
    pub fn finalize(mut self) -> Result<Self> {
        if let Some(version) = &self.version {
            validate_version(version, false)?;
        }

        if self.locale.is_none() {
            self.locale = Some("us".to_string());
        }

        match &self.dist {
            None => {
                self.profile = Some("standard".to_string());
                let mut dist = "drupal".to_string();
                if let Some(version) = &self.version {
                    dist.push('-');
                    dist.push_str(version);
                }
                self.dist = Some(dist);
            }
            Some(dist) => {
                if self.profile.is_none() {
                    self.profile = Some(dist.clone());
                }
            }
        }

        if self.title.is_none() {
            self.title = Some(DEFAULT_TITLE.to_string());
        }

        if let Some(site_email) = &self.site_email {
            if !email_valid(site_email) {
                return Err(Error::validation(format!(
                    "invalid site email `{site_email}' provided"
                )));
            }
        }

        Ok(self)
    }
}

/// Minimal structural email check.
pub(crate) fn email_valid(address: &str) -> bool {
    // one @, nonempty local part, dotted domain
    let re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex");
    re.is_match(address)
}
