//! Version branch extraction and loose version comparison.
//!
//! Drupal version strings are not strict semver: release feeds carry
//! `"9.1.2"`, site manifests report `"9.0"` or bare `"8"`, and download
//! branches use the `<major>.x` convention. This module normalizes all of
//! those into [`semver::Version`] for ordering and provides the branch
//! derivation used to pin package-manager downloads.

use crate::{Error, Result};
use semver::Version;

/// Derive the major branch identifier for a version string.
///
/// - `"9.1.2"` -> `"9.x"`
/// - `"10.x"` -> `"10.x"` (already a branch, returned unchanged)
/// - `"8"` -> `"8.x"`
///
/// Idempotent: `branch_of(branch_of(v)) == branch_of(v)`. Callers must
/// guard against empty input, which yields `".x"`.
pub fn branch_of(version: &str) -> String {
    if version.ends_with(".x") {
        return version.to_string();
    }
    match version.find('.') {
        Some(pos) => format!("{}.x", &version[..pos]),
        // bare major
        None => format!("{version}.x"),
    }
}

/// Leading major number of a version or branch string.
///
/// `"8.4.11"` and `"8.x"` both yield 8. Returns 0 when the string does not
/// start with a digit.
pub fn major_of(version: &str) -> u64 {
    version
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

/// Validate a caller-supplied version string against the accepted
/// character class.
///
/// Install accepts `[0-9.x]`; update additionally accepts `-` for branch
/// pins. Rejection happens before any subprocess or database call.
pub fn validate_version(version: &str, allow_dash: bool) -> Result<()> {
    let ok = !version.is_empty()
        && version
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == 'x' || (allow_dash && c == '-'));
    if ok {
        Ok(())
    } else {
        Err(Error::validation(format!("invalid version number, {version}")))
    }
}

/// Parse a loose Drupal version string into an orderable [`Version`].
///
/// `"9"` and `"9.x"` become `9.0.0`, `"9.1"` becomes `9.1.0`. A trailing
/// `-x` branch suffix is dropped. Returns `None` for strings with no
/// leading numeric component.
pub fn parse_loose(version: &str) -> Option<Version> {
    let trimmed = version.trim().trim_end_matches(".x").trim_end_matches("-x");
    let mut parts = [0u64; 3];
    let mut count = 0;
    for piece in trimmed.split('.') {
        if count == 3 {
            break;
        }
        parts[count] = piece.parse().ok()?;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(Version::new(parts[0], parts[1], parts[2]))
}

/// True when `version` is at least `floor`, comparing loosely.
///
/// Unparseable versions compare as below the floor.
pub fn at_least(version: &str, floor: &Version) -> bool {
    parse_loose(version).map_or(false, |v| v >= *floor)
}

/// Pick the next version after `current` from a list of available releases.
///
/// Releases that fail loose parsing are skipped. Returns the original
/// string form of the smallest release strictly greater than `current`.
pub fn next_version<'a>(available: &'a [String], current: &str) -> Option<&'a str> {
    let floor = parse_loose(current)?;
    available
        .iter()
        .filter_map(|raw| parse_loose(raw).map(|v| (v, raw.as_str())))
        .filter(|(v, _)| *v > floor)
        .min_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw)
}
