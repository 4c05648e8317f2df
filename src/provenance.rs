//! Provenance headers stamped into installed files.
//!
//! ```text
//! /**
//!  * @graft-origin @acme/ui/src/Button.tsx
//!  * @graft-version 1.4.0
//!  * @graft-installed 2026-10-18
//!  * @graft-checksum 9f86d081...
//!  */
//! ```
//!
//! A block comment is used so the same header is valid in scripts and
//! stylesheets. Leading directives (`"use client";`) must stay the first
//! statement of a file, so the header goes right after them.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::ops::Range;
use std::sync::LazyLock;
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use crate::util::compare_versions;

const ORIGIN_TAG: &str = "@graft-origin";
const VERSION_TAG: &str = "@graft-version";
const INSTALLED_TAG: &str = "@graft-installed";
const CHECKSUM_TAG: &str = "@graft-checksum";

static DIRECTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:"use [^"\r\n]*"|'use [^'\r\n]*')\s*;?\s*(?://.*|/\*.*?\*/)?\s*$"#).expect("directive pattern is valid")
});

/// Where an installed file came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    /// `<package>/<sourcePath>` in the registry.
    pub origin: String,
    pub version: String,
    pub date: NaiveDate,
    /// SHA-256 of the file without its header, at install time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Hex SHA-256 of a file body.
pub fn checksum(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// Byte length of the leading directive lines, including their line breaks.
fn directive_prefix_len(content: &str) -> usize {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let text = line.trim_start_matches('\u{feff}');
        if !DIRECTIVE_PATTERN.is_match(text.trim_end_matches(['\r', '\n'])) {
            break;
        }
        offset += line.len();
    }
    offset
}

/// Finds the header and returns its byte range (including its trailing line
/// break) together with the parsed fields.
///
/// A header closing the file without a line break follows a directive that had
/// none; the break inserted before it belongs to the header.
fn locate_header(content: &str) -> Option<(Range<usize>, Provenance)> {
    let start = directive_prefix_len(content);
    let rest = &content[start..];
    if !rest.starts_with("/**") {
        return None;
    }
    let close = rest.find("*/")? + 2;
    let mut end = close;
    if rest[close..].starts_with("\r\n") {
        end += 2;
    } else if rest[close..].starts_with('\n') {
        end += 1;
    }

    let (mut origin, mut version, mut date, mut checksum) = (None, None, None, None);
    for line in rest[..close].lines() {
        let line = line.trim().trim_start_matches("/**").trim_start_matches('*').trim();
        if let Some(value) = line.strip_prefix(ORIGIN_TAG) {
            origin = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix(VERSION_TAG) {
            version = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix(INSTALLED_TAG) {
            date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok();
        } else if let Some(value) = line.strip_prefix(CHECKSUM_TAG) {
            checksum = Some(value.trim().to_string());
        }
    }
    let provenance = Provenance {
        origin: origin?,
        version: version?,
        date: date?,
        checksum,
    };
    let begin = if end == rest.len() && close == end && content[..start].ends_with('\n') {
        start - 1
    } else {
        start
    };
    Some((begin..start + end, provenance))
}

/// Reads the provenance header of a file, `None` for untracked files.
pub fn extract_origin(content: &str) -> Option<Provenance> {
    locate_header(content).map(|(_, provenance)| provenance)
}

/// Removes the provenance header, borrowing the input when there is none.
pub fn strip_header(content: &str) -> Cow<'_, str> {
    match locate_header(content) {
        Some((range, _)) => {
            let mut body = String::with_capacity(content.len() - range.len());
            body.push_str(&content[..range.start]);
            body.push_str(&content[range.end..]);
            Cow::Owned(body)
        }
        None => Cow::Borrowed(content),
    }
}

/// Stamps `content` with a provenance header, replacing any existing one.
pub fn stamp(content: &str, origin: &str, version: &str, date: NaiveDate) -> String {
    let body = strip_header(content);
    let split = directive_prefix_len(&body);
    let (directives, rest) = body.split_at(split);
    let sum = checksum(&body);
    let header = format!(
        "/**\n * {ORIGIN_TAG} {origin}\n * {VERSION_TAG} {version}\n * {INSTALLED_TAG} {}\n * {CHECKSUM_TAG} {sum}\n */",
        date.format("%Y-%m-%d")
    );
    if directives.is_empty() || directives.ends_with('\n') {
        format!("{directives}{header}\n{rest}")
    } else {
        // A directive without a line break is the last line of the file.
        format!("{directives}\n{header}")
    }
}

/// Whether the file body changed since it was stamped. `None` when the file
/// has no header or the header carries no checksum.
pub fn is_locally_modified(content: &str) -> Option<bool> {
    let (range, provenance) = locate_header(content)?;
    let recorded = provenance.checksum?;
    let body = format!("{}{}", &content[..range.start], &content[range.end..]);
    Some(checksum(&body) != recorded)
}

/// How an existing file relates to the registry's current version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Drift {
    /// No provenance header: the file belongs to the user.
    Untracked,
    UpToDate { modified: bool },
    /// Installed from an older (or incomparable) registry version.
    Outdated { installed: String, modified: bool },
    /// Installed from a newer version than the registry offers.
    Ahead { installed: String, modified: bool },
}

impl Drift {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Drift::UpToDate { .. })
    }

    pub fn describe(&self) -> String {
        let edited = |modified: &bool| if *modified { ", locally modified" } else { "" };
        match self {
            Drift::Untracked => "no provenance header (user-owned file)".to_string(),
            Drift::UpToDate { modified } => format!("up to date{}", edited(modified)),
            Drift::Outdated { installed, modified } => {
                format!("installed from version {installed}{}", edited(modified))
            }
            Drift::Ahead { installed, modified } => {
                format!("installed from newer version {installed}{}", edited(modified))
            }
        }
    }
}

/// Classifies existing file content against the registry's current version.
pub fn classify(content: &str, current_version: &str) -> Drift {
    let Some(provenance) = extract_origin(content) else {
        return Drift::Untracked;
    };
    let modified = is_locally_modified(content).unwrap_or(false);
    match compare_versions(&provenance.version, current_version) {
        Some(Ordering::Equal) => Drift::UpToDate { modified },
        Some(Ordering::Greater) => Drift::Ahead { installed: provenance.version, modified },
        _ => Drift::Outdated { installed: provenance.version, modified },
    }
}
