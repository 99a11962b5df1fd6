use itertools::Itertools;
use lazy_regex::regex_captures;
use log::debug;
use semver::{BuildMetadata, Comparator, Op, Version, VersionReq};
use std::{cmp::Ordering, fmt};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("`{range}` is not a valid version range: {reason}")]
    InvalidRange { range: String, reason: String },
}

/// Turns a raw version string like `v1.2.0` or ` =1.2.0 ` into a [`Version`]. Build metadata is
/// dropped, so `1.2.0+abc` cleans to `1.2.0`. Returns `None` for anything that is not a complete
/// `MAJOR.MINOR.PATCH` version.
#[must_use]
pub fn clean(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches(['=', 'v', 'V']);
    let mut version = Version::parse(trimmed).ok()?;
    version.build = BuildMetadata::EMPTY;
    Some(version)
}

/// Orders two tags newest first. Tags which do not clean to a version sort after every tag that
/// does.
#[must_use]
pub fn rcompare(a: &str, b: &str) -> Ordering {
    match (clean(a), clean(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Returns true if `tag` cleans to a version that `range` accepts.
#[must_use]
pub fn satisfies(tag: &str, range: &VersionRange) -> bool {
    clean(tag).is_some_and(|v| range.matches(&v))
}

/// A set of alternative version requirements. A version matches the range when it matches any
/// alternative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionRange {
    alternatives: Vec<VersionReq>,
    raw: String,
}

impl VersionRange {
    /// A range that only accepts `version` (ignoring build metadata).
    #[must_use]
    pub fn exact(version: &Version) -> Self {
        VersionRange {
            alternatives: vec![VersionReq {
                comparators: vec![Comparator {
                    op: Op::Exact,
                    major: version.major,
                    minor: Some(version.minor),
                    patch: Some(version.patch),
                    pre: version.pre.clone(),
                }],
            }],
            raw: version.to_string(),
        }
    }

    /// Parses npm-style range syntax. A complete version is an exact match. Bare partial
    /// versions and wildcards are X-ranges, comparators separated by spaces or commas are
    /// intersected, `||` separates alternatives, and `A - B` is an inclusive range.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidRange`] when any part of the input cannot be parsed.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let raw = input.trim().to_string();
        if raw.is_empty() {
            return Err(invalid(&raw, "the range is empty"));
        }

        let alternatives = raw
            .split("||")
            .map(|alt| parse_alternative(&raw, alt))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(VersionRange { alternatives, raw })
    }

    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// What the caller asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionRequest {
    Latest,
    Exact(Version),
    Range(VersionRange),
}

impl VersionRequest {
    /// Classifies caller input. This never fails. Input that is neither a version nor a range
    /// means the latest release.
    #[must_use]
    pub fn parse(input: Option<&str>) -> Self {
        let Some(input) = input.map(str::trim).filter(|i| !i.is_empty()) else {
            debug!("No version provided. Falling back to latest release ...");
            return VersionRequest::Latest;
        };

        if let Some(version) = clean(input) {
            return VersionRequest::Exact(version);
        }

        match VersionRange::parse(input) {
            Ok(range) => VersionRequest::Range(range),
            Err(e) => {
                debug!("Invalid version provided ({e}). Falling back to latest release ...");
                VersionRequest::Latest
            }
        }
    }
}

fn parse_alternative(raw: &str, alt: &str) -> Result<VersionReq, VersionError> {
    if let Some((_, low, high)) = regex_captures!(r"^\s*(\S+)\s+-\s+(\S+)\s*$", alt) {
        return to_req(
            raw,
            &[
                format!(">={}", strip_wildcards(low)),
                format!("<={}", strip_wildcards(high)),
            ],
        );
    }

    let mut comparators: Vec<String> = vec![];
    let mut pending_op: Option<&str> = None;
    for token in alt.split([' ', '\t', ',']).filter(|t| !t.is_empty()) {
        if is_operator(token) {
            if pending_op.is_some() {
                return Err(invalid(raw, "two operators in a row"));
            }
            pending_op = Some(token);
            continue;
        }
        let token = match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            None => token.to_string(),
        };
        comparators.extend(translate_comparator(raw, &token)?);
    }
    if pending_op.is_some() {
        return Err(invalid(raw, "an operator is missing its version"));
    }

    if comparators.is_empty() {
        return Ok(VersionReq::STAR);
    }
    to_req(raw, &comparators)
}

fn is_operator(token: &str) -> bool {
    matches!(token, "=" | ">" | ">=" | "<" | "<=" | "~" | "^")
}

// Splits a leading operator from the version part and rewrites the comparator so that the semver
// crate reads it the way npm does. The main difference is that a bare version without an operator
// is a caret requirement for the semver crate but an exact/X-range for npm.
fn translate_comparator(raw: &str, token: &str) -> Result<Vec<String>, VersionError> {
    let split = token
        .find(|c: char| c.is_ascii_alphanumeric() || c == '*')
        .ok_or_else(|| invalid(raw, &format!("`{token}` has no version")))?;
    let (op, version) = token.split_at(split);
    let version = version.strip_prefix('v').unwrap_or(version);
    let version = strip_wildcards(version);

    if !op.is_empty() {
        if version.is_empty() {
            // `>=*` and friends match everything.
            return Ok(vec![]);
        }
        if !is_operator(op) {
            return Err(invalid(raw, &format!("`{op}` is not a known operator")));
        }
        return Ok(vec![format!("{op}{version}")]);
    }

    let parts = version.split('.').collect::<Vec<_>>();
    Ok(match parts.len() {
        0 | 1 if version.is_empty() => vec![],
        1 => {
            let major = parse_part(raw, parts[0])?;
            vec![
                format!(">={major}.0.0"),
                format!("<{}.0.0", next(raw, major)?),
            ]
        }
        2 => {
            let major = parse_part(raw, parts[0])?;
            let minor = parse_part(raw, parts[1])?;
            vec![
                format!(">={major}.{minor}.0"),
                format!("<{major}.{}.0", next(raw, minor)?),
            ]
        }
        _ => vec![format!("={version}")],
    })
}

fn parse_part(raw: &str, part: &str) -> Result<u64, VersionError> {
    part.parse::<u64>()
        .map_err(|_| invalid(raw, &format!("`{part}` is not a number")))
}

// The exclusive upper bound of an X-range component.
fn next(raw: &str, part: u64) -> Result<u64, VersionError> {
    part.checked_add(1)
        .ok_or_else(|| invalid(raw, &format!("`{part}` is too large")))
}

// Drops trailing `x`, `X`, and `*` components, so `1.2.x` becomes `1.2` and `*` becomes "".
fn strip_wildcards(version: &str) -> String {
    version
        .split('.')
        .take_while(|p| !matches!(*p, "x" | "X" | "*"))
        .join(".")
}

fn to_req(raw: &str, comparators: &[String]) -> Result<VersionReq, VersionError> {
    VersionReq::parse(&comparators.join(", ")).map_err(|e| invalid(raw, &e.to_string()))
}

fn invalid(range: &str, reason: &str) -> VersionError {
    VersionError::InvalidRange {
        range: range.to_string(),
        reason: reason.to_string(),
    }
}
