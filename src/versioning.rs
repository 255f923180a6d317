//! # Source Version Comparator
//!
//! Parses source instance versions and answers whether a version falls inside
//! a pipeline's `[minimum, maximum]` compatibility window.
//!
//! Compatibility is decided on `(major, minor)` only. Two versions that differ
//! only in their patch component are always equivalent, so `15.0.0` and
//! `15.0.1` gate pipelines identically.
//!
//! An unknown source version (never recorded, or unparsable) is treated as the
//! latest release: every pipeline is compatible.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid version format: {0}")]
    InvalidVersionFormat(String),
}

/// A parsed `major.minor.patch` version.
///
/// Pre-release and edition suffixes (`15.0.0-pre`, `16.1.2-ee`) are accepted
/// and ignored. A missing patch component defaults to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SourceVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidVersionFormat(raw.to_string());

        let trimmed = raw.trim();
        let core = trimmed
            .split(|c| c == '-' || c == '+')
            .next()
            .unwrap_or_default();

        let mut parts = core.split('.');
        let mut next_component = |required: bool| -> Result<Option<u32>, VersionError> {
            match parts.next() {
                Some(part) if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) => {
                    part.parse::<u32>().map(Some).map_err(|_| invalid())
                }
                None if !required => Ok(None),
                _ => Err(invalid()),
            }
        };

        let major = next_component(true)?.ok_or_else(invalid)?;
        let minor = next_component(true)?.ok_or_else(invalid)?;
        let patch = next_component(false)?.unwrap_or(0);

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new(major, minor, patch))
    }

    /// The part of the version that participates in compatibility checks
    pub fn compatibility_key(&self) -> (u32, u32) {
        (self.major, self.minor)
    }

    /// Copy of this version with the patch component dropped
    pub fn without_patch(&self) -> Self {
        Self::new(self.major, self.minor, 0)
    }
}

impl fmt::Display for SourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SourceVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Inclusive compatibility window. An absent bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionBounds {
    pub minimum: Option<SourceVersion>,
    pub maximum: Option<SourceVersion>,
}

impl VersionBounds {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(minimum: Option<SourceVersion>, maximum: Option<SourceVersion>) -> Self {
        Self { minimum, maximum }
    }

    /// Build bounds from raw strings, rejecting malformed bounds
    pub fn parse(minimum: Option<&str>, maximum: Option<&str>) -> Result<Self, VersionError> {
        Ok(Self {
            minimum: minimum.map(SourceVersion::parse).transpose()?,
            maximum: maximum.map(SourceVersion::parse).transpose()?,
        })
    }

    pub fn is_unbounded(&self) -> bool {
        self.minimum.is_none() && self.maximum.is_none()
    }

    /// Whether `version` lies inside the window, comparing `(major, minor)` only
    pub fn contains(&self, version: &SourceVersion) -> bool {
        let key = version.compatibility_key();

        let above_minimum = self
            .minimum
            .map_or(true, |min| key >= min.compatibility_key());
        let below_maximum = self
            .maximum
            .map_or(true, |max| key <= max.compatibility_key());

        above_minimum && below_maximum
    }

    /// Strict check of a raw version string
    pub fn check(&self, raw_version: &str) -> Result<bool, VersionError> {
        SourceVersion::parse(raw_version).map(|version| self.contains(&version))
    }

    /// Permissive check used when gating pipelines.
    ///
    /// `None` and unparsable versions are compatible with every window.
    pub fn compare(&self, raw_version: Option<&str>) -> bool {
        let Some(raw) = raw_version else {
            return true;
        };

        match self.check(raw) {
            Ok(compatible) => compatible,
            Err(error) => {
                tracing::debug!(
                    source_version = %raw,
                    error = %error,
                    "Unparsable source version treated as compatible"
                );
                true
            }
        }
    }
}
