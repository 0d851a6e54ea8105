use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid compiler name \"{0}\"; expected \"v?MAJOR.MINOR.PATCH+commit.<hex>\"")]
    InvalidFormat(String),
    #[error("invalid version number \"{0}\": {1}")]
    InvalidNumber(String, std::num::ParseIntError),
}

/// Structured form of a solc release name like `v0.8.9+commit.e5eed63a`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompilerNameDetail {
    /// `MAJOR.MINOR.PATCH`.
    pub version: String,
    pub commit: String,
    /// `MAJOR.MINOR.PATCH+commit.<commit>`.
    pub long_version: String,
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl CompilerNameDetail {
    pub fn parse(name: &str) -> Result<Self, ParseError> {
        Self::from_str(name)
    }

    pub fn semver(&self) -> semver::Version {
        semver::Version::new(self.major, self.minor, self.patch)
    }

    /// Manifests and users may abbreviate commit hashes differently,
    /// so commits match if either one is a prefix of the other.
    pub fn matches_commit(&self, commit: &str) -> bool {
        let commit = commit.to_ascii_lowercase();
        let own = self.commit.to_ascii_lowercase();
        own.starts_with(&commit) || commit.starts_with(&own)
    }
}

impl FromStr for CompilerNameDetail {
    type Err = ParseError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidFormat(name.to_string());

        let trimmed = name.strip_prefix('v').unwrap_or(name);
        let (version, commit) = trimmed.split_once("+commit.").ok_or_else(invalid)?;
        if commit.is_empty() || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let numbers = version.split('.').collect::<Vec<_>>();
        let [major, minor, patch] = numbers.as_slice() else {
            return Err(invalid());
        };
        let parse_number = |value: &str| {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            value
                .parse::<u64>()
                .map_err(|err| ParseError::InvalidNumber(value.to_string(), err))
        };
        let major = parse_number(major)?;
        let minor = parse_number(minor)?;
        let patch = parse_number(patch)?;

        let version = format!("{major}.{minor}.{patch}");
        let long_version = format!("{version}+commit.{commit}");
        Ok(Self {
            version,
            commit: commit.to_string(),
            long_version,
            major,
            minor,
            patch,
        })
    }
}

impl Display for CompilerNameDetail {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.long_version)
    }
}
