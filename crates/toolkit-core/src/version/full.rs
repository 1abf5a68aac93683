use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Serialize, Serializer};

use super::{VersionError, parse_version};

/// A semantic version stamped with build time and commit.
///
/// Encoded as `<semver>_<epoch>_<hash>`. The hash may be empty. A parsed
/// value displays exactly as its input, `v` prefix and padding included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullVersion {
    semver: Version,
    epoch: u64,
    hash: String,
    semver_text: String,
    epoch_text: String,
}

impl FullVersion {
    /// Assemble a full version from its parts.
    pub fn new(semver: Version, epoch: u64, hash: impl Into<String>) -> Self {
        Self {
            semver_text: semver.to_string(),
            epoch_text: epoch.to_string(),
            semver,
            epoch,
            hash: hash.into(),
        }
    }

    /// The semantic version part.
    pub const fn semver(&self) -> &Version {
        &self.semver
    }

    /// Seconds since the Unix epoch at build time.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Short commit hash, possibly empty.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for FullVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.semver_text, self.epoch_text, self.hash)
    }
}

impl FromStr for FullVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        let [semver, epoch, hash] = parts.as_slice() else {
            return Err(VersionError::InvalidFullVersion {
                input: s.to_string(),
            });
        };

        let parsed = parse_version(semver)?;
        let seconds = epoch.parse().map_err(|_| VersionError::InvalidEpoch {
            epoch: (*epoch).to_string(),
        })?;

        Ok(Self {
            semver: parsed,
            epoch: seconds,
            hash: (*hash).to_string(),
            semver_text: (*semver).to_string(),
            epoch_text: (*epoch).to_string(),
        })
    }
}

impl Serialize for FullVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
