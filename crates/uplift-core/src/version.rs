use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Dotted numeric version identifier, e.g. "2.0.0".
///
/// Comparison pads the shorter side with zero segments, so "2.0" and
/// "2.0.0" are equal and "2.1" sorts above "2.0.9". The original raw
/// text is preserved for display and persistence.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

impl Version {
    /// The version an absent persisted record defaults to.
    pub fn baseline() -> Self {
        Self {
            raw: "1.0.0".to_string(),
            segments: vec![1, 0, 0],
        }
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("version string must not be empty"));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('.') {
            if segment.is_empty() {
                return Err(anyhow!("version '{trimmed}' contains an empty segment"));
            }
            let value = segment
                .parse::<u64>()
                .with_context(|| format!("version '{trimmed}' has non-numeric segment '{segment}'"))?;
            segments.push(value);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.segments.len().max(other.segments.len());
        for index in 0..width {
            let left = self.segments.get(index).copied().unwrap_or(0);
            let right = other.segments.get(index).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Trailing zero segments must not change the hash, since Eq
        // treats "2.0" and "2.0.0" as the same version.
        let trimmed_len = self
            .segments
            .iter()
            .rposition(|segment| *segment != 0)
            .map(|position| position + 1)
            .unwrap_or(0);
        self.segments[..trimmed_len].hash(state);
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|err| D::Error::custom(format!("{err:#}")))
    }
}
