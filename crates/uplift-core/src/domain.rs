use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::version::Version;

/// A connected channel: the primary persisted domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niche: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_unix: Option<u64>,
}

/// Starter content generated for channels that have none yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    pub created_at_unix: u64,
}

/// Derived earnings figures seeded by the feature-state bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub today: f64,
    pub week: f64,
    pub month: f64,
    pub last_update_unix: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Warning,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "success" => Ok(Self::Success),
            "warning" => Ok(Self::Warning),
            _ => Err(anyhow!("invalid notification kind: {value}")),
        }
    }
}

/// Structured event appended to the shared notification list, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub timestamp_unix: u64,
}

/// Self-describing export bundle.
///
/// A document is valid for import only when both `version` and `channels`
/// are present; every other absent field means "not captured in this
/// backup" and is left untouched on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    pub exported_at_unix: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<Channel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earnings: Option<EarningsSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autopilot: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<Vec<Notification>>,
}

impl SnapshotDocument {
    /// Required fields for a restorable backup.
    pub fn is_restorable(&self) -> bool {
        self.version.is_some() && self.channels.is_some()
    }
}
