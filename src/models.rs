use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ProjectId = u64;
pub type AssetId = u64;

// Nucleus project
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Project {
    pub project_id: ProjectId,
    pub project_name: String,
    #[serde(default)]
    pub project_description: Option<String>,
}

// Finding counts per severity
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProjectMetrics {
    #[serde(default)]
    pub finding_count_critical: u64,
    #[serde(default)]
    pub finding_count_high: u64,
    #[serde(default)]
    pub finding_count_medium: u64,
    #[serde(default)]
    pub finding_count_low: u64,
}

impl ProjectMetrics {
    pub fn total(&self) -> u64 {
        self.finding_count_critical
            + self.finding_count_high
            + self.finding_count_medium
            + self.finding_count_low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, clap::ValueEnum)]
pub enum AssetType {
    #[serde(alias = "HOST")]
    Host,
    #[serde(alias = "APPLICATION")]
    Application,
    #[serde(alias = "CONTAINER")]
    Container,
    #[serde(alias = "DATABASE")]
    Database,
    #[serde(alias = "IMAGE")]
    Image,
    #[serde(alias = "OTHER")]
    Other,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetType::Host => "Host",
            AssetType::Application => "Application",
            AssetType::Container => "Container",
            AssetType::Database => "Database",
            AssetType::Image => "Image",
            AssetType::Other => "Other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Asset {
    pub asset_id: AssetId,
    pub asset_name: String,
    pub asset_type: AssetType,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub operating_system_name: Option<String>,
    #[serde(default)]
    pub operating_system_version: Option<String>,
    #[serde(default)]
    pub asset_groups: Vec<String>,
    #[serde(default)]
    pub asset_notes: Option<String>,
}

/// Payload for creating an asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAsset {
    pub asset_name: String,
    pub asset_type: AssetType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_system_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_system_version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub asset_groups: Vec<String>,
}

impl NewAsset {
    pub fn new(name: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            asset_name: name.into(),
            asset_type,
            ip_address: None,
            operating_system_name: None,
            operating_system_version: None,
            asset_groups: Vec::new(),
        }
    }

    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn operating_system(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.operating_system_name = Some(name.into());
        self.operating_system_version = Some(version.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.asset_groups.push(group.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreatedAsset {
    pub asset_id: AssetId,
}

/// Partial asset update. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssetUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_groups: Option<Vec<String>>,
}

impl AssetUpdate {
    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            asset_notes: Some(notes.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.asset_name.is_none()
            && self.asset_notes.is_none()
            && self.ip_address.is_none()
            && self.asset_groups.is_none()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, clap::ValueEnum,
)]
pub enum Severity {
    #[serde(alias = "CRITICAL")]
    Critical,
    #[serde(alias = "HIGH")]
    High,
    #[serde(alias = "MEDIUM")]
    Medium,
    #[serde(alias = "LOW")]
    Low,
    #[serde(alias = "INFORMATIONAL", alias = "Info")]
    Informational,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Informational => "Informational",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Finding {
    pub finding_number: String,
    pub finding_name: String,
    pub finding_severity: Severity,
    pub finding_status: String,
    pub finding_discovered: DateTime<Utc>,
    #[serde(default)]
    pub asset_id: Option<AssetId>,
}

// One search criterion, e.g. finding_severity == Critical
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingFilter {
    pub property: String,
    pub value: serde_json::Value,
    pub exact_match: bool,
}

impl FindingFilter {
    pub fn exact(property: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            exact_match: true,
        }
    }

    pub fn severity(severity: Severity) -> Self {
        Self::exact("finding_severity", severity.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingUpdate {
    pub finding_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finding_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl FindingUpdate {
    pub fn status(finding_number: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            finding_number: finding_number.into(),
            finding_status: Some(status.into()),
            comment: None,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RiskScore {
    pub risk_score: f64,
}
