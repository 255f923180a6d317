use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::SourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortableKind {
    Group,
    Project,
}

impl PortableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Project => "project",
        }
    }
}

impl fmt::Display for PortableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PortableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "group" => Ok(Self::Group),
            "project" => Ok(Self::Project),
            other => Err(format!("Unknown portable type: {other}")),
        }
    }
}

impl From<SourceType> for PortableKind {
    fn from(source_type: SourceType) -> Self {
        match source_type {
            SourceType::Group => Self::Group,
            SourceType::Project => Self::Project,
        }
    }
}

/// A group or project being exported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Portable {
    /// Destination-side entity id, not the source instance's resource id
    pub id: i64,
    pub kind: PortableKind,
}

impl Portable {
    pub fn group(id: i64) -> Self {
        Self {
            id,
            kind: PortableKind::Group,
        }
    }

    pub fn project(id: i64) -> Self {
        Self {
            id,
            kind: PortableKind::Project,
        }
    }
}

impl fmt::Display for Portable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    Batched,
    Single,
}

impl ExportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batched => "batched",
            Self::Single => "single",
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One relation export as handed to the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationExportRequest {
    pub user_id: UserId,
    pub portable: Portable,
    pub relation: String,
    /// Caller asks for batching; honored only for batchable relations
    #[serde(default)]
    pub batched: bool,
}

impl RelationExportRequest {
    pub fn new(
        user_id: UserId,
        portable: Portable,
        relation: impl Into<String>,
        batched: bool,
    ) -> Self {
        Self {
            user_id,
            portable,
            relation: relation.into(),
            batched,
        }
    }

    pub fn lease_key(&self) -> LeaseKey {
        LeaseKey {
            portable: self.portable,
            relation: self.relation.clone(),
        }
    }
}

/// Deduplication key: at most one export runs per `(portable, relation)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseKey {
    pub portable: Portable,
    pub relation: String,
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.portable, self.relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portable_kind_parsing() {
        assert_eq!("Project".parse::<PortableKind>().unwrap(), PortableKind::Project);
        assert_eq!("group".parse::<PortableKind>().unwrap(), PortableKind::Group);
        assert!("namespace".parse::<PortableKind>().is_err());
        assert_eq!(PortableKind::from(SourceType::Project), PortableKind::Project);
    }

    #[test]
    fn test_lease_key_ignores_user_and_mode() {
        let a = RelationExportRequest::new(UserId(1), Portable::project(5), "labels", true);
        let b = RelationExportRequest::new(UserId(2), Portable::project(5), "labels", false);
        let c = RelationExportRequest::new(UserId(1), Portable::group(5), "labels", true);

        assert_eq!(a.lease_key(), b.lease_key());
        assert_ne!(a.lease_key(), c.lease_key());
        assert_eq!(a.lease_key().to_string(), "project/5:labels");
    }
}
