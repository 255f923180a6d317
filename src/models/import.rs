//! # Import Model
//!
//! One migration run. Owns the entities being migrated and carries the source
//! instance version used to gate pipelines.
//!
//! ## Database Schema
//!
//! Maps to `bulk_imports`:
//! ```sql
//! CREATE TABLE bulk_imports (
//!   id BIGSERIAL PRIMARY KEY,
//!   status VARCHAR(32) NOT NULL DEFAULT 'created',
//!   source_version VARCHAR(64),
//!   created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!   updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::ImportState;
use crate::versioning::SourceVersion;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub id: i64,
    pub status: ImportState,
    /// Version reported by the source instance, if known
    pub source_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New Import for creation (without generated fields)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewImport {
    pub source_version: Option<String>,
}

impl NewImport {
    pub fn with_source_version(version: impl Into<String>) -> Self {
        Self {
            source_version: Some(version.into()),
        }
    }
}

impl Import {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Parsed source version; `None` when absent or unparsable
    pub fn parsed_source_version(&self) -> Option<SourceVersion> {
        self.source_version
            .as_deref()
            .and_then(|raw| SourceVersion::parse(raw).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import_with_version(version: Option<&str>) -> Import {
        Import {
            id: 1,
            status: ImportState::Created,
            source_version: version.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parsed_source_version() {
        assert_eq!(
            import_with_version(Some("15.0.1")).parsed_source_version(),
            Some(SourceVersion::new(15, 0, 1))
        );
        assert_eq!(import_with_version(Some("garbage")).parsed_source_version(), None);
        assert_eq!(import_with_version(None).parsed_source_version(), None);
    }
}
