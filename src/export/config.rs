//! Per-portable export configuration: which relations exist and which of
//! them can be exported in batches.

use std::collections::{HashMap, HashSet};

use super::types::{Portable, PortableKind};

pub trait ExportConfiguration: Send + Sync {
    /// Whether `relation` supports the batched export pipeline for `portable`
    fn batchable_relation(&self, portable: &Portable, relation: &str) -> bool;

    /// Relations exported for a portable of `kind`, in export order
    fn exportable_relations(&self, kind: PortableKind) -> Vec<String>;
}

/// Export configuration held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticExportConfiguration {
    relations: HashMap<PortableKind, Vec<String>>,
    batchable: HashMap<PortableKind, HashSet<String>>,
}

impl StaticExportConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relations<I, S>(mut self, kind: PortableKind, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations
            .entry(kind)
            .or_default()
            .extend(relations.into_iter().map(Into::into));
        self
    }

    /// Mark relations batchable; they are also added to the exportable list
    pub fn with_batchable<I, S>(mut self, kind: PortableKind, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for relation in relations.into_iter().map(Into::into) {
            let exportable = self.relations.entry(kind).or_default();
            if !exportable.contains(&relation) {
                exportable.push(relation.clone());
            }
            self.batchable.entry(kind).or_default().insert(relation);
        }
        self
    }

    /// Tree relations exported by the source for groups and projects
    pub fn standard() -> Self {
        Self::new()
            .with_relations(
                PortableKind::Group,
                ["self", "namespace_settings", "members", "badges", "boards"],
            )
            .with_batchable(PortableKind::Group, ["labels", "milestones", "epics"])
            .with_relations(
                PortableKind::Project,
                [
                    "self",
                    "members",
                    "badges",
                    "boards",
                    "protected_branches",
                    "project_feature",
                    "container_expiration_policy",
                    "service_desk_setting",
                    "auto_devops",
                    "uploads",
                    "lfs_objects",
                    "repository",
                    "design",
                ],
            )
            .with_batchable(
                PortableKind::Project,
                [
                    "labels",
                    "milestones",
                    "issues",
                    "snippets",
                    "merge_requests",
                    "external_pull_requests",
                    "releases",
                    "ci_pipelines",
                    "commit_notes",
                ],
            )
    }
}

impl ExportConfiguration for StaticExportConfiguration {
    fn batchable_relation(&self, portable: &Portable, relation: &str) -> bool {
        self.batchable
            .get(&portable.kind)
            .is_some_and(|relations| relations.contains(relation))
    }

    fn exportable_relations(&self, kind: PortableKind) -> Vec<String> {
        self.relations.get(&kind).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batchable_is_per_portable_kind() {
        let config = StaticExportConfiguration::new()
            .with_batchable(PortableKind::Project, ["issues"])
            .with_relations(PortableKind::Project, ["members"]);

        assert!(config.batchable_relation(&Portable::project(1), "issues"));
        assert!(!config.batchable_relation(&Portable::project(1), "members"));
        assert!(!config.batchable_relation(&Portable::group(1), "issues"));
        assert_eq!(
            config.exportable_relations(PortableKind::Project),
            vec!["issues".to_string(), "members".to_string()]
        );
        assert!(config.exportable_relations(PortableKind::Group).is_empty());
    }

    #[test]
    fn test_standard_configuration() {
        let config = StaticExportConfiguration::standard();
        assert!(config.batchable_relation(&Portable::project(1), "merge_requests"));
        assert!(!config.batchable_relation(&Portable::project(1), "repository"));
        assert!(config
            .exportable_relations(PortableKind::Group)
            .contains(&"labels".to_string()));
    }
}
