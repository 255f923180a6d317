//! Standard group and project stage tables.
//!
//! Stage 0 always creates the destination portable itself; the finisher runs
//! last once every relation has landed.

use super::stage_catalog::StagedPipeline;

pub fn group_pipelines() -> Vec<StagedPipeline> {
    vec![
        StagedPipeline::new("group", 0),
        StagedPipeline::new("group_attributes", 1),
        StagedPipeline::new("subgroup_entities", 1),
        StagedPipeline::new("namespace_settings", 1).minimum("15.0.0"),
        StagedPipeline::new("members", 1),
        StagedPipeline::new("labels", 1),
        StagedPipeline::new("milestones", 1),
        StagedPipeline::new("badges", 1),
        StagedPipeline::new("boards", 2),
        StagedPipeline::new("uploads", 2),
        StagedPipeline::new("finisher", 3),
    ]
}

pub fn project_pipelines() -> Vec<StagedPipeline> {
    vec![
        StagedPipeline::new("project", 0),
        StagedPipeline::new("repository", 1),
        StagedPipeline::new("project_attributes", 1),
        StagedPipeline::new("members", 1),
        StagedPipeline::new("labels", 2),
        StagedPipeline::new("milestones", 2),
        StagedPipeline::new("badges", 2),
        StagedPipeline::new("issues", 3),
        StagedPipeline::new("snippets", 3),
        StagedPipeline::new("snippets_repository", 4),
        StagedPipeline::new("boards", 4),
        StagedPipeline::new("merge_requests", 4),
        StagedPipeline::new("external_pull_requests", 4),
        StagedPipeline::new("protected_branches", 4),
        StagedPipeline::new("project_feature", 4),
        StagedPipeline::new("container_expiration_policy", 4),
        StagedPipeline::new("service_desk_setting", 4),
        StagedPipeline::new("releases", 4),
        StagedPipeline::new("ci_pipelines", 5),
        StagedPipeline::new("commit_notes", 5).minimum("15.10.0"),
        StagedPipeline::new("references", 5).minimum("15.11.0"),
        StagedPipeline::new("wiki", 5),
        StagedPipeline::new("uploads", 5),
        StagedPipeline::new("lfs_objects", 5),
        StagedPipeline::new("design_bundle", 5).minimum("15.1.0"),
        StagedPipeline::new("repository_bundle", 5).minimum("15.1.0"),
        StagedPipeline::new("auto_devops", 5),
        StagedPipeline::new("finisher", 6),
    ]
}

/// Every identifier referenced by the standard tables, deduplicated
pub fn relations() -> Vec<String> {
    let mut relations: Vec<String> = group_pipelines()
        .into_iter()
        .chain(project_pipelines())
        .map(|row| row.relation)
        .collect();
    relations.sort();
    relations.dedup();
    relations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PipelineRegistry, StageCatalog};
    use crate::models::SourceType;

    #[test]
    fn test_standard_catalog_builds() {
        let registry = PipelineRegistry::dry_run(relations());
        let catalog = StageCatalog::standard(&registry).unwrap();

        let group = catalog.pipelines_for(SourceType::Group);
        let project = catalog.pipelines_for(SourceType::Project);
        assert_eq!(group.len(), group_pipelines().len());
        assert_eq!(project.len(), project_pipelines().len());

        assert_eq!(group.first().map(|e| e.relation.as_str()), Some("group"));
        assert_eq!(project.first().map(|e| e.relation.as_str()), Some("project"));
        assert_eq!(group.last().map(|e| e.relation.as_str()), Some("finisher"));
        assert_eq!(project.last().map(|e| e.relation.as_str()), Some("finisher"));
    }
}
