use proptest::prelude::*;

use bulk_import_core::state_machine::EntityState;
use bulk_import_core::versioning::SourceVersion;

pub fn source_version_strategy() -> impl Strategy<Value = SourceVersion> {
    (0u32..30, 0u32..15, 0u32..10).prop_map(|(major, minor, patch)| {
        SourceVersion::new(major, minor, patch)
    })
}

/// Raw version strings as instances report them, optionally with a build suffix
pub fn raw_version_strategy() -> impl Strategy<Value = (SourceVersion, String)> {
    (
        source_version_strategy(),
        prop::option::of(prop_oneof![Just("-ee"), Just("-pre"), Just("-rc1")]),
    )
        .prop_map(|(version, suffix)| {
            let raw = format!(
                "{}.{}.{}{}",
                version.major,
                version.minor,
                version.patch,
                suffix.unwrap_or("")
            );
            (version, raw)
        })
}

pub fn entity_state_strategy() -> impl Strategy<Value = EntityState> {
    prop_oneof![
        Just(EntityState::Created),
        Just(EntityState::Started),
        Just(EntityState::Finished),
        Just(EntityState::Failed),
        Just(EntityState::Skipped),
    ]
}
