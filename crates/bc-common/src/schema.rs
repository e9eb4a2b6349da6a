//! Schema versioning and compatibility.

/// Current schema version for all JSON outputs (summaries, JSONL batches).
///
/// Follows semver: MAJOR.MINOR.PATCH
/// - MAJOR: Breaking changes (field removals, type changes)
/// - MINOR: Additive changes (new optional fields)
/// - PATCH: Bug fixes, documentation
pub const SCHEMA_VERSION: &str = "1.0.0";

fn major(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

/// Whether `version` can be read by code written for `current`.
///
/// Versions are compatible when their major components match; an
/// unparseable version is never compatible.
pub fn same_major(version: &str, current: &str) -> bool {
    matches!((major(version), major(current)), (Some(a), Some(b)) if a == b)
}
