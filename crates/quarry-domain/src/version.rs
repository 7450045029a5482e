//! Semantic-version gating for engine features.
//!
//! The installed engine reports one semver string per process lifetime.
//! Feature gates compare it against fixed thresholds; a gate passes only
//! when the live version is *strictly greater* than the threshold.

use semver::Version;

/// The oldest engine version the driver will run with. Construction of a
/// version-checked façade fails below this floor.
pub const MINIMUM_ENGINE_VERSION: &str = "2.9.4";

/// This version will shortly become the oldest supported version; engines
/// at or below it trigger a one-time deprecation warning.
pub const NEXT_MINIMUM_ENGINE_VERSION: &str = "2.9.4";

/// Engines above this version support `resolve languages --format=betterjson`
/// together with `--extractor-options-verbosity`.
pub const VERSION_BETTER_RESOLVE_LANGUAGES: &str = "2.10.3";

/// Engines above this version annotate SARIF with baseline file information.
pub const VERSION_FILE_BASELINE_INFORMATION: &str = "2.11.3";

/// Engines above this version accept `--expect-discarded-cache` on
/// `database run-queries`.
pub const VERSION_EXPECT_DISCARDED_CACHE: &str = "2.12.1";

/// Engines above this version can export the scan configuration into SARIF.
pub const VERSION_EXPORT_SCAN_CONFIG: &str = "2.12.3";

/// Engines above this version accept `--qlconfig-file` on `database init`
/// and `pack download`, and understand `--no-sarif-include-diagnostics`.
pub const VERSION_INIT_WITH_QLCONFIG: &str = "2.12.4";

/// Engines above this version support the `resolve build-environment`
/// subcommand.
pub const VERSION_RESOLVE_BUILD_ENVIRONMENT: &str = "2.13.4";

/// Engines above this version understand the `--new-analysis-summary` /
/// `--no-new-analysis-summary` pair on `database interpret-results`.
pub const VERSION_NEW_ANALYSIS_SUMMARY: &str = "2.14.0";

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("engine reported unparsable version '{raw}': {source}")]
    Unparsable { raw: String, source: semver::Error },
}

/// Parse a version string as reported by `<engine> version --format=terse`.
///
/// Leading/trailing whitespace (the CLI emits a trailing newline) is
/// stripped before parsing.
pub fn parse_version(raw: &str) -> Result<Version, VersionError> {
    let trimmed = raw.trim();
    Version::parse(trimmed).map_err(|source| VersionError::Unparsable {
        raw: trimmed.to_string(),
        source,
    })
}

/// Strict greater-than on (major, minor, patch). Pre-release tags are
/// ignored: "2.13.5-beta" gates identically to "2.13.5".
pub fn version_above(version: &Version, threshold: &Version) -> bool {
    (version.major, version.minor, version.patch)
        > (threshold.major, threshold.minor, threshold.patch)
}
