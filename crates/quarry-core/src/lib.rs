//! Engine driver core for quarry.
//!
//! This crate owns the side-effectful half of the driver: spawning the
//! engine executable with bounded output capture ([`invoke`]), the
//! one-method-per-subcommand façade over it ([`engine`]), repair of the
//! engine's invalid SARIF notifications ([`sarif_fix`]), and the
//! feature-enablement seam the façade consults ([`features`]).
//!
//! Pure decision logic (version gates, override resolution, error
//! classification) lives in `quarry-domain`; DTOs live in `quarry-types`.

pub mod engine;
pub mod features;
pub mod invoke;
pub mod sarif_fix;

#[cfg(test)]
mod test_log;

pub use engine::{
    engine_version_above, CliEngine, CliEngineBuilder, DatabaseInitRequest,
    DiagnosticsExportRequest, Engine, EngineError, ExportDiagnosticsRequest, ExtractRequest,
    InterpretResultsRequest, RunQueriesRequest, TrapCache, VersionCheck, EXTRA_OPTIONS_ENV,
    SUPPRESS_DEPRECATION_ENV,
};
pub use features::{Feature, FeatureEnablement, StaticFeatures};
pub use invoke::{
    InvocationError, InvocationOptions, InvocationResult, MAX_STDERR_CAPTURE,
};
pub use sarif_fix::{fix_invalid_notifications, fix_invalid_notifications_in_file, RepairError};
