//! Test doubles for quarry.
//!
//! [`FakeEngine`] implements the full [`Engine`] façade without spawning
//! anything. Every operation fails with an explicit "not implemented"
//! error until a test configures it, so a test that accidentally reaches
//! an unconfigured operation fails loudly instead of silently succeeding.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use quarry_core::engine::{
    DatabaseInitRequest, DiagnosticsExportRequest, Engine, EngineError, ExportDiagnosticsRequest,
    ExtractRequest, InterpretResultsRequest, RunQueriesRequest,
};
use quarry_types::{
    BetterResolveLanguagesOutput, Language, PackDownloadOutput, ResolveBuildEnvironmentOutput,
    ResolveLanguagesOutput, ResolveQueriesOutput,
};

/// A configurable in-memory engine.
///
/// Build one with the `with_*` / `allowing` methods, hand it to the code
/// under test as `&dyn Engine`, then inspect [`FakeEngine::calls`].
#[derive(Debug, Default)]
pub struct FakeEngine {
    path: String,
    version: Option<String>,
    resolve_languages: Option<ResolveLanguagesOutput>,
    better_resolve_languages: Option<BetterResolveLanguagesOutput>,
    resolve_queries: Option<ResolveQueriesOutput>,
    resolve_build_environment: Option<ResolveBuildEnvironmentOutput>,
    extractors: BTreeMap<Language, String>,
    pack_download: Option<PackDownloadOutput>,
    baseline: Option<String>,
    interpret_summary: Option<String>,
    allowed: BTreeSet<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            path: "/fake/engine".to_string(),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_resolve_languages(mut self, output: ResolveLanguagesOutput) -> Self {
        self.resolve_languages = Some(output);
        self
    }

    pub fn with_better_resolve_languages(mut self, output: BetterResolveLanguagesOutput) -> Self {
        self.better_resolve_languages = Some(output);
        self
    }

    pub fn with_resolve_queries(mut self, output: ResolveQueriesOutput) -> Self {
        self.resolve_queries = Some(output);
        self
    }

    pub fn with_resolve_build_environment(
        mut self,
        output: ResolveBuildEnvironmentOutput,
    ) -> Self {
        self.resolve_build_environment = Some(output);
        self
    }

    pub fn with_extractor(mut self, language: Language, root: impl Into<String>) -> Self {
        self.extractors.insert(language, root.into());
        self
    }

    pub fn with_pack_download(mut self, output: PackDownloadOutput) -> Self {
        self.pack_download = Some(output);
        self
    }

    pub fn with_baseline(mut self, output: impl Into<String>) -> Self {
        self.baseline = Some(output.into());
        self
    }

    pub fn with_interpret_summary(mut self, summary: impl Into<String>) -> Self {
        self.interpret_summary = Some(summary.into());
        self
    }

    /// Let a unit-returning operation succeed. The name is the trait
    /// method name, e.g. `"database_init_cluster"`.
    pub fn allowing(mut self, operation: &'static str) -> Self {
        self.allowed.insert(operation);
        self
    }

    /// Names of the operations invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("call log lock poisoned")
            .clone()
    }

    fn record(&self, operation: &str) {
        self.calls
            .lock()
            .expect("call log lock poisoned")
            .push(operation.to_string());
    }

    fn not_implemented(operation: &str) -> EngineError {
        EngineError::NotImplemented {
            operation: operation.to_string(),
        }
    }

    fn configured<T: Clone>(&self, operation: &str, value: &Option<T>) -> Result<T, EngineError> {
        self.record(operation);
        value
            .clone()
            .ok_or_else(|| Self::not_implemented(operation))
    }

    fn unit(&self, operation: &'static str) -> Result<(), EngineError> {
        self.record(operation);
        if self.allowed.contains(operation) {
            Ok(())
        } else {
            Err(Self::not_implemented(operation))
        }
    }
}

#[async_trait]
impl Engine for FakeEngine {
    fn path(&self) -> &str {
        &self.path
    }

    async fn version(&self) -> Result<String, EngineError> {
        self.configured("version", &self.version)
    }

    async fn print_version(&self) -> Result<(), EngineError> {
        self.unit("print_version")
    }

    async fn database_init_cluster(&self, _req: &DatabaseInitRequest) -> Result<(), EngineError> {
        self.unit("database_init_cluster")
    }

    async fn run_autobuild(&self, _language: Language) -> Result<(), EngineError> {
        self.unit("run_autobuild")
    }

    async fn extract_scanned_language(&self, _req: &ExtractRequest) -> Result<(), EngineError> {
        self.unit("extract_scanned_language")
    }

    async fn finalize_database(
        &self,
        _database_path: &str,
        _threads_flag: &str,
        _memory_flag: &str,
    ) -> Result<(), EngineError> {
        self.unit("finalize_database")
    }

    async fn resolve_languages(&self) -> Result<ResolveLanguagesOutput, EngineError> {
        self.configured("resolve_languages", &self.resolve_languages)
    }

    async fn better_resolve_languages(
        &self,
    ) -> Result<BetterResolveLanguagesOutput, EngineError> {
        self.configured("better_resolve_languages", &self.better_resolve_languages)
    }

    async fn resolve_queries(
        &self,
        _queries: &[String],
        _extra_search_path: Option<&str>,
    ) -> Result<ResolveQueriesOutput, EngineError> {
        self.configured("resolve_queries", &self.resolve_queries)
    }

    async fn resolve_build_environment(
        &self,
        _working_dir: Option<&str>,
        _language: Language,
    ) -> Result<ResolveBuildEnvironmentOutput, EngineError> {
        self.configured("resolve_build_environment", &self.resolve_build_environment)
    }

    async fn resolve_extractor(&self, language: Language) -> Result<String, EngineError> {
        self.record("resolve_extractor");
        self.extractors
            .get(&language)
            .cloned()
            .ok_or_else(|| Self::not_implemented("resolve_extractor"))
    }

    async fn pack_download(
        &self,
        _packs: &[String],
        _qlconfig_file: Option<&Path>,
    ) -> Result<PackDownloadOutput, EngineError> {
        self.configured("pack_download", &self.pack_download)
    }

    async fn database_run_queries(&self, _req: &RunQueriesRequest) -> Result<(), EngineError> {
        self.unit("database_run_queries")
    }

    async fn database_interpret_results(
        &self,
        _req: &InterpretResultsRequest,
    ) -> Result<String, EngineError> {
        self.configured("database_interpret_results", &self.interpret_summary)
    }

    async fn database_print_baseline(&self, _database_path: &str) -> Result<String, EngineError> {
        self.configured("database_print_baseline", &self.baseline)
    }

    async fn database_cleanup(
        &self,
        _database_path: &str,
        _cleanup_level: &str,
    ) -> Result<(), EngineError> {
        self.unit("database_cleanup")
    }

    async fn database_bundle(
        &self,
        _database_path: &str,
        _output_file: &Path,
        _database_name: &str,
    ) -> Result<(), EngineError> {
        self.unit("database_bundle")
    }

    async fn database_export_diagnostics(
        &self,
        _req: &ExportDiagnosticsRequest,
    ) -> Result<(), EngineError> {
        self.unit("database_export_diagnostics")
    }

    async fn diagnostics_export(
        &self,
        _req: &DiagnosticsExportRequest,
    ) -> Result<(), EngineError> {
        self.unit("diagnostics_export")
    }
}
