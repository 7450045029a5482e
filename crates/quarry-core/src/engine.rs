//! The engine command façade.
//!
//! One public operation per engine subcommand. Each operation resolves its
//! user overrides, consults the version gate for optional flags, delegates
//! to the process invoker (classified where structured failure reporting
//! matters, raw where it should propagate as-is), and parses stdout when
//! the subcommand promises structured output.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use semver::Version;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use quarry_domain::classify::{ClassifyError, ErrorMatcher};
use quarry_domain::overrides::{OverrideError, OverrideTree};
use quarry_domain::version::{
    parse_version, version_above, VersionError, MINIMUM_ENGINE_VERSION,
    NEXT_MINIMUM_ENGINE_VERSION, VERSION_BETTER_RESOLVE_LANGUAGES,
    VERSION_EXPECT_DISCARDED_CACHE, VERSION_EXPORT_SCAN_CONFIG,
    VERSION_FILE_BASELINE_INFORMATION, VERSION_INIT_WITH_QLCONFIG, VERSION_NEW_ANALYSIS_SUMMARY,
    VERSION_RESOLVE_BUILD_ENVIRONMENT,
};
use quarry_types::{
    BetterResolveLanguagesOutput, Language, PackDownloadOutput, ResolveBuildEnvironmentOutput,
    ResolveLanguagesOutput, ResolveQueriesOutput,
};

use crate::features::{Feature, FeatureEnablement, StaticFeatures};
use crate::invoke::{self, ClassifiedError, InvocationError, InvocationOptions, InvocationResult};
use crate::sarif_fix::{fix_invalid_notifications_in_file, RepairError};

/// Environment variable holding the extra-options override blob.
pub const EXTRA_OPTIONS_ENV: &str = "QUARRY_EXTRA_OPTIONS";

/// Once the deprecation warning has fired, this variable silences it for
/// the rest of the process tree.
pub const SUPPRESS_DEPRECATION_ENV: &str = "QUARRY_SUPPRESS_DEPRECATED_SOON_WARNING";

/// Size of each per-language TRAP cache, in megabytes.
const TRAP_CACHE_SIZE_MB: u64 = 1024;

/// Engine output lands here first when the invalid-notifications
/// workaround is active; the repaired document goes to the caller's path.
const INTERMEDIATE_SARIF_FILE: &str = "engine-intermediate-results.sarif";

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error(transparent)]
    Classified(#[from] ClassifiedError),
    #[error(transparent)]
    Overrides(#[from] OverrideError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error(transparent)]
    Repair(#[from] RepairError),
    #[error("expected an engine with version at least {minimum} but got version {actual}")]
    VersionTooOld { actual: String, minimum: String },
    #[error(
        "the installed engine (version {actual}) does not support '{subcommand}' \
         (requires a version above {required})"
    )]
    UnsupportedSubcommand {
        subcommand: String,
        required: String,
        actual: String,
    },
    #[error("unexpected output from engine '{subcommand}': {source}\n{output}")]
    UnexpectedOutput {
        subcommand: String,
        output: String,
        source: serde_json::Error,
    },
    #[error("unexpected output from engine '{subcommand}': {reason}\n{output}")]
    MalformedOutput {
        subcommand: String,
        reason: String,
        output: String,
    },
    #[error("engine operation '{operation}' is not implemented by this test double")]
    NotImplemented { operation: String },
}

// ── Request types ──────────────────────────────────────────────

/// Per-language TRAP cache tuning, decided by the caller.
#[derive(Debug, Clone)]
pub struct TrapCache {
    pub dir: PathBuf,
    /// Whether this run may write back to the cache.
    pub write: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseInitRequest {
    pub db_location: String,
    pub source_root: String,
    pub languages: Vec<Language>,
    pub trap_caches: BTreeMap<Language, TrapCache>,
    /// Scan configuration file to be parsed by the engine itself.
    pub scan_config_file: Option<PathBuf>,
    /// Secret token for fetching external repositories; piped via stdin,
    /// never placed on the command line.
    pub external_repository_token: Option<String>,
    /// Package registry configuration, understood by newer engines only.
    pub qlconfig_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub database_path: String,
    pub language: Language,
    pub trap_cache: Option<TrapCache>,
}

#[derive(Debug, Clone, Default)]
pub struct RunQueriesRequest {
    pub database_path: String,
    pub extra_search_path: Option<String>,
    pub query_suite_path: Option<String>,
    pub flags: Vec<String>,
    /// Set when this is the last query run against the database, so an
    /// engine that supports it can discard its evaluation cache eagerly.
    pub optimize_for_last_query_run: bool,
}

#[derive(Debug, Clone)]
pub struct InterpretResultsRequest {
    pub database_path: String,
    pub query_suite_paths: Vec<String>,
    /// Final destination for the SARIF document.
    pub sarif_file: PathBuf,
    pub add_snippets_flag: String,
    pub threads_flag: String,
    pub verbosity_flag: Option<String>,
    pub automation_details_id: Option<String>,
    pub scan_config_file: Option<PathBuf>,
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExportDiagnosticsRequest {
    pub database_path: String,
    pub sarif_file: PathBuf,
    pub automation_details_id: Option<String>,
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DiagnosticsExportRequest {
    pub sarif_file: PathBuf,
    pub automation_details_id: Option<String>,
    pub scan_config_file: Option<PathBuf>,
}

// ── The façade ─────────────────────────────────────────────────

/// Engine access, one method per subcommand.
///
/// `CliEngine` is the real implementation; tests substitute a
/// `FakeEngine` whose unconfigured operations fail explicitly.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Path of the engine executable.
    fn path(&self) -> &str;

    /// Semver version string of the engine, cached per façade lifetime.
    async fn version(&self) -> Result<String, EngineError>;

    /// Print full version information into the log.
    async fn print_version(&self) -> Result<(), EngineError>;

    /// `database init --db-cluster`.
    async fn database_init_cluster(&self, req: &DatabaseInitRequest) -> Result<(), EngineError>;

    /// Run the autobuilder for a language.
    async fn run_autobuild(&self, language: Language) -> Result<(), EngineError>;

    /// Extract a traced language via `database trace-command`.
    async fn extract_scanned_language(&self, req: &ExtractRequest) -> Result<(), EngineError>;

    /// `database finalize`.
    async fn finalize_database(
        &self,
        database_path: &str,
        threads_flag: &str,
        memory_flag: &str,
    ) -> Result<(), EngineError>;

    /// `resolve languages --format=json`.
    async fn resolve_languages(&self) -> Result<ResolveLanguagesOutput, EngineError>;

    /// `resolve languages --format=betterjson` (version gated).
    async fn better_resolve_languages(&self)
        -> Result<BetterResolveLanguagesOutput, EngineError>;

    /// `resolve queries --format=bylanguage`.
    async fn resolve_queries(
        &self,
        queries: &[String],
        extra_search_path: Option<&str>,
    ) -> Result<ResolveQueriesOutput, EngineError>;

    /// `resolve build-environment` (version gated).
    async fn resolve_build_environment(
        &self,
        working_dir: Option<&str>,
        language: Language,
    ) -> Result<ResolveBuildEnvironmentOutput, EngineError>;

    /// Location of the extractor for a language.
    async fn resolve_extractor(&self, language: Language) -> Result<String, EngineError>;

    /// `pack download`.
    async fn pack_download(
        &self,
        packs: &[String],
        qlconfig_file: Option<&Path>,
    ) -> Result<PackDownloadOutput, EngineError>;

    /// `database run-queries`.
    async fn database_run_queries(&self, req: &RunQueriesRequest) -> Result<(), EngineError>;

    /// `database interpret-results`; returns the analysis summary printed
    /// on stdout.
    async fn database_interpret_results(
        &self,
        req: &InterpretResultsRequest,
    ) -> Result<String, EngineError>;

    /// `database print-baseline`; returns raw stdout.
    async fn database_print_baseline(&self, database_path: &str) -> Result<String, EngineError>;

    /// `database cleanup`.
    async fn database_cleanup(
        &self,
        database_path: &str,
        cleanup_level: &str,
    ) -> Result<(), EngineError>;

    /// `database bundle`.
    async fn database_bundle(
        &self,
        database_path: &str,
        output_file: &Path,
        database_name: &str,
    ) -> Result<(), EngineError>;

    /// `database export-diagnostics`, always routed through the
    /// invalid-notifications repair.
    async fn database_export_diagnostics(
        &self,
        req: &ExportDiagnosticsRequest,
    ) -> Result<(), EngineError>;

    /// `diagnostics export`.
    async fn diagnostics_export(&self, req: &DiagnosticsExportRequest) -> Result<(), EngineError>;
}

/// True iff the engine's version is strictly above `threshold`.
pub async fn engine_version_above(
    engine: &dyn Engine,
    threshold: &str,
) -> Result<bool, EngineError> {
    let version = parse_version(&engine.version().await?)?;
    let threshold = parse_version(threshold)?;
    Ok(version_above(&version, &threshold))
}

/// Whether a version-floor check runs at construction. Must be `Required`
/// outside tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionCheck {
    #[default]
    Required,
    Skip,
}

pub struct CliEngineBuilder {
    executable: String,
    features: Arc<dyn FeatureEnablement>,
    matchers: Option<Vec<ErrorMatcher>>,
    extra_options_blob: Option<String>,
    version_check: VersionCheck,
}

impl CliEngineBuilder {
    pub fn features(mut self, features: Arc<dyn FeatureEnablement>) -> Self {
        self.features = features;
        self
    }

    pub fn matchers(mut self, matchers: Vec<ErrorMatcher>) -> Self {
        self.matchers = Some(matchers);
        self
    }

    /// Override the extra-options blob instead of reading the environment.
    pub fn extra_options(mut self, blob: impl Into<String>) -> Self {
        self.extra_options_blob = Some(blob.into());
        self
    }

    pub fn version_check(mut self, check: VersionCheck) -> Self {
        self.version_check = check;
        self
    }

    /// Construct the façade. With `VersionCheck::Required` this runs the
    /// version floor check; a too-old engine fails here and no façade is
    /// returned.
    pub async fn build(self) -> Result<CliEngine, EngineError> {
        let matchers = match self.matchers {
            Some(matchers) => matchers,
            None => quarry_domain::default_matchers()?,
        };
        let engine = CliEngine {
            executable: self.executable,
            features: self.features,
            matchers,
            extra_options_blob: self.extra_options_blob,
            version_cache: OnceCell::new(),
            overrides_cache: OnceCell::new(),
        };
        if self.version_check == VersionCheck::Required {
            engine.enforce_version_floor().await?;
        }
        Ok(engine)
    }
}

/// The real façade, bound to one engine executable.
pub struct CliEngine {
    executable: String,
    features: Arc<dyn FeatureEnablement>,
    matchers: Vec<ErrorMatcher>,
    extra_options_blob: Option<String>,
    /// Written at most once; the engine binary is immutable for the run.
    version_cache: OnceCell<(String, Version)>,
    overrides_cache: OnceCell<OverrideTree>,
}

impl std::fmt::Debug for CliEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliEngine")
            .field("executable", &self.executable)
            .finish_non_exhaustive()
    }
}

impl CliEngine {
    pub fn builder(executable: impl Into<String>) -> CliEngineBuilder {
        CliEngineBuilder {
            executable: executable.into(),
            features: Arc::new(StaticFeatures::none()),
            matchers: None,
            extra_options_blob: None,
            version_check: VersionCheck::default(),
        }
    }

    /// True iff the cached engine version is strictly above `threshold`.
    pub async fn version_above(&self, threshold: &str) -> Result<bool, EngineError> {
        let (_, parsed) = self.cached_version().await?;
        Ok(version_above(parsed, &parse_version(threshold)?))
    }

    async fn cached_version(&self) -> Result<&(String, Version), EngineError> {
        self.version_cache
            .get_or_try_init(|| async {
                let raw = invoke::run(
                    &self.executable,
                    &arg_vec(&["version", "--format=terse"]),
                    InvocationOptions::default(),
                )
                .await?;
                let raw = raw.trim().to_string();
                let parsed = parse_version(&raw)?;
                debug!("Resolved engine version {raw}");
                Ok((raw, parsed))
            })
            .await
    }

    async fn enforce_version_floor(&self) -> Result<(), EngineError> {
        let (raw, parsed) = self.cached_version().await?;
        let minimum = parse_version(MINIMUM_ENGINE_VERSION)?;
        if version_above(&minimum, parsed) {
            return Err(EngineError::VersionTooOld {
                actual: raw.clone(),
                minimum: MINIMUM_ENGINE_VERSION.to_string(),
            });
        }

        let next_minimum = parse_version(NEXT_MINIMUM_ENGINE_VERSION)?;
        let suppressed = std::env::var(SUPPRESS_DEPRECATION_ENV).as_deref() == Ok("true");
        if !suppressed && !version_above(parsed, &next_minimum) {
            warn!(
                "Engine version {raw} is deprecated and will not be supported by the next \
                 release of this driver. Please update to version {NEXT_MINIMUM_ENGINE_VERSION} \
                 or later."
            );
            std::env::set_var(SUPPRESS_DEPRECATION_ENV, "true");
        }
        Ok(())
    }

    /// Resolve the user's extra options for one subcommand path. The
    /// override blob is parsed on first use and memoized; malformed JSON
    /// surfaces here.
    async fn extra_options(&self, path: &[&str]) -> Result<Vec<String>, EngineError> {
        let tree = self
            .overrides_cache
            .get_or_try_init(|| async {
                let blob = match &self.extra_options_blob {
                    Some(blob) => blob.clone(),
                    None => std::env::var(EXTRA_OPTIONS_ENV).unwrap_or_else(|_| "{}".to_string()),
                };
                Ok::<_, EngineError>(OverrideTree::parse(&blob)?)
            })
            .await?;
        Ok(tree.resolve(path))
    }

    async fn require_version_above(
        &self,
        subcommand: &str,
        required: &str,
    ) -> Result<(), EngineError> {
        if self.version_above(required).await? {
            return Ok(());
        }
        let (actual, _) = self.cached_version().await?;
        Err(EngineError::UnsupportedSubcommand {
            subcommand: subcommand.to_string(),
            required: required.to_string(),
            actual: actual.clone(),
        })
    }

    async fn run_raw(
        &self,
        args: Vec<String>,
        options: InvocationOptions,
    ) -> Result<String, EngineError> {
        Ok(invoke::run(&self.executable, &args, options).await?)
    }

    async fn run_classified(&self, args: Vec<String>) -> Result<InvocationResult, EngineError> {
        Ok(invoke::run_classified(
            &self.executable,
            &args,
            InvocationOptions::default(),
            &self.matchers,
        )
        .await?)
    }

    /// Arguments exporting the scan configuration into SARIF, when the
    /// file exists and the engine is new enough to accept it.
    async fn scan_config_export_args(
        &self,
        scan_config_file: Option<&Path>,
    ) -> Result<Vec<String>, EngineError> {
        if let Some(path) = scan_config_file {
            if path.exists() && self.version_above(VERSION_EXPORT_SCAN_CONFIG).await? {
                return Ok(vec![
                    "--sarif-codescanning-config".to_string(),
                    path.display().to_string(),
                ]);
            }
        }
        Ok(Vec::new())
    }

    /// Path of the autobuild script inside a language's extractor root.
    async fn autobuild_script(&self, language: Language) -> Result<PathBuf, EngineError> {
        let extractor_root = self.resolve_extractor(language).await?;
        let script = if cfg!(windows) {
            "autobuild.cmd"
        } else {
            "autobuild.sh"
        };
        Ok(Path::new(&extractor_root).join("tools").join(script))
    }
}

fn arg_vec(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn parse_output<T: DeserializeOwned>(subcommand: &str, output: &str) -> Result<T, EngineError> {
    serde_json::from_str(output).map_err(|source| EngineError::UnexpectedOutput {
        subcommand: subcommand.to_string(),
        output: output.to_string(),
        source,
    })
}

fn trap_cache_args(language: Language, cache: &TrapCache) -> Vec<String> {
    vec![
        format!("-O={language}.trap.cache.dir={}", cache.dir.display()),
        format!("-O={language}.trap.cache.bound={TRAP_CACHE_SIZE_MB}"),
        format!("-O={language}.trap.cache.write={}", cache.write),
    ]
}

#[async_trait]
impl Engine for CliEngine {
    fn path(&self) -> &str {
        &self.executable
    }

    async fn version(&self) -> Result<String, EngineError> {
        Ok(self.cached_version().await?.0.clone())
    }

    async fn print_version(&self) -> Result<(), EngineError> {
        let output = self
            .run_raw(
                arg_vec(&["version", "--format=json"]),
                InvocationOptions::default(),
            )
            .await?;
        info!("{}", output.trim_end());
        Ok(())
    }

    async fn database_init_cluster(&self, req: &DatabaseInitRequest) -> Result<(), EngineError> {
        let mut args = arg_vec(&["database", "init", "--db-cluster"]);
        args.push(req.db_location.clone());
        args.push(format!("--source-root={}", req.source_root));
        for language in &req.languages {
            args.push(format!("--language={language}"));
        }

        if req.languages.iter().any(|l| l.is_traced()) {
            args.push("--begin-tracing".to_string());
            for language in &req.languages {
                if let Some(cache) = req.trap_caches.get(language) {
                    args.extend(trap_cache_args(*language, cache));
                }
            }
        }

        // A secret token only travels via stdin, and only when a scan
        // config file will actually be parsed by the engine.
        let mut stdin_payload = None;
        if let Some(config) = &req.scan_config_file {
            args.push(format!("--codescanning-config={}", config.display()));
            if let Some(token) = &req.external_repository_token {
                args.push("--external-repository-token-stdin".to_string());
                stdin_payload = Some(token.clone());
            }
        }

        if let Some(file) = &req.qlconfig_file {
            if self.version_above(VERSION_INIT_WITH_QLCONFIG).await? {
                args.push(format!("--qlconfig-file={}", file.display()));
            }
        }

        args.extend(self.extra_options(&["database", "init"]).await?);

        let options = match stdin_payload {
            Some(token) => InvocationOptions::with_stdin(token),
            None => InvocationOptions::default(),
        };
        self.run_raw(args, options).await?;
        Ok(())
    }

    async fn run_autobuild(&self, language: Language) -> Result<(), EngineError> {
        let autobuild = self.autobuild_script(language).await?;

        // Long builds pulling JVM dependencies hit idle-connection
        // timeouts; disable keep-alive and pooling in the child only.
        let existing = std::env::var("JAVA_TOOL_OPTIONS").unwrap_or_default();
        let mut java_opts: Vec<&str> = existing.split_whitespace().collect();
        java_opts.push("-Dhttp.keepAlive=false");
        java_opts.push("-Dmaven.wagon.http.pool=false");
        let env = vec![("JAVA_TOOL_OPTIONS".to_string(), java_opts.join(" "))];

        invoke::run(
            &autobuild.display().to_string(),
            &[],
            InvocationOptions::with_env(env),
        )
        .await?;
        Ok(())
    }

    async fn extract_scanned_language(&self, req: &ExtractRequest) -> Result<(), EngineError> {
        let trace_command = self.autobuild_script(req.language).await?;

        let mut args = arg_vec(&["database", "trace-command"]);
        if let Some(cache) = &req.trap_cache {
            args.extend(trap_cache_args(req.language, cache));
        }
        args.extend(self.extra_options(&["database", "trace-command"]).await?);
        args.push(req.database_path.clone());
        args.push("--".to_string());
        args.push(trace_command.display().to_string());

        self.run_classified(args).await?;
        Ok(())
    }

    async fn finalize_database(
        &self,
        database_path: &str,
        threads_flag: &str,
        memory_flag: &str,
    ) -> Result<(), EngineError> {
        let mut args = arg_vec(&["database", "finalize", "--finalize-dataset"]);
        args.push(threads_flag.to_string());
        args.push(memory_flag.to_string());
        args.extend(self.extra_options(&["database", "finalize"]).await?);
        args.push(database_path.to_string());

        self.run_classified(args).await?;
        Ok(())
    }

    async fn resolve_languages(&self) -> Result<ResolveLanguagesOutput, EngineError> {
        let mut args = arg_vec(&["resolve", "languages", "--format=json"]);
        args.extend(self.extra_options(&["resolve", "languages"]).await?);

        let output = self.run_raw(args, InvocationOptions::default()).await?;
        parse_output("resolve languages", &output)
    }

    async fn better_resolve_languages(
        &self,
    ) -> Result<BetterResolveLanguagesOutput, EngineError> {
        self.require_version_above("resolve languages --format=betterjson", VERSION_BETTER_RESOLVE_LANGUAGES)
            .await?;

        let mut args = arg_vec(&[
            "resolve",
            "languages",
            "--format=betterjson",
            "--extractor-options-verbosity=4",
        ]);
        args.extend(self.extra_options(&["resolve", "languages"]).await?);

        let output = self.run_raw(args, InvocationOptions::default()).await?;
        parse_output("resolve languages --format=betterjson", &output)
    }

    async fn resolve_queries(
        &self,
        queries: &[String],
        extra_search_path: Option<&str>,
    ) -> Result<ResolveQueriesOutput, EngineError> {
        let mut args = arg_vec(&["resolve", "queries"]);
        args.extend(queries.iter().cloned());
        args.push("--format=bylanguage".to_string());
        args.extend(self.extra_options(&["resolve", "queries"]).await?);
        if let Some(path) = extra_search_path {
            args.push("--additional-packs".to_string());
            args.push(path.to_string());
        }

        let output = self.run_raw(args, InvocationOptions::default()).await?;
        parse_output("resolve queries", &output)
    }

    async fn resolve_build_environment(
        &self,
        working_dir: Option<&str>,
        language: Language,
    ) -> Result<ResolveBuildEnvironmentOutput, EngineError> {
        self.require_version_above("resolve build-environment", VERSION_RESOLVE_BUILD_ENVIRONMENT)
            .await?;

        let mut args = arg_vec(&["resolve", "build-environment"]);
        args.push(format!("--language={language}"));
        args.extend(self.extra_options(&["resolve", "build-environment"]).await?);
        if let Some(dir) = working_dir {
            args.push("--working-dir".to_string());
            args.push(dir.to_string());
        }

        let output = self.run_raw(args, InvocationOptions::default()).await?;
        parse_output("resolve build-environment", &output)
    }

    async fn resolve_extractor(&self, language: Language) -> Result<String, EngineError> {
        // --format=json wraps the path in quotes, which saves stripping
        // the trailing newline by hand.
        let mut args = arg_vec(&["resolve", "extractor", "--format=json"]);
        args.push(format!("--language={language}"));
        args.extend(self.extra_options(&["resolve", "extractor"]).await?);

        let output = self.run_raw(args, InvocationOptions::default()).await?;
        parse_output("resolve extractor", &output)
    }

    async fn pack_download(
        &self,
        packs: &[String],
        qlconfig_file: Option<&Path>,
    ) -> Result<PackDownloadOutput, EngineError> {
        let mut args = arg_vec(&["pack", "download"]);
        if let Some(file) = qlconfig_file {
            args.push(format!("--qlconfig-file={}", file.display()));
        }
        args.push("--format=json".to_string());
        args.push("--resolve-query-specs".to_string());
        args.extend(self.extra_options(&["pack", "download"]).await?);
        args.extend(packs.iter().cloned());

        let output = self.run_raw(args, InvocationOptions::default()).await?;
        let parsed: PackDownloadOutput = parse_output("pack download", &output)?;
        if parsed.packs.iter().any(|p| p.name.is_empty()) {
            return Err(EngineError::MalformedOutput {
                subcommand: "pack download".to_string(),
                reason: "a downloaded pack is missing its name".to_string(),
                output: output.clone(),
            });
        }
        Ok(parsed)
    }

    async fn database_run_queries(&self, req: &RunQueriesRequest) -> Result<(), EngineError> {
        let mut args = arg_vec(&["database", "run-queries"]);
        args.extend(req.flags.iter().cloned());
        args.push(req.database_path.clone());
        // Try to leave at least 1GB free on the disk hosting the database.
        args.push("--min-disk-free=1024".to_string());
        args.push("-v".to_string());
        args.extend(self.extra_options(&["database", "run-queries"]).await?);
        if req.optimize_for_last_query_run
            && self.version_above(VERSION_EXPECT_DISCARDED_CACHE).await?
        {
            args.push("--expect-discarded-cache".to_string());
        }
        if let Some(path) = &req.extra_search_path {
            args.push("--additional-packs".to_string());
            args.push(path.clone());
        }
        if let Some(suite) = &req.query_suite_path {
            args.push(suite.clone());
        }

        self.run_classified(args).await?;
        Ok(())
    }

    async fn database_interpret_results(
        &self,
        req: &InterpretResultsRequest,
    ) -> Result<String, EngineError> {
        let export_diagnostics = self.features.is_enabled(Feature::ExportDiagnostics).await;
        // No engine release fixes the notification writer yet, so the
        // workaround tracks diagnostics export directly.
        let workaround_invalid_notifications = export_diagnostics;
        let engine_output = if workaround_invalid_notifications {
            req.temp_dir.join(INTERMEDIATE_SARIF_FILE)
        } else {
            req.sarif_file.clone()
        };

        let mut args = arg_vec(&["database", "interpret-results"]);
        args.push(req.threads_flag.clone());
        args.push("--format=sarif-latest".to_string());
        if let Some(verbosity) = &req.verbosity_flag {
            args.push(verbosity.clone());
        }
        args.push(format!("--output={}", engine_output.display()));
        args.push(req.add_snippets_flag.clone());
        args.push("--print-diagnostics-summary".to_string());
        args.push("--print-metrics-summary".to_string());
        args.push("--sarif-add-query-help".to_string());
        args.push("--sarif-group-rules-by-pack".to_string());
        args.extend(
            self.scan_config_export_args(req.scan_config_file.as_deref())
                .await?,
        );
        args.extend(self.extra_options(&["database", "interpret-results"]).await?);
        if let Some(id) = &req.automation_details_id {
            args.push("--sarif-category".to_string());
            args.push(id.clone());
        }
        if self.version_above(VERSION_FILE_BASELINE_INFORMATION).await? {
            args.push("--sarif-add-baseline-file-info".to_string());
        }
        if export_diagnostics {
            args.push("--sarif-include-diagnostics".to_string());
        } else if self.version_above(VERSION_INIT_WITH_QLCONFIG).await? {
            args.push("--no-sarif-include-diagnostics".to_string());
        }
        if self.features.is_enabled(Feature::NewAnalysisSummary).await {
            args.push("--new-analysis-summary".to_string());
        } else if self.version_above(VERSION_NEW_ANALYSIS_SUMMARY).await? {
            args.push("--no-new-analysis-summary".to_string());
        }
        args.push(req.database_path.clone());
        args.extend(req.query_suite_paths.iter().cloned());

        // stdout carries the analysis summary the caller reports.
        let result = self.run_classified(args).await?;

        if workaround_invalid_notifications {
            fix_invalid_notifications_in_file(&engine_output, &req.sarif_file)?;
        }

        Ok(result.stdout)
    }

    async fn database_print_baseline(&self, database_path: &str) -> Result<String, EngineError> {
        let mut args = arg_vec(&["database", "print-baseline"]);
        args.extend(self.extra_options(&["database", "print-baseline"]).await?);
        args.push(database_path.to_string());

        self.run_raw(args, InvocationOptions::default()).await
    }

    async fn database_cleanup(
        &self,
        database_path: &str,
        cleanup_level: &str,
    ) -> Result<(), EngineError> {
        let mut args = arg_vec(&["database", "cleanup"]);
        args.push(database_path.to_string());
        args.push(format!("--mode={cleanup_level}"));
        args.extend(self.extra_options(&["database", "cleanup"]).await?);

        self.run_raw(args, InvocationOptions::default()).await?;
        Ok(())
    }

    async fn database_bundle(
        &self,
        database_path: &str,
        output_file: &Path,
        database_name: &str,
    ) -> Result<(), EngineError> {
        let mut args = arg_vec(&["database", "bundle"]);
        args.push(database_path.to_string());
        args.push(format!("--output={}", output_file.display()));
        args.push(format!("--name={database_name}"));
        args.extend(self.extra_options(&["database", "bundle"]).await?);

        self.run_raw(args, InvocationOptions::default()).await?;
        Ok(())
    }

    async fn database_export_diagnostics(
        &self,
        req: &ExportDiagnosticsRequest,
    ) -> Result<(), EngineError> {
        // The notification writer defect always applies to this command.
        let engine_output = req.temp_dir.join(INTERMEDIATE_SARIF_FILE);

        let mut args = arg_vec(&["database", "export-diagnostics"]);
        args.push(req.database_path.clone());
        // The database is always a cluster on engines that support
        // diagnostics export.
        args.push("--db-cluster".to_string());
        args.push("--format=sarif-latest".to_string());
        args.push(format!("--output={}", engine_output.display()));
        args.push("--sarif-include-diagnostics".to_string());
        args.push("-vvv".to_string());
        args.extend(self.extra_options(&["diagnostics", "export"]).await?);
        if let Some(id) = &req.automation_details_id {
            args.push("--sarif-category".to_string());
            args.push(id.clone());
        }

        self.run_raw(args, InvocationOptions::default()).await?;

        fix_invalid_notifications_in_file(&engine_output, &req.sarif_file)?;
        Ok(())
    }

    async fn diagnostics_export(&self, req: &DiagnosticsExportRequest) -> Result<(), EngineError> {
        let mut args = arg_vec(&["diagnostics", "export", "--format=sarif-latest"]);
        args.push(format!("--output={}", req.sarif_file.display()));
        args.extend(
            self.scan_config_export_args(req.scan_config_file.as_deref())
                .await?,
        );
        args.extend(self.extra_options(&["diagnostics", "export"]).await?);
        if let Some(id) = &req.automation_details_id {
            args.push("--sarif-category".to_string());
            args.push(id.clone());
        }

        self.run_raw(args, InvocationOptions::default()).await?;
        Ok(())
    }
}
