//! Data types for quarry.
//!
//! This crate is intentionally "dumb": pure DTOs with serde. The SARIF model
//! here is deliberately partial: it names only the fields the repair pass
//! needs to walk, and keeps everything else in flattened maps so a document
//! round-trips byte-for-byte at the JSON value level.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Languages ──────────────────────────────────────────────────

/// An analysis language understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cpp,
    Csharp,
    Go,
    Java,
    Javascript,
    Python,
    Ruby,
    Swift,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::Csharp => "csharp",
            Language::Go => "go",
            Language::Java => "java",
            Language::Javascript => "javascript",
            Language::Python => "python",
            Language::Ruby => "ruby",
            Language::Swift => "swift",
        }
    }

    /// Whether extraction for this language requires tracing the build.
    pub fn is_traced(self) -> bool {
        matches!(
            self,
            Language::Cpp | Language::Csharp | Language::Go | Language::Java | Language::Swift
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLanguage(pub String);

impl fmt::Display for UnknownLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown language '{}'", self.0)
    }
}

impl std::error::Error for UnknownLanguage {}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpp" | "c" | "c++" => Ok(Language::Cpp),
            "csharp" | "c#" => Ok(Language::Csharp),
            "go" | "golang" => Ok(Language::Go),
            "java" => Ok(Language::Java),
            "javascript" | "typescript" => Ok(Language::Javascript),
            "python" => Ok(Language::Python),
            "ruby" => Ok(Language::Ruby),
            "swift" => Ok(Language::Swift),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

// ── SARIF document model ───────────────────────────────────────

/// A SARIF results file as emitted by the engine.
///
/// Only the path down to notification locations is typed; every other field
/// at every level is preserved verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarifFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<Vec<SarifRun>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarifRun {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocations: Option<Vec<SarifInvocation>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarifInvocation {
    #[serde(
        rename = "toolExecutionNotifications",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_execution_notifications: Option<Vec<SarifNotification>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A tool execution notification. Locations are kept opaque: duplicate
/// detection is deep equality over the raw JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarifNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

// ── Structured subcommand outputs ──────────────────────────────

/// Output of `resolve languages --format=json`: language name to the
/// extractor root path(s) that provide it.
pub type ResolveLanguagesOutput = BTreeMap<String, Vec<String>>;

/// Output of `resolve languages --format=betterjson`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetterResolveLanguagesOutput {
    pub extractors: BTreeMap<String, Vec<ExtractorInfo>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorInfo {
    pub extractor_root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor_options: Option<Value>,
}

/// Output of `resolve queries --format=bylanguage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveQueriesOutput {
    pub by_language: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(default)]
    pub no_declared_language: BTreeMap<String, Value>,
    #[serde(default)]
    pub multiple_declared_languages: BTreeMap<String, Value>,
}

/// Output of `resolve build-environment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveBuildEnvironmentOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<BTreeMap<String, BTreeMap<String, Value>>>,
}

/// Output of `pack download --format=json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackDownloadOutput {
    pub packs: Vec<PackDownloadItem>,
}

/// One downloaded pack. The engine omits the version when the request did
/// not pin one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackDownloadItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_result: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn language_round_trips_through_str() {
        for lang in [
            Language::Cpp,
            Language::Csharp,
            Language::Go,
            Language::Java,
            Language::Javascript,
            Language::Python,
            Language::Ruby,
            Language::Swift,
        ] {
            assert_eq!(lang.as_str().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn language_aliases_parse() {
        assert_eq!("typescript".parse::<Language>().unwrap(), Language::Javascript);
        assert_eq!("c++".parse::<Language>().unwrap(), Language::Cpp);
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn traced_languages_match_engine_extractors() {
        assert!(Language::Java.is_traced());
        assert!(Language::Swift.is_traced());
        assert!(!Language::Python.is_traced());
        assert!(!Language::Javascript.is_traced());
    }

    #[test]
    fn sarif_preserves_unknown_fields() {
        let doc = json!({
            "$schema": "https://json.schemastore.org/sarif-2.1.0.json",
            "version": "2.1.0",
            "runs": [{
                "tool": { "driver": { "name": "engine" } },
                "invocations": [{
                    "executionSuccessful": true,
                    "toolExecutionNotifications": [{
                        "message": { "text": "hi" },
                        "locations": [{ "physicalLocation": { "artifactLocation": { "uri": "f" } } }]
                    }]
                }],
                "results": []
            }]
        });

        let parsed: SarifFile = serde_json::from_value(doc.clone()).unwrap();
        let emitted = serde_json::to_value(&parsed).unwrap();
        assert_eq!(emitted, doc);
    }

    #[test]
    fn resolve_queries_output_parses_engine_shape() {
        let doc = json!({
            "byLanguage": { "java": { "/q/Foo.ql": {} } },
            "noDeclaredLanguage": { "/q/Bare.ql": {} },
            "multipleDeclaredLanguages": {}
        });
        let parsed: ResolveQueriesOutput = serde_json::from_value(doc).unwrap();
        assert!(parsed.by_language.contains_key("java"));
        assert_eq!(parsed.no_declared_language.len(), 1);
    }

    #[test]
    fn pack_download_item_tolerates_missing_version() {
        let doc = json!({ "packs": [{ "name": "org/queries", "packDir": "/cache/p" }] });
        let parsed: PackDownloadOutput = serde_json::from_value(doc).unwrap();
        assert_eq!(parsed.packs[0].name, "org/queries");
        assert_eq!(parsed.packs[0].version, None);
    }

    #[test]
    fn sarif_tolerates_missing_invocations() {
        let doc = json!({ "runs": [{ "tool": { "driver": { "name": "engine" } } }] });
        let parsed: SarifFile = serde_json::from_value(doc.clone()).unwrap();
        assert_eq!(serde_json::to_value(&parsed).unwrap(), doc);
    }
}
