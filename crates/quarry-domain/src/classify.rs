//! Failure-fingerprint classification for engine stderr.
//!
//! The engine reports most misconfigurations and resource exhaustion only
//! as free-text diagnostics on stderr. Call sites that need structured
//! reporting run the captured text through an ordered matcher list; the
//! first pattern that fires decides the category.

use regex::Regex;

/// Category assigned when no matcher fires.
pub const UNKNOWN_CATEGORY: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("invalid error matcher pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// One stderr fingerprint. Matchers are tried in list order.
#[derive(Debug, Clone)]
pub struct ErrorMatcher {
    pub pattern: Regex,
    pub category: String,
    pub retryable: bool,
    /// Message reported to the user when this matcher fires.
    pub message: String,
}

impl ErrorMatcher {
    pub fn new(
        pattern: &str,
        category: &str,
        retryable: bool,
        message: &str,
    ) -> Result<Self, ClassifyError> {
        let compiled = Regex::new(pattern).map_err(|source| ClassifyError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            category: category.to_string(),
            retryable,
            message: message.to_string(),
        })
    }
}

/// The classifier's verdict for one captured stderr text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub retryable: bool,
    pub message: String,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            category: UNKNOWN_CATEGORY.to_string(),
            retryable: false,
            message: "The engine failed for an unrecognized reason; see the captured stderr."
                .to_string(),
        }
    }
}

/// Classify captured stderr against an ordered matcher list.
///
/// First match wins; identical input always yields an identical verdict.
/// This function never fails: unmatched text gets [`UNKNOWN_CATEGORY`]
/// with `retryable = false`.
pub fn classify(stderr: &str, matchers: &[ErrorMatcher]) -> Classification {
    for matcher in matchers {
        if matcher.pattern.is_match(stderr) {
            return Classification {
                category: matcher.category.clone(),
                retryable: matcher.retryable,
                message: matcher.message.clone(),
            };
        }
    }
    Classification::unknown()
}

/// The matcher set the driver ships with. Callers may substitute their own.
pub fn default_matchers() -> Result<Vec<ErrorMatcher>, ClassifyError> {
    Ok(vec![
        ErrorMatcher::new(
            r"(?i)out of memory|java heap space",
            "out_of_memory",
            false,
            "The engine ran out of memory. Raise the memory limit or reduce parallelism.",
        )?,
        ErrorMatcher::new(
            r"(?i)no space left on device|disk full",
            "out_of_disk",
            false,
            "The engine ran out of disk space during analysis.",
        )?,
        ErrorMatcher::new(
            r"No source code was seen during the build",
            "no_source_code",
            false,
            "The engine observed no source code for this language during the build step.",
        )?,
        ErrorMatcher::new(
            r"(?i)timed out waiting for|connection reset by peer",
            "network_flake",
            true,
            "A transient network failure interrupted the engine; retrying may succeed.",
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(pattern: &str, category: &str, retryable: bool, message: &str) -> ErrorMatcher {
        ErrorMatcher::new(pattern, category, retryable, message)
            .expect("test pattern should compile")
    }

    fn disk_full_matcher() -> Vec<ErrorMatcher> {
        vec![matcher("disk full", "DISK_FULL", false, "Out of disk.")]
    }

    #[test]
    fn first_matching_fingerprint_wins() {
        let matchers = vec![
            matcher("disk", "first", false, "first"),
            matcher("disk full", "second", true, "second"),
        ];
        let verdict = classify("disk full", &matchers);
        assert_eq!(verdict.category, "first");
    }

    #[test]
    fn unbalanced_pattern_is_a_compile_error() {
        let err = ErrorMatcher::new("(", "broken", false, "never fires")
            .expect_err("unbalanced pattern must not compile");
        let ClassifyError::InvalidPattern { pattern, .. } = err;
        assert_eq!(pattern, "(");
    }

    #[test]
    fn pattern_errors_name_the_offending_pattern() {
        let err = ErrorMatcher::new("[a-", "broken", false, "never fires")
            .expect_err("unterminated class must not compile");
        assert!(err.to_string().contains("[a-"));
    }

    #[test]
    fn matching_stderr_yields_the_configured_category() {
        let verdict = classify("fatal: disk full", &disk_full_matcher());
        assert_eq!(verdict.category, "DISK_FULL");
        assert!(!verdict.retryable);
        assert_eq!(verdict.message, "Out of disk.");
    }

    #[test]
    fn unmatched_stderr_falls_back_to_unknown() {
        let verdict = classify("something novel happened", &disk_full_matcher());
        assert_eq!(verdict.category, UNKNOWN_CATEGORY);
        assert!(!verdict.retryable);
    }

    #[test]
    fn empty_matcher_list_falls_back_to_unknown() {
        let verdict = classify("anything", &[]);
        assert_eq!(verdict.category, UNKNOWN_CATEGORY);
    }

    #[test]
    fn builtin_matchers_compile() {
        let matchers = default_matchers().expect("builtin patterns compile");
        assert!(!matchers.is_empty());
    }

    #[test]
    fn classification_is_deterministic() {
        let matchers = default_matchers().expect("builtin patterns compile");
        let first = classify("java heap space exhausted", &matchers);
        for _ in 0..10 {
            assert_eq!(classify("java heap space exhausted", &matchers), first);
        }
        assert_eq!(first.category, "out_of_memory");
    }

    #[test]
    fn default_matchers_flag_retryable_network_failures() {
        let verdict = classify(
            "error: Connection reset by peer while fetching pack",
            &default_matchers().expect("builtin patterns compile"),
        );
        assert_eq!(verdict.category, "network_flake");
        assert!(verdict.retryable);
    }
}
