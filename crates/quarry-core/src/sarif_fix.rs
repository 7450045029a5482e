//! Repair of structurally invalid SARIF emitted by the engine.
//!
//! Some engine releases emit tool execution notifications whose location
//! lists contain exact duplicates, which the ingestion endpoint rejects.
//! The defect lives in the engine's own SARIF writer, so it has to be
//! patched here after the fact.

use std::path::Path;

use tracing::{debug, info};

use quarry_types::SarifFile;

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("could not read SARIF file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("SARIF file {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("could not write repaired SARIF file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Remove duplicate locations from every notification in the document.
///
/// A location is a duplicate iff it is deep-equal to an earlier location in
/// the same notification. The first occurrence survives and relative order
/// is preserved, so the transform is idempotent. Emits exactly one log line
/// per document: debug when nothing was removed, info with the removal
/// count otherwise.
pub fn fix_invalid_notifications(mut sarif: SarifFile) -> SarifFile {
    let mut removed = 0usize;

    for run in sarif.runs.iter_mut().flatten() {
        for invocation in run.invocations.iter_mut().flatten() {
            for notification in invocation.tool_execution_notifications.iter_mut().flatten() {
                if let Some(locations) = notification.locations.as_mut() {
                    let before = locations.len();
                    dedup_preserving_order(locations);
                    removed += before - locations.len();
                }
            }
        }
    }

    if removed == 0 {
        debug!("No duplicate locations found in SARIF notification objects.");
    } else {
        info!("Removed {removed} duplicate locations from SARIF notification objects.");
    }

    sarif
}

/// File-based variant: reads one path, writes the repaired document to
/// another. The source file is never rewritten in place.
pub fn fix_invalid_notifications_in_file(input: &Path, output: &Path) -> Result<(), RepairError> {
    let text = std::fs::read_to_string(input).map_err(|source| RepairError::Read {
        path: input.display().to_string(),
        source,
    })?;
    let sarif: SarifFile = serde_json::from_str(&text).map_err(|source| RepairError::Parse {
        path: input.display().to_string(),
        source,
    })?;

    let repaired = fix_invalid_notifications(sarif);

    let rendered = serde_json::to_string(&repaired).map_err(|source| RepairError::Parse {
        path: output.display().to_string(),
        source,
    })?;
    std::fs::write(output, rendered).map_err(|source| RepairError::Write {
        path: output.display().to_string(),
        source,
    })
}

/// Keep the first occurrence of each distinct value, in order. Location
/// lists are short, so a linear scan beats hashing serialized values.
fn dedup_preserving_order(values: &mut Vec<serde_json::Value>) {
    let mut kept: Vec<serde_json::Value> = Vec::with_capacity(values.len());
    for value in values.drain(..) {
        if !kept.contains(&value) {
            kept.push(value);
        }
    }
    *values = kept;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn location(uri: &str) -> Value {
        json!({ "physicalLocation": { "artifactLocation": { "uri": uri } } })
    }

    fn sarif_with_notification(locations: Vec<Value>) -> SarifFile {
        serde_json::from_value(json!({
            "runs": [{
                "tool": { "driver": { "name": "engine" } },
                "invocations": [{
                    "toolExecutionNotifications": [{ "locations": locations }]
                }]
            }]
        }))
        .expect("fixture should parse")
    }

    fn notification_locations(sarif: &SarifFile) -> &Vec<Value> {
        sarif.runs.as_ref().unwrap()[0].invocations.as_ref().unwrap()[0]
            .tool_execution_notifications
            .as_ref()
            .unwrap()[0]
            .locations
            .as_ref()
            .unwrap()
    }

    #[test]
    fn unique_locations_are_left_alone() {
        let sarif = sarif_with_notification(vec![location("file1")]);
        let repaired = fix_invalid_notifications(sarif.clone());
        assert_eq!(repaired, sarif);
    }

    #[test]
    fn duplicate_locations_are_removed_keeping_first() {
        let sarif =
            sarif_with_notification(vec![location("file1"), location("file1")]);
        let repaired = fix_invalid_notifications(sarif);
        assert_eq!(notification_locations(&repaired), &vec![location("file1")]);
    }

    #[test]
    fn survivor_order_is_preserved() {
        let sarif = sarif_with_notification(vec![
            location("a"),
            location("b"),
            location("a"),
            location("c"),
            location("b"),
        ]);
        let repaired = fix_invalid_notifications(sarif);
        assert_eq!(
            notification_locations(&repaired),
            &vec![location("a"), location("b"), location("c")]
        );
    }

    #[test]
    fn repair_is_idempotent() {
        let sarif = sarif_with_notification(vec![
            location("a"),
            location("a"),
            location("b"),
        ]);
        let once = fix_invalid_notifications(sarif);
        let twice = fix_invalid_notifications(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn structurally_different_locations_both_survive() {
        // Same URI, different region: not a duplicate under deep equality.
        let with_region = json!({
            "physicalLocation": {
                "artifactLocation": { "uri": "file1" },
                "region": { "startLine": 3 }
            }
        });
        let sarif = sarif_with_notification(vec![location("file1"), with_region.clone()]);
        let repaired = fix_invalid_notifications(sarif);
        assert_eq!(
            notification_locations(&repaired),
            &vec![location("file1"), with_region]
        );
    }

    #[test]
    fn removal_is_reported_in_a_single_info_line() {
        let (logs, _guard) = crate::test_log::capture();
        let sarif = sarif_with_notification(vec![location("a"), location("a")]);
        fix_invalid_notifications(sarif);

        assert_eq!(
            logs.messages_at(tracing::Level::INFO),
            vec!["Removed 1 duplicate locations from SARIF notification objects."]
        );
        assert!(logs.messages_at(tracing::Level::DEBUG).is_empty());
    }

    #[test]
    fn clean_document_is_reported_at_debug_only() {
        let (logs, _guard) = crate::test_log::capture();
        fix_invalid_notifications(sarif_with_notification(vec![location("a"), location("b")]));

        assert_eq!(
            logs.messages_at(tracing::Level::DEBUG),
            vec!["No duplicate locations found in SARIF notification objects."]
        );
        assert!(logs.messages_at(tracing::Level::INFO).is_empty());
    }

    #[test]
    fn documents_without_notifications_pass_through() {
        let sarif: SarifFile = serde_json::from_value(json!({
            "runs": [{ "tool": { "driver": { "name": "engine" } }, "results": [] }]
        }))
        .unwrap();
        let repaired = fix_invalid_notifications(sarif.clone());
        assert_eq!(repaired, sarif);
    }

    #[test]
    fn file_variant_writes_to_the_destination_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("raw.sarif");
        let output = dir.path().join("fixed.sarif");

        let doc = serde_json::to_string(&sarif_with_notification(vec![
            location("file1"),
            location("file1"),
        ]))
        .unwrap();
        std::fs::write(&input, &doc).unwrap();

        fix_invalid_notifications_in_file(&input, &output).expect("repair should succeed");

        // Source untouched, destination repaired.
        assert_eq!(std::fs::read_to_string(&input).unwrap(), doc);
        let repaired: SarifFile =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(notification_locations(&repaired).len(), 1);
    }

    #[test]
    fn unparsable_input_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("bad.sarif");
        std::fs::write(&input, "{not json").unwrap();

        let err = fix_invalid_notifications_in_file(&input, &dir.path().join("out.sarif"))
            .expect_err("should fail");
        assert!(matches!(err, RepairError::Parse { .. }));
    }
}
