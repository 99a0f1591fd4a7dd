use anyhow::Context;
use serde_json::Value;
use std::path::Path;
use std::process::ExitCode;

use trendfetch_core::{classify_payload, PayloadShape, RecordStatus, TrendRecord};

/// Result of checking one file.
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict {
    Valid(String),
    Invalid(String),
}

pub fn run(file: &Path) -> anyhow::Result<ExitCode> {
    match check_file(file)? {
        Verdict::Valid(summary) => {
            println!("✓ {}: {}", file.display(), summary);
            Ok(ExitCode::SUCCESS)
        }
        Verdict::Invalid(reason) => {
            println!("✗ {}: {}", file.display(), reason);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Check a raw payload (array or null) or a persisted record (object).
pub fn check_file(file: &Path) -> anyhow::Result<Verdict> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let raw: Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    if raw.is_object() {
        Ok(check_record(&raw))
    } else {
        Ok(check_payload(&raw))
    }
}

fn check_payload(raw: &Value) -> Verdict {
    match classify_payload(raw) {
        Ok(PayloadShape::Empty) => Verdict::Valid("empty payload".to_string()),
        Ok(PayloadShape::Points(points)) => {
            Verdict::Valid(format!("payload with {} data points", points.len()))
        }
        Err(e) => Verdict::Invalid(e.to_string()),
    }
}

fn check_record(raw: &Value) -> Verdict {
    if let Err(e) = classify_payload(&raw["trends"]) {
        return Verdict::Invalid(format!("trends: {}", e));
    }

    let record: TrendRecord = match serde_json::from_value(raw.clone()) {
        Ok(record) => record,
        Err(e) => return Verdict::Invalid(format!("not a trend record: {}", e)),
    };

    match (record.status, record.trends.is_empty()) {
        (RecordStatus::Success, true) => {
            Verdict::Invalid("status is success but trends are empty".to_string())
        }
        (RecordStatus::Empty, false) => {
            Verdict::Invalid("status is empty but trends are present".to_string())
        }
        _ => Verdict::Valid(format!(
            "record for '{}' with {} data points",
            record.topic,
            record.trends.len()
        )),
    }
}
