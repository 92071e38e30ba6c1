//! Merge line-delimited JSON match records into one JSON document.
//!
//! One record is passed through as-is. Several records are folded into a
//! summary object that lifts the shared configuration of the first record
//! to the top level and keeps every record under `matches`.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::{json, Map as JsonMap, Number, Value};
use thiserror::Error;

// Configuration keys lifted from the first record, in output order.
pub const CONFIG_KEYS: [&str; 3] = ["game_config", "agents_config", "models_config"];

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line} is not valid JSON: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("first record has no '{key}' key")]
    MissingKey { key: &'static str },

    #[error("record on line {line} is not a JSON object")]
    NotAnObject { line: usize },

    #[error("record on line {line} has a non-numeric 'token_size'")]
    InvalidTokenSize { line: usize },

    #[error("'token_size' total does not fit in a JSON integer")]
    TokenSizeOverflow,

    #[error("no records to merge")]
    NoRecords,

    #[error("{} contains no records", path.display())]
    EmptyInput { path: PathBuf },

    #[error("cannot serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A decoded input line together with its 1-based line number.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub line: usize,
    pub value: Value,
}

/// What a successful [`aggregate`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub records: usize,
    pub output: PathBuf,
}

/// Read `input`, merge its records and write the result to `output`.
///
/// The output file is only created once the whole document has been built
/// and serialized, so any failure leaves an existing output untouched.
pub fn aggregate(input: &Path, output: &Path) -> Result<Summary, AggregateError> {
    let records = read_records(input)?;
    if records.is_empty() {
        return Err(AggregateError::EmptyInput {
            path: input.to_path_buf(),
        });
    }
    let count = records.len();
    info!("read {count} record(s) from {}", input.display());

    let document = merge_records(records)?;
    write_document(output, &document)?;
    info!("wrote {}", output.display());

    Ok(Summary {
        records: count,
        output: output.to_path_buf(),
    })
}

pub fn read_records(path: &Path) -> Result<Vec<Record>, AggregateError> {
    let text = fs::read_to_string(path).map_err(|source| AggregateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(&text)
}

/// Decode every non-blank line of `text`, keeping input order.
pub fn parse_records(text: &str) -> Result<Vec<Record>, AggregateError> {
    let mut records = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            debug!("skipping blank line {line}");
            continue;
        }
        let value = serde_json::from_str(trimmed)
            .map_err(|source| AggregateError::Decode { line, source })?;
        records.push(Record { line, value });
    }
    Ok(records)
}

/// Build the output document.
///
/// A single record comes back unwrapped. Otherwise the first record must be
/// an object carrying every key in [`CONFIG_KEYS`], and every record must be
/// an object so its `token_size` can be summed.
pub fn merge_records(mut records: Vec<Record>) -> Result<Value, AggregateError> {
    if records.len() == 1 {
        return Ok(records.remove(0).value);
    }

    let first = records.first().ok_or(AggregateError::NoRecords)?;
    let first_obj = first
        .value
        .as_object()
        .ok_or(AggregateError::NotAnObject { line: first.line })?;

    let mut doc = JsonMap::new();
    for key in CONFIG_KEYS {
        let v = first_obj
            .get(key)
            .ok_or(AggregateError::MissingKey { key })?;
        doc.insert(key.to_string(), v.clone());
    }

    let token_size = sum_token_sizes(&records)?;

    doc.insert("win_rate".into(), json!({}));
    doc.insert(
        "matches".into(),
        Value::Array(records.into_iter().map(|r| r.value).collect()),
    );
    doc.insert("token_size".into(), token_size);
    Ok(Value::Object(doc))
}

// Integers are summed exactly and stay integers unless a float shows up
// somewhere. JSON integers span i64 and u64, so the running total is i128.
fn sum_token_sizes(records: &[Record]) -> Result<Value, AggregateError> {
    let mut int_total: i128 = 0;
    let mut float_total: f64 = 0.0;
    let mut saw_float = false;

    for rec in records {
        let obj = rec
            .value
            .as_object()
            .ok_or(AggregateError::NotAnObject { line: rec.line })?;
        match obj.get("token_size") {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) => {
                let exact = n
                    .as_i64()
                    .map(i128::from)
                    .or_else(|| n.as_u64().map(i128::from));
                match exact {
                    Some(i) => {
                        int_total = int_total
                            .checked_add(i)
                            .ok_or(AggregateError::TokenSizeOverflow)?;
                    }
                    None => {
                        float_total += n.as_f64().unwrap_or(0.0);
                        saw_float = true;
                    }
                }
            }
            Some(_) => return Err(AggregateError::InvalidTokenSize { line: rec.line }),
        }
    }

    if saw_float {
        let total = float_total + int_total as f64;
        return Ok(Number::from_f64(total).map_or(Value::Null, Value::Number));
    }
    if let Ok(i) = i64::try_from(int_total) {
        Ok(Value::from(i))
    } else if let Ok(u) = u64::try_from(int_total) {
        Ok(Value::from(u))
    } else {
        Err(AggregateError::TokenSizeOverflow)
    }
}

/// Pretty-print `doc` (2-space indent, non-ASCII kept) and replace `path`.
pub fn write_document(path: &Path, doc: &Value) -> Result<(), AggregateError> {
    let pretty = serde_json::to_string_pretty(doc)?;
    fs::write(path, pretty).map_err(|source| AggregateError::Write {
        path: path.to_path_buf(),
        source,
    })
}
