use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Time layout of the default out_file line format.
pub const OUT_FILE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Parses one input line. JSON objects pass through; anything else is
/// wrapped as `{"message": <line>}`.
pub fn parse_record(line: &str) -> Value {
    match serde_json::from_str::<Value>(line) {
        Ok(value @ Value::Object(_)) => value,
        _ => json!({ "message": line }),
    }
}

/// `time<TAB>tag<TAB>json\n`
pub fn format_record(time: DateTime<Utc>, tag: &str, record: &Value) -> String {
    format!("{}\t{}\t{}\n", time.format(OUT_FILE_TIME_FORMAT), tag, record)
}
