use std::fmt;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use crate::config::ResolvedConfig;
use crate::errors::ConfigError;

/// Name of an append blob inside the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ObjectName(String);

impl ObjectName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectName {
    fn from(s: &str) -> Self {
        ObjectName(s.to_string())
    }
}

/// The time-derived parts of a name, computed once per flush cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketKey {
    /// The configured path with strftime directives expanded.
    pub path: String,
    /// The chunk's time key formatted with the time slice format.
    pub time_slice: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Path,
    TimeSlice,
    Index,
}

/// Rejects strftime patterns chrono cannot render.
pub fn validate_strftime(format: &str) -> Result<(), ConfigError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidTimeFormat(format.to_string()));
    }
    Ok(())
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    match segments.last_mut() {
        Some(Segment::Literal(prev)) => prev.push_str(text),
        _ => segments.push(Segment::Literal(text.to_string())),
    }
}

/// Splits an object key format into literals and the three known placeholders.
/// Anything else that looks like `%{...}` stays literal.
fn parse_template(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("%{") {
        push_literal(&mut segments, &rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            push_literal(&mut segments, &rest[start..]);
            return segments;
        };
        let placeholder = &rest[start..start + 2 + end + 1];
        match &after[..end] {
            "path" => segments.push(Segment::Path),
            "time_slice" => segments.push(Segment::TimeSlice),
            "index" => segments.push(Segment::Index),
            _ => push_literal(&mut segments, placeholder),
        }
        rest = &after[end + 1..];
    }
    push_literal(&mut segments, rest);
    segments
}

/// Turns (path, time bucket, rotation index) into object names.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    segments: Vec<Segment>,
    path: String,
    time_slice_format: String,
    localtime: bool,
}

impl NameGenerator {
    pub fn new(
        object_key_format: &str,
        path: &str,
        time_slice_format: &str,
        localtime: bool,
    ) -> Result<Self, ConfigError> {
        validate_strftime(path)?;
        validate_strftime(time_slice_format)?;
        Ok(Self {
            segments: parse_template(object_key_format),
            path: path.to_string(),
            time_slice_format: time_slice_format.to_string(),
            localtime,
        })
    }

    pub fn from_config(config: &ResolvedConfig) -> Result<Self, ConfigError> {
        Self::new(
            &config.object_key_format,
            &config.path,
            &config.time_slice_format,
            config.localtime,
        )
    }

    /// Whether the rotation index takes part in the name at all.
    pub fn uses_rotation_index(&self) -> bool {
        self.segments.contains(&Segment::Index)
    }

    /// `timekey` is the start of the chunk's time bucket, if the host keys
    /// chunks by time. `now` drives strftime directives in the path.
    pub fn bucket_key(&self, timekey: Option<DateTime<Utc>>, now: DateTime<Utc>) -> BucketKey {
        let path = if self.localtime {
            now.with_timezone(&Local).format(&self.path).to_string()
        } else {
            now.format(&self.path).to_string()
        };
        let time_slice = timekey
            .map(|t| t.format(&self.time_slice_format).to_string())
            .unwrap_or_default();
        BucketKey { path, time_slice }
    }

    pub fn generate(&self, key: &BucketKey, rotation_index: u64) -> ObjectName {
        let mut name = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => name.push_str(text),
                Segment::Path => name.push_str(&key.path),
                Segment::TimeSlice => name.push_str(&key.time_slice),
                Segment::Index => name.push_str(&rotation_index.to_string()),
            }
        }
        ObjectName(name)
    }
}
