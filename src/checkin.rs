use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// A single check-in record as returned by the API.
///
/// The raw JSON object is kept verbatim so that unknown fields round-trip
/// unchanged into the saved file. Only `createdAt` and `timeZoneOffset` are
/// required; they are validated once at construction and used to derive the
/// check-in's local timestamp.
#[derive(Debug, Clone)]
pub struct Checkin {
    raw: Value,
    local_time: DateTime<FixedOffset>,
}

impl Checkin {
    /// Build a [`Checkin`] from a raw API item.
    ///
    /// # Errors
    /// Returns an error if `createdAt` (epoch seconds) or `timeZoneOffset`
    /// (minutes) is missing, not an integer, or out of range.
    pub fn from_value(raw: Value) -> Result<Self> {
        let created_at = raw
            .get("createdAt")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("checkin is missing createdAt"))?;
        let offset_minutes = raw
            .get("timeZoneOffset")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("checkin is missing timeZoneOffset"))?;

        let offset = i32::try_from(offset_minutes * 60)
            .ok()
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow!("invalid timeZoneOffset: {}", offset_minutes))?;
        let local_time = DateTime::from_timestamp(created_at, 0)
            .ok_or_else(|| anyhow!("createdAt out of range: {}", created_at))?
            .with_timezone(&offset);

        Ok(Self { raw, local_time })
    }

    /// The check-in's timestamp in the timezone it occurred in, not the
    /// machine's timezone or UTC.
    pub fn local_time(&self) -> DateTime<FixedOffset> {
        self.local_time
    }

    /// The venue name, or an empty string if the record has none.
    pub fn venue_name(&self) -> &str {
        self.raw
            .pointer("/venue/name")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Derive the file name for this check-in:
    /// `"<local-date> <local-time> <sanitized-venue>.json"`.
    ///
    /// The name is a pure function of record content, so re-fetching the same
    /// record always maps to the same file. Two check-ins at the same venue in
    /// the same local minute collide and overwrite each other.
    pub fn file_name(&self) -> String {
        format!(
            "{} {}.json",
            self.local_time.format("%Y-%m-%d %H%M"),
            sanitize_venue(self.venue_name())
        )
    }

    /// Write the full original record into `dir` as pretty-printed,
    /// key-sorted JSON.
    ///
    /// The record is written to a temp file in the same directory and then
    /// atomically renamed over the final path, so the file is never observed
    /// in a partially-written state.
    ///
    /// # Errors
    /// Returns an error if the temp file cannot be created, written, or
    /// renamed into place.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        let mut tmp = tempfile::Builder::new()
            .prefix(".checkin")
            .suffix(".tmp")
            .tempfile_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), &self.raw)
            .with_context(|| format!("failed to serialize checkin for {}", path.display()))?;
        tmp.persist(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Make a venue name safe to embed in a file name.
///
/// Accented characters are folded to their base form (NFD, combining marks
/// stripped) so the name survives URL/path contexts across encodings, and
/// `/` and `:` are replaced with `_`.
fn sanitize_venue(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            '/' | ':' => '_',
            other => other,
        })
        .collect()
}
