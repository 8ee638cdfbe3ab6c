use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::Path;

/// Timestamp format embedded at the start of every saved check-in file name.
const STAMP_FORMAT: &str = "%Y-%m-%d %H%M";

/// Length of the `"YYYY-MM-DD HHMM"` prefix.
const STAMP_LEN: usize = 15;

/// Find the latest check-in already saved in `dir`, by scanning file names.
///
/// Only names starting with a valid `"YYYY-MM-DD HHMM"` prefix and ending in
/// `.json` are considered; anything else is skipped, not an error. Returns
/// `None` if the directory is missing, unreadable, or holds no matching file.
///
/// The returned instant is the parsed local timestamp interpreted as UTC; the
/// file name does not record the original offset, so this is the closest
/// lower bound available for the resume filter.
pub fn resume_watermark(dir: &Path) -> Option<DateTime<Utc>> {
    let rd = fs::read_dir(dir).ok()?;
    let mut latest: Option<NaiveDateTime> = None;

    for ent in rd.flatten() {
        let name = ent.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(".json") {
            continue;
        }
        let Some(prefix) = name.get(..STAMP_LEN) else {
            continue;
        };
        let Ok(stamp) = NaiveDateTime::parse_from_str(prefix, STAMP_FORMAT) else {
            continue;
        };
        if latest.is_none_or(|cur| stamp > cur) {
            latest = Some(stamp);
        }
    }

    latest.map(|stamp| stamp.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn picks_the_greatest_timestamp() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("2024-01-02 0930 Cafe.json"), "{}").unwrap();
        fs::write(td.path().join("2024-03-15 1815 Bar.json"), "{}").unwrap();
        fs::write(td.path().join("2023-12-31 2359 Pub.json"), "{}").unwrap();

        let wm = resume_watermark(td.path()).unwrap();
        assert_eq!(wm.format("%Y-%m-%d %H%M").to_string(), "2024-03-15 1815");
    }

    #[test]
    fn ignores_names_without_a_timestamp_prefix() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("README.md"), "").unwrap();
        fs::write(td.path().join("notes.json"), "{}").unwrap();
        fs::write(td.path().join("2024-13-99 9999 Bogus.json"), "{}").unwrap();
        fs::write(td.path().join("2024-01-02 0930 Cafe.json"), "{}").unwrap();

        let wm = resume_watermark(td.path()).unwrap();
        assert_eq!(wm.format("%Y-%m-%d %H%M").to_string(), "2024-01-02 0930");
    }

    #[test]
    fn handles_empty_venue_names() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("2024-01-02 0930 .json"), "{}").unwrap();

        assert!(resume_watermark(td.path()).is_some());
    }

    #[test]
    fn none_when_no_file_matches() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("unrelated.txt"), "").unwrap();

        assert!(resume_watermark(td.path()).is_none());
    }

    #[test]
    fn none_when_directory_is_missing() {
        let td = tempdir().unwrap();
        assert!(resume_watermark(&td.path().join("no_such_dir")).is_none());
    }
}
