use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::checkin::Checkin;
use crate::credentials::Credentials;
use crate::watermark::resume_watermark;

/// Fixed page size for the paginated check-in endpoint.
pub const PAGE_SIZE: usize = 50;

/// API version date pinned by the original client.
const API_VERSION: &str = "20231221";

/// Safety ceiling on the pagination loop. Termination normally relies on the
/// API returning an empty page; a buggy upstream that always fills pages
/// would otherwise loop forever.
const MAX_PAGES: usize = 1000;

const DEFAULT_BASE_URL: &str = "https://api.foursquare.com";

/// Client for the paginated check-in API.
pub struct Api {
    client: Client,
    base_url: String,
    creds: Credentials,
}

impl Api {
    /// Build a client against the production API.
    pub fn new(creds: Credentials) -> Result<Self> {
        Self::with_base_url(creds, DEFAULT_BASE_URL)
    }

    /// Build a client against a custom base URL (used by tests).
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn with_base_url(creds: Credentials, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("swarm-backup")
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            creds,
        })
    }

    /// Fetch one page of check-ins at the given offset.
    ///
    /// Any failure (network, HTTP status, decode, missing fields) is logged
    /// to stderr and reported as an empty page, which ends pagination exactly
    /// like reaching the last page. The caller cannot distinguish "no more
    /// records" from "unreadable response"; changing that would change resume
    /// behavior.
    pub fn fetch_page(&self, offset: usize, after: Option<DateTime<Utc>>) -> Vec<Checkin> {
        match self.try_fetch_page(offset, after) {
            Ok(page) => page,
            Err(e) => {
                eprintln!("Error fetching checkins at offset {}: {:#}", offset, e);
                Vec::new()
            }
        }
    }

    fn try_fetch_page(&self, offset: usize, after: Option<DateTime<Utc>>) -> Result<Vec<Checkin>> {
        let url = format!("{}/v2/users/{}/checkins", self.base_url, self.creds.user_id);

        let mut params: Vec<(&str, String)> = vec![
            ("locale", "en".into()),
            ("explicit-lang", "false".into()),
            ("v", API_VERSION.into()),
            ("offset", offset.to_string()),
            ("limit", PAGE_SIZE.to_string()),
            ("m", "swarm".into()),
            ("clusters", "false".into()),
            ("wsid", self.creds.wsid.clone()),
            ("oauth_token", self.creds.oauth_token.clone()),
        ];
        if let Some(after) = after {
            params.push(("afterTimestamp", after.timestamp().to_string()));
        }

        let body: Value = self
            .client
            .get(&url)
            .query(&params)
            .send()?
            .error_for_status()?
            .json()?;

        let items = body
            .pointer("/response/checkins/items")
            .and_then(Value::as_array)
            .context("response is missing response.checkins.items")?;

        items.iter().cloned().map(Checkin::from_value).collect()
    }

    /// Fetch every check-in not yet present in `out_dir` and write each one
    /// as its own file.
    ///
    /// Resumes from the latest timestamp found in existing file names, then
    /// pages sequentially from offset 0 until the API returns an empty page.
    ///
    /// # Errors
    /// Returns an error if a record cannot be written to disk. Fetch errors
    /// are soft (see [`Api::fetch_page`]) and end the loop instead.
    pub fn run(&self, out_dir: &Path) -> Result<usize> {
        let after = resume_watermark(out_dir);
        if let Some(wm) = after {
            println!("Resuming from {}", wm.format("%Y-%m-%d %H%M"));
        }

        let mut offset = 0;
        let mut written = 0;
        for page_no in 0.. {
            if page_no >= MAX_PAGES {
                eprintln!(
                    "Stopping after {} pages; the API never returned an empty page",
                    MAX_PAGES
                );
                break;
            }
            let page = self.fetch_page(offset, after);
            if page.is_empty() {
                break;
            }
            for checkin in &page {
                let path = checkin.write_to(out_dir)?;
                println!("Saved {}", path.display());
            }
            offset += page.len();
            written += page.len();
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn creds() -> Credentials {
        Credentials {
            wsid: "ws".into(),
            oauth_token: "tok".into(),
            user_id: "u123".into(),
        }
    }

    fn item(created_at: i64, venue: &str) -> Value {
        json!({
            "createdAt": created_at,
            "timeZoneOffset": 0,
            "venue": { "name": venue },
            "id": format!("c{created_at}")
        })
    }

    fn page_body(items: Vec<Value>) -> Value {
        json!({ "response": { "checkins": { "items": items } } })
    }

    #[test]
    fn run_visits_pages_until_empty_and_writes_files() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/v2/users/u123/checkins")
                .query_param("offset", "0")
                .query_param("limit", "50")
                .query_param("oauth_token", "tok");
            then.status(200).json_body(page_body(vec![
                item(1704187800, "Cafe"),
                item(1704191400, "Bar"),
            ]));
        });
        let rest = server.mock(|when, then| {
            when.method(GET)
                .path("/v2/users/u123/checkins")
                .query_param("offset", "2");
            then.status(200).json_body(page_body(vec![]));
        });

        let td = tempdir().unwrap();
        let api = Api::with_base_url(creds(), server.base_url()).unwrap();
        let written = api.run(td.path()).unwrap();

        assert_eq!(written, 2);
        first.assert();
        rest.assert();
        assert!(td.path().join("2024-01-02 0930 Cafe.json").is_file());
        assert!(td.path().join("2024-01-02 1030 Bar.json").is_file());
    }

    #[test]
    fn run_sends_watermark_from_existing_files() {
        let server = MockServer::start();
        // "2024-01-02 0930" interpreted as UTC.
        let filtered = server.mock(|when, then| {
            when.method(GET)
                .path("/v2/users/u123/checkins")
                .query_param("offset", "0")
                .query_param("afterTimestamp", "1704187800");
            then.status(200)
                .json_body(page_body(vec![item(1704191400, "Bar")]));
        });
        let rest = server.mock(|when, then| {
            when.method(GET)
                .path("/v2/users/u123/checkins")
                .query_param("offset", "1");
            then.status(200).json_body(page_body(vec![]));
        });

        let td = tempdir().unwrap();
        std::fs::write(td.path().join("2024-01-02 0930 Cafe.json"), "{}").unwrap();

        let api = Api::with_base_url(creds(), server.base_url()).unwrap();
        let written = api.run(td.path()).unwrap();

        assert_eq!(written, 1);
        filtered.assert();
        rest.assert();
        assert_eq!(std::fs::read_dir(td.path()).unwrap().count(), 2);
    }

    #[test]
    fn rerun_against_unchanged_remote_adds_no_files() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v2/users/u123/checkins");
            then.status(200).json_body(page_body(vec![]));
        });

        let td = tempdir().unwrap();
        std::fs::write(td.path().join("2024-01-02 0930 Cafe.json"), "{}").unwrap();

        let api = Api::with_base_url(creds(), server.base_url()).unwrap();
        let written = api.run(td.path()).unwrap();

        assert_eq!(written, 0);
        assert_eq!(std::fs::read_dir(td.path()).unwrap().count(), 1);
    }

    #[test]
    fn malformed_response_ends_pagination_like_an_empty_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v2/users/u123/checkins");
            then.status(200).json_body(json!({ "unexpected": true }));
        });

        let td = tempdir().unwrap();
        let api = Api::with_base_url(creds(), server.base_url()).unwrap();
        let written = api.run(td.path()).unwrap();

        assert_eq!(written, 0);
        assert_eq!(std::fs::read_dir(td.path()).unwrap().count(), 0);
    }

    #[test]
    fn http_error_is_a_soft_empty_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v2/users/u123/checkins");
            then.status(500);
        });

        let td = tempdir().unwrap();
        let api = Api::with_base_url(creds(), server.base_url()).unwrap();
        assert_eq!(api.run(td.path()).unwrap(), 0);
    }
}
