//! Google Sheets sink.
//!
//! Auth is a service-account JWT (RS256) exchanged for an OAuth bearer
//! token. The sink opens the spreadsheet by ID, gets-or-creates the
//! worksheet named after the tab, writes the fixed header row when the
//! sheet is empty, loads all existing rows once for the duplicate check,
//! and then appends one row per record with a flat pacing sleep between
//! appends to respect the API quota.
//!
//! The duplicate-check-before-append convention is not transactional;
//! concurrent runs could race and double-append.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::config::{ServiceAccount, SheetSchema};
use crate::error::{HarvestError, SetupError};
use crate::models::NewsRecord;

/// Flat sleep between successive row appends.
const APPEND_PACING_MS: u64 = 500;

/// OAuth scopes covering both Sheets and Drive (thumbnail hosting).
const OAUTH_SCOPE: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// 9-column worksheet header.
pub const STANDARD_HEADER: [&str; 9] = [
    "id",
    "title",
    "description",
    "category",
    "tags",
    "upload_date",
    "download_count",
    "thumbnail_url",
    "original_url",
];

/// 21-column Materials worksheet header (A-U).
pub const MATERIALS_HEADER: [&str; 21] = [
    "id",
    "title",
    "description",
    "category",
    "tags",
    "upload_date",
    "file_size",
    "file_format",
    "dimensions",
    "creator",
    "brand_alignment",
    "usage_rights",
    "version",
    "download_count",
    "rating",
    "thumbnail_url",
    "file_url",
    "original_url",
    "status",
    "featured",
    "created_at",
];

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchange a service-account credential for an OAuth bearer token.
///
/// # Errors
///
/// Returns [`SetupError`] when the private key is rejected or the token
/// endpoint refuses the assertion; both are fatal configuration problems.
#[instrument(level = "info", skip_all, fields(client_email = %sa.client_email))]
pub async fn access_token(client: &Client, sa: &ServiceAccount) -> Result<String, SetupError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        iss: &sa.client_email,
        scope: OAUTH_SCOPE,
        aud: &sa.token_uri,
        iat: now,
        exp: now + 3600,
    };

    let key = EncodingKey::from_rsa_pem(sa.private_key.as_bytes())?;
    let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?;

    let response = client
        .post(&sa.token_uri)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await
        .map_err(|e| SetupError::SheetBootstrap(format!("token exchange failed: {e}")))?;

    if !response.status().is_success() {
        return Err(SetupError::SheetBootstrap(format!(
            "token endpoint answered {}",
            response.status()
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| SetupError::SheetBootstrap(format!("token response unreadable: {e}")))?;
    info!("Obtained service-account access token");
    Ok(token.access_token)
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// Connected worksheet, ready for paced appends.
#[derive(Debug)]
pub struct SheetsSink {
    client: Client,
    token: String,
    spreadsheet_id: String,
    tab: String,
    schema: SheetSchema,
    existing_urls: HashSet<String>,
    existing_ids: HashSet<String>,
}

impl SheetsSink {
    /// Open the spreadsheet, get-or-create the worksheet, ensure the header
    /// row, and load existing rows for the duplicate check.
    #[instrument(level = "info", skip(client, token), fields(%spreadsheet_id, %tab))]
    pub async fn connect(
        client: Client,
        token: String,
        spreadsheet_id: &str,
        tab: &str,
        schema: SheetSchema,
    ) -> Result<Self, SetupError> {
        let mut sink = Self {
            client,
            token,
            spreadsheet_id: spreadsheet_id.to_string(),
            tab: tab.to_string(),
            schema,
            existing_urls: HashSet::new(),
            existing_ids: HashSet::new(),
        };

        if !sink.worksheet_exists().await? {
            info!(tab = %sink.tab, "Worksheet missing; creating");
            sink.create_worksheet().await?;
        }

        let rows = sink
            .read_all_rows()
            .await
            .map_err(|e| SetupError::SheetBootstrap(e.to_string()))?;
        if rows.is_empty() {
            sink.write_header().await?;
        } else {
            sink.index_existing(&rows);
        }

        info!(
            existing = sink.existing_urls.len(),
            "Sheets sink connected"
        );
        Ok(sink)
    }

    /// Append one record unless its URL or ID is already present.
    ///
    /// Returns `Ok(true)` when a row was written, `Ok(false)` on a skip.
    /// Sleeps [`APPEND_PACING_MS`] after each successful append.
    pub async fn append(&mut self, record: &NewsRecord) -> Result<bool, HarvestError> {
        if self.existing_urls.contains(&record.original_url)
            || self.existing_ids.contains(&record.id)
        {
            debug!(url = %record.original_url, "Duplicate row; skipping append");
            return Ok(false);
        }

        let row = build_row(record, self.schema);
        let url = format!(
            "{SHEETS_API}/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.spreadsheet_id,
            urlencoding::encode(&format!("{}!A1", self.tab)),
        );
        let body = serde_json::json!({ "values": [row] });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(HarvestError::SinkAppend(format!(
                "append answered {}",
                response.status()
            )));
        }

        self.existing_urls.insert(record.original_url.clone());
        self.existing_ids.insert(record.id.clone());

        sleep(Duration::from_millis(APPEND_PACING_MS)).await;
        Ok(true)
    }

    async fn worksheet_exists(&self) -> Result<bool, SetupError> {
        let url = format!(
            "{SHEETS_API}/{}?fields=sheets.properties.title",
            self.spreadsheet_id
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SetupError::SheetBootstrap(format!("spreadsheet open failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SetupError::SheetBootstrap(format!(
                "spreadsheet open answered {}",
                response.status()
            )));
        }
        let meta: SpreadsheetMeta = response
            .json()
            .await
            .map_err(|e| SetupError::SheetBootstrap(format!("spreadsheet meta unreadable: {e}")))?;
        Ok(meta.sheets.iter().any(|s| s.properties.title == self.tab))
    }

    async fn create_worksheet(&self) -> Result<(), SetupError> {
        let url = format!("{SHEETS_API}/{}:batchUpdate", self.spreadsheet_id);
        let body = serde_json::json!({
            "requests": [{ "addSheet": { "properties": { "title": self.tab } } }]
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SetupError::SheetBootstrap(format!("addSheet failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SetupError::SheetBootstrap(format!(
                "addSheet answered {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn write_header(&self) -> Result<(), SetupError> {
        let header: Vec<&str> = match self.schema {
            SheetSchema::Standard => STANDARD_HEADER.to_vec(),
            SheetSchema::Materials => MATERIALS_HEADER.to_vec(),
        };
        let url = format!(
            "{SHEETS_API}/{}/values/{}?valueInputOption=RAW",
            self.spreadsheet_id,
            urlencoding::encode(&format!("{}!A1", self.tab)),
        );
        let body = serde_json::json!({ "values": [header] });
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SetupError::SheetBootstrap(format!("header write failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SetupError::SheetBootstrap(format!(
                "header write answered {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>, HarvestError> {
        let url = format!(
            "{SHEETS_API}/{}/values/{}",
            self.spreadsheet_id,
            urlencoding::encode(&format!("{}!A1:U", self.tab)),
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(HarvestError::BadStatus {
                status: response.status().as_u16(),
                context: "sheet values read".to_string(),
            });
        }
        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| HarvestError::ParseFailed(e.to_string()))?;
        Ok(range.values)
    }

    /// Build the URL/ID duplicate sets from existing rows, using the header
    /// row to locate columns so either schema (or a hand-edited sheet)
    /// indexes correctly.
    fn index_existing(&mut self, rows: &[Vec<String>]) {
        let Some(header) = rows.first() else {
            return;
        };
        let url_col = header.iter().position(|h| h == "original_url");
        let id_col = header.iter().position(|h| h == "id");
        if url_col.is_none() {
            warn!(tab = %self.tab, "Existing sheet lacks original_url column; duplicate check weakened");
        }
        for row in &rows[1..] {
            if let Some(i) = url_col {
                if let Some(url) = row.get(i) {
                    if !url.is_empty() {
                        self.existing_urls.insert(url.clone());
                    }
                }
            }
            if let Some(i) = id_col {
                if let Some(id) = row.get(i) {
                    if !id.is_empty() {
                        self.existing_ids.insert(id.clone());
                    }
                }
            }
        }
    }
}

/// Serialize one record into a worksheet row for the given schema.
pub fn build_row(record: &NewsRecord, schema: SheetSchema) -> Vec<String> {
    let thumbnail = record.thumbnail.clone().unwrap_or_default();
    match schema {
        SheetSchema::Standard => vec![
            record.id.clone(),
            record.title.clone(),
            record.description.clone(),
            record.category.clone(),
            record.tags.clone(),
            record.date.clone(),
            record.download_count.to_string(),
            thumbnail,
            record.original_url.clone(),
        ],
        SheetSchema::Materials => {
            let created_at = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
            vec![
                record.id.clone(),
                record.title.clone(),
                record.description.clone(),
                record.category.clone(),
                record.tags.clone(),
                record.date.clone(),
                "N/A".to_string(),
                "news".to_string(),
                "N/A".to_string(),
                record.category.clone(),
                "high".to_string(),
                "read-only".to_string(),
                "1.0".to_string(),
                record.download_count.to_string(),
                "0".to_string(),
                thumbnail,
                record.original_url.clone(),
                record.original_url.clone(),
                "active".to_string(),
                "false".to_string(),
                created_at,
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> NewsRecord {
        NewsRecord {
            id: "news_abcdef123456".to_string(),
            title: "파이프트리 투자 유치".to_string(),
            description: "회사 소개".to_string(),
            category: "매일경제".to_string(),
            tags: "파이프트리".to_string(),
            date: "2026-08-24".to_string(),
            download_count: 0,
            thumbnail: Some("https://drive.google.com/uc?id=f1".to_string()),
            original_url: "http://x.com/a".to_string(),
            tab: "news_data".to_string(),
            published_at: Utc::now(),
        }
    }

    #[test]
    fn test_standard_row_matches_header_width() {
        let row = build_row(&record(), SheetSchema::Standard);
        assert_eq!(row.len(), STANDARD_HEADER.len());
        assert_eq!(row[0], "news_abcdef123456");
        assert_eq!(row[5], "2026-08-24");
        assert_eq!(row[8], "http://x.com/a");
    }

    #[test]
    fn test_materials_row_matches_header_width() {
        let row = build_row(&record(), SheetSchema::Materials);
        assert_eq!(row.len(), MATERIALS_HEADER.len());
        // creator mirrors the category, file_url mirrors original_url
        assert_eq!(row[9], "매일경제");
        assert_eq!(row[16], "http://x.com/a");
        assert_eq!(row[17], "http://x.com/a");
        assert_eq!(row[18], "active");
        assert_eq!(row[19], "false");
    }

    #[test]
    fn test_materials_row_without_thumbnail() {
        let mut r = record();
        r.thumbnail = None;
        let row = build_row(&r, SheetSchema::Materials);
        assert_eq!(row[15], "");
    }
}
