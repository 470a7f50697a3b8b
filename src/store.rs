use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sheet read failed: {0}")]
    Read(String),
    #[error("sheet write failed: {0}")]
    Write(String),
}

/// Access to the tabular backing store. Ranges use the spreadsheet notation
/// `sheet_name!A:Z`. Reads always re-fetch; there is no caching layer.
pub trait SheetStore: Send + Sync {
    fn read_range(&self, range: &str) -> BoxFuture<'static, Result<Vec<Vec<String>>, StoreError>>;

    /// Bulk write starting at the given origin cell, replacing whatever the
    /// rows cover. Last write wins; there is no compare-and-swap on the
    /// backing store, so concurrent read-modify-write cycles can race.
    fn write_rows(
        &self,
        origin: &str,
        rows: Vec<Vec<String>>,
    ) -> BoxFuture<'static, Result<(), StoreError>>;
}

/// Client for the Google Sheets v4 values API.
#[derive(Clone)]
pub struct GoogleSheetsStore {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    token: String,
}

impl GoogleSheetsStore {
    /// Configured from `SPREADSHEET_ID` and `SHEETS_API_TOKEN`. Returns
    /// `None` when either is absent so the caller can fall back to the
    /// in-memory store.
    pub fn from_env() -> Option<Self> {
        let spreadsheet_id = std::env::var("SPREADSHEET_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())?;
        let token = std::env::var("SHEETS_API_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty())?;
        let base_url = std::env::var("SHEETS_BASE_URL")
            .unwrap_or_else(|_| "https://sheets.googleapis.com".to_string());
        Some(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id,
            token,
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, range
        )
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetStore for GoogleSheetsStore {
    fn read_range(&self, range: &str) -> BoxFuture<'static, Result<Vec<Vec<String>>, StoreError>> {
        let client = self.client.clone();
        let url = self.values_url(range);
        let token = self.token.clone();
        Box::pin(async move {
            let resp = client
                .get(&url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|err| StoreError::Read(err.to_string()))?;
            if !resp.status().is_success() {
                return Err(StoreError::Read(format!("sheets api returned {}", resp.status())));
            }
            let body: ValueRange = resp
                .json()
                .await
                .map_err(|err| StoreError::Read(err.to_string()))?;
            Ok(body.values)
        })
    }

    fn write_rows(
        &self,
        origin: &str,
        rows: Vec<Vec<String>>,
    ) -> BoxFuture<'static, Result<(), StoreError>> {
        let client = self.client.clone();
        let url = format!("{}?valueInputOption=USER_ENTERED", self.values_url(origin));
        let token = self.token.clone();
        Box::pin(async move {
            let resp = client
                .put(&url)
                .bearer_auth(&token)
                .json(&json!({ "values": rows }))
                .send()
                .await
                .map_err(|err| StoreError::Write(err.to_string()))?;
            if !resp.status().is_success() {
                return Err(StoreError::Write(format!("sheets api returned {}", resp.status())));
            }
            Ok(())
        })
    }
}

/// In-process store keyed by sheet name, used when no spreadsheet credentials
/// are configured and throughout the test suite.
#[derive(Clone, Default)]
pub struct InMemorySheetStore {
    sheets: Arc<RwLock<HashMap<String, Vec<Vec<String>>>>>,
}

impl InMemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, sheet: &str, rows: Vec<Vec<String>>) {
        self.sheets.write().await.insert(sheet.to_string(), rows);
    }

    pub async fn sheet(&self, sheet: &str) -> Vec<Vec<String>> {
        self.sheets.read().await.get(sheet).cloned().unwrap_or_default()
    }
}

fn sheet_name(range: &str) -> String {
    range.split('!').next().unwrap_or(range).to_string()
}

impl SheetStore for InMemorySheetStore {
    fn read_range(&self, range: &str) -> BoxFuture<'static, Result<Vec<Vec<String>>, StoreError>> {
        let sheets = Arc::clone(&self.sheets);
        let name = sheet_name(range);
        Box::pin(async move {
            Ok(sheets.read().await.get(&name).cloned().unwrap_or_default())
        })
    }

    fn write_rows(
        &self,
        origin: &str,
        rows: Vec<Vec<String>>,
    ) -> BoxFuture<'static, Result<(), StoreError>> {
        let sheets = Arc::clone(&self.sheets);
        let name = sheet_name(origin);
        Box::pin(async move {
            sheets.write().await.insert(name, rows);
            Ok(())
        })
    }
}
