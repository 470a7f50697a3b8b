pub mod error;
pub mod handlers;
pub mod models;
pub mod recorder;
pub mod routes;
pub mod state;
pub mod store;

use std::sync::Arc;

/// Builds the application state, talking to the real spreadsheet when
/// credentials are configured and falling back to the in-process store
/// otherwise.
pub fn build_state() -> anyhow::Result<state::AppState> {
    let store: Arc<dyn store::SheetStore> =
        if let Some(sheets) = store::GoogleSheetsStore::from_env() {
            Arc::new(sheets)
        } else {
            tracing::warn!("no spreadsheet credentials configured, using in-memory sheet store");
            Arc::new(store::InMemorySheetStore::new())
        };
    Ok(state::AppState::new(store))
}
