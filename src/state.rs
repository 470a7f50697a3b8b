use crate::models::{parse_level, Question, ResponseTable};
use crate::store::{SheetStore, StoreError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct FinalScore {
    pub username: String,
    pub score: i64,
}

/// Process-scoped map of username to last recorded final score. Initialized
/// empty at startup and lost on restart; there is no persistence behind it.
#[derive(Default)]
pub struct FinalScoreStore {
    scores: RwLock<HashMap<String, i64>>,
}

impl FinalScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, username: &str, score: i64) {
        self.scores.write().await.insert(username.to_string(), score);
    }

    pub async fn get(&self, username: &str) -> Option<i64> {
        self.scores.read().await.get(username).copied()
    }
}

/// Spreadsheet ranges for the two backing tables. Defaults match the original
/// sheet layout; overridable per deployment.
#[derive(Debug, Clone)]
pub struct SheetRanges {
    pub questions: String,
    pub responses: String,
    pub responses_origin: String,
}

impl SheetRanges {
    pub fn from_env() -> Self {
        Self {
            questions: std::env::var("QUIZ_QUESTIONS_RANGE")
                .unwrap_or_else(|_| "questions_db!A:J".to_string()),
            responses: std::env::var("QUIZ_RESPONSES_RANGE")
                .unwrap_or_else(|_| "responses_db!A:Z".to_string()),
            responses_origin: std::env::var("QUIZ_RESPONSES_ORIGIN")
                .unwrap_or_else(|_| "responses_db!A1".to_string()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SheetStore>,
    pub final_scores: Arc<FinalScoreStore>,
    pub ranges: Arc<SheetRanges>,
    /// When set, store failures on read/submit paths are logged and hidden
    /// from the client (the original always-respond behavior). Off by
    /// default so failures surface as 500s.
    pub fail_open: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn SheetStore>) -> Self {
        let fail_open = std::env::var("QUIZ_FAIL_OPEN")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            store,
            final_scores: Arc::new(FinalScoreStore::new()),
            ranges: Arc::new(SheetRanges::from_env()),
            fail_open,
        }
    }

    /// Reads the whole question sheet and maps every row after the header to
    /// a `Question`. No numeric validation happens here; levels stay raw.
    pub async fn load_questions(&self) -> Result<Vec<Question>, StoreError> {
        let rows = self.store.read_range(&self.ranges.questions).await?;
        Ok(rows
            .iter()
            .skip(1)
            .map(|row| Question::from_row(row))
            .collect())
    }

    /// Builds the question-id to difficulty-tier map from the question sheet
    /// rows. Rows with a blank id are skipped; non-numeric level cells
    /// (including the blank-cell placeholder) parse to tier 1.
    pub fn level_map(questions: &[Question]) -> HashMap<String, i64> {
        questions
            .iter()
            .filter(|q| !q.id.is_empty())
            .map(|q| (q.id.clone(), parse_level(&q.level)))
            .collect()
    }

    pub async fn load_responses(&self) -> Result<ResponseTable, StoreError> {
        let rows = self.store.read_range(&self.ranges.responses).await?;
        Ok(ResponseTable::from_rows(rows))
    }

    pub async fn write_responses(&self, table: ResponseTable) -> Result<(), StoreError> {
        self.store
            .write_rows(&self.ranges.responses_origin, table.into_rows())
            .await
    }

    /// Resolves a user's final score: the in-memory store first, then the
    /// persisted response table (column 1 of the user's row). Scores recorded
    /// before a restart survive only in the table.
    pub async fn final_score(&self, username: &str) -> Result<Option<FinalScore>, StoreError> {
        if let Some(score) = self.final_scores.get(username).await {
            return Ok(Some(FinalScore { username: username.to_string(), score }));
        }
        let table = self.load_responses().await?;
        let Some(row_idx) = table.user_row_index(username) else {
            return Ok(None);
        };
        let score = table
            .row(row_idx)
            .get(1)
            .and_then(|cell| cell.trim().parse().ok())
            .unwrap_or(0);
        Ok(Some(FinalScore { username: username.to_string(), score }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, level: &str) -> Question {
        let row: Vec<String> = vec![
            id.to_string(),
            "prompt".to_string(),
            "1".to_string(),
            "2".to_string(),
            "3".to_string(),
            "4".to_string(),
            "A".to_string(),
            level.to_string(),
        ];
        Question::from_row(&row)
    }

    #[test]
    fn level_map_skips_blank_ids_and_defaults_levels() {
        let questions = vec![question("q1", "2"), question("", "3"), question("q3", "")];
        let map = AppState::level_map(&questions);
        assert_eq!(map.get("q1"), Some(&2));
        assert_eq!(map.get("q3"), Some(&1));
        assert_eq!(map.len(), 2);
    }

    #[tokio::test]
    async fn final_score_store_overwrites() {
        let store = FinalScoreStore::new();
        store.record("alice", 10).await;
        store.record("alice", 14).await;
        assert_eq!(store.get("alice").await, Some(14));
        assert_eq!(store.get("bob").await, None);
    }
}
