use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MARK_CORRECT: &str = "✅";
pub const MARK_WRONG: &str = "❌";

pub const HEADER_USERNAME: &str = "USERNAME";
pub const HEADER_TOTAL_SCORE: &str = "TOTAL SCORE";

/// Index of the first per-question column in the response table.
/// Columns 0 and 1 are reserved for the username and the running total.
pub const FIRST_QUESTION_COL: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

/// One quiz question as loaded from the question sheet. `level` keeps the raw
/// cell text (`"Unknown"` when blank) and is only parsed to a tier at scoring
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    pub options: QuestionOptions,
    pub correct: String,
    pub level: String,
    #[serde(rename = "isCode")]
    pub is_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Question {
    /// Maps a sheet row to a question by fixed column positions:
    /// id, question, A, B, C, D, correct, level, isCode, code.
    pub fn from_row(row: &[String]) -> Self {
        let cell = |idx: usize| row.get(idx).cloned().unwrap_or_default();
        let level = cell(7);
        Self {
            id: cell(0),
            question: cell(1),
            options: QuestionOptions {
                a: cell(2),
                b: cell(3),
                c: cell(4),
                d: cell(5),
            },
            correct: cell(6),
            level: if level.is_empty() { "Unknown".to_string() } else { level },
            is_code: cell(8),
            code: row.get(9).filter(|c| !c.is_empty()).cloned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Points {
    pub positive: i64,
    pub negative: i64,
}

/// Fixed point table per difficulty tier. Tiers outside 1..=3 score nothing.
pub fn points_for_level(level: i64) -> Points {
    match level {
        1 => Points { positive: 4, negative: 0 },
        2 => Points { positive: 6, negative: 2 },
        3 => Points { positive: 10, negative: 3 },
        _ => Points { positive: 0, negative: 0 },
    }
}

/// Parses a raw level cell, defaulting to tier 1 when missing or non-numeric.
pub fn parse_level(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(1)
}

/// Recomputes a user's total from scratch over all question columns.
/// A `✅` earns the tier's positive points, a `❌` costs the negative points,
/// anything else (unanswered) counts zero. Idempotent by construction.
pub fn compute_total(row: &[String], headers: &[String], levels: &HashMap<String, i64>) -> i64 {
    let mut total = 0;
    for (idx, question_id) in headers.iter().enumerate().skip(FIRST_QUESTION_COL) {
        let level = levels.get(question_id).copied().unwrap_or(1);
        let points = points_for_level(level);
        match row.get(idx).map(String::as_str) {
            Some(MARK_CORRECT) => total += points.positive,
            Some(MARK_WRONG) => total -= points.negative,
            _ => {}
        }
    }
    total
}

/// The response table: row 0 holds the headers (username column, total score
/// column, then one column per question id seen so far), every other row is
/// one user's marks. Rows are kept padded to the header width.
#[derive(Debug, Clone)]
pub struct ResponseTable {
    rows: Vec<Vec<String>>,
}

impl ResponseTable {
    /// Builds a table from raw sheet rows, substituting the default header
    /// row when the sheet is empty. Rows shorter than the header are padded
    /// back to header width: the backing store omits trailing empty cells on
    /// read, so a padded row round-trips truncated.
    pub fn from_rows(mut rows: Vec<Vec<String>>) -> Self {
        if rows.is_empty() {
            rows.push(vec![
                HEADER_USERNAME.to_string(),
                HEADER_TOTAL_SCORE.to_string(),
            ]);
        }
        let width = rows[0].len();
        for row in rows.iter_mut() {
            if row.len() < width {
                row.resize(width, String::new());
            }
        }
        Self { rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.rows[0]
    }

    pub fn row(&self, idx: usize) -> &[String] {
        &self.rows[idx]
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    /// Number of question columns recorded so far.
    pub fn question_count(&self) -> usize {
        self.rows[0].len().saturating_sub(FIRST_QUESTION_COL)
    }

    pub fn user_row_index(&self, username: &str) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, row)| row.first().map(String::as_str) == Some(username))
            .map(|(idx, _)| idx)
    }

    /// Finds the user's row, appending a fresh `{username, "0"}` row when the
    /// user has not submitted before.
    pub fn ensure_user_row(&mut self, username: &str) -> usize {
        if let Some(idx) = self.user_row_index(username) {
            return idx;
        }
        let width = self.rows[0].len();
        let mut row = vec![username.to_string(), "0".to_string()];
        row.resize(width, String::new());
        self.rows.push(row);
        self.rows.len() - 1
    }

    pub fn question_col_index(&self, question_id: &str) -> Option<usize> {
        self.rows[0]
            .iter()
            .skip(FIRST_QUESTION_COL)
            .position(|h| h == question_id)
            .map(|pos| pos + FIRST_QUESTION_COL)
    }

    /// Finds the question's column, appending a new header entry when the
    /// question has not been answered by anyone yet. All rows are padded to
    /// the new header width so row/column alignment holds.
    pub fn ensure_question_col(&mut self, question_id: &str) -> usize {
        if let Some(idx) = self.question_col_index(question_id) {
            return idx;
        }
        self.rows[0].push(question_id.to_string());
        let width = self.rows[0].len();
        for row in self.rows.iter_mut() {
            row.resize(width, String::new());
        }
        width - 1
    }

    pub fn set_mark(&mut self, row_idx: usize, col_idx: usize, correct: bool) {
        self.rows[row_idx][col_idx] = if correct {
            MARK_CORRECT.to_string()
        } else {
            MARK_WRONG.to_string()
        };
    }

    pub fn set_total(&mut self, row_idx: usize, total: i64) {
        self.rows[row_idx][1] = total.to_string();
    }
}
