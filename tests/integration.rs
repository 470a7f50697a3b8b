use futures::future::BoxFuture;
use serde_json::json;
use sheetquiz_backend::routes::build_router;
use sheetquiz_backend::state::AppState;
use sheetquiz_backend::store::{InMemorySheetStore, SheetStore, StoreError};
use std::sync::Arc;

fn question_row(id: &str, prompt: &str, correct: &str, level: &str) -> Vec<String> {
    vec![
        id.to_string(),
        prompt.to_string(),
        "opt a".to_string(),
        "opt b".to_string(),
        "opt c".to_string(),
        "opt d".to_string(),
        correct.to_string(),
        level.to_string(),
        "FALSE".to_string(),
        String::new(),
    ]
}

fn questions_sheet(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let header = vec![
        "Q_ID", "Question", "OptionA", "OptionB", "OptionC", "OptionD", "Correct", "Level",
        "isCode", "Code",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    let mut sheet = vec![header];
    sheet.extend(rows);
    sheet
}

async fn spawn_server(state: AppState) -> (String, reqwest::Client) {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), reqwest::Client::new())
}

async fn seeded_state(question_rows: Vec<Vec<String>>) -> (AppState, InMemorySheetStore) {
    let store = InMemorySheetStore::new();
    store.seed("questions_db", questions_sheet(question_rows)).await;
    (AppState::new(Arc::new(store.clone())), store)
}

#[tokio::test]
async fn list_questions_returns_seeded_rows() {
    let (state, _store) = seeded_state(vec![
        question_row("q1", "What is 2+2?", "B", "1"),
        question_row("q2", "Pick a prime", "C", "2"),
    ])
    .await;
    let (base, client) = spawn_server(state).await;

    let resp = client.get(format!("{}/api/questions", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    let questions = body.as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["id"], "q1");
    assert_eq!(questions[0]["question"], "What is 2+2?");
    assert_eq!(questions[0]["options"]["A"], "opt a");
    assert_eq!(questions[0]["correct"], "B");
    assert_eq!(questions[1]["level"], "2");
}

#[tokio::test]
async fn submit_without_username_is_rejected() {
    let (state, store) = seeded_state(vec![question_row("q1", "p", "A", "1")]).await;
    let (base, client) = spawn_server(state).await;

    let resp = client
        .post(format!("{}/api/submit", base))
        .json(&json!({"qId": "q1", "selectedAnswer": "A"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // nothing was written to the response sheet
    assert!(store.sheet("responses_db").await.is_empty());
}

#[tokio::test]
async fn submit_creates_row_and_running_total() {
    let (state, store) = seeded_state(vec![
        question_row("q1", "p1", "A", "2"),
        question_row("q2", "p2", "B", "1"),
    ])
    .await;
    let (base, client) = spawn_server(state).await;

    let resp = client
        .post(format!("{}/api/submit", base))
        .json(&json!({
            "username": "  alice  ",
            "qId": "q1",
            "selectedAnswer": "A",
            "isCorrect": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["message"], "Response submitted successfully!");

    let rows = store.sheet("responses_db").await;
    assert_eq!(rows.len(), 2);
    // username is trimmed before it lands in the table
    assert_eq!(rows[1][0], "alice");
    assert_eq!(rows[1][1], "6");

    // the running total is visible through the final-score endpoint
    let score = client
        .get(format!("{}/api/get-final-score/alice", base))
        .send()
        .await
        .unwrap();
    assert_eq!(score.status(), 200);
    let score = score.json::<serde_json::Value>().await.unwrap();
    assert_eq!(score["score"], 6);
}

#[tokio::test]
async fn completing_the_quiz_records_the_final_score() {
    let (state, _store) = seeded_state(vec![
        question_row("q1", "p1", "A", "1"),
        question_row("q2", "p2", "B", "3"),
    ])
    .await;
    let final_scores = Arc::clone(&state.final_scores);
    let (base, client) = spawn_server(state).await;

    for (q, answer) in [("q1", "A"), ("q2", "C")] {
        let resp = client
            .post(format!("{}/api/submit", base))
            .json(&json!({"username": "bob", "qId": q, "selectedAnswer": answer}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    // 4 for q1, -3 for the wrong tier-3 answer
    assert_eq!(final_scores.get("bob").await, Some(1));

    let resp = client
        .get(format!("{}/api/get-final-score/bob", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["username"], "bob");
    assert_eq!(body["score"], 1);
}

#[tokio::test]
async fn final_score_not_found_for_unknown_user() {
    let (state, _store) = seeded_state(vec![question_row("q1", "p", "A", "1")]).await;
    let (base, client) = spawn_server(state).await;

    let resp = client
        .get(format!("{}/api/get-final-score/ghost", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn final_score_submission_roundtrip() {
    let (state, _store) = seeded_state(vec![]).await;
    let (base, client) = spawn_server(state).await;

    let resp = client
        .post(format!("{}/api/submit-final-score", base))
        .json(&json!({"username": "carol", "score": 14}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["message"], "Final score saved!");
    assert_eq!(body["username"], "carol");
    assert_eq!(body["score"], 14);

    let resp = client
        .get(format!("{}/api/get-final-score/carol", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<serde_json::Value>().await.unwrap()["score"], 14);
}

#[tokio::test]
async fn final_score_submission_with_missing_score_is_rejected() {
    let (state, store) = seeded_state(vec![]).await;
    let (base, client) = spawn_server(state).await;

    let resp = client
        .post(format!("{}/api/submit-final-score", base))
        .json(&json!({"username": "dave"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // no store was touched
    assert!(store.sheet("responses_db").await.is_empty());
    let lookup = client
        .get(format!("{}/api/get-final-score/dave", base))
        .send()
        .await
        .unwrap();
    assert_eq!(lookup.status(), 404);
}

struct FailingStore;

impl SheetStore for FailingStore {
    fn read_range(&self, _range: &str) -> BoxFuture<'static, Result<Vec<Vec<String>>, StoreError>> {
        Box::pin(async { Err(StoreError::Read("backend unavailable".to_string())) })
    }

    fn write_rows(
        &self,
        _origin: &str,
        _rows: Vec<Vec<String>>,
    ) -> BoxFuture<'static, Result<(), StoreError>> {
        Box::pin(async { Err(StoreError::Write("backend unavailable".to_string())) })
    }
}

#[tokio::test]
async fn store_outage_surfaces_by_default() {
    let state = AppState::new(Arc::new(FailingStore));
    let (base, client) = spawn_server(state).await;

    let resp = client.get(format!("{}/api/questions", base)).send().await.unwrap();
    assert_eq!(resp.status(), 500);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["error"]["code"], "STORE_READ_ERROR");

    let resp = client
        .post(format!("{}/api/submit", base))
        .json(&json!({"username": "erin", "qId": "q1", "selectedAnswer": "A"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn store_outage_is_hidden_when_fail_open() {
    let mut state = AppState::new(Arc::new(FailingStore));
    state.fail_open = true;
    let (base, client) = spawn_server(state).await;

    let resp = client.get(format!("{}/api/questions", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<serde_json::Value>().await.unwrap(), json!([]));

    let resp = client
        .post(format!("{}/api/submit", base))
        .json(&json!({"username": "erin", "qId": "q1", "selectedAnswer": "A"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}
