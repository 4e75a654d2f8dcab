//! Search UI server.
//!
//! Serves a single HTML page plus a small JSON API over the question bank.

use crate::error::QuizbankError;
use crate::search::{SearchEngine, SearchHit, SearchRequest};
use crate::store::{CategoryCount, QuestionStore, SourceCount};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

const INDEX_HTML: &str = include_str!("index.html");

/// Shared application state.
pub struct AppState {
    engine: SearchEngine,
    store: Arc<dyn QuestionStore>,
    embedding_model: String,
}

impl AppState {
    pub fn new(engine: SearchEngine, embedding_model: impl Into<String>) -> Self {
        let store = engine.store();
        Self {
            engine,
            store,
            embedding_model: embedding_model.into(),
        }
    }
}

/// Build the router with CORS open to any origin.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/search", post(search))
        .route("/api/categories", get(categories))
        .route("/api/stats", get(stats))
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: Arc<AppState>) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Search UI listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// === Response Types ===

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Serialize)]
struct SearchResult {
    id: i64,
    question: String,
    correct_answer: String,
    incorrect_answers: Vec<String>,
    category: String,
    difficulty: String,
    source: String,
    score: Option<f32>,
}

impl From<SearchHit> for SearchResult {
    fn from(hit: SearchHit) -> Self {
        let q = hit.question;
        Self {
            id: q.id,
            question: q.question,
            correct_answer: q.correct_answer,
            incorrect_answers: q.incorrect_answers,
            category: q.category,
            difficulty: q.difficulty,
            source: q.source,
            score: hit.score,
        }
    }
}

#[derive(Serialize)]
struct CategoriesResponse {
    categories: Vec<CategoryCount>,
}

#[derive(Serialize)]
struct StatsResponse {
    total: usize,
    sources: Vec<SourceCount>,
    categories: usize,
    embedded: usize,
    embedding_model: String,
    semantic: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Bad input maps to 400, everything else to 500.
struct ApiError(QuizbankError);

impl From<QuizbankError> for ApiError {
    fn from(e: QuizbankError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            QuizbankError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => {
                error!("Request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let hits = state.engine.search(&req).await?;
    Ok(Json(SearchResponse {
        results: hits.into_iter().map(SearchResult::from).collect(),
    }))
}

async fn categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    Ok(Json(CategoriesResponse {
        categories: state.store.categories().await?,
    }))
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let store = &state.store;
    Ok(Json(StatsResponse {
        total: store.count().await?,
        sources: store.count_by_source().await?,
        categories: store.categories().await?.len(),
        embedded: store.embedding_count(&state.embedding_model).await?,
        embedding_model: state.embedding_model.clone(),
        semantic: state.engine.has_reranker(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RerankerSettings, SearchSettings};
    use crate::inference::Reranker;
    use crate::question::NewQuestion;
    use crate::store::SqliteQuestionStore;
    use crate::test_support::spawn_router;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct LengthReranker;

    #[async_trait]
    impl Reranker for LengthReranker {
        async fn score(&self, _query: &str, documents: &[String]) -> crate::Result<Vec<f32>> {
            Ok(documents.iter().map(|d| d.len() as f32 / 10.0).collect())
        }

        fn model(&self) -> &str {
            "length"
        }
    }

    async fn spawn_app(semantic: bool) -> String {
        let store = Arc::new(SqliteQuestionStore::in_memory().unwrap());
        for (text, category, source) in [
            ("What is the capital of France?", "Geography", "OpenTDB"),
            ("Which planet is known as the Red Planet?", "Science", "OpenTDB"),
            ("What is the capital of Japan?", "Geography", "TheTriviaAPI"),
        ] {
            store
                .insert(&NewQuestion {
                    question: text.to_string(),
                    correct_answer: "x".to_string(),
                    incorrect_answers: vec!["y".to_string(), "z".to_string()],
                    category: category.to_string(),
                    difficulty: "easy".to_string(),
                    kind: "multiple".to_string(),
                    source: source.to_string(),
                })
                .await
                .unwrap();
        }

        let mut engine = SearchEngine::new(store, SearchSettings::default());
        if semantic {
            engine = engine.with_reranker(Arc::new(LengthReranker), &RerankerSettings::default());
        }
        let state = Arc::new(AppState::new(engine, "BAAI/bge-m3"));
        spawn_router(router(state)).await
    }

    async fn post_search(base: &str, body: Value) -> (StatusCode, Value) {
        let res = reqwest::Client::new()
            .post(format!("{}/api/search", base))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(res.status().as_u16()).unwrap();
        (status, res.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_index_and_health() {
        let base = spawn_app(false).await;

        let page = reqwest::get(format!("{}/", base)).await.unwrap().text().await.unwrap();
        assert!(page.contains("<title>Quizbank</title>"));

        let health: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
    }

    #[tokio::test]
    async fn test_substring_search_endpoint() {
        let base = spawn_app(false).await;

        let (status, body) = post_search(&base, json!({ "query": "capital" })).await;
        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0]["score"].is_null());
        assert_eq!(results[0]["incorrect_answers"], json!(["y", "z"]));

        let (_, body) = post_search(
            &base,
            json!({ "query": "capital", "source": "TheTriviaAPI" }),
        )
        .await;
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_semantic_search_endpoint() {
        let base = spawn_app(true).await;

        let (status, body) =
            post_search(&base, json!({ "query": "space", "mode": "semantic", "limit": 2 })).await;
        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["question"], "Which planet is known as the Red Planet?");
        assert!(results[0]["score"].as_f64().unwrap() > results[1]["score"].as_f64().unwrap());
    }

    #[tokio::test]
    async fn test_semantic_without_reranker_is_bad_request() {
        let base = spawn_app(false).await;

        let (status, body) =
            post_search(&base, json!({ "query": "space", "mode": "semantic" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("reranker"));
    }

    #[tokio::test]
    async fn test_categories_and_stats() {
        let base = spawn_app(false).await;

        let cats: Value = reqwest::get(format!("{}/api/categories", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let geography = cats["categories"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["category"] == "Geography")
            .unwrap();
        assert_eq!(geography["count"], 2);

        let stats: Value = reqwest::get(format!("{}/api/stats", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["total"], 3);
        assert_eq!(stats["categories"], 2);
        assert_eq!(stats["embedded"], 0);
        assert_eq!(stats["semantic"], false);
    }
}
