//! Open Trivia Database (opentdb.com) source.

use super::{base_url, Category, PageOutcome, TriviaSource};
use crate::error::{QuizbankError, Result};
use crate::question::NewQuestion;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const SOURCE_NAME: &str = "OpenTDB";

/// `response_code` values returned by the question endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    NoResults,
    InvalidParameter,
    TokenNotFound,
    TokenEmpty,
    RateLimit,
    Unknown(i64),
}

impl ResponseCode {
    /// A missing code is treated as an invalid parameter.
    pub fn from_code(code: Option<i64>) -> Self {
        match code.unwrap_or(2) {
            0 => ResponseCode::Success,
            1 => ResponseCode::NoResults,
            2 => ResponseCode::InvalidParameter,
            3 => ResponseCode::TokenNotFound,
            4 => ResponseCode::TokenEmpty,
            5 => ResponseCode::RateLimit,
            other => ResponseCode::Unknown(other),
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseCode::Success => write!(f, "success"),
            ResponseCode::NoResults => write!(f, "no results"),
            ResponseCode::InvalidParameter => write!(f, "invalid parameter"),
            ResponseCode::TokenNotFound => write!(f, "token not found"),
            ResponseCode::TokenEmpty => write!(f, "token empty"),
            ResponseCode::RateLimit => write!(f, "rate limit"),
            ResponseCode::Unknown(code) => write!(f, "unknown response code {}", code),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
}

#[derive(Deserialize)]
struct CategoryListResponse {
    #[serde(default)]
    trivia_categories: Vec<CategoryEntry>,
}

#[derive(Deserialize)]
struct CategoryEntry {
    id: i64,
    name: String,
}

#[derive(Deserialize)]
struct QuestionResponse {
    response_code: Option<i64>,
    #[serde(default)]
    results: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
    question: String,
    correct_answer: String,
    #[serde(default)]
    incorrect_answers: Vec<String>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    difficulty: String,
    #[serde(rename = "type", default)]
    kind: String,
}

impl From<RawQuestion> for NewQuestion {
    fn from(q: RawQuestion) -> Self {
        NewQuestion {
            question: q.question,
            correct_answer: q.correct_answer,
            incorrect_answers: q.incorrect_answers,
            category: q.category,
            difficulty: q.difficulty,
            kind: q.kind,
            source: SOURCE_NAME.to_string(),
        }
        .unescaped()
    }
}

/// Open Trivia Database source.
///
/// A session token is requested once per run so the upstream never repeats a
/// question within the session; once the token is exhausted the upstream
/// answers with code 4 and the page size ladder runs down.
pub struct OpenTdbSource {
    client: reqwest::Client,
    base_url: Url,
    question_type: String,
    token: String,
}

impl OpenTdbSource {
    pub fn new(client: reqwest::Client, base: &str, question_type: &str) -> Result<Self> {
        Ok(Self {
            client,
            base_url: base_url(base)?,
            question_type: question_type.to_string(),
            token: String::new(),
        })
    }

    /// The session token in use (empty when none could be acquired).
    pub fn token(&self) -> &str {
        &self.token
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl TriviaSource for OpenTdbSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    #[instrument(skip(self))]
    async fn prepare(&mut self) -> Result<()> {
        let mut url = self.endpoint("api_token.php")?;
        url.query_pairs_mut().append_pair("command", "request");

        let res = self.client.get(url).send().await?;
        self.token = if res.status() == StatusCode::OK {
            res.json::<TokenResponse>().await?.token
        } else {
            warn!("Session token request failed with {}, continuing without token", res.status());
            String::new()
        };

        debug!("Using session token {:?}", self.token);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<Category>> {
        let res = self.client.get(self.endpoint("api_category.php")?).send().await?;
        if res.status() != StatusCode::OK {
            warn!("Category list request failed with {}", res.status());
            return Ok(Vec::new());
        }

        let body: CategoryListResponse = res.json().await?;
        info!("OpenTDB lists {} categories", body.trivia_categories.len());

        Ok(body
            .trivia_categories
            .into_iter()
            .map(|c| Category::new(c.id.to_string(), c.name))
            .collect())
    }

    #[instrument(skip(self), fields(category = %category.name))]
    async fn fetch_page(&self, category: &Category, amount: usize) -> Result<PageOutcome> {
        let mut url = self.endpoint("api.php")?;
        url.query_pairs_mut()
            .append_pair("amount", &amount.to_string())
            .append_pair("category", &category.id)
            .append_pair("type", &self.question_type)
            .append_pair("token", &self.token);

        let res = self.client.get(url).send().await?;
        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            return Ok(PageOutcome::RateLimited);
        }

        let body: QuestionResponse = res.json().await.map_err(|e| {
            QuizbankError::Source(format!("Malformed OpenTDB response: {}", e))
        })?;

        let code = ResponseCode::from_code(body.response_code);
        debug!("OpenTDB answered {} for amount={}", code, amount);

        Ok(match code {
            ResponseCode::Success => {
                PageOutcome::Questions(body.results.into_iter().map(NewQuestion::from).collect())
            }
            ResponseCode::NoResults | ResponseCode::TokenEmpty => PageOutcome::ShrinkPage,
            ResponseCode::RateLimit => PageOutcome::RateLimited,
            ResponseCode::InvalidParameter
            | ResponseCode::TokenNotFound
            | ResponseCode::Unknown(_) => PageOutcome::Abort(code.to_string()),
        })
    }

    fn request_budget(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_router;
    use axum::{extract::Query, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_response_code_dispatch_table() {
        assert_eq!(ResponseCode::from_code(Some(0)), ResponseCode::Success);
        assert_eq!(ResponseCode::from_code(Some(4)), ResponseCode::TokenEmpty);
        assert_eq!(ResponseCode::from_code(None), ResponseCode::InvalidParameter);
        assert_eq!(ResponseCode::from_code(Some(9)), ResponseCode::Unknown(9));
    }

    async fn questions(Query(params): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
        let code = match params.get("amount").map(String::as_str) {
            Some("50") => 1,
            Some("20") => 0,
            Some("10") => 5,
            Some("5") => 3,
            _ => 2,
        };
        let results = if code == 0 {
            json!([{
                "type": "multiple",
                "difficulty": "easy",
                "category": "Entertainment: Books",
                "question": "Who wrote &quot;Harry Potter&quot;?",
                "correct_answer": "J. K. Rowling",
                "incorrect_answers": ["J. R. R. Tolkien", "Terry Pratchett", "C. S. Lewis"]
            }])
        } else {
            json!([])
        };
        assert_eq!(params.get("token").map(String::as_str), Some("tok123"));
        Json(json!({ "response_code": code, "results": results }))
    }

    fn router() -> Router {
        Router::new()
            .route(
                "/api_token.php",
                get(|| async { Json(json!({"response_code": 0, "token": "tok123"})) }),
            )
            .route(
                "/api_category.php",
                get(|| async {
                    Json(json!({"trivia_categories": [{"id": 10, "name": "Entertainment: Books"}]}))
                }),
            )
            .route("/api.php", get(questions))
    }

    #[tokio::test]
    async fn test_fetch_page_maps_response_codes() {
        let base = spawn_router(router()).await;
        let mut source = OpenTdbSource::new(reqwest::Client::new(), &base, "multiple").unwrap();
        source.prepare().await.unwrap();
        assert_eq!(source.token(), "tok123");

        let categories = source.categories().await.unwrap();
        assert_eq!(categories, vec![Category::new("10", "Entertainment: Books")]);
        let cat = &categories[0];

        assert_eq!(source.fetch_page(cat, 50).await.unwrap(), PageOutcome::ShrinkPage);
        assert_eq!(source.fetch_page(cat, 10).await.unwrap(), PageOutcome::RateLimited);
        assert!(matches!(source.fetch_page(cat, 5).await.unwrap(), PageOutcome::Abort(_)));
        assert!(matches!(source.fetch_page(cat, 1).await.unwrap(), PageOutcome::Abort(_)));

        match source.fetch_page(cat, 20).await.unwrap() {
            PageOutcome::Questions(qs) => {
                assert_eq!(qs.len(), 1);
                assert_eq!(qs[0].question, "Who wrote \"Harry Potter\"?");
                assert_eq!(qs[0].source, "OpenTDB");
                assert_eq!(qs[0].incorrect_answers.len(), 3);
            }
            other => panic!("expected questions, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_endpoints_degrade() {
        let base = spawn_router(Router::new()).await;
        let mut source = OpenTdbSource::new(reqwest::Client::new(), &base, "multiple").unwrap();

        source.prepare().await.unwrap();
        assert_eq!(source.token(), "");
        assert!(source.categories().await.unwrap().is_empty());
    }
}
