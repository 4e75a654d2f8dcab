//! The Trivia API (the-trivia-api.com) source.

use super::{base_url, Category, PageOutcome, TriviaSource};
use crate::error::{QuizbankError, Result};
use crate::question::NewQuestion;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

pub const SOURCE_NAME: &str = "TheTriviaAPI";

/// v1 returns the question as a string, v2 as `{"text": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionText {
    Plain(String),
    Rich { text: String },
}

impl QuestionText {
    fn into_string(self) -> String {
        match self {
            QuestionText::Plain(s) => s,
            QuestionText::Rich { text } => text,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    question: QuestionText,
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
            question: q.question.into_string(),
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

/// The Trivia API source.
///
/// The upstream hands out random questions with no session, so each category
/// gets a fixed number of requests and duplicates are filtered on insert.
pub struct TheTriviaApiSource {
    client: reqwest::Client,
    base_url: Url,
    categories: Vec<String>,
    requests_per_category: usize,
}

impl TheTriviaApiSource {
    pub fn new(
        client: reqwest::Client,
        base: &str,
        categories: Vec<String>,
        requests_per_category: usize,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base_url: base_url(base)?,
            categories,
            requests_per_category,
        })
    }
}

#[async_trait]
impl TriviaSource for TheTriviaApiSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        Ok(self
            .categories
            .iter()
            .map(|slug| Category::new(slug.clone(), slug.clone()))
            .collect())
    }

    #[instrument(skip(self), fields(category = %category.id))]
    async fn fetch_page(&self, category: &Category, amount: usize) -> Result<PageOutcome> {
        let mut url = self.base_url.join("api/questions")?;
        url.query_pairs_mut()
            .append_pair("limit", &amount.to_string())
            .append_pair("categories", &category.id);

        let res = self.client.get(url).send().await?;
        match res.status() {
            StatusCode::TOO_MANY_REQUESTS => Ok(PageOutcome::RateLimited),
            StatusCode::OK => {
                let raw: Vec<RawQuestion> = res.json().await.map_err(|e| {
                    QuizbankError::Source(format!("Malformed Trivia API response: {}", e))
                })?;
                debug!("Trivia API returned {} questions", raw.len());
                Ok(PageOutcome::Questions(raw.into_iter().map(NewQuestion::from).collect()))
            }
            status => {
                warn!("Trivia API answered {} for {}", status, category.id);
                Ok(PageOutcome::Questions(Vec::new()))
            }
        }
    }

    fn request_budget(&self) -> Option<usize> {
        Some(self.requests_per_category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_router;
    use axum::{extract::Query, http::StatusCode as AxumStatus, response::IntoResponse, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn questions(Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
        match params.get("categories").map(String::as_str) {
            Some("history") => Json(json!([
                {
                    "category": "History",
                    "correctAnswer": "1066",
                    "incorrectAnswers": ["1055", "1077", "1088"],
                    "question": "When was the Battle of Hastings?",
                    "type": "Multiple Choice",
                    "difficulty": "medium"
                },
                {
                    "category": "History",
                    "correctAnswer": "Rome",
                    "incorrectAnswers": ["Athens"],
                    "question": {"text": "Where did Caesar die?"},
                    "type": "text_choice",
                    "difficulty": "easy"
                }
            ]))
            .into_response(),
            Some("music") => AxumStatus::TOO_MANY_REQUESTS.into_response(),
            _ => AxumStatus::BAD_GATEWAY.into_response(),
        }
    }

    fn source(base: &str) -> TheTriviaApiSource {
        TheTriviaApiSource::new(
            reqwest::Client::new(),
            base,
            vec!["history".to_string(), "music".to_string()],
            3,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page_statuses() {
        let base = spawn_router(Router::new().route("/api/questions", get(questions))).await;
        let source = source(&base);

        assert_eq!(source.request_budget(), Some(3));
        assert_eq!(source.categories().await.unwrap().len(), 2);

        match source.fetch_page(&Category::new("history", "history"), 50).await.unwrap() {
            PageOutcome::Questions(qs) => {
                assert_eq!(qs.len(), 2);
                assert_eq!(qs[0].correct_answer, "1066");
                assert_eq!(qs[1].question, "Where did Caesar die?");
                assert_eq!(qs[1].source, "TheTriviaAPI");
            }
            other => panic!("expected questions, got {:?}", other),
        }

        assert_eq!(
            source.fetch_page(&Category::new("music", "music"), 50).await.unwrap(),
            PageOutcome::RateLimited
        );
        assert_eq!(
            source.fetch_page(&Category::new("science", "science"), 50).await.unwrap(),
            PageOutcome::Questions(Vec::new())
        );
    }
}
