//! SQLite-based question store implementation.
//!
//! Nearest-neighbour search loads embeddings and scores them in Rust. The
//! question bank is small (tens of thousands of rows at most) so a full scan
//! stays cheap.

use super::{cosine_similarity, CategoryCount, QuestionFilter, QuestionStore, SourceCount};
use crate::error::{QuizbankError, Result};
use crate::question::{NewQuestion, Question};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS questions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        question TEXT UNIQUE,
        correct_answer TEXT,
        incorrect_answers TEXT,
        category TEXT,
        difficulty TEXT,
        type TEXT,
        source TEXT,
        created_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_questions_category ON questions(category);
    CREATE INDEX IF NOT EXISTS idx_questions_source ON questions(source);

    CREATE TABLE IF NOT EXISTS question_embeddings (
        question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
        model TEXT NOT NULL,
        embedding BLOB NOT NULL,
        PRIMARY KEY (question_id, model)
    );
"#;

const QUESTION_COLUMNS: &str = "q.id, q.question, q.correct_answer, q.incorrect_answers, \
     q.category, q.difficulty, q.type, q.source, q.created_at";

/// SQLite-based question store.
pub struct SqliteQuestionStore {
    conn: Mutex<Connection>,
}

impl SqliteQuestionStore {
    /// Open (or create) a question database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, Some(path))
    }

    /// Create an in-memory question store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<&Path>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        register_fold(&conn)?;

        if let Some(path) = path {
            info!("Opened question store at {:?}", path);
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| QuizbankError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn insert_with(conn: &Connection, q: &NewQuestion) -> Result<bool> {
        let incorrect = serde_json::to_string(&q.incorrect_answers)?;
        let source = if q.source.is_empty() { "unknown" } else { q.source.as_str() };

        let changed = conn.execute(
            r#"
            INSERT OR IGNORE INTO questions
            (question, correct_answer, incorrect_answers, category, difficulty, type, source, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                q.question,
                q.correct_answer,
                incorrect,
                q.category,
                q.difficulty,
                q.kind,
                source,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(changed == 1)
    }

    fn row_to_question(row: &Row<'_>) -> rusqlite::Result<Question> {
        let incorrect_json: Option<String> = row.get(3)?;
        let created_at: Option<String> = row.get(8)?;

        Ok(Question {
            id: row.get(0)?,
            question: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            correct_answer: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            incorrect_answers: incorrect_json
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            category: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            difficulty: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            kind: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            source: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            created_at: created_at.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }),
        })
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

/// Register `fold(text)`, Unicode lowercasing for case-insensitive matching.
/// SQLite's own `LIKE` only folds ASCII letters.
fn register_fold(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

/// Escape LIKE wildcards so the needle matches literally.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl QuestionStore for SqliteQuestionStore {
    #[instrument(skip(self, question))]
    async fn insert(&self, question: &NewQuestion) -> Result<bool> {
        let conn = self.conn()?;
        let inserted = Self::insert_with(&conn, question)?;
        if !inserted {
            debug!("Skipped duplicate question: {}", question.question);
        }
        Ok(inserted)
    }

    #[instrument(skip(self, questions), fields(count = questions.len()))]
    async fn insert_batch(&self, questions: &[NewQuestion]) -> Result<usize> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut inserted = 0;
        for q in questions {
            if Self::insert_with(&tx, q)? {
                inserted += 1;
            }
        }

        tx.commit()?;
        debug!("Batch inserted {} of {} questions", inserted, questions.len());
        Ok(inserted)
    }

    async fn exists(&self, text: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM questions WHERE question = ?1",
            params![text],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn get(&self, id: i64) -> Result<Option<Question>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM questions q WHERE q.id = ?1", QUESTION_COLUMNS);

        match conn.query_row(&sql, params![id], Self::row_to_question) {
            Ok(q) => Ok(Some(q)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn filter(&self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        let needle = filter.text.trim();
        if !needle.is_empty() {
            values.push(like_pattern(&needle.to_lowercase()));
            clauses.push(format!("fold(q.question) LIKE ?{} ESCAPE '\\'", values.len()));
        }
        for (column, value) in [
            ("q.category", &filter.category),
            ("q.difficulty", &filter.difficulty),
            ("q.source", &filter.source),
        ] {
            if let Some(v) = value {
                values.push(v.clone());
                clauses.push(format!("{} = ?{}", column, values.len()));
            }
        }

        let mut sql = format!("SELECT {} FROM questions q", QUESTION_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY q.id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_question)?;
        let questions = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Filter matched {} questions", questions.len());
        Ok(questions)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn count_by_source(&self) -> Result<Vec<SourceCount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT COALESCE(source, ''), COUNT(*) FROM questions GROUP BY source ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SourceCount {
                source: row.get(0)?,
                count: row.get::<_, i64>(1)? as usize,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn categories(&self) -> Result<Vec<CategoryCount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT COALESCE(category, ''), COUNT(*) FROM questions GROUP BY category ORDER BY category",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CategoryCount {
                category: row.get(0)?,
                count: row.get::<_, i64>(1)? as usize,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    #[instrument(skip(self, embeddings), fields(count = embeddings.len()))]
    async fn store_embeddings(&self, model: &str, embeddings: &[(i64, Vec<f32>)]) -> Result<usize> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        for (id, embedding) in embeddings {
            tx.execute(
                "INSERT OR REPLACE INTO question_embeddings (question_id, model, embedding) VALUES (?1, ?2, ?3)",
                params![id, model, Self::embedding_to_bytes(embedding)],
            )?;
        }

        tx.commit()?;
        debug!("Stored {} embeddings for {}", embeddings.len(), model);
        Ok(embeddings.len())
    }

    async fn missing_embeddings(&self, model: &str, limit: usize) -> Result<Vec<Question>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM questions q
            LEFT JOIN question_embeddings e ON e.question_id = q.id AND e.model = ?1
            WHERE e.question_id IS NULL
            ORDER BY q.id
            LIMIT ?2
            "#,
            QUESTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![model, limit as i64], Self::row_to_question)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn embedding_count(&self, model: &str) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM question_embeddings WHERE model = ?1",
            params![model],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    #[instrument(skip(self, query))]
    async fn nearest(&self, model: &str, query: &[f32], limit: usize) -> Result<Vec<(Question, f32)>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {}, e.embedding FROM questions q
            JOIN question_embeddings e ON e.question_id = q.id
            WHERE e.model = ?1
            "#,
            QUESTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![model], |row| {
            let question = Self::row_to_question(row)?;
            let bytes: Vec<u8> = row.get(9)?;
            Ok((question, Self::bytes_to_embedding(&bytes)))
        })?;

        let mut scored: Vec<(Question, f32)> = rows
            .filter_map(|r| r.ok())
            .map(|(question, embedding)| {
                let score = cosine_similarity(query, &embedding);
                (question, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        debug!("Found {} nearest questions", scored.len());
        Ok(scored)
    }
}
