use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use vocab_core::{Choice, Question, QuestionStore, StoreStats, VocabError, VocabResult};

use crate::schema::init_db;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(path: &Path) -> VocabResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VocabError::Database(format!("cannot create db directory: {e}")))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| VocabError::Database(format!("cannot open database: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| VocabError::Database(e.to_string()))?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> VocabResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VocabError::Database(format!("cannot open in-memory db: {e}")))?;
        init_db(&conn)?;
        Ok(Self { conn })
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn row_to_question(row: &rusqlite::Row) -> rusqlite::Result<Question> {
    let choices_json: String = row.get(8)?;
    let choices: Vec<Choice> = serde_json::from_str(&choices_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Question {
        question_type: row.get(0)?,
        prompt: row.get(1)?,
        context: row.get(2)?,
        code: row.get(3)?,
        markup: row.get(4)?,
        answer: row.get(5)?,
        answer_key: row.get(6)?,
        difficulty: row.get(7)?,
        choices,
        is_correct: row.get(9)?,
        target_word: row.get(10)?,
    })
}

fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}

const SELECT_COLS: &str = "question_type, question, question_context, question_code, \
                           question_html, answer, answer_data_key, difficulty, \
                           choices, correct, target_word";

// ---------------------------------------------------------------------------
// QuestionStore impl
// ---------------------------------------------------------------------------

impl QuestionStore for SqliteStore {
    fn upsert(&self, question: &Question) -> VocabResult<()> {
        let choices_json = serde_json::to_string(&question.choices)?;
        let now = Utc::now().to_rfc3339();

        let changed = self
            .conn
            .execute(
                "INSERT INTO questions (question_type, question, question_context,
                 question_code, question_html, answer, answer_data_key, difficulty,
                 choices, correct, target_word, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
                 ON CONFLICT (question_type, question_context, question) DO UPDATE SET
                     answer = excluded.answer,
                     answer_data_key = excluded.answer_data_key,
                     correct = excluded.correct,
                     target_word = excluded.target_word,
                     updated_at = excluded.updated_at
                 WHERE questions.correct = 0",
                params![
                    question.question_type,
                    question.prompt,
                    question.context,
                    question.code,
                    question.markup,
                    question.answer,
                    question.answer_key,
                    question.difficulty,
                    choices_json,
                    question.is_correct,
                    question.target_word,
                    now,
                ],
            )
            .map_err(|e| VocabError::Database(e.to_string()))?;

        if changed == 0 {
            debug!(
                question_type = %question.question_type,
                "question already recorded as correct, left unchanged"
            );
        }
        Ok(())
    }

    fn get(
        &self,
        question_type: &str,
        context: &str,
        prompt: &str,
    ) -> VocabResult<Option<Question>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {SELECT_COLS} FROM questions
                 WHERE question_type = ?1 AND question_context = ?2 AND question = ?3"
            ))
            .map_err(|e| VocabError::Database(e.to_string()))?;

        let result = stmt
            .query_row(params![question_type, context, prompt], row_to_question)
            .optional()
            .map_err(|e| VocabError::Database(e.to_string()))?;

        Ok(result)
    }

    fn list_recent(&self, limit: usize) -> VocabResult<Vec<Question>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {SELECT_COLS} FROM questions ORDER BY updated_at DESC, id DESC LIMIT ?1"
            ))
            .map_err(|e| VocabError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], row_to_question)
            .map_err(|e| VocabError::Database(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| VocabError::Database(e.to_string()))?);
        }
        Ok(results)
    }

    fn count(&self) -> VocabResult<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM questions", [], |row| {
                row.get::<_, usize>(0)
            })
            .map_err(|e| VocabError::Database(e.to_string()))
    }

    fn stats(&self) -> VocabResult<StoreStats> {
        let total_questions = self.count()?;

        let correct_questions: usize = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM questions WHERE correct = 1",
                [],
                |row| row.get(0),
            )
            .map_err(|e| VocabError::Database(e.to_string()))?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT question_type, COUNT(*) FROM questions
                 GROUP BY question_type ORDER BY question_type",
            )
            .map_err(|e| VocabError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
            })
            .map_err(|e| VocabError::Database(e.to_string()))?;
        let mut by_type = Vec::new();
        for row in rows {
            by_type.push(row.map_err(|e| VocabError::Database(e.to_string()))?);
        }

        let first_seen = self
            .conn
            .query_row("SELECT MIN(created_at) FROM questions", [], |row| {
                row.get::<_, Option<String>>(0)
            })
            .map_err(|e| VocabError::Database(e.to_string()))?;

        let last_seen = self
            .conn
            .query_row("SELECT MAX(updated_at) FROM questions", [], |row| {
                row.get::<_, Option<String>>(0)
            })
            .map_err(|e| VocabError::Database(e.to_string()))?;

        Ok(StoreStats {
            total_questions,
            correct_questions,
            by_type,
            first_seen: parse_timestamp(first_seen),
            last_seen: parse_timestamp(last_seen),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    fn make_question(qtype: &str, context: &str, prompt: &str) -> Question {
        Question {
            question_type: qtype.into(),
            code: "PGRpdj48L2Rpdj4=".into(),
            markup: "<div></div>".into(),
            difficulty: 0.42,
            context: context.into(),
            prompt: prompt.into(),
            choices: vec![Choice::new("n1", "glad"), Choice::new("n2", "sad")],
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let store = test_store();
        let q = make_question("S", "", "elated has the same meaning as:");
        store.upsert(&q).unwrap();

        let got = store
            .get("S", "", "elated has the same meaning as:")
            .unwrap()
            .unwrap();
        assert_eq!(got, q);
    }

    #[test]
    fn test_get_not_found() {
        let store = test_store();
        assert!(store.get("S", "", "nothing").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_choices_is_database_error() {
        let store = test_store();
        store.upsert(&make_question("S", "", "glum means:")).unwrap();
        store
            .conn
            .execute("UPDATE questions SET choices = '{not json'", [])
            .unwrap();

        let result = store.get("S", "", "glum means:");
        assert!(matches!(result, Err(VocabError::Database(_))));
        assert!(matches!(store.list_recent(5), Err(VocabError::Database(_))));
    }

    #[test]
    fn test_upsert_twice_keeps_one_row_and_latest_answer() {
        let store = test_store();
        let mut q = make_question("D", "a sentence", "glum means:");
        store.upsert(&q).unwrap();

        q.apply_verdict(&Choice::new("n2", "sad"), false, "glum".into());
        store.upsert(&q).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let got = store.get("D", "a sentence", "glum means:").unwrap().unwrap();
        assert_eq!(got.answer, "sad");
        assert_eq!(got.answer_key, "n2");
        assert_eq!(got.target_word, "glum");
        assert!(!got.is_correct);
    }

    #[test]
    fn test_correct_row_is_locked() {
        let store = test_store();
        let mut q = make_question("D", "", "glum means:");
        q.apply_verdict(&Choice::new("n2", "sad"), true, "glum".into());
        store.upsert(&q).unwrap();

        let mut stale = make_question("D", "", "glum means:");
        stale.apply_verdict(&Choice::new("n1", "glad"), false, "other".into());
        store.upsert(&stale).unwrap();

        let got = store.get("D", "", "glum means:").unwrap().unwrap();
        assert_eq!(got.answer, "sad");
        assert_eq!(got.target_word, "glum");
        assert!(got.is_correct);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_key_includes_type_and_context() {
        let store = test_store();
        store.upsert(&make_question("D", "", "p")).unwrap();
        store.upsert(&make_question("S", "", "p")).unwrap();
        store.upsert(&make_question("S", "ctx", "p")).unwrap();
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_list_recent() {
        let store = test_store();
        for i in 0..5 {
            store
                .upsert(&make_question("S", "", &format!("prompt {i}")))
                .unwrap();
        }
        let recent = store.list_recent(3).unwrap();
        assert_eq!(recent.len(), 3);
    }

    #[test]
    fn test_stats() {
        let store = test_store();
        let mut right = make_question("S", "", "one");
        right.apply_verdict(&Choice::new("n1", "glad"), true, "happy".into());
        store.upsert(&right).unwrap();
        store.upsert(&make_question("S", "", "two")).unwrap();
        store.upsert(&make_question("T", "ctx", "")).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_questions, 3);
        assert_eq!(stats.correct_questions, 1);
        assert_eq!(
            stats.by_type,
            vec![("S".to_string(), 2), ("T".to_string(), 1)]
        );
        assert!(stats.first_seen.is_some());
        assert!(stats.last_seen.is_some());
    }

    #[test]
    fn test_stats_empty() {
        let stats = test_store().stats().unwrap();
        assert_eq!(stats.total_questions, 0);
        assert!(stats.first_seen.is_none());
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("questions.db");
        {
            let store = SqliteStore::new(&path).unwrap();
            store.upsert(&make_question("S", "", "kept")).unwrap();
        }
        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
