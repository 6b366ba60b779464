use rusqlite::Connection;

use vocab_core::VocabError;

pub fn init_db(conn: &Connection) -> Result<(), VocabError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question_type TEXT NOT NULL,
            question TEXT NOT NULL,
            question_context TEXT NOT NULL,
            question_code TEXT NOT NULL,
            question_html TEXT NOT NULL,

            answer TEXT NOT NULL DEFAULT '',
            answer_data_key TEXT NOT NULL DEFAULT '',
            difficulty REAL NOT NULL DEFAULT 0.0,
            choices TEXT NOT NULL DEFAULT '[]', -- JSON array of {key, value}
            correct INTEGER NOT NULL DEFAULT 0,
            target_word TEXT NOT NULL DEFAULT '',

            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(question_type, question_context, question)
        );

        CREATE INDEX IF NOT EXISTS idx_questions_type ON questions(question_type);
        CREATE INDEX IF NOT EXISTS idx_questions_target ON questions(target_word);
        CREATE INDEX IF NOT EXISTS idx_questions_updated ON questions(updated_at);
        ",
    )
    .map_err(|e| VocabError::Database(e.to_string()))?;

    Ok(())
}
