use chrono::Utc;
use moodscape_core::UserId;
use rusqlite::{params, Connection};

use crate::StoreResult;

/// One log row per detected phrase, sharing the same context excerpt.
pub fn log_phrases(
    conn: &Connection,
    user_id: UserId,
    journal_entry_id: i64,
    phrases: &[String],
    context: &str,
) -> StoreResult<usize> {
    let now = Utc::now();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO harmful_word_log (user_id, journal_entry_id, word, context, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    for phrase in phrases {
        stmt.execute(params![user_id, journal_entry_id, phrase, context, now])?;
    }
    Ok(phrases.len())
}
