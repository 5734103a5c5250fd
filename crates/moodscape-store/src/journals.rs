use chrono::Utc;
use moodscape_core::{JournalEntry, NewJournalEntry, UserId};
use rusqlite::{params, Connection, Row};

use crate::StoreResult;

const ENTRY_COLUMNS: &str = "id, user_id, content, is_voice, mood, mood_score, ai_report, \
     ai_response, assigned_therapist_id, contains_harmful, harmful_words, is_crisis, \
     created_at, updated_at";

fn parse_entry(row: &Row) -> rusqlite::Result<JournalEntry> {
    let harmful_raw: String = row.get(10)?;
    let harmful_words = serde_json::from_str(&harmful_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(JournalEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        is_voice: row.get(3)?,
        mood: row.get(4)?,
        mood_score: row.get(5)?,
        ai_report: row.get(6)?,
        ai_response: row.get(7)?,
        assigned_therapist_id: row.get(8)?,
        contains_harmful: row.get(9)?,
        harmful_words,
        is_crisis: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Persist an analyzed entry. Any harmful phrase marks it as a crisis entry.
pub fn insert(conn: &Connection, entry: &NewJournalEntry) -> StoreResult<JournalEntry> {
    let now = Utc::now();
    let flagged = !entry.harmful_words.is_empty();
    let harmful_json = serde_json::to_string(&entry.harmful_words)?;

    conn.execute(
        "INSERT INTO journal_entries
             (user_id, content, is_voice, mood, mood_score, ai_report, ai_response,
              contains_harmful, harmful_words, is_crisis, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?8, ?10, ?10)",
        params![
            entry.user_id,
            entry.content,
            entry.is_voice,
            entry.mood,
            entry.mood_score,
            entry.ai_report,
            entry.ai_response,
            flagged,
            harmful_json,
            now,
        ],
    )?;

    Ok(JournalEntry {
        id: conn.last_insert_rowid(),
        user_id: entry.user_id,
        content: entry.content.clone(),
        is_voice: entry.is_voice,
        mood: entry.mood.clone(),
        mood_score: entry.mood_score,
        ai_report: entry.ai_report.clone(),
        ai_response: entry.ai_response.clone(),
        assigned_therapist_id: None,
        contains_harmful: flagged,
        harmful_words: entry.harmful_words.clone(),
        is_crisis: flagged,
        created_at: now,
        updated_at: now,
    })
}

/// Newest first.
pub fn list_for_user(conn: &Connection, user_id: UserId, limit: u32) -> StoreResult<Vec<JournalEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM journal_entries
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![user_id, limit], parse_entry)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Every mood score of the user, oldest first.
pub fn mood_scores_for_user(conn: &Connection, user_id: UserId) -> StoreResult<Vec<f64>> {
    let mut stmt = conn.prepare(
        "SELECT mood_score FROM journal_entries
         WHERE user_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<f64>>>()?)
}
