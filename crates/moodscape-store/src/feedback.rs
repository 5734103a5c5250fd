use chrono::Utc;
use moodscape_core::{Feedback, FeedbackAuthor, FeedbackView, UserId};
use rusqlite::{params, Connection};

use crate::StoreResult;

pub fn create(conn: &Connection, user_id: UserId, message: &str) -> StoreResult<Feedback> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO feedback (user_id, message, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![user_id, message, now],
    )?;

    Ok(Feedback {
        id: conn.last_insert_rowid(),
        user_id,
        message: message.to_string(),
        created_at: now,
        updated_at: now,
    })
}

/// Newest first, with the submitting user when the account still exists.
pub fn list_with_authors(conn: &Connection) -> StoreResult<Vec<FeedbackView>> {
    let mut stmt = conn.prepare(
        "SELECT f.id, f.user_id, f.message, f.created_at, f.updated_at, u.id, u.username, u.email
         FROM feedback f LEFT JOIN users u ON u.id = f.user_id
         ORDER BY f.created_at DESC, f.id DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        let author_id: Option<UserId> = row.get(5)?;
        let user = match author_id {
            Some(id) => Some(FeedbackAuthor {
                id,
                username: row.get(6)?,
                email: row.get(7)?,
            }),
            None => None,
        };

        Ok(FeedbackView {
            feedback: Feedback {
                id: row.get(0)?,
                user_id: row.get(1)?,
                message: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            },
            user,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
