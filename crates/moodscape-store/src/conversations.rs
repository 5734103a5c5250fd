use chrono::Utc;
use moodscape_core::{ChatRole, ConversationMessage, UserId};
use rusqlite::{params, Connection};

use crate::{parse_column, StoreResult};

pub fn append(
    conn: &Connection,
    user_id: UserId,
    role: ChatRole,
    content: &str,
    is_error: bool,
) -> StoreResult<ConversationMessage> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO conversations (user_id, role, content, is_error, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, role.as_str(), content, is_error, now],
    )?;

    Ok(ConversationMessage {
        id: conn.last_insert_rowid(),
        user_id,
        role,
        content: content.to_string(),
        is_error,
        created_at: now,
    })
}

/// The user's conversation in the order it was written.
pub fn history(conn: &Connection, user_id: UserId) -> StoreResult<Vec<ConversationMessage>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, user_id, role, content, is_error, created_at
         FROM conversations WHERE user_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(ConversationMessage {
            id: row.get(0)?,
            user_id: row.get(1)?,
            role: parse_column(2, row.get(2)?)?,
            content: row.get(3)?,
            is_error: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn clear(conn: &Connection, user_id: UserId) -> StoreResult<usize> {
    Ok(conn.execute("DELETE FROM conversations WHERE user_id = ?1", params![user_id])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn history_is_per_user_and_clearable() {
        let (_dir, store) = open_store();
        let conn = store.connection().unwrap();
        let alice = add_user(&conn, "alice");
        let bob = add_user(&conn, "bob");

        append(&conn, alice, ChatRole::User, "hi", false).unwrap();
        append(&conn, alice, ChatRole::Assistant, "AI request failed", true).unwrap();
        append(&conn, bob, ChatRole::User, "hey", false).unwrap();

        let alice_history = history(&conn, alice).unwrap();
        assert_eq!(alice_history.len(), 2);
        assert_eq!(alice_history[0].role, ChatRole::User);
        assert!(alice_history[1].is_error);

        assert_eq!(clear(&conn, alice).unwrap(), 2);
        assert!(history(&conn, alice).unwrap().is_empty());
        assert_eq!(history(&conn, bob).unwrap().len(), 1);
    }
}
