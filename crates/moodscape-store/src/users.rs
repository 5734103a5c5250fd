use chrono::Utc;
use moodscape_core::{Role, User, UserId, UserSummary};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{parse_column, StoreResult};

const USER_COLUMNS: &str =
    "id, username, email, full_name, avatar, role, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: Role,
}

/// A user together with the stored password hash, for login only.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

fn parse_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        avatar: row.get(4)?,
        role: parse_column(5, row.get(5)?)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub fn create(conn: &Connection, new_user: &NewUser) -> StoreResult<User> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (username, email, password_hash, full_name, role, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        params![
            new_user.username,
            new_user.email,
            new_user.password_hash,
            new_user.full_name,
            new_user.role.as_str(),
            now,
        ],
    )?;

    Ok(User {
        id: conn.last_insert_rowid(),
        username: new_user.username.clone(),
        email: new_user.email.clone(),
        full_name: new_user.full_name.clone(),
        avatar: None,
        role: new_user.role,
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

pub fn find_by_id(conn: &Connection, id: UserId) -> StoreResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            parse_user,
        )
        .optional()?;
    Ok(user)
}

pub fn find_credentials_by_email(conn: &Connection, email: &str) -> StoreResult<Option<Credentials>> {
    let creds = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
            params![email],
            |row| {
                Ok(Credentials {
                    user: parse_user(row)?,
                    password_hash: row.get(9)?,
                })
            },
        )
        .optional()?;
    Ok(creds)
}

/// Whether another account already uses `email`.
pub fn email_taken(conn: &Connection, email: &str, except: Option<UserId>) -> StoreResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1 AND (?2 IS NULL OR id != ?2)",
        params![email, except],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Whether another account already uses `username`.
pub fn username_taken(conn: &Connection, username: &str, except: Option<UserId>) -> StoreResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1 AND (?2 IS NULL OR id != ?2)",
        params![username, except],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Apply the provided fields and return the updated user.
pub fn update_profile(
    conn: &Connection,
    id: UserId,
    changes: &ProfileChanges,
) -> StoreResult<Option<User>> {
    let updated = conn.execute(
        "UPDATE users SET
             username = COALESCE(?2, username),
             email = COALESCE(?3, email),
             full_name = COALESCE(?4, full_name),
             updated_at = ?5
         WHERE id = ?1",
        params![id, changes.username, changes.email, changes.full_name, Utc::now()],
    )?;

    if updated == 0 {
        return Ok(None);
    }
    find_by_id(conn, id)
}

pub fn list_summaries(conn: &Connection) -> StoreResult<Vec<UserSummary>> {
    let mut stmt = conn.prepare("SELECT id, username, email, role FROM users ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(UserSummary {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            role: parse_column(3, row.get(3)?)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
