//! Community board: posts, comments, likes and up/down votes.

use chrono::Utc;
use moodscape_core::{
    Comment, CommentAuthor, CommunityPost, NewPost, PostAuthor, PostId, PostView, UserId, Vote,
    VoteTally, VoteType,
};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::{parse_column, StoreResult};

const POST_COLUMNS: &str = "p.id, p.user_id, p.title, p.content, p.category, p.is_anonymous, \
     p.likes_count, p.upvotes, p.downvotes, p.created_at, p.updated_at";

fn parse_post(row: &Row) -> rusqlite::Result<CommunityPost> {
    Ok(CommunityPost {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        category: row.get(4)?,
        is_anonymous: row.get(5)?,
        likes_count: row.get(6)?,
        upvotes: row.get(7)?,
        downvotes: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Post columns followed by the author's id, username and full name.
fn parse_post_with_author(row: &Row) -> rusqlite::Result<(CommunityPost, PostAuthor)> {
    Ok((
        parse_post(row)?,
        PostAuthor {
            id: Some(row.get(11)?),
            username: row.get(12)?,
            full_name: row.get(13)?,
        },
    ))
}

fn parse_comment(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        user: CommentAuthor {
            id: row.get(2)?,
            username: row.get(6)?,
        },
    })
}

pub fn create_post(conn: &Connection, post: &NewPost) -> StoreResult<CommunityPost> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO community_posts (user_id, title, content, category, is_anonymous, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            post.user_id,
            post.title,
            post.content,
            post.category,
            post.is_anonymous,
            now
        ],
    )?;

    Ok(CommunityPost {
        id: conn.last_insert_rowid(),
        user_id: post.user_id,
        title: post.title.clone(),
        content: post.content.clone(),
        category: post.category.clone(),
        is_anonymous: post.is_anonymous,
        likes_count: 0,
        upvotes: 0,
        downvotes: 0,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_post(conn: &Connection, id: PostId) -> StoreResult<Option<CommunityPost>> {
    let post = conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM community_posts p WHERE p.id = ?1"),
            params![id],
            parse_post,
        )
        .optional()?;
    Ok(post)
}

pub fn count_posts(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM community_posts", [], |row| row.get(0))?)
}

pub fn delete_post(conn: &Connection, id: PostId) -> StoreResult<bool> {
    Ok(conn.execute("DELETE FROM community_posts WHERE id = ?1", params![id])? > 0)
}

/// Oldest first, each with its author.
pub fn comments_for_post(conn: &Connection, post_id: PostId) -> StoreResult<Vec<Comment>> {
    let mut stmt = conn.prepare_cached(
        "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, c.updated_at, u.username
         FROM community_comments c
         JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.id ASC",
    )?;
    let rows = stmt.query_map(params![post_id], parse_comment)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn votes_for_post(conn: &Connection, post_id: PostId) -> StoreResult<Vec<Vote>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, post_id, user_id, type, created_at
         FROM community_votes WHERE post_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![post_id], |row| {
        Ok(Vote {
            id: row.get(0)?,
            post_id: row.get(1)?,
            user_id: row.get(2)?,
            vote_type: parse_column(3, row.get(3)?)?,
            created_at: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn assemble(conn: &Connection, post: CommunityPost, author: PostAuthor) -> StoreResult<PostView> {
    let comments = comments_for_post(conn, post.id)?;
    let votes = votes_for_post(conn, post.id)?;
    Ok(PostView {
        post,
        user: author,
        comments,
        votes,
    }
    .masked())
}

/// A single post as the board renders it, author masked when anonymous.
pub fn post_view(conn: &Connection, id: PostId) -> StoreResult<Option<PostView>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {POST_COLUMNS}, u.id, u.username, u.full_name
                 FROM community_posts p JOIN users u ON u.id = p.user_id
                 WHERE p.id = ?1"
            ),
            params![id],
            parse_post_with_author,
        )
        .optional()?;

    row.map(|(post, author)| assemble(conn, post, author))
        .transpose()
}

/// Newest first.
pub fn list_views(conn: &Connection, limit: u32, offset: u32) -> StoreResult<Vec<PostView>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS}, u.id, u.username, u.full_name
         FROM community_posts p JOIN users u ON u.id = p.user_id
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?1 OFFSET ?2"
    ))?;
    let rows = stmt
        .query_map(params![limit, offset], parse_post_with_author)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(post, author)| assemble(conn, post, author))
        .collect()
}

pub fn add_comment(
    conn: &Connection,
    post_id: PostId,
    user_id: UserId,
    content: &str,
) -> StoreResult<Comment> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO community_comments (post_id, user_id, content, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![post_id, user_id, content, now],
    )?;
    let id = conn.last_insert_rowid();

    Ok(conn.query_row(
        "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, c.updated_at, u.username
         FROM community_comments c JOIN users u ON u.id = c.user_id
         WHERE c.id = ?1",
        params![id],
        parse_comment,
    )?)
}

/// Like or unlike. Returns whether the post is now liked by the user.
pub fn toggle_like(conn: &mut Connection, post_id: PostId, user_id: UserId) -> StoreResult<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let removed = tx.execute(
        "DELETE FROM community_likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
    )?;

    let liked = if removed > 0 {
        tx.execute(
            "UPDATE community_posts SET likes_count = MAX(likes_count - 1, 0) WHERE id = ?1",
            params![post_id],
        )?;
        false
    } else {
        tx.execute(
            "INSERT INTO community_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![post_id, user_id, Utc::now()],
        )?;
        tx.execute(
            "UPDATE community_posts SET likes_count = likes_count + 1 WHERE id = ?1",
            params![post_id],
        )?;
        true
    };

    tx.commit()?;
    Ok(liked)
}

/// Same vote again removes it, the other type switches it, no vote creates
/// one. Counters are recomputed from the vote rows afterwards.
pub fn toggle_vote(
    conn: &mut Connection,
    post_id: PostId,
    user_id: UserId,
    vote_type: VoteType,
) -> StoreResult<VoteTally> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing: Option<(i64, String)> = tx
        .query_row(
            "SELECT id, type FROM community_votes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match existing {
        Some((id, current)) if current == vote_type.as_str() => {
            tx.execute("DELETE FROM community_votes WHERE id = ?1", params![id])?;
        }
        Some((id, _)) => {
            tx.execute(
                "UPDATE community_votes SET type = ?2 WHERE id = ?1",
                params![id, vote_type.as_str()],
            )?;
        }
        None => {
            tx.execute(
                "INSERT INTO community_votes (post_id, user_id, type, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![post_id, user_id, vote_type.as_str(), Utc::now()],
            )?;
        }
    }

    let tally = tx.query_row(
        "SELECT
             COALESCE(SUM(CASE WHEN type = 'up' THEN 1 ELSE 0 END), 0),
             COALESCE(SUM(CASE WHEN type = 'down' THEN 1 ELSE 0 END), 0)
         FROM community_votes WHERE post_id = ?1",
        params![post_id],
        |row| {
            Ok(VoteTally {
                upvotes: row.get(0)?,
                downvotes: row.get(1)?,
            })
        },
    )?;

    tx.execute(
        "UPDATE community_posts SET upvotes = ?2, downvotes = ?3, updated_at = ?4 WHERE id = ?1",
        params![post_id, tally.upvotes, tally.downvotes, Utc::now()],
    )?;

    tx.commit()?;
    Ok(tally)
}
