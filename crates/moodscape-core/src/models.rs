use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub type UserId = i64;
pub type PostId = i64;

/// Account role. Admins can read every user and every feedback message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Therapist,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Therapist => "therapist",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "therapist" => Ok(Role::Therapist),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Public view of an account. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trimmed-down user row for the admin listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub id: i64,
    pub user_id: UserId,
    pub content: String,
    pub is_voice: bool,
    pub mood: String,
    pub mood_score: f64,
    pub ai_report: Option<String>,
    pub ai_response: Option<String>,
    pub assigned_therapist_id: Option<UserId>,
    pub contains_harmful: bool,
    pub harmful_words: Vec<String>,
    pub is_crisis: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when persisting a freshly analyzed entry.
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub user_id: UserId,
    pub content: String,
    pub is_voice: bool,
    pub mood: String,
    pub mood_score: f64,
    pub ai_report: Option<String>,
    pub ai_response: Option<String>,
    pub harmful_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarmfulWordLog {
    pub id: i64,
    pub user_id: Option<UserId>,
    pub journal_entry_id: Option<i64>,
    pub word: String,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_CATEGORY: &str = "General";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommunityPost {
    pub id: PostId,
    pub user_id: UserId,
    pub title: Option<String>,
    pub content: String,
    pub category: String,
    pub is_anonymous: bool,
    pub likes_count: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: UserId,
    pub title: Option<String>,
    pub content: String,
    pub category: String,
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostAuthor {
    pub id: Option<UserId>,
    pub username: String,
    pub full_name: Option<String>,
}

impl PostAuthor {
    pub fn anonymous() -> Self {
        Self {
            id: None,
            username: "Anonymous".to_string(),
            full_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentAuthor {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: CommentAuthor,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Up => "up",
            VoteType::Down => "down",
        }
    }
}

impl FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(VoteType::Up),
            "down" => Ok(VoteType::Down),
            other => Err(format!("unknown vote type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub id: i64,
    pub post_id: PostId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteTally {
    pub upvotes: i64,
    pub downvotes: i64,
}

/// A post as the community board renders it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostView {
    #[serde(flatten)]
    pub post: CommunityPost,
    pub user: PostAuthor,
    pub comments: Vec<Comment>,
    pub votes: Vec<Vote>,
}

impl PostView {
    /// Hide the author of anonymous posts. The owning `user_id` stays so
    /// that delete permissions keep working client-side.
    pub fn masked(mut self) -> Self {
        if self.post.is_anonymous {
            self.user = PostAuthor::anonymous();
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub id: i64,
    pub user_id: UserId,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackAuthor {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackView {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub user: Option<FeedbackAuthor>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(format!("unknown chat role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub id: i64,
    pub user_id: UserId,
    pub role: ChatRole,
    pub content: String,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post(is_anonymous: bool) -> PostView {
        let now = Utc::now();
        PostView {
            post: CommunityPost {
                id: 1,
                user_id: 7,
                title: None,
                content: "hello".into(),
                category: DEFAULT_CATEGORY.into(),
                is_anonymous,
                likes_count: 0,
                upvotes: 0,
                downvotes: 0,
                created_at: now,
                updated_at: now,
            },
            user: PostAuthor {
                id: Some(7),
                username: "alice".into(),
                full_name: Some("Alice".into()),
            },
            comments: vec![],
            votes: vec![],
        }
    }

    #[test]
    fn anonymous_posts_hide_author() {
        let view = sample_post(true).masked();
        assert_eq!(view.user, PostAuthor::anonymous());

        let view = sample_post(false).masked();
        assert_eq!(view.user.username, "alice");
    }

    #[test]
    fn post_view_flattens_post_fields() {
        let json = serde_json::to_value(sample_post(false)).unwrap();
        assert_eq!(json["content"], "hello");
        assert_eq!(json["user"]["username"], "alice");
        assert!(json.get("post").is_none());
    }

    #[test]
    fn vote_type_serializes_as_type_field() {
        let vote = Vote {
            id: 1,
            post_id: 2,
            user_id: 3,
            vote_type: VoteType::Down,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&vote).unwrap();
        assert_eq!(json["type"], "down");
    }

    #[test]
    fn roles_round_trip_through_strings() {
        for role in [Role::User, Role::Therapist, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
    }
}
