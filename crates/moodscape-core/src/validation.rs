//! Request body validation. Every validator collects all field errors before
//! returning so the client can show them together.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;
pub const FULL_NAME_MAX: usize = 100;
pub const JOURNAL_MAX: usize = 5000;
pub const POST_MAX: usize = 1000;
pub const TITLE_MAX: usize = 100;
pub const POST_CATEGORIES: &[&str] = &["General", "Advice", "Vent", "Fun"];

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed")]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

#[derive(Default)]
struct Collector {
    errors: Vec<FieldError>,
}

impl Collector {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(ValidationErrors {
                errors: self.errors,
            })
        }
    }
}

fn check_username(c: &mut Collector, username: &str) {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        c.push(
            "username",
            format!("Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"),
        );
    } else if !username.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        c.push("username", "Username must contain only letters and numbers");
    }
}

fn check_email(c: &mut Collector, email: &str) {
    if !EMAIL_REGEX.is_match(email) {
        c.push("email", "Please provide a valid email");
    }
}

fn check_full_name(c: &mut Collector, full_name: Option<&str>) {
    if full_name.is_some_and(|name| name.trim().chars().count() > FULL_NAME_MAX) {
        c.push(
            "full_name",
            format!("Full name must be at most {FULL_NAME_MAX} characters"),
        );
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn trimmed_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    full_name: Option<&str>,
) -> Result<Registration, ValidationErrors> {
    let mut c = Collector::default();
    let username = username.trim();
    let email = normalize_email(email);

    check_username(&mut c, username);
    check_email(&mut c, &email);

    if password.chars().count() < PASSWORD_MIN {
        c.push(
            "password",
            format!("Password must be at least {PASSWORD_MIN} characters long"),
        );
    } else if !password.chars().any(|ch| ch.is_ascii_digit()) {
        c.push("password", "Password must contain at least one number");
    }

    check_full_name(&mut c, full_name);

    c.finish(Registration {
        username: username.to_string(),
        email,
        password: password.to_string(),
        full_name: trimmed_opt(full_name),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub email: String,
    pub password: String,
}

pub fn validate_login(email: &str, password: &str) -> Result<Login, ValidationErrors> {
    let mut c = Collector::default();
    let email = normalize_email(email);

    check_email(&mut c, &email);
    if password.is_empty() {
        c.push("password", "Password is required");
    }

    c.finish(Login {
        email,
        password: password.to_string(),
    })
}

/// Returns the trimmed entry text.
pub fn validate_journal(content: &str) -> Result<String, ValidationErrors> {
    let mut c = Collector::default();
    let content = content.trim();

    if content.is_empty() {
        c.push("content", "Journal content is required");
    } else if content.chars().count() > JOURNAL_MAX {
        c.push(
            "content",
            format!("Journal content must be at most {JOURNAL_MAX} characters"),
        );
    }

    c.finish(content.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostInput {
    pub title: Option<String>,
    pub content: String,
    pub category: Option<String>,
}

pub fn validate_post(
    title: Option<&str>,
    content: &str,
    category: Option<&str>,
) -> Result<PostInput, ValidationErrors> {
    let mut c = Collector::default();
    let content = content.trim();

    if content.is_empty() {
        c.push("content", "Post content is required");
    } else if content.chars().count() > POST_MAX {
        c.push(
            "content",
            format!("Post content must be at most {POST_MAX} characters"),
        );
    }

    if title.is_some_and(|t| t.trim().chars().count() > TITLE_MAX) {
        c.push("title", format!("Title must be at most {TITLE_MAX} characters"));
    }

    let category = trimmed_opt(category);
    if let Some(cat) = &category {
        if !POST_CATEGORIES.contains(&cat.as_str()) {
            c.push(
                "category",
                format!("Category must be one of: {}", POST_CATEGORIES.join(", ")),
            );
        }
    }

    c.finish(PostInput {
        title: trimmed_opt(title),
        content: content.to_string(),
        category,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

/// Only the fields present in the request are checked.
pub fn validate_profile_update(
    username: Option<&str>,
    email: Option<&str>,
    full_name: Option<&str>,
) -> Result<ProfileUpdate, ValidationErrors> {
    let mut c = Collector::default();

    let username = username.map(|u| u.trim().to_string());
    if let Some(u) = &username {
        check_username(&mut c, u);
    }

    let email = email.map(normalize_email);
    if let Some(e) = &email {
        check_email(&mut c, e);
    }

    check_full_name(&mut c, full_name);

    c.finish(ProfileUpdate {
        username,
        email,
        full_name: full_name.map(|n| n.trim().to_string()),
    })
}
