//! HTTP surface of MoodScape: routing, handlers, middleware and the server
//! loop. Handlers are thin; domain logic lives in `moodscape-core`,
//! `moodscape-ai` and `moodscape-store`.

pub mod admin_handlers;
pub mod ai_handlers;
pub mod auth_handlers;
pub mod community_handlers;
pub mod error;
pub mod feedback_handlers;
pub mod health;
pub mod journal_handlers;
pub mod middleware;
pub mod mood_handlers;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;
pub mod user_handlers;

pub use error::*;
pub use response::*;
pub use routes::*;
pub use server::*;
pub use state::*;
