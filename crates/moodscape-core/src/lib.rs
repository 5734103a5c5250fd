pub mod config_manager;
pub mod error;
pub mod models;
pub mod mood;
pub mod reply;
pub mod safety;
pub mod security;
pub mod validation;

pub use config_manager::*;
pub use error::*;
pub use models::*;
pub use security::{
    AuthConfig, AuthContext, Claims, JwtManager, PasswordHasher, SecurityError, SecurityEvent,
    SecurityLogger,
};
pub use validation::{FieldError, ValidationErrors};
