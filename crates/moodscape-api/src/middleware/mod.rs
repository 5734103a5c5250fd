pub mod auth;
pub mod rate_limit;
pub mod security;

pub use auth::{require_admin, require_auth};
pub use rate_limit::{client_ip, general_rate_limit, ClientIp, request_ip, RateLimiters};
pub use security::with_security_headers;
