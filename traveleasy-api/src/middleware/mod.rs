pub mod auth;

pub use auth::{current_user, issue_token, require_auth, Claims};
