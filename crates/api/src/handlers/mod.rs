pub mod auth;
pub mod fallback;
