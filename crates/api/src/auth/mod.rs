//! Session-based authentication.
//!
//! [`strategy`] holds the pluggable sign-in strategies; [`session`] maps an
//! authenticated user to and from the session store.

pub mod session;
pub mod strategy;

pub use session::SessionUser;
pub use strategy::{AuthOutcome, AuthRequest, Strategy, StrategyRegistry};
