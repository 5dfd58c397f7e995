//! Shared building blocks for the Nash Stash backend.
//!
//! Zero internal dependencies: every other workspace crate depends on this
//! one for the runtime environment, the settings lookup, the retry policy,
//! and the common error and id types.

pub mod environment;
pub mod error;
pub mod retry;
pub mod settings;
pub mod types;
