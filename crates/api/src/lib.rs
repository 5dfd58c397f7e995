//! HTTP and socket server for the Nash Stash backend.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod startup;
pub mod state;
pub mod ws;
