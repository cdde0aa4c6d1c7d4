//! Reel campaign service
//!
//! Credit-metered AI video generation with asynchronous job resolution, and
//! Threads campaign sharing whose rewards are re-verified at claim time.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
