// Library exports for Yatube
// This allows integration tests and the binary to share the same modules

pub mod auth;
pub mod blog;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
