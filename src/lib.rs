// Library exports for superblog
// The binary and the integration tests both drive the client through these modules.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod resource;
pub mod routes;
pub mod state;
