//! Library exports for reqenv, shared between the binary and tests.

pub mod authenticators;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod http_client;
pub mod jwt;
pub mod models;
pub mod pool;
pub mod query;
pub mod routes;
pub mod startup;
pub mod state;
pub mod utils;
