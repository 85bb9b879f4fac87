pub mod auth;
pub mod cache;
pub mod config;
pub mod crud;
pub mod engine;
pub mod error;
pub mod filter;
pub mod model;
pub mod routes;
pub mod schema;
