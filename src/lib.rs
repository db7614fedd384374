// src/lib.rs

pub mod authoring;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod participation;
pub mod report;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

pub use routes::create_router;
