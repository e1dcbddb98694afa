// src/lib.rs
pub mod allowlist;
pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod models;
pub mod scheduler;
pub mod server;
pub mod source_query;
pub mod storage;
pub mod utils;
