//! Core translation engine module

pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod mappings;
pub mod models;
pub mod prompt;
