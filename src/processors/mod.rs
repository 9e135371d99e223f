//! Document processing stages and the tree orchestrator

pub mod links;
pub mod markdown;
pub mod normalizer;
pub mod protector;
pub mod validate;
