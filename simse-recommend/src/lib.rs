pub mod catalog;
pub mod collaborative;
pub mod config;
pub mod content;
pub mod cosine;
pub mod engine;
pub mod error;
pub mod features;
pub mod fusion;
pub mod protocol;
pub mod server;
pub mod transport;
pub mod types;
