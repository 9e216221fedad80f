pub mod cache;
pub mod config;
pub mod error;
pub mod git;
pub mod search;
pub mod server;
pub mod tools;
