pub mod config;
pub mod history;
pub mod redis;
pub mod types;
