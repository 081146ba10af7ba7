pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod records;
pub mod storage;
pub mod telemetry;
