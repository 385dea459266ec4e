pub mod application;
pub mod auth;
pub mod cli;
pub mod config;
pub mod domain;
pub mod storage;
pub mod telemetry;

pub use domain::*;
pub use storage::Repository;
