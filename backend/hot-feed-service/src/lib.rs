pub mod clients;
pub mod config;
pub mod consumers;
pub mod db;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
