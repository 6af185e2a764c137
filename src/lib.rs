pub mod bootstrap;
pub mod config;
pub mod database;
pub mod models;
pub mod orchestrator;
pub mod repository;
pub mod scheduler;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use database::Database;
pub use orchestrator::{ProcessRunner, ScrapeRunner, ScraperOrchestrator};
pub use scheduler::ScrapeScheduler;
pub use utils::error::{AppError, Result};
