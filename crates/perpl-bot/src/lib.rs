//! PerplBot application wiring.
//!
//! Front-ends (CLI, chat, Telegram) are consumers of the core crates; this
//! crate only loads configuration, initializes logging, and assembles the
//! clients, router, tracker, and agent context.

pub mod app;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;

pub use app::Application;
pub use config::BotConfig;
pub use error::{AppError, AppResult};
pub use logging::init_logging;
