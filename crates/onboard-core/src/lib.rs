pub mod config;
pub mod error;
pub mod io;
pub mod orchestrator;
pub mod paths;
pub mod profile;
pub mod progress;
pub mod requirement;
pub mod role;
pub mod stage;
pub mod store;
pub mod taxonomy;
pub mod types;

pub use error::{OnboardError, Result};
