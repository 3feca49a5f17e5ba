pub mod config;
pub mod error;
pub mod messages;
pub mod types;

pub use config::ArcConfig;
pub use error::{ArcError, Result};
pub use messages::*;
pub use types::*;
