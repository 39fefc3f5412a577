//! HTTP boundary to the external issue tracker. The rest of the crate treats
//! the tracker as a black box with a narrow contract: look up an issue, fetch
//! its details, search a project backlog page, update summary/description.

mod client;
mod config;
mod error;
pub mod models;
pub mod rich_text;

pub use client::TrackerClient;
pub use config::TrackerConfig;
pub use error::{TrackerError, TrackerResult};
