//! Quarry Client - HTTP implementation of the search/details capability.

pub mod youtube;

pub use youtube::{DEFAULT_BASE_URL, YouTubeClient};
