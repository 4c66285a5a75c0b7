pub mod api;
pub mod client;
pub mod error;
pub mod pagination;
pub mod traits;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

pub use client::SeplisClient;
pub use error::SourceError;
pub use pagination::{walk, DEFAULT_PAGE_SIZE};
pub use traits::{ApiResponse, SeplisApi};
