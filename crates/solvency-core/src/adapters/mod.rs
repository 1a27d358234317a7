//! Subject directory implementations.
//!
//! | Adapter | Backing |
//! |---------|---------|
//! | [`InMemoryDirectory`] | Process-local fixtures, deterministic |
//! | [`HttpDirectory`] | JSON over HTTP via [`HttpClient`](crate::HttpClient) |

mod http;
mod memory;

pub use http::HttpDirectory;
pub use memory::{DirectoryEntry, InMemoryDirectory};
