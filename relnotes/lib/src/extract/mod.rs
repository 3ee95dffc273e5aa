//! Item extraction from cached release documents.
//!
//! [`extract_release`] reads one document and yields its version, release
//! date, and the normalized markdown of every top-level change entry.
//! [`normalize`] holds the markup → markdown rendering shared with the rest
//! of the crate.

mod document;
pub mod normalize;

pub use document::extract_release;
pub use normalize::{normalize_fragment, resolve_href};
