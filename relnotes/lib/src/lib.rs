//! Release Notes Library - changelog extraction, classification, and enrichment
//!
//! Turns a cache of per-release changelog documents into one structured,
//! category-partitioned summary of security fixes, performance work, new
//! features, and bug fixes across every release.
//!
//! ## Pipeline
//!
//! 1. [`fetch`] downloads the release index and each release document into a
//!    [`DocumentStore`](store::DocumentStore).
//! 2. [`extract`] parses each document into a [`Release`](types::Release),
//!    normalizing change entries to markdown.
//! 3. [`classify`] buckets each release's entries by keyword policy.
//! 4. [`aggregate`] folds all releases into a
//!    [`ReleaseNotesSummary`](types::ReleaseNotesSummary), parsing titles,
//!    contributors and CVE ids via [`parse`].
//! 5. [`enrich`] attaches advisory severity data to security entries,
//!    persisting after every entry so an interrupted run can resume.
//! 6. [`links`] anchors documentation links at each entry's major version.
//!
//! [`pipeline`] strings the stages together over the on-disk artifacts.
//!
//! ## Examples
//!
//! ```
//! use relnotes_lib::{aggregate::aggregate, classify::classify_release, extract::extract_release};
//!
//! let html = r#"
//!   <h2 class="title">Release 16.1</h2>
//!   <p>Release date: 2023-11-09</p>
//!   <div class="itemizedlist"><ul><li><p>Fix crash in parser (Carol)</p></li></ul></div>
//! "#;
//! let release = extract_release("16.1", html, "https://www.postgresql.org/docs");
//! let summary = aggregate(&[classify_release(release)]);
//!
//! assert_eq!(summary.bugs[0].title, "Fix crash in parser");
//! assert_eq!(summary.bugs[0].contributors, vec!["Carol"]);
//! ```

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod extract;
pub mod fetch;
pub mod links;
pub mod parse;
pub mod pipeline;
pub mod store;
pub mod types;

pub use config::{Config, ConfigError};
pub use pipeline::PipelineError;
pub use types::{ChangeEntry, ClassifiedRelease, Release, ReleaseNotesSummary, SecurityEntry};
