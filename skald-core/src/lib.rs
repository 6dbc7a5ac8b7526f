//! Skald core library: content sources, oracle client, traversal engine and export.
//!
//! The main entry point is [`pipeline::SkaldPipeline`], which walks a
//! [`source::ContentSource`] with the [`engine::SummaryEngine`], summarizing
//! functions, files and directories bottom-up while threading README-derived
//! context top-down, then flattens the resulting [`tree::SummaryTree`] into
//! retrieval documents. [`relations`] optionally links files through their
//! imports.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod export;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod relations;
pub mod source;
pub mod summarize;
pub mod tree;
pub mod types;
