//! # chatmem Core
//!
//! Data model and pure processing steps for chat-archive enrichment.
//!
//! - [`types`]: raw archive model, clean messages, processed conversations
//!   and the metadata envelope
//! - [`linearize`]: leaf-to-root walk of a conversation's message tree
//! - [`turns`]: processed turns and their flattened prompt-context form
//! - [`archive`]: loading raw `conversations.json` exports
//! - [`storage`]: reading/writing processed output files
//! - [`sampling`]: seeded sampling of conversations
//!
//! Nothing in this crate talks to an LLM; see `chatmem_extraction` for the
//! enrichment pipeline built on top of it.

pub mod archive;
pub mod linearize;
pub mod sampling;
pub mod storage;
pub mod turns;
pub mod types;

pub use archive::{load_archive, parse_archive};
pub use linearize::{filter_conversations, format_timestamp, linearize, matches_filter};
pub use sampling::{resolve_seed, sample_conversations, DEFAULT_PROD_SEED};
pub use storage::{
    create_metadata, generate_output_filename, load_processed, output_path_for_today,
    parse_processed, save_conversations, StoredDataset, StoredFormat,
};
pub use turns::{flatten, flatten_all, flatten_value, AgentText, Turn};
pub use types::*;
