//! # chatmem Server Library
//!
//! Shared pieces of the two chatmem binaries:
//! - `chatmem` processes a raw archive through the enrichment pipeline
//!   ([`process`])
//! - `chatmem_viewer` serves processed datasets over HTTP
//!
//! Separated from the binaries so that handlers can be unit-tested without
//! starting a real TCP listener.

pub mod datasets;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod process;
pub mod router;
pub mod state;
pub mod telemetry;
pub mod types;
