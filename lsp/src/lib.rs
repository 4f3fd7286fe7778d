//! LSP client protocol layer: one spawned language server, exposed to agent
//! tools as synchronous-looking capability calls.
//!
//! [`LspClient`] owns the subprocess, frames and correlates JSON-RPC over
//! its standard streams, tracks per-document open/version state, and
//! reconciles pushed and polled diagnostics into a single view. Tool-facing
//! result and configuration types live in [`sextant_types`].

pub mod active;
pub mod codec;

pub(crate) mod correlate;
pub(crate) mod diagnostics;
pub(crate) mod documents;
pub(crate) mod protocol;

mod client;
mod error;

pub use client::LspClient;
pub use codec::{FrameError, FrameReader, FrameWriter};
pub use error::ClientError;

pub use sextant_types as types;
