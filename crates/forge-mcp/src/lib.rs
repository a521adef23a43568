//! Hand-rolled JSON-RPC stdio client for indexing a stack's MCP tool
//! inventory (spec.md §4.G).
//!
//! Deliberately not a wrapper around a general-purpose MCP SDK: each spawn
//! gets its own tiny protocol state (a request-id counter and a
//! single-in-flight-request read loop), matching exactly what a sequential
//! indexing run needs and nothing more.

mod client;
mod error;
mod indexer;
mod protocol;

pub use client::McpStackClient;
pub use error::{McpError, McpResult};
pub use indexer::{index_all, StackIndexResult, ToolIndex};
pub use protocol::{RequestIdCounter, RpcErrorObject, RpcRequest, RpcResponse, PROTOCOL_VERSION};
