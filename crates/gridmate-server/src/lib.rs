//! Stateful power-grid tool server.
//!
//! A [`Session`] holds at most one current network; [`tools`] exposes its
//! operations as a named catalogue, and [`Server`] serves that catalogue as
//! line-delimited JSON-RPC. [`ToolClient`] drives the server binary from
//! another process.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod tools;

pub use client::{ClientError, ToolClient};
pub use config::{load_config, ServerConfig};
pub use error::{ToolError, ToolResult};
pub use protocol::{ToolCallResult, ToolDescriptor};
pub use server::Server;
pub use session::{Session, SessionState};
