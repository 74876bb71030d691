//! # toolcheck-mcp
//!
//! MCP (Model Context Protocol) server exposing toolcheck diagnostics to
//! agents. Tools available:
//!
//! - `run_smoke_tests` - Run config/connectivity/health checks and return the report
//! - `list_smoke_specs` - List servers and the checks declared for them

mod server;
mod tools;

pub use server::{ToolcheckMcpServer, serve_stdio};
pub use tools::{ListSpecsParams, RunSmokeTestsParams};
