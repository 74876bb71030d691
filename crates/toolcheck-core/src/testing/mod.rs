//! Testing utilities for deterministic orchestration tests.

pub mod mock_invoker;

pub use mock_invoker::{InvocationRecord, MockInvoker};
