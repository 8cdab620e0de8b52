//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise
//! tool-calling loop. This crate has **no framework dependencies**: it
//! defines the model that every other crate implements against.
//!
//! Every collaborator of the loop is a trait here (the model client and
//! the tool registry). Implementations live in their own crates, which keeps
//! the loop testable with scripted doubles.

pub mod context;
pub mod error;
pub mod message;
pub mod model;
pub mod step;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::ToolContext;
pub use error::{DecodeError, ModelError, ToolError};
pub use message::{Message, Role};
pub use model::{ModelClient, ModelRequest, ModelResponse, ToolDescriptor, Usage};
pub use step::{FinalStep, StepResponse, StructuredSummary, ToolCall, ToolOutcome, ToolStep};
pub use tool::{RoutedRegistry, Tool, ToolRegistry, ToolSet, parse_arguments};
