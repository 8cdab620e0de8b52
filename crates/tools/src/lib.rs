//! Built-in tool implementations for Stepwise.
//!
//! A small, dependency-free set that lets the loop be exercised end to end
//! without any external system: arithmetic, string handling, Fibonacci
//! numbers, and per-invocation notes stored in the [`ToolContext`].
//!
//! [`ToolContext`]: stepwise_core::ToolContext

pub mod calculator;
pub mod fibonacci;
pub mod notes;
pub mod text;

use stepwise_core::ToolSet;

pub use calculator::CalculatorTool;
pub use fibonacci::FibonacciTool;
pub use notes::{RecallTool, RememberTool};
pub use text::ReverseStringTool;

/// Create a tool set with every built-in tool.
///
/// `remember` and `recall` share the invocation context, so the set is left
/// sequential; callers that drop the notes tools may opt into parallelism.
pub fn default_registry() -> ToolSet {
    let mut registry = ToolSet::new();
    registry.register(Box::new(calculator::CalculatorTool));
    registry.register(Box::new(text::ReverseStringTool));
    registry.register(Box::new(fibonacci::FibonacciTool));
    registry.register(Box::new(notes::RememberTool));
    registry.register(Box::new(notes::RecallTool));
    registry
}
