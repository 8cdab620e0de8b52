//! # Stepwise Protocol
//!
//! The step protocol codec. Every model reply is one JSON document:
//!
//! ```text
//! {"step":"tool","toolCalls":[{"name":"<tool>","arguments":{...}}],"answer":null}
//! {"step":"final","toolCalls":[],"answer":"<text>","summary":{...}}
//! ```
//!
//! [`decode`] is tolerant of what models actually produce (fences, prose,
//! near-JSON); [`encode`] renders tool outcomes as the next user message.

pub mod decode;
pub mod encode;
pub mod repair;

pub use decode::{Decoded, decode, decode_with_report, strip_fences};
pub use encode::{FEEDBACK_HEADER, encode, encode_step};
pub use repair::{RepairRule, Repaired, repair, repair_with_report};
