//! Model client implementations for Stepwise.
//!
//! All clients implement the `stepwise_core::ModelClient` trait.
//! [`build_from_config`] picks and configures one from `AppConfig`.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatClient;
pub use router::build_from_config;
