//! LLM Provider implementations for Nimbus.
//!
//! All providers implement the `nimbus_core::Provider` trait. The agent loop
//! only ever sees the trait object.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
