//! Small utilities around an LLM gaming benchmark.
//!
//! * [`records`] merges line-delimited JSON match records into one document.
//! * [`chat`] drives a causal language model through a chat-message interface.

pub mod chat;
pub mod logging;
pub mod records;
