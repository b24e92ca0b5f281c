//! Core logic of the storefront chat assistant: the transcript store,
//! the turn engine, and prompt assembly.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod assistant;
mod completion_client;
pub mod lookup;
pub mod prompt;
pub mod transcript;

pub use assistant::{Assistant, AssistantBuilder};
