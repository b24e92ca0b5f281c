//! An out-of-the-box chat assistant for the storefront, assembling the
//! catalog lookup and the streaming completion backend.
//!
//! The crate includes a CLI shell for chatting in the terminal. And you
//! can also use it as a library to embed the assistant in a host app.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod catalog;
mod session;

pub use catalog::CatalogClient;
pub use session::{Session, SessionBuilder};

/// Re-exports of [`maitre_core`] crate.
pub mod core {
    pub use maitre_core::*;
}
