//! An in-memory document host for arbor.
//!
//! [`Document`] implements [`arbor_core::Host`] over a plain node arena and
//! records every change it receives, which makes it the host of choice for
//! tests and headless rendering.

mod config;
mod document;
mod error;
mod html;

pub use config::DocumentConfig;
pub use document::{Document, Mutation, dispatch_event};
pub use error::DomError;
pub use html::escape_html;
