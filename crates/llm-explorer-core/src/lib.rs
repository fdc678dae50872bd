//! Core library for LLM Explorer.
//!
//! LLM Explorer is a small installable site presenting a catalogue of
//! large language models. This crate holds the parts with real contracts:
//!
//! - `cache`: the versioned offline response cache and its background worker
//! - `install`: installed-mode detection and the single-use install prompt
//! - `session`: the page-side owner of both
//! - `catalogue` and `webmanifest`: the static data the site ships

pub mod cache;
pub mod catalogue;
pub mod config;
pub mod error;
pub mod install;
pub mod net;
pub mod session;
pub mod site;
pub mod utils;
pub mod webmanifest;

#[cfg(test)]
mod testing;

pub use catalogue::{Catalogue, ModelRecord};
pub use config::Config;
pub use error::{CacheError, FetchError, PromptError};
pub use session::PageSession;
pub use site::SiteLocation;
pub use webmanifest::WebAppManifest;
