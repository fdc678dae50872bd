//! Install-state tracking.
//!
//! This module provides:
//! - `is_installed`: detection of an installed (standalone) launch
//! - `InstallTracker`: owner of the captured, single-use install prompt
//! - `ManualInstructions`: fallback guidance when no prompt is available

pub mod environment;
pub mod guidance;
pub mod tracker;

pub use environment::{is_installed, BrowserEnvironment, DisplayMode, Platform};
pub use guidance::ManualInstructions;
pub use tracker::{InstallOutcome, InstallPrompt, InstallTracker, UserChoice};
