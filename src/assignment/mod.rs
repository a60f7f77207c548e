//! Reviewer assignment engine.
//!
//! Random selection, the tiered replacement search and the bulk team
//! deactivation orchestrator. Everything here works against `ReviewStore`
//! and never against a concrete backend.

pub mod deactivation;
pub mod search;
pub mod selection;

pub use deactivation::{DeactivationSettings, TeamDeactivation};
pub use selection::Selector;
