//! Property Sheets
//!
//! Builds the property sheet for the current selection:
//!
//! 1. [`Scene::snapshot`](crate::scene::Scene::snapshot) copies the selected
//!    nodes' editable state.
//! 2. [`generate`] validates panels per node type and merges fields across
//!    the selection, by intersection or union.
//! 3. [`PropertiesManager`] runs generation in the background and presents
//!    only results for the current selection.

mod cancel;
mod manager;
mod panel;
mod snapshot;

pub use cancel::{SelectionCounter, SelectionToken};
pub use manager::PropertiesManager;
pub use panel::{
    generate, validate_panel, NodeSnapshot, Panel, PanelField, PanelKind, PropertiesStyle,
    PropertyField, PropertySheet, PropertyValue,
};
