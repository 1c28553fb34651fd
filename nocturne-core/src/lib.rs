//! Nocturne Core
//!
//! This crate provides the scene graph at the heart of the Nocturne editor.
//! It implements:
//!
//! - A dependency graph of scene nodes with two-direction dirty propagation
//! - An incremental evaluation sweep that settles every dirty node once, in
//!   dependency order
//! - A display hierarchy of transforms, lights, locators, meshes and entities
//!   with cached matrices, bounds and visibility
//! - Layers, entity sets and skins as graph-only nodes
//! - Scene documents in MessagePack or JSON
//! - Property sheets generated on a cancellable background task
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: node bookkeeping, classification and the evaluation sweep
//! - `scene`: the node arena, node kinds and the `Scene` mutation API
//! - `persist`: scene documents
//! - `properties`: selection snapshots and property sheets
//! - `config`: scene configuration
//! - `error`: error types
//!
//! # Example
//!
//! ```rust,ignore
//! use glam::Vec3;
//! use nocturne_core::scene::Scene;
//!
//! let mut scene = Scene::default();
//! let arm = scene.create_transform("arm");
//! let hand = scene.create_transform("hand");
//! scene.set_parent(hand, arm)?;
//!
//! scene.set_translate(arm, Vec3::X)?;
//! scene.set_translate(hand, Vec3::Y)?;
//!
//! // Settle everything that was dirtied above
//! let result = scene.evaluate()?;
//! println!("evaluated {} nodes", result.node_count);
//!
//! let world = scene.global_transform(hand).unwrap();
//! assert_eq!(world.w_axis.truncate(), Vec3::new(1.0, 1.0, 0.0));
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod persist;
pub mod properties;
pub mod scene;
