//! Layers
//!
//! A layer groups nodes independently of the hierarchy. Members depend on
//! the layer, so toggling the layer dirties every member downstream, and a
//! member's visibility and selectability require all of its layers to allow
//! them.

use std::collections::BTreeMap;

use glam::Vec3;
use uuid::Uuid;

use super::store::{NodeKind, NodeStore};
use crate::graph::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub(crate) visible: bool,
    pub(crate) selectable: bool,
    pub(crate) color: Vec3,

    /// Persistent ids of the members, refreshed by evaluation.
    pub(crate) members: Vec<Uuid>,
}

impl Default for Layer {
    fn default() -> Self {
        Self {
            visible: true,
            selectable: true,
            color: Vec3::ONE,
            members: Vec::new(),
        }
    }
}

impl Layer {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn members(&self) -> &[Uuid] {
        &self.members
    }

    pub fn contains_member(&self, uid: Uuid) -> bool {
        self.members.contains(&uid)
    }
}

/// Names present in any / every one of several name lists.
///
/// Both results are sorted case-insensitively and compared
/// case-insensitively; the first spelling seen wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSummary {
    pub union: Vec<String>,
    pub intersection: Vec<String>,
}

impl MembershipSummary {
    pub fn build<I, S>(lists: I) -> Self
    where
        I: IntoIterator<Item = Vec<S>>,
        S: AsRef<str>,
    {
        // lowercase key -> (first spelling, number of lists containing it)
        let mut seen: BTreeMap<String, (String, usize)> = BTreeMap::new();
        let mut list_count = 0;

        for list in lists {
            list_count += 1;
            let mut keys: Vec<String> = Vec::new();
            for name in &list {
                let name: &str = name.as_ref();
                let key = name.to_lowercase();
                if keys.contains(&key) {
                    continue;
                }
                keys.push(key.clone());
                seen.entry(key)
                    .and_modify(|(_, count)| *count += 1)
                    .or_insert_with(|| (name.to_string(), 1));
            }
        }

        let union = seen.values().map(|(name, _)| name.clone()).collect();
        let intersection = seen
            .values()
            .filter(|(_, count)| *count == list_count)
            .map(|(name, _)| name.clone())
            .collect();

        Self {
            union,
            intersection,
        }
    }
}

impl NodeStore {
    /// Refresh a layer's persisted member list from its descendants.
    pub(super) fn evaluate_layer_members(&mut self, id: NodeId) {
        let Some(entry) = self.get(id) else {
            return;
        };
        let members: Vec<Uuid> = entry
            .node
            .descendants()
            .iter()
            .filter_map(|&member| self.get(member).map(|e| e.node.uid()))
            .collect();

        if let Some(NodeKind::Layer(layer)) = self.get_mut(id).map(|e| &mut e.kind) {
            layer.members = members;
        }
    }
}
