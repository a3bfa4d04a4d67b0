//! Materials and per-instance overrides.
//!
//! Material *contents* (textures, shading parameters) belong to the
//! rendering backend; this subsystem only tracks the name a subset resolves
//! to and whether the material is visible at all.

use rustc_hash::FxHashMap;

use crate::utils::Symbol;

/// A material slot of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Material {
    pub name: Symbol,
    pub visible: bool,
}

impl Material {
    #[must_use]
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            visible: true,
        }
    }
}

/// Per-instance material overrides, keyed by (node index, subset index).
///
/// A draw resolves its material through the override first and falls back
/// to the node's own material list.
#[derive(Debug, Clone, Default)]
pub struct MaterialInstance {
    overrides: FxHashMap<(u32, u32), Material>,
}

impl MaterialInstance {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_override(&mut self, node_index: u32, subset_index: u32, material: Material) {
        self.overrides.insert((node_index, subset_index), material);
    }

    pub fn clear_override(&mut self, node_index: u32, subset_index: u32) {
        self.overrides.remove(&(node_index, subset_index));
    }

    #[must_use]
    pub fn resolve(&self, node_index: u32, subset_index: u32) -> Option<Material> {
        self.overrides.get(&(node_index, subset_index)).copied()
    }

    pub fn clear(&mut self) {
        self.overrides.clear();
    }
}
