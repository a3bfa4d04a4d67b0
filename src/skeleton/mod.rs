//! Skeleton data and per-instance pose state.
//!
//! A [`Skeleton`] is the shared, read-only bone description owned by a
//! `Model`; every live `ModelInstance` mirrors it 1:1 with a
//! [`SkeletonInstance`] holding the mutable per-frame pose.
//!
//! # Bone ordering
//!
//! Bones live in one flat array and parents are looked up *by name* at
//! creation time, so a parent's index is always assigned before any of its
//! children — the array is topologically sorted by construction and the
//! per-frame pose pass is a single forward sweep with no runtime sort.

use glam::{Affine3A, Mat4};
use rustc_hash::FxHashMap;

use crate::utils::{Symbol, interner};

/// Index into a skeleton's flat bone array.
pub type BoneIndex = u16;

/// Sentinel parent index for root bones.
pub const INVALID_BONE_INDEX: BoneIndex = BoneIndex::MAX;

/// One bone of the shared skeleton.
#[derive(Debug, Clone)]
pub struct Bone {
    pub name: Symbol,
    pub index: BoneIndex,
    /// Parent bone index; [`INVALID_BONE_INDEX`] for roots, otherwise
    /// strictly less than `index`.
    pub parent_index: BoneIndex,
    /// Inverse-bind matrix: mesh space → bone local space.
    pub motion_offset: Affine3A,
    /// Bind-pose local transform, the motion matrix when no animation is
    /// applied.
    pub default_motion: Affine3A,
}

/// Shared, read-only bone hierarchy plus named skinned bindings.
///
/// A *skinned binding* maps a group name to the ordered list of bone names
/// a skinned node's vertex indices refer to.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    name_index: FxHashMap<Symbol, BoneIndex>,
    bindings: FxHashMap<Symbol, Vec<Symbol>>,
}

impl Skeleton {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a bone to the flat array.
    ///
    /// The parent is resolved by name, which guarantees its index is
    /// already assigned and therefore smaller. An unknown parent name is
    /// logged and the bone becomes a root; a duplicate bone name is logged
    /// and dropped (the existing bone wins).
    pub fn create_bone(
        &mut self,
        name: &str,
        parent_name: Option<&str>,
        motion_offset: Affine3A,
        default_motion: Affine3A,
    ) -> BoneIndex {
        let name_sym = interner::intern(name);
        if let Some(&existing) = self.name_index.get(&name_sym) {
            log::error!("duplicate bone name '{name}', keeping existing bone");
            return existing;
        }

        let parent_index = match parent_name {
            Some(parent) => match interner::get(parent).and_then(|p| self.name_index.get(&p)) {
                Some(&idx) => idx,
                None => {
                    log::warn!("bone '{name}' references unknown parent '{parent}', treated as root");
                    INVALID_BONE_INDEX
                }
            },
            None => INVALID_BONE_INDEX,
        };

        let index = self.bones.len() as BoneIndex;
        self.bones.push(Bone {
            name: name_sym,
            index,
            parent_index,
            motion_offset,
            default_motion,
        });
        self.name_index.insert(name_sym, index);
        index
    }

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    #[must_use]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    #[must_use]
    pub fn bone(&self, index: BoneIndex) -> Option<&Bone> {
        self.bones.get(index as usize)
    }

    /// Looks a bone up by name.
    #[must_use]
    pub fn find_bone(&self, name: &str) -> Option<BoneIndex> {
        interner::get(name).and_then(|sym| self.name_index.get(&sym).copied())
    }

    #[inline]
    #[must_use]
    pub fn find_bone_sym(&self, name: Symbol) -> Option<BoneIndex> {
        self.name_index.get(&name).copied()
    }

    /// Registers a named skinned binding (group name → ordered bone names).
    ///
    /// Re-registering an existing name is logged and ignored.
    pub fn register_binding(&mut self, name: &str, bone_names: Vec<Symbol>) {
        let sym = interner::intern(name);
        if self.bindings.contains_key(&sym) {
            log::error!("skinned binding '{name}' already registered, keeping existing");
            return;
        }
        self.bindings.insert(sym, bone_names);
    }

    #[must_use]
    pub fn binding(&self, name: Symbol) -> Option<&[Symbol]> {
        self.bindings.get(&name).map(Vec::as_slice)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (Symbol, &[Symbol])> {
        self.bindings.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

/// Per-instance state of one bone.
#[derive(Debug, Clone)]
pub struct BoneInstance {
    /// Observing back-reference into the same array; always smaller than
    /// this bone's own index.
    pub parent_index: BoneIndex,
    /// Current animated local transform, fed by the motion system.
    pub motion: Affine3A,
    /// Optional override composed under the motion matrix.
    pub override_matrix: Option<Affine3A>,
    /// Accumulated model-space transform (parents applied).
    pub local: Affine3A,
    /// World-space transform.
    pub global: Affine3A,
    /// `local * motion_offset`, the matrix GPU skinning consumes.
    pub skinning: Mat4,
}

/// Mutable pose mirror of a [`Skeleton`], one per `ModelInstance`.
///
/// The bone array size is fixed at construction.
#[derive(Debug, Clone)]
pub struct SkeletonInstance {
    bones: Vec<BoneInstance>,
    /// Binding name → bone indices, resolved once at construction. Skinned
    /// nodes use these to pack their GPU bone ranges without any per-frame
    /// name lookups.
    bindings: FxHashMap<Symbol, Vec<BoneIndex>>,
    /// Guard for [`Self::set_identity`]: true while every motion matrix is
    /// still the bind pose.
    at_bind_pose: bool,
}

impl SkeletonInstance {
    #[must_use]
    pub fn new(skeleton: &Skeleton) -> Self {
        let bones = skeleton
            .bones()
            .iter()
            .map(|bone| BoneInstance {
                parent_index: bone.parent_index,
                motion: bone.default_motion,
                override_matrix: None,
                local: Affine3A::IDENTITY,
                global: Affine3A::IDENTITY,
                skinning: Mat4::IDENTITY,
            })
            .collect();

        let mut bindings = FxHashMap::default();
        for (name, bone_names) in skeleton.bindings() {
            let mut indices = Vec::with_capacity(bone_names.len());
            for &bone_name in bone_names {
                match skeleton.find_bone_sym(bone_name) {
                    Some(idx) => indices.push(idx),
                    None => log::warn!(
                        "binding '{}' references unknown bone '{}'",
                        interner::resolve(name),
                        interner::resolve(bone_name)
                    ),
                }
            }
            bindings.insert(name, indices);
        }

        Self {
            bones,
            bindings,
            at_bind_pose: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    #[must_use]
    pub fn bone(&self, index: BoneIndex) -> Option<&BoneInstance> {
        self.bones.get(index as usize)
    }

    /// Sets a bone's animated local transform for this frame.
    #[inline]
    pub fn set_motion_matrix(&mut self, index: BoneIndex, matrix: Affine3A) {
        if let Some(bone) = self.bones.get_mut(index as usize) {
            bone.motion = matrix;
            self.at_bind_pose = false;
        }
    }

    /// Sets or clears a bone's override matrix.
    #[inline]
    pub fn set_override_matrix(&mut self, index: BoneIndex, matrix: Option<Affine3A>) {
        if let Some(bone) = self.bones.get_mut(index as usize) {
            bone.override_matrix = matrix;
            self.at_bind_pose = false;
        }
    }

    /// Resets every bone's motion matrix to the bind pose.
    ///
    /// Idempotent: a no-op while the instance is already at bind pose.
    pub fn set_identity(&mut self, skeleton: &Skeleton) {
        if self.at_bind_pose {
            return;
        }
        for (bone, shared) in self.bones.iter_mut().zip(skeleton.bones()) {
            bone.motion = shared.default_motion;
            bone.override_matrix = None;
        }
        self.at_bind_pose = true;
    }

    /// Recomputes every bone's local/global/skinning matrix.
    ///
    /// Single forward pass in index order: parents always precede children,
    /// so each bone's parent local is already final when read.
    pub fn update(&mut self, skeleton: &Skeleton, world: &Affine3A) {
        for i in 0..self.bones.len() {
            let (parent_index, base) = {
                let bone = &self.bones[i];
                let base = match bone.override_matrix {
                    Some(ov) => bone.motion * ov,
                    None => bone.motion,
                };
                (bone.parent_index, base)
            };

            let local = if parent_index == INVALID_BONE_INDEX {
                base
            } else {
                // parent_index < i, already updated this pass
                self.bones[parent_index as usize].local * base
            };

            // inverse bind first, then the current pose
            let offset = skeleton.bones()[i].motion_offset;
            let bone = &mut self.bones[i];
            bone.local = local;
            bone.skinning = Mat4::from(local * offset);
            bone.global = *world * local;
        }
    }

    /// The resolved bone indices of a named skinned binding, in the order a
    /// skinned node packs them into its GPU bone range.
    #[must_use]
    pub fn skinned_bone_indices(&self, binding: Symbol) -> Option<&[BoneIndex]> {
        self.bindings.get(&binding).map(Vec::as_slice)
    }

    /// Skinning matrix of one bone, identity when the index is stale.
    #[inline]
    #[must_use]
    pub fn skinning_matrix(&self, index: BoneIndex) -> Mat4 {
        self.bones
            .get(index as usize)
            .map_or(Mat4::IDENTITY, |b| b.skinning)
    }

    /// World-space matrix of one bone.
    #[inline]
    #[must_use]
    pub fn global_matrix(&self, index: BoneIndex) -> Option<Affine3A> {
        self.bones.get(index as usize).map(|b| b.global)
    }
}
