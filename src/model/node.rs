//! Model nodes: geometry, subsets and draw emission.
//!
//! A node is either `Static` or `Skinned` — a closed set of variants, as is
//! the dispatch on them. Skinned nodes additionally own the name of the
//! skinned binding whose bones they pack into the frame's bone-matrix
//! buffer.

use std::sync::Arc;

use glam::{Affine3A, Mat4, Vec3};
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::model::instance::TransformInstance;
use crate::model::material::{Material, MaterialInstance};
use crate::render::{
    BoneMatrixRing, BoneRange, BufferId, CpuMeshData, DebugRecord, DrawRecord, FrameContext,
    FrameDrawList, FrameFlags, PrimitiveTopology,
};
use crate::skeleton::{Skeleton, SkeletonInstance};
use crate::utils::{Symbol, interner};

/// Axis-aligned bounding box in node-local space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub center: Vec3,
    pub extents: Vec3,
}

/// One drawable index range of a LOD.
#[derive(Debug, Clone, PartialEq)]
pub struct Subset {
    pub name: String,
    pub start_index: u32,
    pub index_count: u32,
    /// Index into the node's material list.
    pub material_id: u32,
    pub topology: PrimitiveTopology,
}

/// Per-LOD buffers and subsets.
///
/// Buffer ids are issued by the external backend once the model finishes
/// loading; until then they are `None`.
#[derive(Debug, Clone, Default)]
pub struct NodeLod {
    pub vertex_buffer: Option<BufferId>,
    pub index_buffer: Option<BufferId>,
    pub subsets: Vec<Subset>,
}

/// Closed node-kind dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Static,
    Skinned {
        /// Name of the skinned binding registered on the model's skeleton.
        binding: Symbol,
        /// Number of bones the binding packs, i.e. the bone-range size.
        bone_count: u32,
    },
}

/// One node of a model's hierarchy.
#[derive(Debug, Clone)]
pub struct ModelNode {
    pub name: Symbol,
    pub kind: NodeKind,
    /// When set, the node follows this bone's skinning matrix.
    pub attached_bone: Option<Symbol>,
    pub visible: bool,
    pub bounds: Aabb,
    pub lods: Vec<NodeLod>,
    pub active_lod: usize,
    pub materials: SmallVec<[Material; 4]>,
    /// Raw CPU copy of the geometry, shared with emitted draw records.
    pub cpu: Arc<CpuMeshData>,

    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
}

impl ModelNode {
    #[must_use]
    pub fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: interner::intern(name),
            kind,
            attached_bone: None,
            visible: true,
            bounds: Aabb::default(),
            lods: Vec::new(),
            active_lod: 0,
            materials: SmallVec::new(),
            cpu: Arc::new(CpuMeshData::default()),
            parent: None,
            children: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Emits this node's draw records and returns the transform its
    /// children inherit.
    ///
    /// The effective transform starts from the parent matrix, with the
    /// attached bone's current skinning matrix applied first when the node
    /// is bone-attached.
    pub(crate) fn update(
        &self,
        node_index: usize,
        parent_matrix: &Affine3A,
        skeleton: &Skeleton,
        skeleton_instance: Option<&SkeletonInstance>,
        material_instance: &MaterialInstance,
        transform_instance: &mut TransformInstance,
        ring: &Mutex<BoneMatrixRing>,
        ctx: &FrameContext,
        out: &mut FrameDrawList,
    ) -> Affine3A {
        let effective = match (self.attached_bone, skeleton_instance) {
            (Some(bone_name), Some(instance)) => match skeleton.find_bone_sym(bone_name) {
                Some(index) => {
                    *parent_matrix * Affine3A::from_mat4(instance.skinning_matrix(index))
                }
                None => *parent_matrix,
            },
            _ => *parent_matrix,
        };
        let transform = Mat4::from(effective);
        let (prev_transform, prev_bone_range) = transform_instance.previous(node_index, transform);

        let mut bone_range = None;
        if self.visible
            && let Some(lod) = self.lods.get(self.active_lod)
        {
            if let (Some(vertex_buffer), Some(index_buffer)) = (lod.vertex_buffer, lod.index_buffer)
            {
                bone_range = self.pack_bones(skeleton_instance, ring);
                // A skinned node that could not get a bone range this frame
                // emits nothing rather than drawing with stale bones.
                let skinned_without_bones =
                    matches!(self.kind, NodeKind::Skinned { .. }) && bone_range.is_none();
                if !skinned_without_bones {
                    let camera_distance =
                        ctx.camera_position.distance(effective.translation.into());
                    for (subset_index, subset) in lod.subsets.iter().enumerate() {
                        let material = material_instance
                            .resolve(node_index as u32, subset_index as u32)
                            .or_else(|| self.materials.get(subset.material_id as usize).copied());
                        let Some(material) = material else {
                            log::warn!(
                                "node '{}' subset {} references unknown material {}",
                                interner::resolve(self.name),
                                subset_index,
                                subset.material_id
                            );
                            continue;
                        };
                        if !material.visible {
                            continue;
                        }
                        out.records.push(DrawRecord {
                            transform,
                            prev_transform,
                            vertex_buffer,
                            index_buffer,
                            start_index: subset.start_index,
                            index_count: subset.index_count,
                            material: material.name,
                            topology: subset.topology,
                            occlusion: Arc::clone(&self.cpu),
                            camera_distance,
                            bone_range,
                            prev_bone_range,
                        });
                    }
                }
            } else {
                log::warn!(
                    "node '{}' has no buffers for LOD {}, skipping",
                    interner::resolve(self.name),
                    self.active_lod
                );
            }
        }

        if ctx.flags.contains(FrameFlags::DRAW_BOUNDS) {
            out.debug.push(DebugRecord {
                transform,
                center: self.bounds.center,
                extents: self.bounds.extents,
            });
        }

        transform_instance.store(node_index, transform, bone_range);
        effective
    }

    /// Allocates and fills this node's range in the frame bone buffer.
    fn pack_bones(
        &self,
        skeleton_instance: Option<&SkeletonInstance>,
        ring: &Mutex<BoneMatrixRing>,
    ) -> Option<BoneRange> {
        let NodeKind::Skinned {
            binding,
            bone_count,
        } = &self.kind
        else {
            return None;
        };
        let instance = skeleton_instance?;
        let Some(indices) = instance.skinned_bone_indices(*binding) else {
            log::warn!(
                "node '{}' uses unregistered binding '{}'",
                interner::resolve(self.name),
                interner::resolve(*binding)
            );
            return None;
        };

        let mut ring = ring.lock();
        let range = ring.allocate(*bone_count)?;
        for (i, &bone) in indices.iter().take(*bone_count as usize).enumerate() {
            ring.pack(range, i as u32, instance.skinning_matrix(bone));
        }
        Some(range)
    }
}
