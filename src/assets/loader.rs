//! Load dispatch and the importer boundary.
//!
//! Loading strategies form a closed set: three external importers (FBX,
//! OBJ, XPS — supplied by the embedding application through the
//! [`ModelImporter`] trait), the engine's native binary format, and the
//! procedural primitive generator. All five produce the same thread-safe
//! [`ModelData`] intermediate, which the resource manager applies to the
//! pooled `Model` on the main thread when it drains the completion queue.

use std::path::PathBuf;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Mat4, Quat, Vec3};

use crate::errors::{Result, RigError};
use crate::model::node::{Aabb, ModelNode, NodeKind, NodeLod, Subset};
use crate::model::primitives::ProceduralShape;
use crate::model::{Material, Model};
use crate::render::{CpuMeshData, PrimitiveTopology};
use crate::utils::interner;

#[cfg(not(target_arch = "wasm32"))]
use std::sync::OnceLock;
#[cfg(not(target_arch = "wasm32"))]
use tokio::runtime::Runtime;

/// Process-wide runtime the background loads run on.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn load_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| Runtime::new().expect("Failed to create asset loader runtime"))
}

// ============================================================================
// Vertex layouts
// ============================================================================

/// Vertex layout of static nodes: position, uv, normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct StaticVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

/// Static layout plus three bone weights and four bone indices. The fourth
/// weight is implied by the first three summing to one.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    pub bone_weights: [f32; 3],
    pub bone_indices: [u16; 4],
}

// ============================================================================
// Load specification — closed five-way dispatch
// ============================================================================

/// What to load a model from.
#[derive(Debug, Clone)]
pub enum LoadSpec {
    Fbx(PathBuf),
    Obj(PathBuf),
    Xps(PathBuf),
    /// Engine-native binary format.
    Native(PathBuf),
    /// Parametric primitive generator.
    Procedural(ProceduralShape),
}

/// Boundary trait for the external file-format importers.
///
/// Implementations parse the file and hand back the intermediate data; the
/// parsing internals stay outside this crate.
pub trait ModelImporter: Send + Sync {
    fn import(&self, path: &std::path::Path) -> Result<ModelData>;
}

/// External importer slots.
#[derive(Clone, Default)]
pub struct ImporterRegistry {
    fbx: Option<Arc<dyn ModelImporter>>,
    obj: Option<Arc<dyn ModelImporter>>,
    xps: Option<Arc<dyn ModelImporter>>,
}

impl ImporterRegistry {
    pub fn set_fbx(&mut self, importer: Arc<dyn ModelImporter>) {
        self.fbx = Some(importer);
    }

    pub fn set_obj(&mut self, importer: Arc<dyn ModelImporter>) {
        self.obj = Some(importer);
    }

    pub fn set_xps(&mut self, importer: Arc<dyn ModelImporter>) {
        self.xps = Some(importer);
    }

    /// Runs one load strategy to completion.
    pub fn dispatch(&self, spec: &LoadSpec) -> Result<ModelData> {
        match spec {
            LoadSpec::Fbx(path) => Self::import_with(self.fbx.as_deref(), "FBX", path),
            LoadSpec::Obj(path) => Self::import_with(self.obj.as_deref(), "OBJ", path),
            LoadSpec::Xps(path) => Self::import_with(self.xps.as_deref(), "XPS", path),
            LoadSpec::Native(path) => crate::assets::model_file::load_file(path),
            LoadSpec::Procedural(shape) => Ok(procedural_model_data(*shape)),
        }
    }

    fn import_with(
        importer: Option<&dyn ModelImporter>,
        format: &str,
        path: &std::path::Path,
    ) -> Result<ModelData> {
        importer
            .ok_or_else(|| RigError::ImporterMissing(format.to_string()))?
            .import(path)
    }
}

// ============================================================================
// Thread-safe intermediate representation
// ============================================================================

/// One node of the intermediate model.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub skinned: bool,
    pub name: String,
    pub parent_name: Option<String>,
    pub attached_bone: Option<String>,
    pub aabb_center: Vec3,
    pub aabb_extents: Vec3,
    pub visible: bool,
    pub subsets: Vec<Subset>,
    pub cpu: CpuMeshData,
    pub materials: Vec<String>,
    /// Skinned nodes: ordered bone names of the node's skinned binding.
    pub bone_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<String>,
    pub motion_offset: Mat4,
    pub default_motion: Mat4,
}

#[derive(Debug, Clone, Default)]
pub struct SkeletonData {
    pub bones: Vec<BoneData>,
}

/// Everything a finished load produced. Pure data, `Send`, no handles —
/// instantiated into the pooled `Model` on the main thread.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub name: String,
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: Quat,
    pub nodes: Vec<NodeData>,
    pub skeleton: Option<SkeletonData>,
}

/// Builds a single-node static model from a generated primitive.
#[must_use]
pub fn procedural_model_data(shape: ProceduralShape) -> ModelData {
    let mesh = shape.generate();
    let (aabb_center, aabb_extents) = mesh.aabb();

    let vertices: Vec<StaticVertex> = mesh
        .positions
        .iter()
        .zip(&mesh.uvs)
        .zip(&mesh.normals)
        .map(|((position, uv), normal)| StaticVertex {
            position: position.to_array(),
            uv: uv.to_array(),
            normal: normal.to_array(),
        })
        .collect();

    let index_count = mesh.indices.len() as u32;
    let node = NodeData {
        skinned: false,
        name: shape.name().to_string(),
        parent_name: None,
        attached_bone: None,
        aabb_center,
        aabb_extents,
        visible: true,
        subsets: vec![Subset {
            name: shape.name().to_string(),
            start_index: 0,
            index_count,
            material_id: 0,
            topology: PrimitiveTopology::TriangleList,
        }],
        cpu: CpuMeshData {
            vertex_stride: std::mem::size_of::<StaticVertex>() as u32,
            vertices: bytemuck::cast_slice(&vertices).to_vec(),
            indices: mesh.indices,
        },
        materials: vec!["default".to_string()],
        bone_names: Vec::new(),
    };

    ModelData {
        name: shape.name().to_string(),
        position: Vec3::ZERO,
        scale: Vec3::ONE,
        rotation: Quat::IDENTITY,
        nodes: vec![node],
        skeleton: None,
    }
}

/// Instantiates loaded data into a pooled model. Main thread only; runs as
/// part of the manager's completion drain.
pub(crate) fn apply_model_data(model: &mut Model, data: ModelData) {
    if !data.name.is_empty() {
        model.name = data.name;
    }
    model.transform.position = data.position;
    model.transform.scale = data.scale;
    model.transform.rotation = data.rotation;
    model.transform.mark_dirty();

    if let Some(skeleton_data) = data.skeleton {
        let skeleton = model.skeleton_mut();
        for bone in skeleton_data.bones {
            skeleton.create_bone(
                &bone.name,
                bone.parent.as_deref(),
                Affine3A::from_mat4(bone.motion_offset),
                Affine3A::from_mat4(bone.default_motion),
            );
        }
    }

    for node_data in data.nodes {
        let kind = if node_data.skinned {
            let bone_names: Vec<_> = node_data
                .bone_names
                .iter()
                .map(|n| interner::intern(n))
                .collect();
            let bone_count = bone_names.len() as u32;
            let binding = interner::intern(&node_data.name);
            model
                .skeleton_mut()
                .register_binding(&node_data.name, bone_names);
            NodeKind::Skinned {
                binding,
                bone_count,
            }
        } else {
            NodeKind::Static
        };

        let mut node = ModelNode::new(&node_data.name, kind);
        node.attached_bone = node_data.attached_bone.as_deref().map(interner::intern);
        node.visible = node_data.visible;
        node.bounds = Aabb {
            center: node_data.aabb_center,
            extents: node_data.aabb_extents,
        };
        node.lods.push(NodeLod {
            vertex_buffer: None,
            index_buffer: None,
            subsets: node_data.subsets,
        });
        node.materials = node_data
            .materials
            .iter()
            .map(|name| Material::new(interner::intern(name)))
            .collect();
        node.cpu = Arc::new(node_data.cpu);

        model.add_node(node, node_data.parent_name.as_deref());
    }
}
