//! Native binary model format.
//!
//! Layout (all scalars little-endian, strings as `[len: u16][utf8]`):
//!
//! ```text
//! [name][pos: 3f][scale: 3f][rot: 4f][nodeCount: u32]
//! per node:
//!   [type: u32][name][parentName][attachedBoneName]
//!   [aabbCenter: 3f][aabbExtents: 3f][visible: bool][subsetCount: u32]
//!     { name, startIndex, indexCount, materialId, primitiveType }*
//!   [vertexCount: u32][raw vertices][indexCount: u32][raw u32 indices]
//!   [materialCount: u32]{ materialName }*
//!   skinned only: [boneCount: u32][boneName]*
//! [hasSkeleton: bool][boneCount: u32]
//!   { boneName, parentBoneName ("NoParent" for roots),
//!     motionOffsetMatrix: 16f, defaultMotionMatrix: 16f }*
//! ```
//!
//! The layout carries no version tag; readers reject unknown node-type tags
//! as [`RigError::MalformedAsset`]. `save` is the exact inverse of `load`
//! and round-trips every field.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::{Mat4, Quat, Vec3};

use crate::assets::loader::{BoneData, ModelData, NodeData, SkeletonData};
use crate::errors::{Result, RigError};
use crate::model::node::Subset;
use crate::model::{Model, NodeKind};
use crate::render::{CpuMeshData, PrimitiveTopology};
use crate::utils::interner;

/// Parent sentinel in the skeleton block.
const NO_PARENT: &str = "NoParent";

const NODE_TYPE_STATIC: u32 = 0;
const NODE_TYPE_SKINNED: u32 = 1;

/// Bytes per vertex: position + uv + normal.
pub const STATIC_VERTEX_STRIDE: u32 = 32;
/// Static layout plus bone weights (3f) and bone indices (4×u16).
pub const SKINNED_VERTEX_STRIDE: u32 = 52;

// ============================================================================
// Primitive readers / writers
// ============================================================================

fn write_u16(w: &mut impl Write, v: u16) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u32(w: &mut impl Write, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f32(w: &mut impl Write, v: f32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_bool(w: &mut impl Write, v: bool) -> Result<()> {
    w.write_all(&[u8::from(v)])?;
    Ok(())
}

fn write_str(w: &mut impl Write, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > usize::from(u16::MAX) {
        return Err(RigError::MalformedAsset(format!(
            "string too long to serialize: {} bytes",
            bytes.len()
        )));
    }
    write_u16(w, bytes.len() as u16)?;
    w.write_all(bytes)?;
    Ok(())
}

fn write_vec3(w: &mut impl Write, v: Vec3) -> Result<()> {
    for c in v.to_array() {
        write_f32(w, c)?;
    }
    Ok(())
}

fn write_quat(w: &mut impl Write, q: Quat) -> Result<()> {
    for c in q.to_array() {
        write_f32(w, c)?;
    }
    Ok(())
}

fn write_mat4(w: &mut impl Write, m: &Mat4) -> Result<()> {
    for c in m.to_cols_array() {
        write_f32(w, c)?;
    }
    Ok(())
}

fn read_u16(r: &mut impl Read) -> Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f32(r: &mut impl Read) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_bool(r: &mut impl Read) -> Result<bool> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0] != 0)
}

fn read_str(r: &mut impl Read) -> Result<String> {
    let len = read_u16(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn read_vec3(r: &mut impl Read) -> Result<Vec3> {
    Ok(Vec3::new(read_f32(r)?, read_f32(r)?, read_f32(r)?))
}

fn read_quat(r: &mut impl Read) -> Result<Quat> {
    Ok(Quat::from_xyzw(
        read_f32(r)?,
        read_f32(r)?,
        read_f32(r)?,
        read_f32(r)?,
    ))
}

fn read_mat4(r: &mut impl Read) -> Result<Mat4> {
    let mut cols = [0.0f32; 16];
    for c in &mut cols {
        *c = read_f32(r)?;
    }
    Ok(Mat4::from_cols_array(&cols))
}

// ============================================================================
// Save
// ============================================================================

/// Writes a model in the native binary layout.
pub fn save(model: &Model, w: &mut impl Write) -> Result<()> {
    write_str(w, &model.name)?;
    write_vec3(w, model.transform.position)?;
    write_vec3(w, model.transform.scale)?;
    write_quat(w, model.transform.rotation)?;

    write_u32(w, model.node_count() as u32)?;
    for node in model.nodes() {
        let (type_tag, binding) = match &node.kind {
            NodeKind::Static => (NODE_TYPE_STATIC, None),
            NodeKind::Skinned { binding, .. } => (NODE_TYPE_SKINNED, Some(*binding)),
        };
        write_u32(w, type_tag)?;
        write_str(w, interner::resolve(node.name))?;
        let parent_name = node
            .parent()
            .and_then(|p| model.node(p))
            .map_or("", |p| interner::resolve(p.name));
        write_str(w, parent_name)?;
        write_str(w, node.attached_bone.map_or("", interner::resolve))?;
        write_vec3(w, node.bounds.center)?;
        write_vec3(w, node.bounds.extents)?;
        write_bool(w, node.visible)?;

        let subsets: &[Subset] = node.lods.first().map_or(&[], |lod| &lod.subsets);
        write_u32(w, subsets.len() as u32)?;
        for subset in subsets {
            write_str(w, &subset.name)?;
            write_u32(w, subset.start_index)?;
            write_u32(w, subset.index_count)?;
            write_u32(w, subset.material_id)?;
            write_u32(w, subset.topology as u32)?;
        }

        write_u32(w, node.cpu.vertex_count())?;
        w.write_all(&node.cpu.vertices)?;
        write_u32(w, node.cpu.indices.len() as u32)?;
        w.write_all(bytemuck::cast_slice(&node.cpu.indices))?;

        write_u32(w, node.materials.len() as u32)?;
        for material in &node.materials {
            write_str(w, interner::resolve(material.name))?;
        }

        if let Some(binding) = binding {
            let bones = model.skeleton().binding(binding).unwrap_or(&[]);
            write_u32(w, bones.len() as u32)?;
            for &bone in bones {
                write_str(w, interner::resolve(bone))?;
            }
        }
    }

    let skeleton = model.skeleton();
    write_bool(w, skeleton.bone_count() > 0)?;
    if skeleton.bone_count() > 0 {
        write_u32(w, skeleton.bone_count() as u32)?;
        for bone in skeleton.bones() {
            write_str(w, interner::resolve(bone.name))?;
            let parent = bone
                .parent_index
                .ne(&crate::skeleton::INVALID_BONE_INDEX)
                .then(|| skeleton.bones()[bone.parent_index as usize].name);
            write_str(w, parent.map_or(NO_PARENT, interner::resolve))?;
            write_mat4(w, &Mat4::from(bone.motion_offset))?;
            write_mat4(w, &Mat4::from(bone.default_motion))?;
        }
    }

    Ok(())
}

/// Saves a model to a file.
pub fn save_file(model: &Model, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    save(model, &mut writer)?;
    writer.flush()?;
    Ok(())
}

// ============================================================================
// Load
// ============================================================================

/// Reads a model in the native binary layout into the thread-safe
/// intermediate representation.
pub fn load(r: &mut impl Read) -> Result<ModelData> {
    let name = read_str(r)?;
    let position = read_vec3(r)?;
    let scale = read_vec3(r)?;
    let rotation = read_quat(r)?;

    let node_count = read_u32(r)?;
    let mut nodes = Vec::with_capacity(node_count as usize);
    for _ in 0..node_count {
        let type_tag = read_u32(r)?;
        let skinned = match type_tag {
            NODE_TYPE_STATIC => false,
            NODE_TYPE_SKINNED => true,
            other => {
                return Err(RigError::MalformedAsset(format!(
                    "unknown node type tag {other}"
                )));
            }
        };

        let node_name = read_str(r)?;
        let parent_name = read_str(r)?;
        let attached_bone = read_str(r)?;
        let aabb_center = read_vec3(r)?;
        let aabb_extents = read_vec3(r)?;
        let visible = read_bool(r)?;

        let subset_count = read_u32(r)?;
        let mut subsets = Vec::with_capacity(subset_count as usize);
        for _ in 0..subset_count {
            let subset_name = read_str(r)?;
            let start_index = read_u32(r)?;
            let index_count = read_u32(r)?;
            let material_id = read_u32(r)?;
            let topology_tag = read_u32(r)?;
            let topology = PrimitiveTopology::from_u32(topology_tag).ok_or_else(|| {
                RigError::MalformedAsset(format!("unknown primitive type {topology_tag}"))
            })?;
            subsets.push(Subset {
                name: subset_name,
                start_index,
                index_count,
                material_id,
                topology,
            });
        }

        let stride = if skinned {
            SKINNED_VERTEX_STRIDE
        } else {
            STATIC_VERTEX_STRIDE
        };
        let vertex_count = read_u32(r)?;
        let mut vertices = vec![0u8; (vertex_count * stride) as usize];
        r.read_exact(&mut vertices)?;

        let index_count = read_u32(r)?;
        let mut index_bytes = vec![0u8; index_count as usize * 4];
        r.read_exact(&mut index_bytes)?;
        // pod_collect copies, so the byte buffer's alignment is irrelevant
        let indices: Vec<u32> = bytemuck::pod_collect_to_vec(&index_bytes);

        let material_count = read_u32(r)?;
        let mut materials = Vec::with_capacity(material_count as usize);
        for _ in 0..material_count {
            materials.push(read_str(r)?);
        }

        let bone_names = if skinned {
            let bone_count = read_u32(r)?;
            let mut bones = Vec::with_capacity(bone_count as usize);
            for _ in 0..bone_count {
                bones.push(read_str(r)?);
            }
            bones
        } else {
            Vec::new()
        };

        nodes.push(NodeData {
            skinned,
            name: node_name,
            parent_name: (!parent_name.is_empty()).then_some(parent_name),
            attached_bone: (!attached_bone.is_empty()).then_some(attached_bone),
            aabb_center,
            aabb_extents,
            visible,
            subsets,
            cpu: CpuMeshData {
                vertex_stride: stride,
                vertices,
                indices,
            },
            materials,
            bone_names,
        });
    }

    let skeleton = if read_bool(r)? {
        let bone_count = read_u32(r)?;
        let mut bones = Vec::with_capacity(bone_count as usize);
        for _ in 0..bone_count {
            let bone_name = read_str(r)?;
            let parent = read_str(r)?;
            let motion_offset = read_mat4(r)?;
            let default_motion = read_mat4(r)?;
            bones.push(BoneData {
                name: bone_name,
                parent: (parent != NO_PARENT).then_some(parent),
                motion_offset,
                default_motion,
            });
        }
        Some(SkeletonData { bones })
    } else {
        None
    };

    Ok(ModelData {
        name,
        position,
        scale,
        rotation,
        nodes,
        skeleton,
    })
}

/// Loads a model file.
pub fn load_file(path: impl AsRef<Path>) -> Result<ModelData> {
    let mut reader = BufReader::new(File::open(path)?);
    load(&mut reader)
}
