//! Native binary motion format.
//!
//! Layout (little-endian, strings as `[len: u16][utf8]`):
//!
//! ```text
//! [name][startTime: f][endTime: f][frameInterval: f][boneCount: u32]
//!   { boneName, keyframeCount: u32,
//!     { time: f, scale: 3f, rotation: 4f, position: 3f }* }*
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::{Quat, Vec3};

use crate::errors::{Result, RigError};
use crate::motion::{BoneTrack, Keyframe, Motion};
use crate::utils::interner;

fn write_f32(w: &mut impl Write, v: f32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u32(w: &mut impl Write, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
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
    w.write_all(&(bytes.len() as u16).to_le_bytes())?;
    w.write_all(bytes)?;
    Ok(())
}

fn write_vec3(w: &mut impl Write, v: Vec3) -> Result<()> {
    for c in v.to_array() {
        write_f32(w, c)?;
    }
    Ok(())
}

fn read_f32(r: &mut impl Read) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_str(r: &mut impl Read) -> Result<String> {
    let mut len = [0u8; 2];
    r.read_exact(&mut len)?;
    let mut buf = vec![0u8; u16::from_le_bytes(len) as usize];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn read_vec3(r: &mut impl Read) -> Result<Vec3> {
    Ok(Vec3::new(read_f32(r)?, read_f32(r)?, read_f32(r)?))
}

/// Writes a motion in the native binary layout.
pub fn save(motion: &Motion, w: &mut impl Write) -> Result<()> {
    write_str(w, &motion.name)?;
    write_f32(w, motion.start_time)?;
    write_f32(w, motion.end_time)?;
    write_f32(w, motion.interval)?;

    write_u32(w, motion.tracks().len() as u32)?;
    for track in motion.tracks() {
        write_str(w, interner::resolve(track.bone))?;
        write_u32(w, track.keys.len() as u32)?;
        for key in &track.keys {
            write_f32(w, key.time)?;
            write_vec3(w, key.scale)?;
            for c in key.rotation.to_array() {
                write_f32(w, c)?;
            }
            write_vec3(w, key.position)?;
        }
    }
    Ok(())
}

pub fn save_file(motion: &Motion, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    save(motion, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Reads a motion in the native binary layout.
pub fn load(r: &mut impl Read) -> Result<Motion> {
    let name = read_str(r)?;
    let start_time = read_f32(r)?;
    let end_time = read_f32(r)?;
    let interval = read_f32(r)?;

    let mut motion = Motion::new(name, start_time, end_time, interval);

    let bone_count = read_u32(r)?;
    for _ in 0..bone_count {
        let bone = interner::intern(&read_str(r)?);
        let key_count = read_u32(r)?;
        let mut keys = Vec::with_capacity(key_count as usize);
        for _ in 0..key_count {
            let time = read_f32(r)?;
            let scale = read_vec3(r)?;
            let rotation = Quat::from_xyzw(read_f32(r)?, read_f32(r)?, read_f32(r)?, read_f32(r)?);
            let position = read_vec3(r)?;
            keys.push(Keyframe {
                time,
                scale,
                rotation,
                position,
            });
        }
        motion.add_track(BoneTrack { bone, keys });
    }

    Ok(motion)
}

pub fn load_file(path: impl AsRef<Path>) -> Result<Motion> {
    let mut reader = BufReader::new(File::open(path)?);
    load(&mut reader)
}
