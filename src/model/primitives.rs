//! Procedural geometry generator.
//!
//! Seventeen parametric primitive shapes, generated CPU-side as positions,
//! normals, UVs and triangle indices. The loader wraps the result in a
//! single-node static model; callers mostly use these for placeholders,
//! collision proxies and debug stand-ins while real assets stream in.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

/// Generated geometry, one triangle list.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl MeshData {
    fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: Vec2) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
        index
    }

    fn push_tri(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Center and extents of the generated geometry.
    #[must_use]
    pub fn aabb(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for &p in &self.positions {
            min = min.min(p);
            max = max.max(p);
        }
        if self.positions.is_empty() {
            return (Vec3::ZERO, Vec3::ZERO);
        }
        ((min + max) * 0.5, (max - min) * 0.5)
    }
}

/// The closed set of parametric shapes the generator understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProceduralShape {
    Box { extents: Vec3 },
    Quad { size: Vec2 },
    Plane { size: Vec2, segments: [u32; 2] },
    Disc { radius: f32, segments: u32 },
    Sphere { radius: f32, sectors: u32, stacks: u32 },
    GeoSphere { radius: f32, subdivisions: u32 },
    Hemisphere { radius: f32, sectors: u32, stacks: u32 },
    Cylinder { radius: f32, height: f32, sectors: u32 },
    Cone { radius: f32, height: f32, sectors: u32 },
    Capsule { radius: f32, height: f32, sectors: u32, stacks: u32 },
    Tube { inner_radius: f32, outer_radius: f32, height: f32, sectors: u32 },
    Torus { radius: f32, tube_radius: f32, sectors: u32, sides: u32 },
    Pyramid { base: Vec2, height: f32 },
    Wedge { extents: Vec3 },
    Tetrahedron { radius: f32 },
    Octahedron { radius: f32 },
    Icosahedron { radius: f32 },
}

impl ProceduralShape {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Box { .. } => "box",
            Self::Quad { .. } => "quad",
            Self::Plane { .. } => "plane",
            Self::Disc { .. } => "disc",
            Self::Sphere { .. } => "sphere",
            Self::GeoSphere { .. } => "geosphere",
            Self::Hemisphere { .. } => "hemisphere",
            Self::Cylinder { .. } => "cylinder",
            Self::Cone { .. } => "cone",
            Self::Capsule { .. } => "capsule",
            Self::Tube { .. } => "tube",
            Self::Torus { .. } => "torus",
            Self::Pyramid { .. } => "pyramid",
            Self::Wedge { .. } => "wedge",
            Self::Tetrahedron { .. } => "tetrahedron",
            Self::Octahedron { .. } => "octahedron",
            Self::Icosahedron { .. } => "icosahedron",
        }
    }

    #[must_use]
    pub fn generate(&self) -> MeshData {
        match *self {
            Self::Box { extents } => generate_box(extents),
            Self::Quad { size } => generate_quad(size),
            Self::Plane { size, segments } => generate_plane(size, segments),
            Self::Disc { radius, segments } => {
                let mut mesh = MeshData::default();
                add_disc_cap(&mut mesh, 0.0, radius, segments.max(3), true);
                mesh
            }
            Self::Sphere {
                radius,
                sectors,
                stacks,
            } => generate_sphere(radius, sectors.max(3), stacks.max(2)),
            Self::GeoSphere {
                radius,
                subdivisions,
            } => generate_geosphere(radius, subdivisions.min(5)),
            Self::Hemisphere {
                radius,
                sectors,
                stacks,
            } => generate_hemisphere(radius, sectors.max(3), stacks.max(1)),
            Self::Cylinder {
                radius,
                height,
                sectors,
            } => generate_cylinder(radius, height, sectors.max(3)),
            Self::Cone {
                radius,
                height,
                sectors,
            } => generate_cone(radius, height, sectors.max(3)),
            Self::Capsule {
                radius,
                height,
                sectors,
                stacks,
            } => generate_capsule(radius, height, sectors.max(3), stacks.max(1)),
            Self::Tube {
                inner_radius,
                outer_radius,
                height,
                sectors,
            } => generate_tube(inner_radius, outer_radius, height, sectors.max(3)),
            Self::Torus {
                radius,
                tube_radius,
                sectors,
                sides,
            } => generate_torus(radius, tube_radius, sectors.max(3), sides.max(3)),
            Self::Pyramid { base, height } => generate_pyramid(base, height),
            Self::Wedge { extents } => generate_wedge(extents),
            Self::Tetrahedron { radius } => generate_tetrahedron(radius),
            Self::Octahedron { radius } => generate_octahedron(radius),
            Self::Icosahedron { radius } => {
                let (vertices, faces) = icosahedron_data(radius);
                polyhedron(&vertices, &faces)
            }
        }
    }
}

// ============================================================================
// Flat shapes
// ============================================================================

fn add_face(mesh: &mut MeshData, origin: Vec3, u_axis: Vec3, v_axis: Vec3) {
    let normal = u_axis.cross(v_axis).normalize();
    let a = mesh.push_vertex(origin, normal, Vec2::new(0.0, 1.0));
    let b = mesh.push_vertex(origin + u_axis, normal, Vec2::new(1.0, 1.0));
    let c = mesh.push_vertex(origin + u_axis + v_axis, normal, Vec2::new(1.0, 0.0));
    let d = mesh.push_vertex(origin + v_axis, normal, Vec2::new(0.0, 0.0));
    mesh.push_tri(a, b, c);
    mesh.push_tri(a, c, d);
}

fn generate_box(extents: Vec3) -> MeshData {
    let mut mesh = MeshData::default();
    let e = extents;
    // +X, -X, +Y, -Y, +Z, -Z
    add_face(&mut mesh, Vec3::new(e.x, -e.y, e.z), Vec3::new(0.0, 0.0, -2.0 * e.z), Vec3::new(0.0, 2.0 * e.y, 0.0));
    add_face(&mut mesh, Vec3::new(-e.x, -e.y, -e.z), Vec3::new(0.0, 0.0, 2.0 * e.z), Vec3::new(0.0, 2.0 * e.y, 0.0));
    add_face(&mut mesh, Vec3::new(-e.x, e.y, e.z), Vec3::new(2.0 * e.x, 0.0, 0.0), Vec3::new(0.0, 0.0, -2.0 * e.z));
    add_face(&mut mesh, Vec3::new(-e.x, -e.y, -e.z), Vec3::new(2.0 * e.x, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0 * e.z));
    add_face(&mut mesh, Vec3::new(-e.x, -e.y, e.z), Vec3::new(2.0 * e.x, 0.0, 0.0), Vec3::new(0.0, 2.0 * e.y, 0.0));
    add_face(&mut mesh, Vec3::new(e.x, -e.y, -e.z), Vec3::new(-2.0 * e.x, 0.0, 0.0), Vec3::new(0.0, 2.0 * e.y, 0.0));
    mesh
}

fn generate_quad(size: Vec2) -> MeshData {
    let mut mesh = MeshData::default();
    let half = size * 0.5;
    add_face(
        &mut mesh,
        Vec3::new(-half.x, -half.y, 0.0),
        Vec3::new(size.x, 0.0, 0.0),
        Vec3::new(0.0, size.y, 0.0),
    );
    mesh
}

fn generate_plane(size: Vec2, segments: [u32; 2]) -> MeshData {
    let mut mesh = MeshData::default();
    let (sx, sz) = (segments[0].max(1), segments[1].max(1));
    let half = size * 0.5;

    for z in 0..=sz {
        let v = z as f32 / sz as f32;
        for x in 0..=sx {
            let u = x as f32 / sx as f32;
            mesh.push_vertex(
                Vec3::new(-half.x + u * size.x, 0.0, -half.y + v * size.y),
                Vec3::Y,
                Vec2::new(u, v),
            );
        }
    }

    let stride = sx + 1;
    for z in 0..sz {
        for x in 0..sx {
            let v0 = z * stride + x;
            let v1 = v0 + 1;
            let v2 = v0 + stride;
            let v3 = v2 + 1;
            mesh.push_tri(v0, v2, v1);
            mesh.push_tri(v1, v2, v3);
        }
    }
    mesh
}

/// Cap disc at height `y`, winding chosen by `up`.
fn add_disc_cap(mesh: &mut MeshData, y: f32, radius: f32, sectors: u32, up: bool) {
    let normal = if up { Vec3::Y } else { -Vec3::Y };
    let center = mesh.push_vertex(Vec3::new(0.0, y, 0.0), normal, Vec2::splat(0.5));
    let mut ring = Vec::with_capacity(sectors as usize + 1);
    for s in 0..=sectors {
        let phi = s as f32 / sectors as f32 * TAU;
        let (sin, cos) = phi.sin_cos();
        ring.push(mesh.push_vertex(
            Vec3::new(radius * cos, y, radius * sin),
            normal,
            Vec2::new(0.5 + 0.5 * cos, 0.5 + 0.5 * sin),
        ));
    }
    for s in 0..sectors as usize {
        if up {
            mesh.push_tri(center, ring[s + 1], ring[s]);
        } else {
            mesh.push_tri(center, ring[s], ring[s + 1]);
        }
    }
}

// ============================================================================
// Lathe-style shapes
// ============================================================================

fn generate_sphere(radius: f32, sectors: u32, stacks: u32) -> MeshData {
    let mut mesh = MeshData::default();

    for y in 0..=stacks {
        let v = y as f32 / stacks as f32;
        let theta = v * PI;
        let py = -radius * theta.cos();
        let ring_radius = radius * theta.sin();

        for x in 0..=sectors {
            let u = x as f32 / sectors as f32;
            let phi = u * TAU;
            let position = Vec3::new(-ring_radius * phi.cos(), py, ring_radius * phi.sin());
            mesh.push_vertex(position, position / radius, Vec2::new(u, 1.0 - v));
        }
    }

    let stride = sectors + 1;
    for y in 0..stacks {
        for x in 0..sectors {
            let v0 = y * stride + x;
            let v1 = v0 + 1;
            let v2 = v0 + stride;
            let v3 = v2 + 1;
            mesh.push_tri(v0, v1, v2);
            mesh.push_tri(v1, v3, v2);
        }
    }
    mesh
}

fn generate_hemisphere(radius: f32, sectors: u32, stacks: u32) -> MeshData {
    let mut mesh = MeshData::default();

    // Upper half only: theta sweeps [0, PI/2] from the pole down to the rim.
    for y in 0..=stacks {
        let v = y as f32 / stacks as f32;
        let theta = v * PI * 0.5;
        let py = radius * theta.cos();
        let ring_radius = radius * theta.sin();

        for x in 0..=sectors {
            let u = x as f32 / sectors as f32;
            let phi = u * TAU;
            let position = Vec3::new(ring_radius * phi.cos(), py, ring_radius * phi.sin());
            mesh.push_vertex(position, position / radius, Vec2::new(u, v));
        }
    }

    let stride = sectors + 1;
    for y in 0..stacks {
        for x in 0..sectors {
            let v0 = y * stride + x;
            let v1 = v0 + 1;
            let v2 = v0 + stride;
            let v3 = v2 + 1;
            mesh.push_tri(v0, v2, v1);
            mesh.push_tri(v1, v2, v3);
        }
    }

    add_disc_cap(&mut mesh, 0.0, radius, sectors, false);
    mesh
}

/// Open side wall between two rings, outward normals.
fn add_wall(mesh: &mut MeshData, bottom: f32, top: f32, r_bottom: f32, r_top: f32, sectors: u32) {
    let slope = (r_bottom - r_top) / (top - bottom).max(1e-6);
    let base = mesh.vertex_count() as u32;
    for (y, r) in [(bottom, r_bottom), (top, r_top)] {
        let v = if (top - bottom).abs() > 1e-6 {
            (y - bottom) / (top - bottom)
        } else {
            0.0
        };
        for s in 0..=sectors {
            let u = s as f32 / sectors as f32;
            let phi = u * TAU;
            let (sin, cos) = phi.sin_cos();
            let normal = Vec3::new(cos, slope, sin).normalize();
            mesh.push_vertex(Vec3::new(r * cos, y, r * sin), normal, Vec2::new(u, 1.0 - v));
        }
    }
    let stride = sectors + 1;
    for s in 0..sectors {
        let v0 = base + s;
        let v1 = v0 + 1;
        let v2 = v0 + stride;
        let v3 = v2 + 1;
        mesh.push_tri(v0, v2, v1);
        mesh.push_tri(v1, v2, v3);
    }
}

fn generate_cylinder(radius: f32, height: f32, sectors: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let half = height * 0.5;
    add_wall(&mut mesh, -half, half, radius, radius, sectors);
    add_disc_cap(&mut mesh, half, radius, sectors, true);
    add_disc_cap(&mut mesh, -half, radius, sectors, false);
    mesh
}

fn generate_cone(radius: f32, height: f32, sectors: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let half = height * 0.5;
    add_wall(&mut mesh, -half, half, radius, 0.0, sectors);
    add_disc_cap(&mut mesh, -half, radius, sectors, false);
    mesh
}

fn generate_capsule(radius: f32, height: f32, sectors: u32, stacks: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let half = height * 0.5;

    // One continuous profile: top cap rings, then bottom cap rings; the
    // gap between the two rim rings stitches into the cylinder wall.
    let mut rings: u32 = 0;
    for y in 0..=stacks {
        let theta = y as f32 / stacks as f32 * PI * 0.5;
        push_capsule_ring(&mut mesh, radius, half, theta, true, sectors);
        rings += 1;
    }
    for y in 0..=stacks {
        let theta = (1.0 - y as f32 / stacks as f32) * PI * 0.5;
        push_capsule_ring(&mut mesh, radius, half, theta, false, sectors);
        rings += 1;
    }

    let stride = sectors + 1;
    for ring in 0..rings - 1 {
        for s in 0..sectors {
            let v0 = ring * stride + s;
            let v1 = v0 + 1;
            let v2 = v0 + stride;
            let v3 = v2 + 1;
            mesh.push_tri(v0, v2, v1);
            mesh.push_tri(v1, v2, v3);
        }
    }
    mesh
}

fn push_capsule_ring(mesh: &mut MeshData, radius: f32, half: f32, theta: f32, top: bool, sectors: u32) {
    let (ring_radius, offset) = (radius * theta.sin(), radius * theta.cos());
    let y = if top { half + offset } else { -half - offset };
    let ny = if top { offset } else { -offset };
    for s in 0..=sectors {
        let u = s as f32 / sectors as f32;
        let phi = u * TAU;
        let (sin, cos) = phi.sin_cos();
        let normal = Vec3::new(ring_radius * cos, ny, ring_radius * sin).normalize_or(Vec3::Y);
        mesh.push_vertex(
            Vec3::new(ring_radius * cos, y, ring_radius * sin),
            normal,
            Vec2::new(u, (y + half + radius) / (2.0 * (half + radius))),
        );
    }
}

fn generate_tube(inner_radius: f32, outer_radius: f32, height: f32, sectors: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let half = height * 0.5;

    // Outer wall, then inner wall with flipped winding/normals.
    add_wall(&mut mesh, -half, half, outer_radius, outer_radius, sectors);
    let inner_base = mesh.vertex_count() as u32;
    add_wall(&mut mesh, -half, half, inner_radius, inner_radius, sectors);
    for i in inner_base as usize..mesh.normals.len() {
        mesh.normals[i] = -mesh.normals[i];
    }
    let inner_tri_start = mesh.indices.len() - (sectors as usize * 6);
    for tri in mesh.indices[inner_tri_start..].chunks_exact_mut(3) {
        tri.swap(1, 2);
    }

    // Ring caps
    for (y, up) in [(half, true), (-half, false)] {
        let base = mesh.vertex_count() as u32;
        let normal = if up { Vec3::Y } else { -Vec3::Y };
        for s in 0..=sectors {
            let phi = s as f32 / sectors as f32 * TAU;
            let (sin, cos) = phi.sin_cos();
            mesh.push_vertex(Vec3::new(outer_radius * cos, y, outer_radius * sin), normal, Vec2::new(1.0, 0.0));
            mesh.push_vertex(Vec3::new(inner_radius * cos, y, inner_radius * sin), normal, Vec2::new(0.0, 0.0));
        }
        for s in 0..sectors {
            let v0 = base + s * 2;
            let (v1, v2, v3) = (v0 + 1, v0 + 2, v0 + 3);
            if up {
                mesh.push_tri(v0, v2, v1);
                mesh.push_tri(v1, v2, v3);
            } else {
                mesh.push_tri(v0, v1, v2);
                mesh.push_tri(v1, v3, v2);
            }
        }
    }
    mesh
}

fn generate_torus(radius: f32, tube_radius: f32, sectors: u32, sides: u32) -> MeshData {
    let mut mesh = MeshData::default();

    for s in 0..=sectors {
        let u = s as f32 / sectors as f32;
        let phi = u * TAU;
        let (sin_phi, cos_phi) = phi.sin_cos();
        let center = Vec3::new(radius * cos_phi, 0.0, radius * sin_phi);

        for t in 0..=sides {
            let v = t as f32 / sides as f32;
            let theta = v * TAU;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let normal = Vec3::new(cos_phi * cos_theta, sin_theta, sin_phi * cos_theta);
            mesh.push_vertex(center + normal * tube_radius, normal, Vec2::new(u, v));
        }
    }

    let stride = sides + 1;
    for s in 0..sectors {
        for t in 0..sides {
            let v0 = s * stride + t;
            let v1 = v0 + 1;
            let v2 = v0 + stride;
            let v3 = v2 + 1;
            mesh.push_tri(v0, v2, v1);
            mesh.push_tri(v1, v2, v3);
        }
    }
    mesh
}

// ============================================================================
// Faceted shapes
// ============================================================================

fn generate_pyramid(base: Vec2, height: f32) -> MeshData {
    let half = base * 0.5;
    let apex = Vec3::new(0.0, height, 0.0);
    let corners = [
        Vec3::new(-half.x, 0.0, -half.y),
        Vec3::new(half.x, 0.0, -half.y),
        Vec3::new(half.x, 0.0, half.y),
        Vec3::new(-half.x, 0.0, half.y),
    ];

    let mut mesh = MeshData::default();
    for i in 0..4 {
        push_flat_tri(&mut mesh, corners[i], corners[(i + 1) % 4], apex);
    }
    // Base
    add_face(
        &mut mesh,
        Vec3::new(-half.x, 0.0, -half.y),
        Vec3::new(0.0, 0.0, base.y),
        Vec3::new(base.x, 0.0, 0.0),
    );
    mesh
}

fn generate_wedge(extents: Vec3) -> MeshData {
    let e = extents;
    // Right-triangular prism: the slope runs from the +Z bottom edge up to
    // the -Z top edge.
    let mut mesh = MeshData::default();
    // Bottom
    add_face(&mut mesh, Vec3::new(-e.x, -e.y, -e.z), Vec3::new(2.0 * e.x, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0 * e.z));
    // Back (vertical)
    add_face(&mut mesh, Vec3::new(e.x, -e.y, -e.z), Vec3::new(-2.0 * e.x, 0.0, 0.0), Vec3::new(0.0, 2.0 * e.y, 0.0));
    // Slope
    add_face(&mut mesh, Vec3::new(-e.x, -e.y, e.z), Vec3::new(2.0 * e.x, 0.0, 0.0), Vec3::new(0.0, 2.0 * e.y, -2.0 * e.z));
    // Triangular sides
    push_flat_tri(&mut mesh, Vec3::new(-e.x, -e.y, -e.z), Vec3::new(-e.x, -e.y, e.z), Vec3::new(-e.x, e.y, -e.z));
    push_flat_tri(&mut mesh, Vec3::new(e.x, -e.y, e.z), Vec3::new(e.x, -e.y, -e.z), Vec3::new(e.x, e.y, -e.z));
    mesh
}

fn push_flat_tri(mesh: &mut MeshData, a: Vec3, b: Vec3, c: Vec3) {
    let normal = (b - a).cross(c - a).normalize_or(Vec3::Y);
    let ia = mesh.push_vertex(a, normal, Vec2::new(0.0, 1.0));
    let ib = mesh.push_vertex(b, normal, Vec2::new(1.0, 1.0));
    let ic = mesh.push_vertex(c, normal, Vec2::new(0.5, 0.0));
    mesh.push_tri(ia, ib, ic);
}

/// Flat-shaded polyhedron from a vertex table and face list.
fn polyhedron(vertices: &[Vec3], faces: &[[usize; 3]]) -> MeshData {
    let mut mesh = MeshData::default();
    for face in faces {
        push_flat_tri(&mut mesh, vertices[face[0]], vertices[face[1]], vertices[face[2]]);
    }
    mesh
}

fn generate_tetrahedron(radius: f32) -> MeshData {
    let a = radius / 3.0_f32.sqrt();
    let vertices = [
        Vec3::new(a, a, a),
        Vec3::new(a, -a, -a),
        Vec3::new(-a, a, -a),
        Vec3::new(-a, -a, a),
    ];
    let faces = [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];
    polyhedron(&vertices, &faces)
}

fn generate_octahedron(radius: f32) -> MeshData {
    let vertices = [
        Vec3::new(radius, 0.0, 0.0),
        Vec3::new(-radius, 0.0, 0.0),
        Vec3::new(0.0, radius, 0.0),
        Vec3::new(0.0, -radius, 0.0),
        Vec3::new(0.0, 0.0, radius),
        Vec3::new(0.0, 0.0, -radius),
    ];
    let faces = [
        [0, 2, 4],
        [0, 4, 3],
        [0, 3, 5],
        [0, 5, 2],
        [1, 4, 2],
        [1, 3, 4],
        [1, 5, 3],
        [1, 2, 5],
    ];
    polyhedron(&vertices, &faces)
}

fn icosahedron_data(radius: f32) -> (Vec<Vec3>, Vec<[usize; 3]>) {
    // Golden-ratio construction
    let t = (1.0 + 5.0_f32.sqrt()) * 0.5;
    let raw = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ];
    let vertices = raw.iter().map(|v| v.normalize() * radius).collect();
    let faces = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];
    (vertices, faces)
}

fn generate_geosphere(radius: f32, subdivisions: u32) -> MeshData {
    let (mut vertices, mut faces) = icosahedron_data(radius);

    for _ in 0..subdivisions {
        let mut midpoints: rustc_hash::FxHashMap<(usize, usize), usize> =
            rustc_hash::FxHashMap::default();
        let mut next = Vec::with_capacity(faces.len() * 4);

        let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Vec3>| {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let m = ((vertices[a] + vertices[b]) * 0.5).normalize() * radius;
                vertices.push(m);
                vertices.len() - 1
            })
        };

        for [a, b, c] in &faces {
            let (a, b, c) = (*a, *b, *c);
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            next.push([a, ab, ca]);
            next.push([b, bc, ab]);
            next.push([c, ca, bc]);
            next.push([ab, bc, ca]);
        }
        faces = next;
    }

    // Smooth shading: shared vertices, spherical UVs.
    let mut mesh = MeshData::default();
    for &v in &vertices {
        let normal = v / radius;
        let uv = Vec2::new(
            0.5 + normal.z.atan2(normal.x) / TAU,
            0.5 - normal.y.asin() / PI,
        );
        mesh.push_vertex(v, normal, uv);
    }
    for [a, b, c] in &faces {
        mesh.push_tri(*a as u32, *b as u32, *c as u32);
    }
    mesh
}
