use glam::{Vec2, Vec3};

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { position: position.to_array(), normal: normal.to_array(), uv: uv.to_array() }
    }

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshTopology {
    Triangles,
    Lines,
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub topology: MeshTopology,
    pub bounds: MeshBounds,
}

#[derive(Clone, Copy, Debug)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

/// Flat material model: enough for solid shading, wireframe overrides and
/// unlit helper lines.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub base_color: [f32; 4],
    pub wireframe: bool,
    pub unlit: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self { base_color: [0.8, 0.8, 0.82, 1.0], wireframe: false, unlit: false }
    }
}

impl Material {
    pub fn solid(color: Vec3) -> Self {
        Self { base_color: [color.x, color.y, color.z, 1.0], ..Self::default() }
    }

    pub fn line(color: Vec3) -> Self {
        Self { base_color: [color.x, color.y, color.z, 1.0], wireframe: false, unlit: true }
    }

    pub fn wireframe_override(color: Vec3) -> Self {
        Self { base_color: [color.x, color.y, color.z, 1.0], wireframe: true, unlit: true }
    }
}

impl Mesh {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        let bounds = MeshBounds::from_vertices(&vertices);
        Self { vertices, indices, topology: MeshTopology::Triangles, bounds }
    }

    pub fn lines(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        let bounds = MeshBounds::from_vertices(&vertices);
        Self { vertices, indices, topology: MeshTopology::Lines, bounds }
    }

    pub fn cube(size: f32) -> Self {
        let hs = size * 0.5;
        let positions = [
            Vec3::new(-hs, -hs, -hs),
            Vec3::new(hs, -hs, -hs),
            Vec3::new(hs, hs, -hs),
            Vec3::new(-hs, hs, -hs),
            Vec3::new(-hs, -hs, hs),
            Vec3::new(hs, -hs, hs),
            Vec3::new(hs, hs, hs),
            Vec3::new(-hs, hs, hs),
        ];
        let normals = [
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
        ];

        let uv_quad = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
        let mut vertices = Vec::with_capacity(24);
        let mut write_face = |indices: [usize; 4], normal: Vec3| {
            for (i, &index) in indices.iter().enumerate() {
                vertices.push(MeshVertex::new(positions[index], normal, uv_quad[i]));
            }
        };

        write_face([0, 3, 2, 1], normals[0]); // back
        write_face([4, 5, 6, 7], normals[1]); // front
        write_face([0, 4, 7, 3], normals[2]); // left
        write_face([1, 2, 6, 5], normals[3]); // right
        write_face([3, 7, 6, 2], normals[4]); // top
        write_face([0, 1, 5, 4], normals[5]); // bottom

        let mut indices = Vec::with_capacity(36);
        for face in 0..6u32 {
            let base = face * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(vertices, indices)
    }

    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut vertices = Vec::new();
        for ring in 0..=rings {
            let v = ring as f32 / rings as f32;
            let phi = v * std::f32::consts::PI;
            for segment in 0..=segments {
                let u = segment as f32 / segments as f32;
                let theta = u * std::f32::consts::TAU;
                let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                vertices.push(MeshVertex::new(normal * radius, normal, Vec2::new(u, v)));
            }
        }
        let stride = segments + 1;
        let mut indices = Vec::new();
        for ring in 0..rings {
            for segment in 0..segments {
                let a = ring * stride + segment;
                let b = a + stride;
                indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }
        Self::new(vertices, indices)
    }

    /// Horizontal quad in the XZ plane, facing up.
    pub fn plane(size: f32) -> Self {
        let hs = size * 0.5;
        let vertices = vec![
            MeshVertex::new(Vec3::new(-hs, 0.0, -hs), Vec3::Y, Vec2::new(0.0, 0.0)),
            MeshVertex::new(Vec3::new(hs, 0.0, -hs), Vec3::Y, Vec2::new(1.0, 0.0)),
            MeshVertex::new(Vec3::new(hs, 0.0, hs), Vec3::Y, Vec2::new(1.0, 1.0)),
            MeshVertex::new(Vec3::new(-hs, 0.0, hs), Vec3::Y, Vec2::new(0.0, 1.0)),
        ];
        Self::new(vertices, vec![0, 2, 1, 0, 3, 2])
    }

    /// One axis segment from the origin along `direction`; the composition
    /// layer adds one per axis with its own color.
    pub fn axis_segment(direction: Vec3, length: f32) -> Self {
        let vertices = vec![
            MeshVertex::new(Vec3::ZERO, Vec3::Y, Vec2::ZERO),
            MeshVertex::new(direction * length, Vec3::Y, Vec2::ZERO),
        ];
        Self::lines(vertices, vec![0, 1])
    }

    /// Square line grid in the XZ plane centered on the origin.
    pub fn grid_lines(size: f32, divisions: u32) -> Self {
        let divisions = divisions.max(1);
        let half = size * 0.5;
        let step = size / divisions as f32;
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for i in 0..=divisions {
            let offset = -half + i as f32 * step;
            let base = vertices.len() as u32;
            vertices.push(MeshVertex::new(Vec3::new(offset, 0.0, -half), Vec3::Y, Vec2::ZERO));
            vertices.push(MeshVertex::new(Vec3::new(offset, 0.0, half), Vec3::Y, Vec2::ZERO));
            vertices.push(MeshVertex::new(Vec3::new(-half, 0.0, offset), Vec3::Y, Vec2::ZERO));
            vertices.push(MeshVertex::new(Vec3::new(half, 0.0, offset), Vec3::Y, Vec2::ZERO));
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 3]);
        }
        Self::lines(vertices, indices)
    }

    /// Line-list index buffer over the triangle edges, used for wireframe
    /// override draws.
    pub fn edge_indices(&self) -> Vec<u32> {
        let mut edges = Vec::with_capacity(self.indices.len() * 2);
        for tri in self.indices.chunks_exact(3) {
            edges.extend_from_slice(&[tri[0], tri[1], tri[1], tri[2], tri[2], tri[0]]);
        }
        edges
    }
}

pub fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks(3) {
        if tri.len() < 3 {
            continue;
        }
        let i0 = tri[0] as usize;
        let i1 = tri[1] as usize;
        let i2 = tri[2] as usize;
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }
        let a = positions[i0];
        let b = positions[i1];
        let c = positions[i2];
        let normal = (b - a).cross(c - a);
        if normal.length_squared() > 0.0 {
            normals[i0] += normal;
            normals[i1] += normal;
            normals[i2] += normal;
        }
    }
    for normal in &mut normals {
        if normal.length_squared() > 0.0 {
            *normal = normal.normalize();
        } else {
            *normal = Vec3::Y;
        }
    }
    normals
}

impl MeshBounds {
    pub fn from_vertices(vertices: &[MeshVertex]) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for vertex in vertices {
            let pos = Vec3::from_array(vertex.position);
            min = min.min(pos);
            max = max.max(pos);
        }
        if vertices.is_empty() {
            return MeshBounds { min: Vec3::ZERO, max: Vec3::ZERO, center: Vec3::ZERO, radius: 0.0 };
        }
        let center = (min + max) * 0.5;
        let mut radius: f32 = 0.0;
        for vertex in vertices {
            let pos = Vec3::from_array(vertex.position);
            radius = radius.max((pos - center).length());
        }
        MeshBounds { min, max, center, radius }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_bounds_match_size() {
        let mesh = Mesh::cube(2.0);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert!((mesh.bounds.min - Vec3::splat(-1.0)).length() < 1e-6);
        assert!((mesh.bounds.max - Vec3::splat(1.0)).length() < 1e-6);
    }

    #[test]
    fn computed_normals_face_outward_for_ccw_triangle() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let normals = compute_normals(&positions, &[0, 1, 2]);
        for normal in normals {
            assert!((normal - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn edge_indices_triple_the_triangle_count() {
        let mesh = Mesh::cube(1.0);
        let edges = mesh.edge_indices();
        assert_eq!(edges.len(), mesh.indices.len() * 2);
    }
}
