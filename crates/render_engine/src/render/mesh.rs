//! CPU-side mesh data
//!
//! A mesh owns its vertex and index arrays plus one or more primitive
//! ranges describing how the index data is drawn. The local-space bounding
//! box is computed from the vertex positions and consumed by culling and
//! batching through the instances that reference the mesh.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Point3, Vec3};
use crate::geometry::Aabb;

slotmap::new_key_type! {
    /// Stable handle to a mesh owned by a render scene
    pub struct MeshKey;
}

/// Topology of a primitive range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// Independent triangles, three indices each
    Triangles,
    /// Independent line segments, two indices each
    Lines,
    /// One point per index
    Points,
}

/// Vertex layout shared by all meshes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Normal in model space
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

impl Vertex {
    /// Create a vertex from position, normal, and texture coordinates
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// One drawable span of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveRange {
    /// Primitive topology
    pub primitive: PrimitiveType,
    /// First index (or vertex, when non-indexed) in the range
    pub base: u32,
    /// Number of indices (or vertices) in the range
    pub count: u32,
    /// Whether the range reads through the index buffer
    pub indexed: bool,
}

/// Geometry shared by any number of mesh instances
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Display name for logs and asset lookups
    pub name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    ranges: Vec<PrimitiveRange>,
    aabb: Aabb,
}

impl Mesh {
    /// Create an indexed triangle mesh with a single primitive range
    pub fn new(name: impl Into<String>, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let aabb = aabb_from_vertices(&vertices);
        let count = indices.len() as u32;
        Self {
            name: name.into(),
            vertices,
            indices,
            ranges: vec![PrimitiveRange {
                primitive: PrimitiveType::Triangles,
                base: 0,
                count,
                indexed: true,
            }],
            aabb,
        }
    }

    /// Create a mesh with explicit primitive ranges
    pub fn with_ranges(
        name: impl Into<String>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        ranges: Vec<PrimitiveRange>,
    ) -> Self {
        let aabb = aabb_from_vertices(&vertices);
        Self {
            name: name.into(),
            vertices,
            indices,
            ranges,
            aabb,
        }
    }

    /// Axis-aligned unit cube centered at the origin, scaled by `half_extent`
    pub fn cube(name: impl Into<String>, half_extent: f32) -> Self {
        let h = half_extent;
        let corners = [
            [-h, -h, -h],
            [h, -h, -h],
            [h, h, -h],
            [-h, h, -h],
            [-h, -h, h],
            [h, -h, h],
            [h, h, h],
            [-h, h, h],
        ];
        let vertices = corners
            .iter()
            .map(|&p| {
                let n = Vec3::new(p[0], p[1], p[2]).normalize();
                Vertex::new(p, [n.x, n.y, n.z], [0.0, 0.0])
            })
            .collect();
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 0, 3, 2, // back
            4, 5, 6, 4, 6, 7, // front
            0, 4, 7, 0, 7, 3, // left
            1, 6, 5, 1, 2, 6, // right
            3, 7, 6, 3, 6, 2, // top
            0, 1, 5, 0, 5, 4, // bottom
        ];
        Self::new(name, vertices, indices)
    }

    /// Vertex array
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Index array
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Drawable primitive ranges
    pub fn ranges(&self) -> &[PrimitiveRange] {
        &self.ranges
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Local-space bounding box enclosing all vertices
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Mutable vertex access for CPU re-transformation of merged geometry
    pub(crate) fn vertices_mut(&mut self) -> &mut [Vertex] {
        &mut self.vertices
    }

    /// Refresh the bounding box after vertex mutation
    pub(crate) fn recompute_aabb(&mut self) {
        self.aabb = aabb_from_vertices(&self.vertices);
    }
}

fn aabb_from_vertices(vertices: &[Vertex]) -> Aabb {
    let Some(first) = vertices.first() else {
        return Aabb::zero();
    };
    let mut min = Point3::new(first.position[0], first.position[1], first.position[2]);
    let mut max = min;
    for vertex in vertices {
        for axis in 0..3 {
            min[axis] = min[axis].min(vertex.position[axis]);
            max[axis] = max[axis].max(vertex.position[axis]);
        }
    }
    Aabb::new(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_aabb_encloses_all_vertices() {
        let mesh = Mesh::cube("box", 1.5);
        assert_relative_eq!(mesh.aabb().min, Point3::new(-1.5, -1.5, -1.5));
        assert_relative_eq!(mesh.aabb().max, Point3::new(1.5, 1.5, 1.5));
    }

    #[test]
    fn test_default_range_covers_all_indices() {
        let mesh = Mesh::cube("box", 1.0);
        assert_eq!(mesh.ranges().len(), 1);
        assert_eq!(mesh.ranges()[0].count, 36);
        assert!(mesh.ranges()[0].indexed);
    }

    #[test]
    fn test_empty_mesh_has_degenerate_aabb() {
        let mesh = Mesh::new("empty", Vec::new(), Vec::new());
        assert_eq!(mesh.aabb().min, mesh.aabb().max);
    }

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }
}
