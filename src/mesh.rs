use crate::{
    error::{IsosurfaceError, Result},
    types::{Point, Value, Vector},
    utils::{PointBuckets, find, union},
};

/// Triangle mesh produced by the grid polygonizers.
///
/// Fresh from a polygonizer every triangle owns its three vertices; vertices are only
/// shared once [`weld`](IsoMesh::weld) has run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IsoMesh {
    /// Vertex positions.
    pub vertices: Vec<Point>,

    /// Triangle index triples into `vertices`: `[[v0, v1, v2], ...]`
    pub faces: Vec<[usize; 3]>,

    /// Per-vertex unit normals. Either empty or the same length as `vertices`.
    pub normals: Vec<Vector>,
}

impl IsoMesh {
    /// Creates an empty mesh with no vertices, triangles, or normals.
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Concatenates meshes in order, offsetting face indices.
    pub fn join(parts: impl IntoIterator<Item = IsoMesh>) -> Self {
        let mut joined = Self::new_empty();
        for part in parts {
            joined.append(part);
        }
        joined
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.vertices.is_empty()
    }

    /// Adds a triangle defined by three vertex indices.
    ///
    /// Returns [`IsosurfaceError::InvalidFace`] if any index is out of bounds.
    pub fn triangle_from_verts(&mut self, a: usize, b: usize, c: usize) -> Result<()> {
        if let Some(&vertex) = [a, b, c].iter().find(|&&v| v >= self.vertices.len()) {
            return Err(IsosurfaceError::InvalidFace {
                face: self.faces.len(),
                vertex,
            });
        }
        self.faces.push([a, b, c]);
        Ok(())
    }

    /// Appends a triangle with three new vertices of its own.
    #[inline]
    pub fn push_triangle(&mut self, corners: [Point; 3]) {
        let first = self.vertices.len();
        self.vertices.extend(corners);
        self.faces.push([first, first + 1, first + 2]);
    }

    /// Moves `other` onto the end of this mesh. Normals are dropped unless both sides
    /// have them.
    pub fn append(&mut self, mut other: IsoMesh) {
        let offset = self.vertices.len();
        let keep_normals = (self.normals.len() == self.vertices.len())
            && (other.normals.len() == other.vertices.len());
        self.vertices.append(&mut other.vertices);
        self.faces
            .extend(other.faces.iter().map(|f| f.map(|v| v + offset)));
        if keep_normals {
            self.normals.append(&mut other.normals);
        } else {
            self.normals.clear();
        }
    }

    /// Returns the three vertex positions of triangle `tri`.
    pub fn tri_coords(&self, tri: usize) -> [Point; 3] {
        self.faces[tri].map(|v| self.vertices[v])
    }

    /// Non-normalized face normal; its length is twice the triangle's area.
    fn tri_cross(&self, tri: usize) -> Vector {
        let [a, b, c] = self.tri_coords(tri);
        (b - a).cross(&(c - a))
    }

    /// Computes the unit face normal for triangle `tri`.
    ///
    /// Returns the zero vector if the triangle is degenerate.
    pub fn tri_normal(&self, tri: usize) -> Vector {
        self.tri_cross(tri)
            .try_normalize(0.0)
            .unwrap_or_else(Vector::zeros)
    }

    pub fn tri_area(&self, tri: usize) -> Value {
        self.tri_cross(tri).norm() * 0.5
    }

    /// Total surface area.
    pub fn area(&self) -> Value {
        (0..self.faces.len()).map(|t| self.tri_area(t)).sum()
    }

    /// Volume enclosed by a closed mesh, positive when faces wind outwards.
    ///
    /// Accumulated in `f64`; small meshes of large coordinates lose too much otherwise.
    pub fn signed_volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| {
                let [a, b, c] = f.map(|v| self.vertices[v].coords.cast::<f64>());
                a.dot(&b.cross(&c)) / 6.0
            })
            .sum()
    }

    /// Merges vertices that lie within `tolerance` of each other and rewrites faces to
    /// match. Returns how many vertices were removed.
    ///
    /// Vertices are grouped transitively: two vertices end up merged when a chain of
    /// vertices, each within `tolerance` of the next, links them. Each group collapses
    /// onto its lowest-indexed member, whose position is kept as is, so surviving
    /// vertices never move. Afterwards any two vertices are more than `tolerance`
    /// apart, which makes a second pass a no-op. A zero tolerance merges only identical
    /// positions.
    pub fn weld(&mut self, tolerance: Value) -> usize {
        let count = self.vertices.len();
        let mut parent: Vec<usize> = (0..count).collect();
        let mut buckets = PointBuckets::new(tolerance);

        for (i, p) in self.vertices.iter().enumerate() {
            for candidate in buckets.candidates(p) {
                if nalgebra::distance(p, &self.vertices[candidate]) <= tolerance {
                    union(&mut parent, i, candidate);
                }
            }
            buckets.insert(p, i);
        }

        // Roots are the lowest index of their group, so they are met before any member.
        let mut remap = vec![0; count];
        let mut vertices = Vec::with_capacity(count);
        let mut normals = Vec::new();
        let keep_normals = self.normals.len() == count;
        for i in 0..count {
            let root = find(&mut parent, i);
            if root == i {
                remap[i] = vertices.len();
                vertices.push(self.vertices[i]);
                if keep_normals {
                    normals.push(self.normals[i]);
                }
            } else {
                remap[i] = remap[root];
            }
        }

        for face in &mut self.faces {
            *face = face.map(|v| remap[v]);
        }
        let removed = count - vertices.len();
        self.vertices = vertices;
        self.normals = normals;
        removed
    }

    /// Removes faces that reuse a vertex or have exactly zero area. Returns how many
    /// faces were removed.
    ///
    /// Run after [`weld`](Self::weld), a face with two corners within the tolerance
    /// already reuses a vertex. Thin faces with corners farther apart than that are
    /// kept, since removing one would open the surface.
    pub fn cull_degenerate_faces(&mut self) -> usize {
        let before = self.faces.len();
        let vertices = &self.vertices;
        self.faces.retain(|&[a, b, c]| {
            a != b
                && b != c
                && a != c
                && (vertices[b] - vertices[a])
                    .cross(&(vertices[c] - vertices[a]))
                    .norm_squared()
                    > 0.0
        });
        before - self.faces.len()
    }

    /// Drops vertices no face refers to, keeping the order of the rest.
    pub fn compact(&mut self) -> usize {
        let mut used = vec![false; self.vertices.len()];
        for &v in self.faces.iter().flatten() {
            used[v] = true;
        }
        let keep_normals = self.normals.len() == self.vertices.len();

        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut next = 0;
        for (i, &is_used) in used.iter().enumerate() {
            if is_used {
                remap[i] = next;
                self.vertices[next] = self.vertices[i];
                if keep_normals {
                    self.normals[next] = self.normals[i];
                }
                next += 1;
            }
        }
        let removed = self.vertices.len() - next;
        self.vertices.truncate(next);
        if keep_normals {
            self.normals.truncate(next);
        }
        for face in &mut self.faces {
            *face = face.map(|v| remap[v]);
        }
        removed
    }

    /// Computes per-vertex normals from the mesh alone: each vertex gets the
    /// area-weighted average of the normals of the faces around it.
    ///
    /// Replaces any previously stored normals. Isolated vertices get the zero vector.
    pub fn create_normals(&mut self) {
        let mut normals = vec![Vector::zeros(); self.vertices.len()];
        for tri in 0..self.faces.len() {
            let weighted = self.tri_cross(tri);
            for v in self.faces[tri] {
                normals[v] += weighted;
            }
        }
        for n in &mut normals {
            *n = n.try_normalize(0.0).unwrap_or_else(Vector::zeros);
        }
        self.normals = normals;
    }

    /// Edges used by exactly one face. Empty for a closed, manifold mesh.
    pub fn boundary_edges(&self) -> Vec<[usize; 2]> {
        let mut counts = std::collections::HashMap::new();
        for &[a, b, c] in &self.faces {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *counts.entry([u.min(v), u.max(v)]).or_insert(0usize) += 1;
            }
        }
        let mut boundary: Vec<[usize; 2]> = counts
            .into_iter()
            .filter(|&(_, n)| n == 1)
            .map(|(edge, _)| edge)
            .collect();
        boundary.sort_unstable();
        boundary
    }
}
