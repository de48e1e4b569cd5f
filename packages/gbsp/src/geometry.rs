use std::sync::Arc;

use log::debug;
use serde::Serialize;
use tsify::Tsify;

use crate::{ChunkTable, DecodeOptions, Face, GBSPError, Material, MaterialCache, Model, TexInfo, Vec3};

/// A contiguous vertex range drawn with `materials[material_index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Tsify)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub start: usize,
    pub end: usize,
    pub material_index: usize,
}

impl Group {
    pub fn count(&self) -> usize {
        self.end - self.start
    }
}

/// Non-indexed triangle soup for one model: every triangle corner is its own
/// vertex.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub model_index: usize,
    pub world_position: Vec3,
    pub positions: Vec<f32>,
    pub uvs: Vec<f32>,
    pub normals: Vec<f32>,
    pub groups: Vec<Group>,
    pub materials: Vec<Arc<Material>>,
}

impl Mesh {
    pub fn new(model_index: usize) -> Self {
        Mesh {
            name: format!("model_{}", model_index),
            model_index,
            world_position: [0.0; 3],
            positions: vec![],
            uvs: vec![],
            normals: vec![],
            groups: vec![],
            materials: vec![],
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.vertex_count() / 3
    }

    pub fn position(&self, vertex: usize) -> Option<Vec3> {
        let xyz = self.positions.get(vertex * 3..vertex * 3 + 3)?;
        Some([xyz[0], xyz[1], xyz[2]])
    }

    pub fn uv(&self, vertex: usize) -> Option<[f32; 2]> {
        let uv = self.uvs.get(vertex * 2..vertex * 2 + 2)?;
        Some([uv[0], uv[1]])
    }

    /// Axis-aligned `(mins, maxs)` of the vertex buffer.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut corners = self.positions.chunks_exact(3);
        let first = corners.next()?;
        let init = ([first[0], first[1], first[2]], [first[0], first[1], first[2]]);

        Some(corners.fold(init, |(mut mins, mut maxs), xyz| {
            for axis in 0..3 {
                mins[axis] = mins[axis].min(xyz[axis]);
                maxs[axis] = maxs[axis].max(xyz[axis]);
            }
            (mins, maxs)
        }))
    }

    /// Moves every vertex by `offset`.
    pub fn translate(&mut self, offset: Vec3) {
        for xyz in self.positions.chunks_exact_mut(3) {
            xyz[0] += offset[0];
            xyz[1] += offset[1];
            xyz[2] += offset[2];
        }
    }

    fn material_index(&mut self, material: Arc<Material>) -> usize {
        match self.materials.iter().position(|existing| Arc::ptr_eq(existing, &material)) {
            Some(index) => index,
            None => {
                self.materials.push(material);
                self.materials.len() - 1
            }
        }
    }

    fn push_triangle(&mut self, corners: [Vec3; 3], texinfo: &TexInfo, material: &Material) {
        let normal = normalize(cross(sub(corners[1], corners[0]), sub(corners[2], corners[0])));
        for corner in corners {
            let uv = project_uv(corner, texinfo, material.width, material.height);
            self.positions.extend_from_slice(&corner);
            self.uvs.extend_from_slice(&uv);
            self.normals.extend_from_slice(&normal);
        }
    }
}

/// Tracks the material run currently being emitted.
#[derive(Debug, Clone, Copy, PartialEq)]
enum GroupState {
    NoGroupOpen,
    GroupOpen { texture: u32, material_index: usize, start: usize },
}

impl GroupState {
    fn close(self, end: usize, groups: &mut Vec<Group>) {
        if let GroupState::GroupOpen { material_index, start, .. } = self {
            groups.push(Group { start, end, material_index });
        }
    }
}

/// Texture-space coordinates for `position`, normalised by texture size.
pub fn project_uv(position: Vec3, texinfo: &TexInfo, width: u32, height: u32) -> [f32; 2] {
    let tu = dot(position, texinfo.vecs[0]);
    let tv = dot(position, texinfo.vecs[1]);
    let scale_u = 1.0 / texinfo.draw_scale[0];
    let scale_v = 1.0 / texinfo.draw_scale[1];

    [
        (tu * scale_u + texinfo.shift[0]) / width as f32,
        (tv * scale_v + texinfo.shift[1]) / height as f32,
    ]
}

pub struct GeometryBuilder<'a> {
    faces: &'a [Face],
    texinfos: &'a [TexInfo],
    verts: &'a [Vec3],
    vert_index: &'a [u32],
    options: DecodeOptions,
}

impl<'a> GeometryBuilder<'a> {
    pub fn new(chunks: &'a ChunkTable, options: DecodeOptions) -> Result<Self, GBSPError> {
        Ok(GeometryBuilder {
            faces: chunks.faces()?,
            texinfos: chunks.texinfos()?,
            verts: chunks.verts()?,
            vert_index: chunks.vert_index()?,
            options,
        })
    }

    pub fn build_model(&self, model_index: usize, model: &Model, cache: &mut MaterialCache) -> Result<Mesh, GBSPError> {
        let first_face = model.first_face as usize;
        let last_face = first_face.saturating_add(model.num_faces as usize);
        let faces = self.faces.get(first_face..last_face).ok_or(GBSPError::IndexOutOfRange {
            kind: "face",
            index: last_face.saturating_sub(1),
            len: self.faces.len(),
        })?;

        let mut mesh = Mesh::new(model_index);
        let mut state = GroupState::NoGroupOpen;
        let mut polygon = vec![];

        for (face_index, face) in (first_face..).zip(faces) {
            let texinfo = self.texinfos.get(face.tex_info as usize).ok_or(GBSPError::IndexOutOfRange {
                kind: "texinfo",
                index: face.tex_info as usize,
                len: self.texinfos.len(),
            })?;

            if texinfo.is_sky() && self.options.exclude_sky {
                continue;
            }

            if face.num_verts < 3 {
                return Err(GBSPError::DegenerateFace {
                    face: face_index,
                    count: face.num_verts,
                });
            }

            let (next, material) = match state {
                GroupState::GroupOpen { texture, material_index, .. } if texture == texinfo.texture => {
                    (state, Arc::clone(&mesh.materials[material_index]))
                }
                previous => {
                    previous.close(mesh.vertex_count(), &mut mesh.groups);
                    let material = cache.material_for(texinfo.texture)?;
                    let material_index = mesh.material_index(Arc::clone(&material));
                    let next = GroupState::GroupOpen {
                        texture: texinfo.texture,
                        material_index,
                        start: mesh.vertex_count(),
                    };
                    (next, material)
                }
            };
            state = next;

            self.polygon(face, &mut polygon)?;

            // Fan around the first corner: (0, k + 1, k + 2).
            for k in 0..polygon.len() - 2 {
                mesh.push_triangle([polygon[0], polygon[k + 1], polygon[k + 2]], texinfo, &material);
            }
        }

        state.close(mesh.vertex_count(), &mut mesh.groups);

        debug!(
            "model {}: {} faces, {} triangles, {} groups",
            model_index,
            faces.len(),
            mesh.triangle_count(),
            mesh.groups.len()
        );

        Ok(mesh)
    }

    /// Resolves the face's corners through the index table into `polygon`.
    fn polygon(&self, face: &Face, polygon: &mut Vec<Vec3>) -> Result<(), GBSPError> {
        polygon.clear();

        let first_vert = face.first_vert as usize;
        for slot in first_vert..first_vert.saturating_add(face.num_verts as usize) {
            let vert = *self.vert_index.get(slot).ok_or(GBSPError::IndexOutOfRange {
                kind: "vertex index",
                index: slot,
                len: self.vert_index.len(),
            })?;
            let position = self.verts.get(vert as usize).ok_or(GBSPError::IndexOutOfRange {
                kind: "vertex",
                index: vert as usize,
                len: self.verts.len(),
            })?;
            polygon.push(*position);
        }

        Ok(())
    }
}

fn dot(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
}

fn normalize(v: Vec3) -> Vec3 {
    let len = dot(v, v).sqrt();
    if len == 0.0 { v } else { [v[0] / len, v[1] / len, v[2] / len] }
}
