//! In-memory level builders for unit tests.

use crate::Vec3;

pub fn chunk(tag: u32, size: u32, elements: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![];
    buf.extend(tag.to_le_bytes());
    buf.extend(size.to_le_bytes());
    buf.extend(elements.to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

fn records(tag: u32, size: usize, elements: &[Vec<u8>]) -> Vec<u8> {
    let payload = elements.concat();
    chunk(tag, size as u32, elements.len() as u32, &payload)
}

fn floats(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn words(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// Encodes entities in the compiled length-prefixed layout.
pub fn binary_entities(entities: &[&[(&str, &str)]]) -> Vec<u8> {
    let mut buf = vec![];
    for pairs in entities {
        buf.extend((pairs.len() as u32).to_le_bytes());
        for (key, value) in pairs.iter() {
            for string in [key, value] {
                buf.extend((string.len() as u32 + 1).to_le_bytes());
                buf.extend_from_slice(string.as_bytes());
                buf.push(0);
            }
        }
    }
    buf
}

#[derive(Debug, Clone, Copy)]
pub struct TexInfoFixture {
    pub vecs: [Vec3; 2],
    pub shift: [f32; 2],
    pub draw_scale: [f32; 2],
    pub flags: u32,
    pub texture: u32,
}

impl TexInfoFixture {
    pub fn flat(texture: u32) -> Self {
        TexInfoFixture {
            vecs: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            shift: [0.0, 0.0],
            draw_scale: [1.0, 1.0],
            flags: 0,
            texture,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LevelFixture {
    pub palettes: Vec<Vec<[u8; 3]>>,
    /// name, width, height, offset, palette index
    pub textures: Vec<(&'static str, u32, u32, u32, u32)>,
    pub texdata: Vec<u8>,
    pub texinfos: Vec<TexInfoFixture>,
    pub verts: Vec<Vec3>,
    pub vert_index: Vec<u32>,
    /// first vert, vert count, texinfo
    pub faces: Vec<(u32, u32, u32)>,
    /// first face, face count
    pub models: Vec<(u32, u32)>,
    pub entities: Option<Vec<u8>>,
}

impl LevelFixture {
    pub fn gradient_palette() -> Vec<[u8; 3]> {
        (0..256).map(|i| [i as u8, 255 - i as u8, (i / 2) as u8]).collect()
    }

    /// One 2x2 texture, one flat-projected 64x64 quad, one model.
    pub fn quad() -> Self {
        let mut level = LevelFixture {
            palettes: vec![Self::gradient_palette()],
            textures: vec![("stone", 2, 2, 0, 0)],
            texdata: vec![0, 1, 2, 3],
            texinfos: vec![TexInfoFixture::flat(0)],
            ..Default::default()
        };
        level.add_face(&[[0.0, 0.0, 0.0], [0.0, 64.0, 0.0], [64.0, 64.0, 0.0], [64.0, 0.0, 0.0]], 0);
        level.models.push((0, 1));
        level
    }

    /// Appends the polygon's vertices and a face over them, returning the face index.
    pub fn add_face(&mut self, polygon: &[Vec3], texinfo: u32) -> u32 {
        let first_vert = self.vert_index.len() as u32;
        for position in polygon {
            self.vert_index.push(self.verts.len() as u32);
            self.verts.push(*position);
        }
        self.faces.push((first_vert, polygon.len() as u32, texinfo));
        self.faces.len() as u32 - 1
    }

    pub fn add_texture(&mut self, name: &'static str, width: u32, height: u32, pixels: &[u8]) -> u32 {
        self.textures.push((name, width, height, self.texdata.len() as u32, 0));
        self.texdata.extend_from_slice(pixels);
        self.textures.len() as u32 - 1
    }

    /// Chunks are written out of their usual order, with an unknown chunk in
    /// the middle.
    pub fn build(&self) -> Vec<u8> {
        let mut header = b"GBSP\0\0\0\0".to_vec();
        header.extend(15i32.to_le_bytes());
        header.extend([0; 16]);
        let mut buf = chunk(0, header.len() as u32, 1, &header);

        if let Some(entities) = &self.entities {
            buf.extend(chunk(16, 1, entities.len() as u32, entities));
        }

        let models: Vec<Vec<u8>> = self
            .models
            .iter()
            .map(|(first_face, num_faces)| {
                let mut record = vec![0; 44];
                record.extend(words(&[*first_face, *num_faces, 0, 0, 0, 0, 0, 0, 0]));
                record
            })
            .collect();
        buf.extend(records(1, 80, &models));

        let faces: Vec<Vec<u8>> = self
            .faces
            .iter()
            .map(|(first_vert, num_verts, tex_info)| words(&[*first_vert, *num_verts, 0, 0, *tex_info, 0, 0, 0, 0]))
            .collect();
        buf.extend(records(11, 36, &faces));

        buf.extend(chunk(0x7777, 2, 2, &[1, 2, 3, 4]));

        buf.extend(chunk(13, 4, self.vert_index.len() as u32, &words(&self.vert_index)));
        buf.extend(chunk(14, 12, self.verts.len() as u32, &floats(&self.verts.concat())));

        let texinfos: Vec<Vec<u8>> = self
            .texinfos
            .iter()
            .map(|texinfo| {
                let mut record = floats(&texinfo.vecs.concat());
                record.extend(floats(&texinfo.shift));
                record.extend(floats(&texinfo.draw_scale));
                record.extend(texinfo.flags.to_le_bytes());
                record.extend(floats(&[0.0, 1.0, 1.0, 0.0]));
                record.extend(texinfo.texture.to_le_bytes());
                record
            })
            .collect();
        buf.extend(records(17, 64, &texinfos));

        let textures: Vec<Vec<u8>> = self
            .textures
            .iter()
            .map(|(name, width, height, offset, palette)| {
                let mut record = vec![0; 32];
                record[..name.len()].copy_from_slice(name.as_bytes());
                record.extend(words(&[0, *width, *height, *offset, *palette]));
                record
            })
            .collect();
        buf.extend(records(18, 52, &textures));

        buf.extend(chunk(19, 1, self.texdata.len() as u32, &self.texdata));

        if let Some(size) = self.palettes.first().map(|palette| palette.len() * 3) {
            let palettes: Vec<Vec<u8>> = self.palettes.iter().map(|palette| palette.concat()).collect();
            buf.extend(records(23, size, &palettes));
        }

        buf.extend(chunk(0xffff, 0, 0, &[]));
        buf
    }
}
