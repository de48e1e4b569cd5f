use std::collections::HashMap;

use bincode::{Decode, config::Config};
use log::{debug, trace};

use crate::GBSPError;

/// Every chunk starts with `type`, `size` (bytes per element) and `elements`.
pub const CHUNK_HEADER_SIZE: usize = 12;

pub const TEXINFO_MIRROR: u32 = 1 << 0;
pub const TEXINFO_FULLBRIGHT: u32 = 1 << 1;
pub const TEXINFO_SKY: u32 = 1 << 2;
pub const TEXINFO_LIGHT: u32 = 1 << 3;
pub const TEXINFO_TRANS: u32 = 1 << 4;
pub const TEXINFO_GOURAUD: u32 = 1 << 5;
pub const TEXINFO_FLAT: u32 = 1 << 6;
pub const TEXINFO_NO_LIGHTMAP: u32 = 1 << 15;

pub type Vec3 = [f32; 3];

pub(crate) fn config() -> impl Config {
    bincode::config::standard().with_fixed_int_encoding()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    Header,
    Models,
    Nodes,
    BNodes,
    Leafs,
    Clusters,
    Areas,
    AreaPortals,
    LeafSides,
    Portals,
    Planes,
    Faces,
    LeafFaces,
    VertIndex,
    Verts,
    RGBVerts,
    EntData,
    TexInfos,
    Textures,
    TexData,
    LightData,
    VisData,
    SkyData,
    Palettes,
    Motions,
    End,
}

impl ChunkType {
    pub fn from_tag(tag: u32) -> Option<ChunkType> {
        match tag {
            0 => Some(ChunkType::Header),
            1 => Some(ChunkType::Models),
            2 => Some(ChunkType::Nodes),
            3 => Some(ChunkType::BNodes),
            4 => Some(ChunkType::Leafs),
            5 => Some(ChunkType::Clusters),
            6 => Some(ChunkType::Areas),
            7 => Some(ChunkType::AreaPortals),
            8 => Some(ChunkType::LeafSides),
            9 => Some(ChunkType::Portals),
            10 => Some(ChunkType::Planes),
            11 => Some(ChunkType::Faces),
            12 => Some(ChunkType::LeafFaces),
            13 => Some(ChunkType::VertIndex),
            14 => Some(ChunkType::Verts),
            15 => Some(ChunkType::RGBVerts),
            16 => Some(ChunkType::EntData),
            17 => Some(ChunkType::TexInfos),
            18 => Some(ChunkType::Textures),
            19 => Some(ChunkType::TexData),
            20 => Some(ChunkType::LightData),
            21 => Some(ChunkType::VisData),
            22 => Some(ChunkType::SkyData),
            23 => Some(ChunkType::Palettes),
            24 => Some(ChunkType::Motions),
            0xffff => Some(ChunkType::End),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Decode)]
struct ChunkHeader {
    tag: u32,
    size: u32,
    elements: u32,
}

#[derive(Debug, Clone, Copy, Decode)]
pub struct GBSPHeader {
    pub tag: [u8; 4],
    _padding: [u8; 4],
    pub version: i32,
}

impl GBSPHeader {
    const SIZE: usize = 12;
}

#[derive(Debug, Clone, Copy, Decode)]
pub struct Model {
    pub root_node: [i32; 2],
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub first_face: u32,
    pub num_faces: u32,
    pub first_leaf: u32,
    pub num_leafs: u32,
    pub first_cluster: u32,
    pub num_clusters: u32,
    pub areas: [i32; 2],
    _motion: u32,
}

impl Model {
    const SIZE: usize = 80;
}

#[derive(Debug, Clone, Copy, Decode)]
pub struct Face {
    pub first_vert: u32,
    pub num_verts: u32,
    pub plane_num: i32,
    pub plane_side: i32,
    pub tex_info: u32,
    pub light_ofs: i32,
    pub l_width: i32,
    pub l_height: i32,
    pub l_types: [u8; 4],
}

impl Face {
    const SIZE: usize = 36;
}

#[derive(Debug, Clone, Copy, Decode)]
pub struct TexInfo {
    pub vecs: [Vec3; 2],
    pub shift: [f32; 2],
    pub draw_scale: [f32; 2],
    pub flags: u32,
    pub face_light: f32,
    pub reflective_scale: f32,
    pub alpha: f32,
    pub mip_map_bias: f32,
    pub texture: u32,
}

impl TexInfo {
    const SIZE: usize = 64;

    pub fn is_sky(&self) -> bool {
        self.flags & TEXINFO_SKY != 0
    }
}

#[derive(Debug, Clone, Copy, Decode)]
pub struct Texture {
    pub name: [u8; 32],
    pub flags: u32,
    pub width: u32,
    pub height: u32,
    pub offset: u32,
    pub palette_index: u32,
}

impl Texture {
    const SIZE: usize = 52;

    pub fn name(&self) -> String {
        let end = self.name.iter().position(|byte| *byte == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// One palette; 256 entries in every shipped level.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette(pub Vec<[u8; 3]>);

#[derive(Debug)]
pub enum Chunk {
    Header(GBSPHeader),
    Palettes(Vec<Palette>),
    TexInfos(Vec<TexInfo>),
    Textures(Vec<Texture>),
    TexData(Vec<u8>),
    Models(Vec<Model>),
    Faces(Vec<Face>),
    Verts(Vec<Vec3>),
    VertIndex(Vec<u32>),
    EntData(Vec<u8>),
}

impl Chunk {
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            Chunk::Header(_) => ChunkType::Header,
            Chunk::Palettes(_) => ChunkType::Palettes,
            Chunk::TexInfos(_) => ChunkType::TexInfos,
            Chunk::Textures(_) => ChunkType::Textures,
            Chunk::TexData(_) => ChunkType::TexData,
            Chunk::Models(_) => ChunkType::Models,
            Chunk::Faces(_) => ChunkType::Faces,
            Chunk::Verts(_) => ChunkType::Verts,
            Chunk::VertIndex(_) => ChunkType::VertIndex,
            Chunk::EntData(_) => ChunkType::EntData,
        }
    }
}

/// The decoded chunks of one level, keyed by type. A type that appears twice
/// keeps the later chunk.
#[derive(Debug, Default)]
pub struct ChunkTable {
    chunks: HashMap<ChunkType, Chunk>,
}

macro_rules! required_chunk {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Result<&[$ty], GBSPError> {
            match self.chunks.get(&ChunkType::$variant) {
                Some(Chunk::$variant(elements)) => Ok(elements),
                _ => Err(GBSPError::MissingChunk(ChunkType::$variant)),
            }
        }
    };
}

impl ChunkTable {
    pub fn read(buf: &[u8]) -> Result<ChunkTable, GBSPError> {
        let mut table = ChunkTable::default();
        let mut offset = 0;

        while offset < buf.len() {
            let remaining = buf.len() - offset;
            if remaining < CHUNK_HEADER_SIZE {
                return Err(GBSPError::TruncatedChunk {
                    offset,
                    declared: CHUNK_HEADER_SIZE as u64,
                    remaining,
                });
            }

            let (header, _): (ChunkHeader, usize) = bincode::decode_from_slice(&buf[offset..], config())?;
            offset += CHUNK_HEADER_SIZE;

            let declared = header.size as u64 * header.elements as u64;
            let remaining = buf.len() - offset;
            if declared > remaining as u64 {
                return Err(GBSPError::TruncatedChunk { offset, declared, remaining });
            }

            let payload = &buf[offset..offset + declared as usize];
            offset += declared as usize;

            match ChunkType::from_tag(header.tag) {
                Some(ChunkType::End) => break,
                Some(chunk_type) => match decode_chunk(chunk_type, header, payload)? {
                    Some(chunk) => {
                        debug!("{:?}: {} x {} bytes", chunk_type, header.elements, header.size);
                        table.insert(chunk);
                    }
                    None => trace!("skipping {:?} ({} bytes)", chunk_type, declared),
                },
                None => trace!("skipping unknown chunk {:#x} ({} bytes)", header.tag, declared),
            }
        }

        Ok(table)
    }

    pub fn insert(&mut self, chunk: Chunk) {
        self.chunks.insert(chunk.chunk_type(), chunk);
    }

    pub fn get(&self, chunk_type: ChunkType) -> Option<&Chunk> {
        self.chunks.get(&chunk_type)
    }

    pub fn contains(&self, chunk_type: ChunkType) -> bool {
        self.chunks.contains_key(&chunk_type)
    }

    pub fn header(&self) -> Option<&GBSPHeader> {
        match self.chunks.get(&ChunkType::Header) {
            Some(Chunk::Header(header)) => Some(header),
            _ => None,
        }
    }

    required_chunk!(palettes, Palettes, Palette);
    required_chunk!(texinfos, TexInfos, TexInfo);
    required_chunk!(textures, Textures, Texture);
    required_chunk!(texdata, TexData, u8);
    required_chunk!(models, Models, Model);
    required_chunk!(faces, Faces, Face);
    required_chunk!(verts, Verts, Vec3);
    required_chunk!(vert_index, VertIndex, u32);
    required_chunk!(entdata, EntData, u8);
}

fn decode_chunk(chunk_type: ChunkType, header: ChunkHeader, payload: &[u8]) -> Result<Option<Chunk>, GBSPError> {
    let chunk = match chunk_type {
        ChunkType::Header => {
            check_size(chunk_type, header, GBSPHeader::SIZE)?;
            let (gbsp_header, _): (GBSPHeader, usize) = bincode::decode_from_slice(payload, config())?;
            if &gbsp_header.tag != b"GBSP" {
                return Err(GBSPError::Signature(gbsp_header.tag));
            }
            Chunk::Header(gbsp_header)
        }
        ChunkType::Palettes if header.elements == 0 => Chunk::Palettes(vec![]),
        ChunkType::Palettes => {
            if header.size == 0 || header.size % 3 != 0 {
                return Err(GBSPError::RecordSize {
                    chunk: chunk_type,
                    expected: 768,
                    found: header.size,
                });
            }
            Chunk::Palettes(
                payload
                    .chunks_exact(header.size as usize)
                    .map(|palette| Palette(palette.chunks_exact(3).map(|rgb| [rgb[0], rgb[1], rgb[2]]).collect()))
                    .collect(),
            )
        }
        ChunkType::TexInfos => Chunk::TexInfos(decode_records(chunk_type, header, payload, TexInfo::SIZE)?),
        ChunkType::Textures => Chunk::Textures(decode_records(chunk_type, header, payload, Texture::SIZE)?),
        ChunkType::TexData => Chunk::TexData(payload.to_vec()),
        ChunkType::Models => Chunk::Models(decode_records(chunk_type, header, payload, Model::SIZE)?),
        ChunkType::Faces => Chunk::Faces(decode_records(chunk_type, header, payload, Face::SIZE)?),
        ChunkType::Verts => Chunk::Verts(decode_records(chunk_type, header, payload, 12)?),
        ChunkType::VertIndex => Chunk::VertIndex(decode_records(chunk_type, header, payload, 4)?),
        ChunkType::EntData => Chunk::EntData(payload.to_vec()),
        _ => return Ok(None),
    };

    Ok(Some(chunk))
}

fn check_size(chunk_type: ChunkType, header: ChunkHeader, record_size: usize) -> Result<(), GBSPError> {
    if header.elements > 0 && (header.size as usize) < record_size {
        return Err(GBSPError::RecordSize {
            chunk: chunk_type,
            expected: record_size,
            found: header.size,
        });
    }
    Ok(())
}

/// Decodes fixed-size records; bytes past `record_size` in each element are ignored.
fn decode_records<T: Decode<()>>(chunk_type: ChunkType, header: ChunkHeader, payload: &[u8], record_size: usize) -> Result<Vec<T>, GBSPError> {
    if header.elements == 0 {
        return Ok(vec![]);
    }
    check_size(chunk_type, header, record_size)?;

    payload
        .chunks_exact(header.size as usize)
        .map(|element| -> Result<T, GBSPError> { Ok(bincode::decode_from_slice::<T, _>(element, config())?.0) })
        .collect()
}
