mod chunks;
mod entities;
mod gbsp;
mod geometry;
mod textures;

#[cfg(test)]
mod fixtures;

pub use chunks::{
    CHUNK_HEADER_SIZE, Chunk, ChunkTable, ChunkType, Face, GBSPHeader, Model, Palette, TEXINFO_FLAT, TEXINFO_FULLBRIGHT, TEXINFO_GOURAUD, TEXINFO_LIGHT, TEXINFO_MIRROR, TEXINFO_NO_LIGHTMAP, TEXINFO_SKY,
    TEXINFO_TRANS, TexInfo, Texture, Vec3,
};
pub use entities::{Entities, Entity, MODEL_CLASS, SyntaxError, Warning};
pub use gbsp::{DecodeOptions, ErrorKind, GBSP, GBSPError, Level, MeshData, Meshes};
pub use geometry::{GeometryBuilder, Group, Mesh, project_uv};
pub use textures::{Material, MaterialCache};
