use std::sync::Arc;

use bincode::error::DecodeError;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tsify::Tsify;
use wasm_bindgen::{JsError, JsValue, prelude::wasm_bindgen};

use crate::{ChunkTable, ChunkType, Entities, GBSPHeader, GeometryBuilder, Group, Material, MaterialCache, Mesh, entities::SyntaxError, entities::Warning};

#[derive(Debug, Error)]
#[error("{:#?}", self)]
pub enum GBSPError {
    #[error(transparent)]
    DecodeError(#[from] DecodeError),

    TruncatedChunk { offset: usize, declared: u64, remaining: usize },
    RecordSize { chunk: ChunkType, expected: usize, found: u32 },
    Signature([u8; 4]),
    MissingChunk(ChunkType),
    IndexOutOfRange { kind: &'static str, index: usize, len: usize },
    TextureDataOutOfRange { texture: u32, offset: usize, needed: u64, available: usize },
    PixelOutOfRange { texture: u32, value: u8, entries: usize },
    DegenerateFace { face: usize, count: u32 },

    #[error(transparent)]
    Entities(#[from] SyntaxError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes contradict the chunk format.
    MalformedInput,
    /// A chunk the operation needs is absent.
    MissingRequiredData,
}

impl GBSPError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GBSPError::MissingChunk(_) => ErrorKind::MissingRequiredData,
            _ => ErrorKind::MalformedInput,
        }
    }
}

impl From<GBSPError> for JsValue {
    fn from(value: GBSPError) -> Self {
        JsValue::from(JsError::new(&format!("{:?}", value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DecodeOptions {
    pub exclude_sky: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions { exclude_sky: true }
    }
}

#[derive(Debug, Clone)]
pub struct Level {
    pub header: Option<GBSPHeader>,
    pub meshes: Vec<Mesh>,
    pub entities: Entities,
    /// Every material referenced by a mesh, ordered by texture index.
    pub materials: Vec<Arc<Material>>,
    pub warnings: Vec<Warning>,
}

impl Level {
    pub fn decode(buf: &[u8], options: DecodeOptions) -> Result<Level, GBSPError> {
        let chunks = ChunkTable::read(buf)?;
        let models = chunks.models()?;
        let geometry = GeometryBuilder::new(&chunks, options)?;
        let mut cache = MaterialCache::new(&chunks);

        let mut meshes = models
            .iter()
            .enumerate()
            .map(|(index, model)| geometry.build_model(index, model, &mut cache))
            .collect::<Result<Vec<Mesh>, GBSPError>>()?;

        let entities = match chunks.entdata() {
            Ok(entdata) => Entities::new(entdata)?,
            Err(_) => Entities::default(),
        };
        let warnings = entities.place_submodels(&mut meshes);

        debug!("decoded {} models, {} materials, {} entities", meshes.len(), cache.len(), entities.len());

        Ok(Level {
            header: chunks.header().copied(),
            meshes,
            entities,
            materials: cache.into_materials(),
            warnings,
        })
    }

    /// Model 0, the static world geometry.
    pub fn world(&self) -> Option<&Mesh> {
        self.meshes.first()
    }

    pub fn material(&self, texture_index: u32) -> Option<&Arc<Material>> {
        self.materials
            .binary_search_by_key(&texture_index, |material| material.texture_index)
            .ok()
            .map(|index| &self.materials[index])
    }
}

/// A mesh as handed to JavaScript; materials are referenced by texture index.
#[derive(Debug, Clone, Serialize, Tsify)]
#[serde(rename_all = "camelCase")]
pub struct MeshData {
    pub name: String,
    pub model_index: usize,
    pub world_position: [f32; 3],
    pub positions: Vec<f32>,
    pub uvs: Vec<f32>,
    pub normals: Vec<f32>,
    pub groups: Vec<Group>,
    pub materials: Vec<u32>,
}

impl From<&Mesh> for MeshData {
    fn from(mesh: &Mesh) -> Self {
        MeshData {
            name: mesh.name.clone(),
            model_index: mesh.model_index,
            world_position: mesh.world_position,
            positions: mesh.positions.clone(),
            uvs: mesh.uvs.clone(),
            normals: mesh.normals.clone(),
            groups: mesh.groups.clone(),
            materials: mesh.materials.iter().map(|material| material.texture_index).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct Meshes(pub Vec<MeshData>);

#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct GBSP {
    level: Level,
}

impl GBSP {
    pub fn new(buf: &[u8], options: DecodeOptions) -> Result<GBSP, GBSPError> {
        Ok(GBSP { level: Level::decode(buf, options)? })
    }

    /// Parses ENTDATA alone; geometry and texture chunks may be absent.
    pub fn entities_only(buf: &[u8]) -> Result<Entities, GBSPError> {
        let chunks = ChunkTable::read(buf)?;
        Ok(Entities::new(chunks.entdata()?)?)
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn into_level(self) -> Level {
        self.level
    }
}

#[wasm_bindgen]
impl GBSP {
    #[wasm_bindgen(constructor)]
    pub fn load(buf: &[u8], exclude_sky: Option<bool>) -> Result<GBSP, GBSPError> {
        let options = DecodeOptions {
            exclude_sky: exclude_sky.unwrap_or(true),
        };
        GBSP::new(buf, options)
    }

    #[wasm_bindgen(js_name = "entitiesOnly")]
    pub fn load_entities(buf: &[u8]) -> Result<Entities, GBSPError> {
        GBSP::entities_only(buf)
    }

    #[wasm_bindgen(getter = modelCount)]
    pub fn model_count(&self) -> usize {
        self.level.meshes.len()
    }

    #[wasm_bindgen(getter)]
    pub fn version(&self) -> Option<i32> {
        self.level.header.map(|header| header.version)
    }

    #[wasm_bindgen]
    pub fn entities(&self) -> Entities {
        self.level.entities.clone()
    }

    #[wasm_bindgen]
    pub fn meshes(&self) -> Meshes {
        Meshes(self.level.meshes.iter().map(MeshData::from).collect())
    }

    #[wasm_bindgen(js_name = "textureIndices")]
    pub fn texture_indices(&self) -> Vec<u32> {
        self.level.materials.iter().map(|material| material.texture_index).collect()
    }

    #[wasm_bindgen]
    pub fn warnings(&self) -> Vec<String> {
        self.level.warnings.iter().map(ToString::to_string).collect()
    }
}
