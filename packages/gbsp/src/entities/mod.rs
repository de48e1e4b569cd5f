use std::collections::{HashMap, HashSet};

use bincode::error::DecodeError;
use log::warn;
use serde::Serialize;
use thiserror::Error;
use tokeniser::{Token, Tokeniser};
use tsify::Tsify;

use crate::{Mesh, Vec3, chunks::config};

mod tokeniser;

pub const CLASSNAME: &str = "classname";
pub const NAME: &str = "%name%";
pub const MODEL_CLASS: &str = "%Model%";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Tsify)]
pub struct Entity {
    pub classname: String,
    pub name: String,
    pub properties: HashMap<String, String>,
}

impl Entity {
    /// Later values for the same key replace earlier ones.
    pub fn insert(&mut self, key: String, value: String) {
        match key.as_str() {
            CLASSNAME => self.classname = value,
            NAME => self.name = value,
            _ => {
                self.properties.insert(key, value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            CLASSNAME => Some(&self.classname),
            NAME => Some(&self.name),
            _ => self.properties.get(key).map(String::as_str),
        }
    }

    /// The `origin` property, three whitespace-separated numbers.
    pub fn origin(&self) -> Option<Vec3> {
        let mut parts = self.get("origin")?.split_whitespace().map(|part| part.parse::<f32>().ok());
        let origin = [parts.next()??, parts.next()??, parts.next()??];
        parts.next().is_none().then_some(origin)
    }

    pub fn model_index(&self) -> Option<usize> {
        self.get("Model")?.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct Entities(pub Vec<Entity>);

#[derive(Debug, Error)]
#[error("{:#?}", self)]
pub enum SyntaxError {
    UnexpectedToken(String),
    UnexpectedEnd,
    TruncatedRecord { offset: usize },
}

/// A `%Model%` placement that could not be applied. Decoding carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Warning {
    #[error("entity {entity:?}: model {model:?} does not name one of the {models} models")]
    UnresolvedModel { entity: String, model: String, models: usize },

    #[error("entity {entity:?}: origin {origin:?} is not three numbers")]
    InvalidOrigin { entity: String, origin: String },

    #[error("entity {entity:?}: model {model} was already placed")]
    AlreadyPlaced { entity: String, model: usize },
}

impl Entities {
    /// Parses ENTDATA, either the compiled length-prefixed records or `{ "key" "value" }` text.
    /// A leading `{` alone does not mean text: a binary pair count can start
    /// with that byte too, so the binary layout is tried first.
    pub fn new(buf: &[u8]) -> Result<Self, SyntaxError> {
        match Entities::from_binary(buf) {
            Ok(entities) => Ok(entities),
            Err(err) => match buf.iter().copied().find(|byte| !byte.is_ascii_whitespace()) {
                Some(b'{') => Entities::from_text(&String::from_utf8_lossy(buf)),
                _ => Err(err),
            },
        }
    }

    pub fn from_text(str: &str) -> Result<Self, SyntaxError> {
        let mut tokens = Tokeniser::new(str);
        let mut entities = vec![];

        loop {
            let mut entity = Entity::default();
            let mut pairs = 0;

            match tokens.next() {
                Some(Token::OpeningBrace) => loop {
                    match tokens.next().ok_or(SyntaxError::UnexpectedEnd)? {
                        Token::String(key) => {
                            let value = match tokens.next().ok_or(SyntaxError::UnexpectedEnd)? {
                                Token::String(value) => value,
                                token => Err(SyntaxError::UnexpectedToken(format!("{:?}", token)))?,
                            };

                            entity.insert(key, value);
                            pairs += 1;
                        }
                        Token::ClosingBrace => break,
                        token => Err(SyntaxError::UnexpectedToken(format!("{:?}", token)))?,
                    };
                },
                Some(Token::Eof) => break,
                None => break,
                Some(token) => Err(SyntaxError::UnexpectedToken(format!("{:?}", token)))?,
            };

            if pairs > 0 {
                entities.push(entity);
            }
        }

        Ok(Entities(entities))
    }

    /// Each record is a pair count followed by that many length-prefixed,
    /// NUL-terminated key and value strings.
    pub fn from_binary(buf: &[u8]) -> Result<Self, SyntaxError> {
        let mut reader = RecordReader { buf, offset: 0 };
        let mut entities = vec![];

        while reader.offset < buf.len() {
            let pairs = reader.u32()?;
            let mut entity = Entity::default();

            for _ in 0..pairs {
                let key = reader.string()?;
                let value = reader.string()?;
                entity.insert(key, value);
            }

            if pairs > 0 {
                entities.push(entity);
            }
        }

        Ok(Entities(entities))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.iter()
    }

    pub fn by_class<'a>(&'a self, classname: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.0.iter().filter(move |entity| entity.classname == classname)
    }

    /// Binds `%Model%` entities to their meshes: the mesh takes the entity's
    /// name and world position, and its vertices are shifted by `-origin` so
    /// the origin becomes the mesh's pivot.
    pub fn place_submodels(&self, meshes: &mut [Mesh]) -> Vec<Warning> {
        let mut warnings = vec![];
        let mut placed = HashSet::new();

        for entity in self.by_class(MODEL_CLASS) {
            let Some(index) = entity.model_index().filter(|index| *index < meshes.len()) else {
                warnings.push(Warning::UnresolvedModel {
                    entity: entity.name.clone(),
                    model: entity.get("Model").unwrap_or_default().to_string(),
                    models: meshes.len(),
                });
                continue;
            };

            let Some(origin) = entity.origin() else {
                warnings.push(Warning::InvalidOrigin {
                    entity: entity.name.clone(),
                    origin: entity.get("origin").unwrap_or_default().to_string(),
                });
                continue;
            };

            if !placed.insert(index) {
                warnings.push(Warning::AlreadyPlaced {
                    entity: entity.name.clone(),
                    model: index,
                });
                continue;
            }

            let mesh = &mut meshes[index];
            mesh.name = entity.name.clone();
            mesh.world_position = origin;
            mesh.translate([-origin[0], -origin[1], -origin[2]]);
        }

        for warning in &warnings {
            warn!("{}", warning);
        }

        warnings
    }
}

struct RecordReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl RecordReader<'_> {
    fn u32(&mut self) -> Result<u32, SyntaxError> {
        let offset = self.offset;
        let truncated = |_: DecodeError| SyntaxError::TruncatedRecord { offset };
        let (value, read): (u32, usize) = bincode::decode_from_slice(&self.buf[self.offset..], config()).map_err(truncated)?;
        self.offset += read;
        Ok(value)
    }

    fn string(&mut self) -> Result<String, SyntaxError> {
        let len = self.u32()? as usize;
        let bytes = self
            .buf
            .get(self.offset..self.offset.saturating_add(len))
            .ok_or(SyntaxError::TruncatedRecord { offset: self.offset })?;
        self.offset += len;

        let end = bytes.iter().position(|byte| *byte == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}
