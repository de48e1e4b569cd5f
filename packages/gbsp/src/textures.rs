use std::{collections::HashMap, sync::Arc};

use log::debug;

use crate::{ChunkTable, GBSPError, Palette, Texture};

/// An RGB texture rebuilt from indexed pixels and its palette.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub texture_index: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Row-major RGB, `width * height * 3` bytes.
    pub pixels: Vec<u8>,
}

/// Builds each material at most once per decode. Texture chunks are looked up
/// lazily so a level whose models draw nothing never needs them.
#[derive(Debug)]
pub struct MaterialCache<'a> {
    chunks: &'a ChunkTable,
    materials: HashMap<u32, Arc<Material>>,
}

impl<'a> MaterialCache<'a> {
    pub fn new(chunks: &'a ChunkTable) -> Self {
        MaterialCache {
            chunks,
            materials: HashMap::new(),
        }
    }

    pub fn material_for(&mut self, texture_index: u32) -> Result<Arc<Material>, GBSPError> {
        if let Some(material) = self.materials.get(&texture_index) {
            return Ok(Arc::clone(material));
        }

        let material = Arc::new(self.build(texture_index)?);
        debug!("built material {} {:?} ({}x{})", texture_index, material.name, material.width, material.height);
        self.materials.insert(texture_index, Arc::clone(&material));

        Ok(material)
    }

    pub fn texture(&self, texture_index: u32) -> Result<&'a Texture, GBSPError> {
        let textures = self.chunks.textures()?;
        textures.get(texture_index as usize).ok_or(GBSPError::IndexOutOfRange {
            kind: "texture",
            index: texture_index as usize,
            len: textures.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Every material built so far, ordered by texture index.
    pub fn into_materials(self) -> Vec<Arc<Material>> {
        let mut materials: Vec<Arc<Material>> = self.materials.into_values().collect();
        materials.sort_by_key(|material| material.texture_index);
        materials
    }

    fn build(&self, texture_index: u32) -> Result<Material, GBSPError> {
        let texture = self.texture(texture_index)?;
        let palettes = self.chunks.palettes()?;
        let palette = palettes.get(texture.palette_index as usize).ok_or(GBSPError::IndexOutOfRange {
            kind: "palette",
            index: texture.palette_index as usize,
            len: palettes.len(),
        })?;

        let pixels = expand_indices(texture_index, texture, palette, self.chunks.texdata()?)?;

        Ok(Material {
            texture_index,
            name: texture.name(),
            width: texture.width,
            height: texture.height,
            pixels,
        })
    }
}

fn expand_indices(texture_index: u32, texture: &Texture, palette: &Palette, texdata: &[u8]) -> Result<Vec<u8>, GBSPError> {
    let out_of_range = || GBSPError::TextureDataOutOfRange {
        texture: texture_index,
        offset: texture.offset as usize,
        needed: texture.width as u64 * texture.height as u64,
        available: texdata.len(),
    };

    let len = (texture.width as usize).checked_mul(texture.height as usize).ok_or_else(out_of_range)?;
    let start = texture.offset as usize;
    let end = start.checked_add(len).ok_or_else(out_of_range)?;
    let indexed = texdata.get(start..end).ok_or_else(out_of_range)?;

    let mut pixels = vec![0; len * 3];

    // Indexed bytes are stored row-major, matching the output layout.
    for (rgb, &value) in pixels.chunks_exact_mut(3).zip(indexed) {
        let entry = palette.0.get(value as usize).ok_or(GBSPError::PixelOutOfRange {
            texture: texture_index,
            value,
            entries: palette.0.len(),
        })?;
        rgb.copy_from_slice(entry);
    }

    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::fixtures::LevelFixture;

    fn table(level: &LevelFixture) -> ChunkTable {
        ChunkTable::read(&level.build()).unwrap()
    }

    #[test]
    fn test_resolves_pixels_through_palette() {
        let chunks = table(&LevelFixture::quad());
        let mut cache = MaterialCache::new(&chunks);
        let material = cache.material_for(0).unwrap();

        assert_eq!(material.name, "stone");
        assert_eq!((material.width, material.height), (2, 2));
        assert_eq!(material.pixels, vec![0, 255, 0, 1, 254, 0, 2, 253, 1, 3, 252, 1]);
    }

    #[test]
    fn test_pixel_buffer_length() {
        let mut level = LevelFixture::quad();
        level.add_texture("wide", 5, 3, &[7; 15]);
        let chunks = table(&level);
        let mut cache = MaterialCache::new(&chunks);
        let material = cache.material_for(1).unwrap();

        assert_eq!(material.pixels.len(), 5 * 3 * 3);
        assert!(material.pixels.chunks_exact(3).all(|rgb| rgb == [7, 248, 3]));
    }

    #[test]
    fn test_cached_per_texture() {
        let chunks = table(&LevelFixture::quad());
        let mut cache = MaterialCache::new(&chunks);
        let first = cache.material_for(0).unwrap();
        let second = cache.material_for(0).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_separate_caches_do_not_share() {
        let chunks = table(&LevelFixture::quad());
        let first = MaterialCache::new(&chunks).material_for(0).unwrap();
        let second = MaterialCache::new(&chunks).material_for(0).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
    }

    #[test]
    fn test_pixel_past_palette_is_malformed() {
        let mut level = LevelFixture::quad();
        level.palettes = vec![vec![[1, 2, 3]; 4]];
        level.texdata = vec![0, 1, 2, 200];
        let chunks = table(&level);
        let err = MaterialCache::new(&chunks).material_for(0).unwrap_err();

        assert!(matches!(err, GBSPError::PixelOutOfRange { value: 200, entries: 4, .. }));
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_texture_past_texdata_is_malformed() {
        let mut level = LevelFixture::quad();
        level.textures[0].3 = 2;
        let chunks = table(&level);
        let err = MaterialCache::new(&chunks).material_for(0).unwrap_err();

        assert!(matches!(err, GBSPError::TextureDataOutOfRange { needed: 4, available: 4, .. }));
    }

    #[test]
    fn test_bad_palette_index() {
        let mut level = LevelFixture::quad();
        level.textures[0].4 = 3;
        let chunks = table(&level);

        assert!(matches!(
            MaterialCache::new(&chunks).material_for(0),
            Err(GBSPError::IndexOutOfRange { kind: "palette", index: 3, len: 1 })
        ));
    }

    #[test]
    fn test_bad_texture_index() {
        let chunks = table(&LevelFixture::quad());

        assert!(matches!(
            MaterialCache::new(&chunks).material_for(9),
            Err(GBSPError::IndexOutOfRange { kind: "texture", index: 9, len: 1 })
        ));
    }

    #[test]
    fn test_into_materials_sorted() {
        let mut level = LevelFixture::quad();
        level.add_texture("second", 1, 1, &[5]);
        let chunks = table(&level);
        let mut cache = MaterialCache::new(&chunks);
        cache.material_for(1).unwrap();
        cache.material_for(0).unwrap();
        let materials = cache.into_materials();

        assert_eq!(materials.iter().map(|material| material.texture_index).collect::<Vec<_>>(), vec![0, 1]);
    }
}
