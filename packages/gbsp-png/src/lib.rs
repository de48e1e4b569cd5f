use std::{cmp, io::Cursor};

use base64::{Engine, engine::general_purpose};
use gbsp::{GBSP, Material};
use image::{DynamicImage, ImageError, ImageFormat, RgbImage};
use thiserror::Error;
use wasm_bindgen::{JsError, JsValue, prelude::wasm_bindgen};

#[derive(Debug, Error)]
#[error("{:#?}", self)]
pub enum PNGError {
    #[error(transparent)]
    ImageError(#[from] ImageError),

    BufferSize { width: u32, height: u32, len: usize },
    MissingMaterial(u32),
}

impl From<PNGError> for JsValue {
    fn from(value: PNGError) -> Self {
        JsValue::from(JsError::new(&format!("{:?}", value)))
    }
}

#[wasm_bindgen(js_name = "MaterialToPNG")]
pub fn gbsp_material_to_png(gbsp: &GBSP, texture_index: u32, size: u32) -> Result<String, PNGError> {
    let material = gbsp.level().material(texture_index).ok_or(PNGError::MissingMaterial(texture_index))?;
    material_to_png(material, size)
}

/// Encodes the material as a PNG data URL, shrunk to fit `size` x `size` when
/// larger. A `size` of 0 keeps the full resolution.
pub fn material_to_png(material: &Material, size: u32) -> Result<String, PNGError> {
    let Material { width, height, pixels, .. } = material;

    let image_buffer = RgbImage::from_vec(*width, *height, pixels.clone()).ok_or(PNGError::BufferSize {
        width: *width,
        height: *height,
        len: pixels.len(),
    })?;
    let mut image = DynamicImage::ImageRgb8(image_buffer);

    if size > 0 && cmp::max(*width, *height) > size {
        image = image.thumbnail(size, size);
    }

    let mut out = vec![];
    image.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;

    Ok(String::from("data:image/png;base64,") + &general_purpose::STANDARD.encode(out))
}
