use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use folio_core::{EncodeError, RasterSurface, SnippetEncoder};
use image::{ImageFormat, RgbaImage};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encodes snippet crops as `data:image/png;base64,...`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngDataUrlEncoder;

impl SnippetEncoder for PngDataUrlEncoder {
    fn encode(&self, crop: &RasterSurface) -> Result<String, EncodeError> {
        if crop.is_empty() {
            return Err(EncodeError::Empty);
        }
        let image = RgbaImage::from_raw(crop.width(), crop.height(), crop.pixels().to_vec())
            .ok_or_else(|| EncodeError::Failed("pixel buffer does not match size".into()))?;
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|err| EncodeError::Failed(err.to_string()))?;
        Ok(format!("{PNG_DATA_URL_PREFIX}{}", BASE64.encode(png)))
    }
}

/// Reverses [`PngDataUrlEncoder`], e.g. to show a stored snippet.
pub fn decode_png_data_url(data_url: &str) -> Result<RasterSurface, EncodeError> {
    let payload = data_url
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .ok_or_else(|| EncodeError::Failed("not a PNG data URL".into()))?;
    let png = BASE64
        .decode(payload)
        .map_err(|err| EncodeError::Failed(err.to_string()))?;
    let image = image::load_from_memory_with_format(&png, ImageFormat::Png)
        .map_err(|err| EncodeError::Failed(err.to_string()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    RasterSurface::from_rgba(width, height, image.into_raw())
        .ok_or_else(|| EncodeError::Failed("decoded size mismatch".into()))
}
