//! QR PNG rendering for descriptor retrieval URLs.

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use std::io::Cursor;

#[derive(thiserror::Error, Debug)]
pub enum QrError {
    #[error("could not encode QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("could not render QR image: {0}")]
    Render(#[from] image::ImageError),
}

pub fn render_png(text: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::new(text.as_bytes())?;
    let rendered = code.render::<Luma<u8>>().build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(rendered).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}
