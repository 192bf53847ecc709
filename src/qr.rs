use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

use crate::error::AppError;

const MIN_SIZE: u32 = 256;

// Render `content` as a QR code SVG, at least 256x256
pub fn render_svg(content: &str) -> Result<String, AppError> {
    let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::M)
        .map_err(|e| AppError::Internal(format!("failed to generate qr: {}", e)))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(MIN_SIZE, MIN_SIZE)
        .build())
}
