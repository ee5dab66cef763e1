//! The QR encoder.

use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Luma};
use qrcode::{Color, EcLevel, QrCode};

use crate::error::{QrError, Result};

/// Default output size in pixels.
pub const DEFAULT_SIZE: u32 = 256;

/// Encodes arbitrary UTF-8 text into QR form.
#[derive(Debug, Clone, Copy)]
pub struct QrEncoder {
    ec_level: EcLevel,
}

impl Default for QrEncoder {
    fn default() -> Self {
        Self {
            ec_level: EcLevel::M,
        }
    }
}

impl QrEncoder {
    /// Creates an encoder with a specific error-correction level.
    #[must_use]
    pub const fn new(ec_level: EcLevel) -> Self {
        Self { ec_level }
    }

    fn code(&self, data: &str) -> Result<QrCode> {
        if data.is_empty() {
            return Err(QrError::EmptyInput);
        }
        QrCode::with_error_correction_level(data, self.ec_level).map_err(|e| QrError::Encode {
            reason: e.to_string(),
        })
    }

    /// Encodes `data` as PNG bytes at (at least) `size` pixels square.
    ///
    /// # Errors
    ///
    /// Rejects empty input; surfaces QR and PNG encoder failures.
    pub fn to_png(&self, data: &str, size: u32) -> Result<Vec<u8>> {
        let code = self.code(data)?;
        let img = code
            .render::<Luma<u8>>()
            .min_dimensions(size, size)
            .build();

        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::L8)
            .map_err(|e| QrError::Png {
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }

    /// Encodes `data` as a `data:image/png;base64,...` URL.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`QrEncoder::to_png`].
    pub fn to_base64(&self, data: &str, size: u32) -> Result<String> {
        let png = self.to_png(data, size)?;
        let b64 = base64::engine::general_purpose::STANDARD.encode(png);
        Ok(format!("data:image/png;base64,{b64}"))
    }

    /// Renders `data` as terminal block art.
    ///
    /// Each module is two characters wide so the output is roughly
    /// square in a monospace terminal; a one-module light border
    /// surrounds the bitmap.
    ///
    /// # Errors
    ///
    /// Rejects empty input; surfaces QR encoder failures.
    pub fn to_terminal(&self, data: &str) -> Result<String> {
        let code = self.code(data)?;
        let width = code.width();
        let colors = code.to_colors();

        let mut out = String::new();
        let blank_row = "  ".repeat(width + 2);

        out.push_str(&blank_row);
        out.push('\n');
        for y in 0..width {
            out.push_str("  ");
            for x in 0..width {
                match colors[y * width + x] {
                    Color::Dark => out.push_str("██"),
                    Color::Light => out.push_str("  "),
                }
            }
            out.push_str("  \n");
        }
        out.push_str(&blank_row);
        out.push('\n');

        Ok(out)
    }
}
