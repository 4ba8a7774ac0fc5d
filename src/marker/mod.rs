//! QR marker rendering.

pub mod payload;
pub use payload::{DocumentInfo, EnrichError, MarkerPayload, PayloadEnricher};

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use qrcode::{Color, EcLevel, QrCode};
use tracing::debug;

use crate::config::StampConfig;
use crate::error::{Result, StampError};

const MODULE_PX: u32 = 8;
const BORDER_MODULES: u32 = 2;
const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Renders payloads as square black-on-white QR codes of a fixed size.
#[derive(Debug, Clone, Copy)]
pub struct MarkerRenderer {
    size: u32,
    module_px: u32,
    border_modules: u32,
}

impl MarkerRenderer {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            module_px: MODULE_PX,
            border_modules: BORDER_MODULES,
        }
    }

    pub fn from_config(config: &StampConfig) -> Self {
        Self::new(config.marker_size)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Encodes `payload` at error-correction level L and scales the symbol
    /// to exactly `size x size` with nearest-neighbour sampling.
    pub fn render(&self, payload: &str) -> Result<GrayImage> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
            .map_err(|e| StampError::Marker(e.to_string()))?;
        let modules = code.width() as u32;
        let colors = code.to_colors();

        let side = (modules + 2 * self.border_modules) * self.module_px;
        let mut symbol = GrayImage::from_pixel(side, side, LIGHT);
        for (i, color) in colors.iter().enumerate() {
            if *color != Color::Dark {
                continue;
            }
            let col = i as u32 % modules + self.border_modules;
            let row = i as u32 / modules + self.border_modules;
            for dy in 0..self.module_px {
                for dx in 0..self.module_px {
                    symbol.put_pixel(col * self.module_px + dx, row * self.module_px + dy, DARK);
                }
            }
        }

        debug!(modules, side, size = self.size, "marker rendered");
        if side == self.size {
            return Ok(symbol);
        }
        Ok(imageops::resize(&symbol, self.size, self.size, FilterType::Nearest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_has_requested_size() {
        let marker = MarkerRenderer::new(150).render("Document: plan.pdf").expect("render");
        assert_eq!(marker.dimensions(), (150, 150));
    }

    #[test]
    fn marker_is_black_and_white() {
        let marker = MarkerRenderer::new(150).render("hello").expect("render");
        assert!(marker.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(marker.pixels().any(|p| p[0] == 0));
        // quiet zone
        assert_eq!(marker.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn rendering_is_deterministic() {
        let renderer = MarkerRenderer::new(150);
        assert_eq!(
            renderer.render("same payload").expect("render"),
            renderer.render("same payload").expect("render")
        );
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = "x".repeat(8000);
        assert!(matches!(
            MarkerRenderer::new(150).render(&payload),
            Err(StampError::Marker(_))
        ));
    }
}
