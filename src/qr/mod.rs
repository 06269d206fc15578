//! QR code image composition.
//!
//! A payload is encoded at error-correction level H, rendered black on white, optionally
//! overlaid with a logo at its center, and optionally mounted under a caption.

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;
use std::path::PathBuf;

pub mod caption;

pub use caption::CaptionRenderer;

use crate::config::QrConfig;
use crate::{Error, Result};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Vertical space between the caption band and the code
pub const CAPTION_GAP: u32 = 10;

/// Top margin of the caption text
pub const CAPTION_TOP: u32 = 5;

/// Largest code image side, in pixels
pub const MAX_SIDE: u32 = 16_384;

/// Data to encode and the caption to print above it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrRequest {
    pub payload: String,
    pub title: Option<String>,
}

impl QrRequest {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn caption(&self) -> Option<&str> {
        self.title.as_deref().filter(|title| !title.is_empty())
    }
}

/// Builds finished QR images
pub struct QrCompositor {
    box_size: u32,
    border: u32,
    logo_path: Option<PathBuf>,
    captions: CaptionRenderer,
}

impl QrCompositor {
    pub fn new() -> Self {
        Self::from_config(&QrConfig::default())
    }

    pub fn from_config(config: &QrConfig) -> Self {
        Self {
            box_size: config.box_size.max(1),
            border: config.border,
            logo_path: Some(config.logo_path.clone()),
            captions: CaptionRenderer::new(Some(config.font_path.as_path()), config.font_size),
        }
    }

    /// Use a different logo, or none at all
    pub fn with_logo(mut self, logo_path: Option<PathBuf>) -> Self {
        self.logo_path = logo_path;
        self
    }

    /// Compose the image and encode it as PNG
    pub fn compose(&self, request: &QrRequest) -> Result<Vec<u8>> {
        let image = self.render(request)?;

        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }

    /// Compose the image without encoding it
    pub fn render(&self, request: &QrRequest) -> Result<RgbImage> {
        let mut qr = self.render_matrix(&request.payload)?;

        if let Some(logo) = self.load_logo(qr.width()) {
            let x = (qr.width() - logo.width()) / 2;
            let y = (qr.height() - logo.height()) / 2;
            paste_with_alpha(&mut qr, &logo, x as i64, y as i64);
        }

        Ok(match request.caption() {
            Some(title) => self.add_caption(qr, title),
            None => qr,
        })
    }

    /// Encode `payload` at level H in the smallest version that fits and paint it
    pub fn render_matrix(&self, payload: &str) -> Result<RgbImage> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)?;
        let modules = code.width() as u32;
        let side = self
            .border
            .checked_mul(2)
            .and_then(|quiet| quiet.checked_add(modules))
            .and_then(|span| span.checked_mul(self.box_size))
            .filter(|side| *side <= MAX_SIDE)
            .ok_or_else(|| {
                Error::QrSize(format!(
                    "{} modules with border {} at {}px per module exceed {}px",
                    modules, self.border, self.box_size, MAX_SIDE
                ))
            })?;

        tracing::debug!(
            "Encoded {} bytes as {:?} ({} modules)",
            payload.len(),
            code.version(),
            modules
        );

        let mut image = RgbImage::from_pixel(side, side, WHITE);
        for (i, color) in code.to_colors().into_iter().enumerate() {
            if color != Color::Dark {
                continue;
            }
            let column = i as u32 % modules + self.border;
            let row = i as u32 / modules + self.border;
            for y in row * self.box_size..(row + 1) * self.box_size {
                for x in column * self.box_size..(column + 1) * self.box_size {
                    image.put_pixel(x, y, BLACK);
                }
            }
        }

        Ok(image)
    }

    /// Load the logo scaled to a quarter of the code width. Missing or broken logos are skipped.
    fn load_logo(&self, qr_width: u32) -> Option<RgbaImage> {
        let path = self.logo_path.as_ref()?;
        if !path.is_file() {
            tracing::debug!("No logo at {}, skipping overlay", path.display());
            return None;
        }

        let logo = match image::open(path) {
            Ok(logo) => logo.to_rgba8(),
            Err(e) => {
                tracing::warn!("Could not read logo {}: {}", path.display(), e);
                return None;
            }
        };

        let size = qr_width / 4;
        if size == 0 {
            return None;
        }
        Some(imageops::resize(&logo, size, size, FilterType::Lanczos3))
    }

    /// Mount `qr` on a taller canvas with `title` centered above it
    fn add_caption(&self, qr: RgbImage, title: &str) -> RgbImage {
        tracing::debug!("Drawing caption in {}", self.captions.family());
        let text = self.captions.rasterize(title);
        let (text_width, text_height) = text
            .as_ref()
            .map(|t| (t.width(), t.height()))
            .unwrap_or((0, 0));

        let width = qr.width();
        let offset = text_height + CAPTION_GAP;
        let mut canvas = RgbImage::from_pixel(width, qr.height() + offset, WHITE);
        imageops::replace(&mut canvas, &qr, 0, offset as i64);

        if let Some(text) = text {
            let x = (width as i64 - text_width as i64) / 2;
            paste_with_alpha(&mut canvas, &text, x, CAPTION_TOP as i64);
        }

        canvas
    }
}

impl Default for QrCompositor {
    fn default() -> Self {
        Self::new()
    }
}

/// Alpha-blend `overlay` onto `base` with its top-left corner at `(x, y)`, clipping at the edges
fn paste_with_alpha(base: &mut RgbImage, overlay: &RgbaImage, x: i64, y: i64) {
    for (ox, oy, pixel) in overlay.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        if alpha == 0 {
            continue;
        }

        let (bx, by) = (x + ox as i64, y + oy as i64);
        if bx < 0 || by < 0 || bx >= base.width() as i64 || by >= base.height() as i64 {
            continue;
        }

        let target = base.get_pixel_mut(bx as u32, by as u32);
        for channel in 0..3 {
            let blended = pixel[channel] as u32 * alpha + target[channel] as u32 * (255 - alpha);
            target[channel] = ((blended + 127) / 255) as u8;
        }
    }
}
