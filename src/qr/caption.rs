use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::Arc;
use usvg::fontdb;

/// Built-in fallback face, always registered
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
const BUNDLED_FAMILY: &str = "DejaVu Sans";

/// Rasterises single-line captions with a configured TrueType font or the built-in one
pub struct CaptionRenderer {
    fontdb: Arc<fontdb::Database>,
    family: String,
    font_size: f32,
}

impl CaptionRenderer {
    /// `font_path` is tried first, then the built-in font. System fonts cover missing glyphs.
    pub fn new(font_path: Option<&Path>, font_size: f32) -> Self {
        Self::load(font_path, font_size, true)
    }

    /// Like `new`, but never scans the system font directories
    pub fn without_system_fonts(font_path: Option<&Path>, font_size: f32) -> Self {
        Self::load(font_path, font_size, false)
    }

    fn load(font_path: Option<&Path>, font_size: f32, system_fonts: bool) -> Self {
        let mut db = fontdb::Database::new();
        let mut family = None;

        if let Some(path) = font_path {
            if path.is_file() {
                match db.load_font_file(path) {
                    Ok(()) => {
                        family = db
                            .faces()
                            .next()
                            .and_then(|face| face.families.first())
                            .map(|(name, _)| name.clone());
                    }
                    Err(e) => tracing::warn!("Could not load font {}: {}", path.display(), e),
                }
            } else {
                tracing::debug!("Font {} not found, using {}", path.display(), BUNDLED_FAMILY);
            }
        }

        db.load_font_data(BUNDLED_FONT.to_vec());
        db.set_sans_serif_family(BUNDLED_FAMILY);
        if system_fonts {
            db.load_system_fonts();
        }

        Self {
            fontdb: Arc::new(db),
            family: family.unwrap_or_else(|| BUNDLED_FAMILY.to_string()),
            font_size,
        }
    }

    /// Family name captions are drawn with
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Render `text` and crop to its ink. `None` when nothing visible was drawn.
    pub fn rasterize(&self, text: &str) -> Option<RgbaImage> {
        let size = self.font_size;
        let pad = size.ceil();
        let width = ((text.chars().count() as f32 + 2.0) * size * 1.5).ceil() as u32;
        let height = (size * 3.0).ceil() as u32;

        let family = format!(
            "'{}', '{}', sans-serif",
            escape_xml(&self.family),
            BUNDLED_FAMILY
        );
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><text x="{pad}" y="{baseline}" font-family="{family}" font-size="{size}" fill="black">{text}</text></svg>"#,
            baseline = size * 2.0,
            text = escape_xml(text),
        );

        let options = usvg::Options {
            fontdb: self.fontdb.clone(),
            font_resolver: font_resolver(),
            ..Default::default()
        };
        let tree = match usvg::Tree::from_str(&svg, &options) {
            Ok(tree) => tree,
            Err(e) => {
                tracing::warn!("Could not lay out caption: {}", e);
                return None;
            }
        };

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)?;
        resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap.as_mut());

        crop_to_ink(&pixmap)
    }
}

/// Map requested families onto the loaded fonts, falling back to the first face available
fn font_resolver() -> usvg::FontResolver<'static> {
    usvg::FontResolver {
        select_font: Box::new(|font, db| {
            let mut families: Vec<fontdb::Family<'_>> = font
                .families()
                .iter()
                .map(|family| match family {
                    usvg::FontFamily::Named(name) => fontdb::Family::Name(name),
                    _ => fontdb::Family::SansSerif,
                })
                .collect();
            families.push(fontdb::Family::SansSerif);

            let query = fontdb::Query {
                families: &families,
                weight: fontdb::Weight::NORMAL,
                stretch: fontdb::Stretch::Normal,
                style: fontdb::Style::Normal,
            };

            db.query(&query).or_else(|| db.faces().next().map(|face| face.id))
        }),
        select_fallback: usvg::FontResolver::default_fallback_selector(),
    }
}

fn crop_to_ink(pixmap: &resvg::tiny_skia::Pixmap) -> Option<RgbaImage> {
    let width = pixmap.width();
    let pixels = pixmap.pixels();

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (i, pixel) in pixels.iter().enumerate() {
        if pixel.alpha() == 0 {
            continue;
        }
        let (x, y) = (i as u32 % width, i as u32 / width);
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    let (x0, y0, x1, y1) = bounds?;
    let crop = RgbaImage::from_fn(x1 - x0 + 1, y1 - y0 + 1, |x, y| {
        let color = pixels[((y + y0) * width + (x + x0)) as usize].demultiply();
        Rgba([color.red(), color.green(), color.blue(), color.alpha()])
    });
    Some(crop)
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
