//! Text overlay rendering.
//!
//! The overlay is a bottom-anchored stack: heading lines, a gap, then body
//! lines, each line centred and sitting on its own rounded black backdrop.
//! Heading backdrops are darker than body backdrops. Backdrops and glyphs are
//! painted on a transparent layer first so overlapping line backdrops do not
//! double up, then the layer is composited over the photo and flattened to an
//! opaque JPEG.

use crate::carousel::layout::{
    FontStyle, LayoutResult, SlideLayout, TextExtent, TextMeasure, fit_slide,
};
use crate::config::RenderSettings;
use crate::error::{CarouselError, CarouselResult};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, Rgba, RgbaImage, RgbImage};
use once_cell::sync::Lazy;
use regex::Regex;
use rusttype::{Font, PositionedGlyph, Scale, point};
use std::path::Path;
use tracing::{debug, instrument};

const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

static RUNS_OF_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Draws lines of text onto a canvas.
pub trait Typesetter: TextMeasure {
    /// Whether the face for `style` has a real glyph for `ch`.
    fn can_render(&self, ch: char, style: FontStyle) -> bool;

    /// Draw `text` so that its ink box's top-left corner lands on `(x, y)`.
    fn draw_line(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        style: FontStyle,
        size: u32,
        x: i32,
        y: i32,
        color: Rgba<u8>,
    );
}

/// Bold heading face plus regular body face.
pub struct FontPair {
    bold: Font<'static>,
    regular: Font<'static>,
}

impl std::fmt::Debug for FontPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontPair")
            .field("bold_glyphs", &self.bold.glyph_count())
            .field("regular_glyphs", &self.regular.glyph_count())
            .finish()
    }
}

impl FontPair {
    pub fn from_bytes(bold: Vec<u8>, regular: Vec<u8>) -> CarouselResult<Self> {
        let parse = |bytes: Vec<u8>, which: &str| {
            Font::try_from_vec(bytes).ok_or_else(|| {
                CarouselError::decode(format!("{which} font is not a TrueType/OpenType face"))
            })
        };
        Ok(Self {
            bold: parse(bold, "heading")?,
            regular: parse(regular, "body")?,
        })
    }

    pub fn load(bold: &Path, regular: &Path) -> CarouselResult<Self> {
        Self::from_bytes(std::fs::read(bold)?, std::fs::read(regular)?)
    }

    fn face(&self, style: FontStyle) -> &Font<'static> {
        match style {
            FontStyle::Bold => &self.bold,
            FontStyle::Regular => &self.regular,
        }
    }

    fn glyphs(&self, text: &str, style: FontStyle, size: u32) -> Vec<PositionedGlyph<'_>> {
        let font = self.face(style);
        let scale = Scale::uniform(size as f32);
        let ascent = font.v_metrics(scale).ascent;
        font.layout(text, scale, point(0.0, ascent)).collect()
    }
}

/// Union of the glyph pixel boxes as `(min_x, min_y, max_x, max_y)`.
fn ink_box(glyphs: &[PositionedGlyph<'_>]) -> Option<(i32, i32, i32, i32)> {
    glyphs
        .iter()
        .filter_map(|g| g.pixel_bounding_box())
        .fold(None, |acc, bb| match acc {
            None => Some((bb.min.x, bb.min.y, bb.max.x, bb.max.y)),
            Some((x0, y0, x1, y1)) => Some((
                x0.min(bb.min.x),
                y0.min(bb.min.y),
                x1.max(bb.max.x),
                y1.max(bb.max.y),
            )),
        })
}

impl TextMeasure for FontPair {
    fn measure(&self, text: &str, style: FontStyle, size: u32) -> TextExtent {
        match ink_box(&self.glyphs(text, style, size)) {
            Some((x0, y0, x1, y1)) => TextExtent {
                width: (x1 - x0) as f32,
                height: (y1 - y0) as f32,
            },
            None => TextExtent::default(),
        }
    }
}

impl Typesetter for FontPair {
    fn can_render(&self, ch: char, style: FontStyle) -> bool {
        self.face(style).glyph(ch).id().0 != 0
    }

    fn draw_line(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        style: FontStyle,
        size: u32,
        x: i32,
        y: i32,
        color: Rgba<u8>,
    ) {
        let glyphs = self.glyphs(text, style, size);
        let Some((x0, y0, _, _)) = ink_box(&glyphs) else {
            return;
        };
        let (dx, dy) = (x - x0, y - y0);
        let (w, h) = (canvas.width() as i32, canvas.height() as i32);

        for glyph in &glyphs {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = dx + bb.min.x + gx as i32;
                let py = dy + bb.min.y + gy as i32;
                if px < 0 || py < 0 || px >= w || py >= h {
                    return;
                }
                let alpha = (coverage * color[3] as f32).round() as u8;
                let src = Rgba([color[0], color[1], color[2], alpha]);
                blend_over(canvas.get_pixel_mut(px as u32, py as u32), src);
            });
        }
    }
}

/// Porter-Duff "over" for straight-alpha RGBA8.
pub(crate) fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for i in 0..3 {
        let c = (src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) / out_a;
        dst[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

fn rounded_rect_contains(x: i32, y: i32, w: i32, h: i32, r: i32) -> bool {
    if (x >= r && x < w - r) || (y >= r && y < h - r) {
        return true;
    }
    let cx = if x < r { r - 1 } else { w - r };
    let cy = if y < r { r - 1 } else { h - r };
    let (dx, dy) = (x - cx, y - cy);
    dx * dx + dy * dy <= r * r
}

/// Paint (replace, not blend) a rounded rectangle spanning `[x0, x1) x [y0, y1)`.
fn fill_rounded_rect(
    layer: &mut RgbaImage,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    radius: u32,
    color: Rgba<u8>,
) {
    let (w, h) = (x1 - x0, y1 - y0);
    if w <= 0 || h <= 0 {
        return;
    }
    let r = (radius as i32).min(w / 2).min(h / 2);
    let cx0 = x0.max(0);
    let cy0 = y0.max(0);
    let cx1 = x1.min(layer.width() as i32);
    let cy1 = y1.min(layer.height() as i32);

    for py in cy0..cy1 {
        for px in cx0..cx1 {
            if rounded_rect_contains(px - x0, py - y0, w, h, r) {
                layer.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

/// Drop characters `typesetter` cannot draw for `style` and normalise whitespace.
///
/// Lossy on purpose: an emoji in model output must not become a tofu box.
pub fn normalize_text<T: Typesetter + ?Sized>(
    typesetter: &T,
    text: &str,
    style: FontStyle,
) -> String {
    let kept: String = text
        .chars()
        .filter(|&ch| ch.is_whitespace() || (!ch.is_control() && typesetter.can_render(ch, style)))
        .collect();
    RUNS_OF_SPACE.replace_all(kept.trim(), " ").into_owned()
}

fn encode_failure(e: ImageError) -> CarouselError {
    CarouselError::Encode(e.to_string())
}

/// Renders slide overlays with a [`Typesetter`] and [`RenderSettings`].
#[derive(Debug)]
pub struct Compositor<'a, T> {
    typesetter: &'a T,
    settings: &'a RenderSettings,
}

impl<'a, T: Typesetter> Compositor<'a, T> {
    pub fn new(typesetter: &'a T, settings: &'a RenderSettings) -> Self {
        Self { typesetter, settings }
    }

    /// Decode `base_image`, overlay `heading` and `body`, and encode a flattened JPEG.
    ///
    /// # Errors
    ///
    /// - [`CarouselError::Decode`] if `base_image` is not a decodable image
    /// - [`CarouselError::Encode`] if the flattened slide cannot be written as JPEG
    #[instrument(level = "debug", skip_all, fields(heading = %heading))]
    pub fn render(&self, base_image: &[u8], heading: &str, body: &str) -> CarouselResult<Vec<u8>> {
        let base = image::load_from_memory(base_image)?.to_rgba8();
        let (width, height) = base.dimensions();

        let heading = normalize_text(self.typesetter, heading, FontStyle::Bold);
        let body = normalize_text(self.typesetter, body, FontStyle::Regular);
        let layout = fit_slide(self.typesetter, &heading, &body, width, height, self.settings)?;

        let flat = self.render_layout(base, &layout);
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(flat)
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, self.settings.jpeg_quality))
            .map_err(encode_failure)?;
        debug!(width, height, bytes = out.len(), "Slide rendered");
        Ok(out)
    }

    /// Draw an already fitted layout over `base` and flatten the result.
    pub fn render_layout(&self, mut base: RgbaImage, layout: &SlideLayout) -> RgbImage {
        let s = self.settings;
        let (width, height) = base.dimensions();
        let mut overlay = RgbaImage::new(width, height);

        let gap = if layout.heading.is_empty() || layout.body.is_empty() {
            0
        } else {
            s.section_gap as i32
        };
        let stacked = self.block_height(&layout.heading) + gap + self.block_height(&layout.body);
        // Bottom of the last backdrop sits on the bottom margin; overflow grows upward
        // but never pushes the first backdrop above the top edge.
        let mut y =
            (height as i32 - s.bottom_margin as i32 - stacked).max(s.backdrop_pad_top as i32);

        y = self.draw_block(
            &mut overlay,
            &layout.heading,
            FontStyle::Bold,
            s.heading_backdrop_alpha,
            y,
        );
        y += gap;
        self.draw_block(&mut overlay, &layout.body, FontStyle::Regular, s.body_backdrop_alpha, y);

        for (dst, src) in base.pixels_mut().zip(overlay.pixels()) {
            blend_over(dst, *src);
        }
        DynamicImage::ImageRgba8(base).to_rgb8()
    }

    fn block_height(&self, block: &LayoutResult) -> i32 {
        block
            .line_heights
            .iter()
            .map(|h| h.ceil() as i32 + self.settings.backdrop_pad_bottom as i32)
            .sum()
    }

    fn draw_block(
        &self,
        overlay: &mut RgbaImage,
        block: &LayoutResult,
        style: FontStyle,
        alpha: u8,
        mut y: i32,
    ) -> i32 {
        let s = self.settings;
        let canvas_width = overlay.width() as f32;
        let backdrop = Rgba([0, 0, 0, alpha]);

        for (line, line_height) in block.lines() {
            let text_width = self.typesetter.measure(line, style, block.font_size).width;
            let line_height = line_height.ceil() as i32;
            let x = ((canvas_width - text_width) / 2.0).round() as i32;

            fill_rounded_rect(
                overlay,
                x - s.backdrop_pad_x as i32,
                y - s.backdrop_pad_top as i32,
                x + text_width.ceil() as i32 + s.backdrop_pad_x as i32,
                y + line_height + s.backdrop_pad_bottom as i32,
                s.corner_radius,
                backdrop,
            );
            self.typesetter
                .draw_line(overlay, line, style, block.font_size, x, y, TEXT_COLOR);

            y += line_height + s.backdrop_pad_bottom as i32;
        }
        y
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::carousel::fingerprint::tests::encode_jpeg;
    use crate::carousel::layout::tests::Monospace;

    /// Monospace metrics; glyphs are solid blocks; only ASCII is renderable.
    pub(crate) struct BlockTypesetter;

    impl TextMeasure for BlockTypesetter {
        fn measure(&self, text: &str, style: FontStyle, size: u32) -> TextExtent {
            Monospace.measure(text, style, size)
        }
    }

    impl Typesetter for BlockTypesetter {
        fn can_render(&self, ch: char, _style: FontStyle) -> bool {
            ch.is_ascii()
        }

        fn draw_line(
            &self,
            canvas: &mut RgbaImage,
            text: &str,
            style: FontStyle,
            size: u32,
            x: i32,
            y: i32,
            color: Rgba<u8>,
        ) {
            let extent = self.measure(text, style, size);
            let (w, h) = (canvas.width() as i32, canvas.height() as i32);
            for py in y..y + extent.height as i32 {
                for px in x..x + extent.width as i32 {
                    if (0..w).contains(&px) && (0..h).contains(&py) {
                        blend_over(canvas.get_pixel_mut(px as u32, py as u32), color);
                    }
                }
            }
        }
    }

    fn gray_canvas(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([120, 120, 120, 255]))
    }

    #[test]
    fn test_normalize_strips_unrenderable_symbols() {
        assert_eq!(
            normalize_text(&BlockTypesetter, "AI 🚀 beats\n humans ✨", FontStyle::Bold),
            "AI beats humans"
        );
        assert_eq!(normalize_text(&BlockTypesetter, "🔥🔥", FontStyle::Regular), "");
    }

    #[test]
    fn test_overlay_geometry_and_two_tier_backdrops() {
        let settings = RenderSettings::default();
        let compositor = Compositor::new(&BlockTypesetter, &settings);
        let layout = fit_slide(&BlockTypesetter, "Hi", "ok", 400, 400, &settings).unwrap();
        assert_eq!(layout.heading.font_size, 18);
        assert_eq!(layout.body.font_size, 14);

        let out = compositor.render_layout(gray_canvas(400, 400), &layout);

        // stacked = (18 + 15) + 20 + (14 + 15) = 82; top line at 400 - 30 - 82 = 288
        // heading text [191, 209) x [288, 306), backdrop [181, 219) x [283, 321)
        // body text [193, 207) x [341, 355), backdrop [183, 217) x [336, 370)
        let heading_text = out.get_pixel(200, 295)[0];
        let heading_backdrop = out.get_pixel(185, 300)[0];
        let body_backdrop = out.get_pixel(187, 360)[0];
        let untouched_top = out.get_pixel(10, 10)[0];
        let below_block = out.get_pixel(200, 375)[0];
        let rounded_corner = out.get_pixel(183, 336)[0];

        assert_eq!(heading_text, 255);
        assert!(heading_backdrop < body_backdrop, "{heading_backdrop} vs {body_backdrop}");
        assert!(body_backdrop < 120);
        assert_eq!(untouched_top, 120);
        assert_eq!(below_block, 120);
        assert_eq!(rounded_corner, 120);
    }

    #[test]
    fn test_empty_text_leaves_image_unchanged() {
        let settings = RenderSettings::default();
        let compositor = Compositor::new(&BlockTypesetter, &settings);
        let layout = fit_slide(&BlockTypesetter, "", "", 120, 80, &settings).unwrap();

        let out = compositor.render_layout(gray_canvas(120, 80), &layout);
        assert!(out.pixels().all(|p| p.0 == [120, 120, 120]));
    }

    #[test]
    fn test_render_produces_opaque_jpeg_of_same_size() {
        let settings = RenderSettings::default();
        let compositor = Compositor::new(&BlockTypesetter, &settings);
        let base = encode_jpeg(&DynamicImage::ImageRgba8(gray_canvas(320, 240)).to_rgb8(), 90);

        let out = compositor.render(&base, "Heading 🚀", "Body copy for the slide").unwrap();
        let decoded = image::load_from_memory(&out).unwrap();

        assert_eq!(image::guess_format(&out).unwrap(), image::ImageFormat::Jpeg);
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn test_render_rejects_undecodable_base() {
        let settings = RenderSettings::default();
        let compositor = Compositor::new(&BlockTypesetter, &settings);
        let err = compositor.render(b"not an image", "h", "b").unwrap_err();
        assert!(matches!(err, CarouselError::Decode(_)));
    }

    #[test]
    fn test_encoder_failure_is_not_a_decode_error() {
        use image::error::{EncodingError, ImageFormatHint};

        let failure = ImageError::Encoding(EncodingError::new(
            ImageFormatHint::Exact(image::ImageFormat::Jpeg),
            "output buffer closed",
        ));
        let err = encode_failure(failure);
        assert!(matches!(err, CarouselError::Encode(_)));
        assert!(err.to_string().starts_with("encode error:"));
    }

    #[test]
    fn test_rounded_rect_corners_are_cut() {
        let mut layer = RgbaImage::new(40, 20);
        fill_rounded_rect(&mut layer, 0, 0, 40, 20, 8, Rgba([0, 0, 0, 200]));
        assert_eq!(layer.get_pixel(0, 0)[3], 0);
        assert_eq!(layer.get_pixel(20, 0)[3], 200);
        assert_eq!(layer.get_pixel(20, 10)[3], 200);
        assert_eq!(layer.get_pixel(39, 19)[3], 0);
    }

    #[test]
    fn test_blend_over_transparent_destination_takes_source() {
        let mut dst = Rgba([0, 0, 0, 0]);
        blend_over(&mut dst, Rgba([0, 0, 0, 160]));
        assert_eq!(dst, Rgba([0, 0, 0, 160]));

        let mut dst = Rgba([0, 0, 0, 160]);
        blend_over(&mut dst, Rgba([255, 255, 255, 255]));
        assert_eq!(dst, Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_font_pair_with_system_font_when_available() {
        let path = Path::new("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf");
        if !path.exists() {
            return;
        }
        let fonts = FontPair::load(path, path).unwrap();
        let small = fonts.measure("Hello", FontStyle::Bold, 12);
        let large = fonts.measure("Hello", FontStyle::Bold, 24);
        assert!(large.width > small.width && small.width > 0.0);
        assert!(fonts.can_render('A', FontStyle::Regular));
        assert_eq!(fonts.measure("   ", FontStyle::Regular, 20), TextExtent::default());
    }

    #[test]
    fn test_font_pair_rejects_garbage_font() {
        let err = FontPair::from_bytes(b"nope".to_vec(), b"nope".to_vec()).unwrap_err();
        assert!(matches!(err, CarouselError::Decode(_)));
    }
}
