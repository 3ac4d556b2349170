//! Auto-fitting text layout for slide overlays.
//!
//! [`layout`] word-wraps a string at a font size, measures the block, and
//! steps the size down one point at a time until the block fits its height
//! budget. At the minimum size the result is accepted even if it still
//! overflows: a slide with slightly too much text beats no slide.
//!
//! [`fit_slide`] runs it twice. The heading goes first against its own
//! budget; the body then gets whatever is left of the shared budget after
//! the heading's *realized* height. Headings therefore win space priority
//! and the body is the one that shrinks when copy runs long.

use crate::config::RenderSettings;
use crate::error::{CarouselError, CarouselResult};
use tracing::debug;

/// Which of the two typefaces a block is set in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontStyle {
    Bold,
    Regular,
}

/// Ink extent of a rendered string in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
}

/// Measures strings. Implemented by the real fonts and by test stubs.
pub trait TextMeasure {
    fn measure(&self, text: &str, style: FontStyle, size: u32) -> TextExtent;
}

/// Constraints for one layout search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutBounds {
    pub max_width_px: f32,
    pub max_block_height_px: f32,
    pub min_font_size: u32,
    pub max_font_size: u32,
    pub line_spacing: f32,
}

impl LayoutBounds {
    fn validate(&self) -> CarouselResult<()> {
        if self.min_font_size == 0 {
            return Err(CarouselError::layout("min_font_size must be > 0"));
        }
        if self.min_font_size > self.max_font_size {
            return Err(CarouselError::layout(format!(
                "min_font_size {} exceeds max_font_size {}",
                self.min_font_size, self.max_font_size
            )));
        }
        if !self.max_width_px.is_finite() || self.max_width_px <= 0.0 {
            return Err(CarouselError::layout("max_width_px must be finite and > 0"));
        }
        if self.max_block_height_px.is_nan() || !self.line_spacing.is_finite() {
            return Err(CarouselError::layout("height budget and spacing must be numbers"));
        }
        Ok(())
    }
}

/// Wrapped lines at the chosen size.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutResult {
    pub wrapped_lines: Vec<String>,
    /// Ink height of each line, same length as `wrapped_lines`.
    pub line_heights: Vec<f32>,
    pub font_size: u32,
    /// Sum of line heights plus spacing between lines.
    pub total_height: f32,
}

impl LayoutResult {
    fn empty(font_size: u32) -> Self {
        Self {
            wrapped_lines: Vec::new(),
            line_heights: Vec::new(),
            font_size,
            total_height: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.wrapped_lines.is_empty()
    }

    /// Iterate `(line, height)` pairs.
    pub fn lines(&self) -> impl Iterator<Item = (&str, f32)> {
        self.wrapped_lines
            .iter()
            .map(String::as_str)
            .zip(self.line_heights.iter().copied())
    }
}

/// Find the largest size in `[min_font_size, max_font_size]` whose wrapped
/// block fits `max_block_height_px`, or the minimum size if none does.
///
/// Blank text yields an empty, zero-height result.
pub fn layout<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    style: FontStyle,
    bounds: &LayoutBounds,
) -> CarouselResult<LayoutResult> {
    bounds.validate()?;
    if text.split_whitespace().next().is_none() {
        return Ok(LayoutResult::empty(bounds.max_font_size));
    }

    let mut size = bounds.max_font_size;
    loop {
        let pass = wrap_at(measure, text, style, size, bounds);
        if pass.total_height <= bounds.max_block_height_px {
            return Ok(pass);
        }
        if size <= bounds.min_font_size {
            debug!(
                size,
                height = pass.total_height,
                budget = bounds.max_block_height_px,
                "Text overflows at minimum size; accepting"
            );
            return Ok(pass);
        }
        size -= 1;
    }
}

/// One layout pass: greedy word wrap at a fixed size.
///
/// A word wider than the line on its own gets a line to itself.
pub fn wrap_at<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    style: FontStyle,
    size: u32,
    bounds: &LayoutBounds,
) -> LayoutResult {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure.measure(&candidate, style, size).width <= bounds.max_width_px {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    let line_heights: Vec<f32> = lines
        .iter()
        .map(|l| measure.measure(l, style, size).height)
        .collect();
    let gaps = lines.len().saturating_sub(1) as f32 * bounds.line_spacing;
    let total_height = line_heights.iter().sum::<f32>() + gaps;

    LayoutResult {
        wrapped_lines: lines,
        line_heights,
        font_size: size,
        total_height,
    }
}

/// Heading and body layouts for one slide.
#[derive(Clone, Debug, PartialEq)]
pub struct SlideLayout {
    pub heading: LayoutResult,
    pub body: LayoutResult,
}

/// Lay out a slide's heading and body on a `canvas_width` x `canvas_height` image.
pub fn fit_slide<M: TextMeasure + ?Sized>(
    measure: &M,
    heading: &str,
    body: &str,
    canvas_width: u32,
    canvas_height: u32,
    settings: &RenderSettings,
) -> CarouselResult<SlideLayout> {
    let height = canvas_height as f32;
    let min = settings.min_font_size;
    let max = ((height * settings.max_font_ratio) as u32).max(min);
    let max_width_px = canvas_width
        .saturating_sub(2 * settings.side_margin)
        .max(1) as f32;

    let heading_bounds = LayoutBounds {
        max_width_px,
        max_block_height_px: height * settings.heading_height_ratio,
        min_font_size: min,
        max_font_size: max,
        line_spacing: settings.line_spacing,
    };
    let heading = layout(measure, heading, FontStyle::Bold, &heading_bounds)?;

    let body_bounds = LayoutBounds {
        max_block_height_px: height * settings.block_height_ratio
            - heading.total_height
            - settings.budget_gap,
        max_font_size: max.saturating_sub(settings.body_size_offset).max(min),
        ..heading_bounds
    };
    let body = layout(measure, body, FontStyle::Regular, &body_bounds)?;

    debug!(
        heading_size = heading.font_size,
        heading_lines = heading.wrapped_lines.len(),
        body_size = body.font_size,
        body_lines = body.wrapped_lines.len(),
        "Slide text fitted"
    );
    Ok(SlideLayout { heading, body })
}
