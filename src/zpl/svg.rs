//! Lays out a parsed label as an SVG page in printer dots.

use super::code128;
use super::model::*;
use crate::error::RenderError;
use crate::label::LabelSize;
use std::fmt::Write;

const SCALABLE_FAMILY: &str = "Helvetica, Arial, 'Liberation Sans', 'DejaVu Sans', sans-serif";
const BITMAP_FAMILY: &str = "'DejaVu Sans Mono', 'Liberation Mono', 'Courier New', monospace";

/// Share of the font height above the baseline.
const ASCENT: f32 = 0.8;

/// Advance of one monospace glyph relative to the font size.
const GLYPH_ASPECT: f32 = 0.6;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn paint(color: LineColor, reverse: bool) -> (&'static str, &'static str) {
    if reverse {
        ("white", " style=\"mix-blend-mode:difference\"")
    } else {
        (color.as_svg(), "")
    }
}

/// Group transform placing a field of local size `w`×`h` so that its rotated
/// bounding box keeps its top-left corner on the field origin.
fn placement(origin: Origin, orientation: Orientation, w: f32, h: f32) -> String {
    let (x, y) = (origin.x as f32, origin.y as f32);
    let (dx, dy) = if origin.baseline {
        (0.0, 0.0)
    } else {
        match orientation {
            Orientation::Normal => (0.0, 0.0),
            Orientation::Rotated => (h, 0.0),
            Orientation::Inverted => (w, h),
            Orientation::Bottom => (0.0, w),
        }
    };
    format!(
        "translate({} {}) rotate({})",
        x + dx,
        y + dy,
        orientation.degrees()
    )
}

struct TextMetrics {
    family: &'static str,
    weight: &'static str,
    size: f32,
    scale_x: f32,
    advance: f32,
}

fn metrics(font: Font) -> TextMetrics {
    let size = font.height.max(1) as f32;
    let width = font.width.max(1) as f32;
    if font.name == '0' {
        TextMetrics {
            family: SCALABLE_FAMILY,
            weight: "bold",
            size,
            scale_x: width / size,
            advance: width * GLYPH_ASPECT,
        }
    } else {
        TextMetrics {
            family: BITMAP_FAMILY,
            weight: "normal",
            size,
            scale_x: width / (size * GLYPH_ASPECT),
            advance: width,
        }
    }
}

/// Greedy word wrap into at most `max_lines` lines of `max_chars`.
fn wrap(text: &str, max_chars: usize, max_lines: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split("\\&") {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate_len = if line.is_empty() {
                word.chars().count()
            } else {
                line.chars().count() + 1 + word.chars().count()
            };
            if candidate_len > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines.truncate(max_lines.max(1));
    lines
}

fn text_svg(out: &mut String, field: &TextField) {
    let m = metrics(field.font);
    let (fill, blend) = paint(LineColor::Black, field.reverse);

    let (lines, box_width, anchor, anchor_x, line_height) = match field.block {
        Some(block) => {
            let max_chars = ((block.width as f32 / m.advance).floor() as usize).max(1);
            let (anchor, anchor_x) = match block.justify {
                Justify::Center => ("middle", block.width as f32 / 2.0),
                Justify::Right => ("end", block.width as f32),
                Justify::Left | Justify::Justified => ("start", 0.0),
            };
            (
                wrap(&field.text, max_chars, block.max_lines as usize),
                block.width as f32,
                anchor,
                anchor_x,
                (m.size + block.line_spacing as f32).max(1.0),
            )
        }
        None => {
            let width = field.text.chars().count() as f32 * m.advance;
            (vec![field.text.clone()], width, "start", 0.0, m.size)
        }
    };

    let height = line_height * lines.len() as f32;
    let first_baseline = if field.origin.baseline { 0.0 } else { m.size * ASCENT };

    let _ = writeln!(
        out,
        "<g transform=\"{} scale({} 1)\">",
        placement(field.origin, field.orientation, box_width, height),
        m.scale_x
    );
    for (i, line) in lines.iter().enumerate() {
        let _ = writeln!(
            out,
            "<text x=\"{}\" y=\"{}\" font-family=\"{}\" font-weight=\"{}\" font-size=\"{}\" text-anchor=\"{}\" fill=\"{}\"{}>{}</text>",
            anchor_x / m.scale_x,
            first_baseline + i as f32 * line_height,
            m.family,
            m.weight,
            m.size,
            anchor,
            fill,
            blend,
            escape(line)
        );
    }
    out.push_str("</g>\n");
}

fn barcode_svg(out: &mut String, barcode: &Barcode) -> Result<(), RenderError> {
    let modules = code128::encode(&barcode.data, barcode.subset)?;
    let module = barcode.module_width.max(1) as f32;
    let bar_height = barcode.height.max(1) as f32;
    let width = modules.len() as f32 * module;
    let text_size = module * 10.0;
    let text_band = if barcode.interpretation { text_size + 4.0 } else { 0.0 };
    let bars_top = if barcode.interpretation && barcode.interpretation_above {
        text_band
    } else {
        0.0
    };
    let (fill, blend) = paint(LineColor::Black, barcode.reverse);

    let mut origin = barcode.origin;
    if origin.baseline {
        // ^FT anchors the bottom-left corner of the bars
        origin.y = origin.y.saturating_sub(barcode.height);
        origin.baseline = false;
    }

    let _ = writeln!(
        out,
        "<g transform=\"{}\" fill=\"{}\"{}>",
        placement(origin, barcode.orientation, width, bar_height + text_band),
        fill,
        blend
    );

    let mut start = None;
    for (i, bar) in modules.iter().copied().chain(std::iter::once(false)).enumerate() {
        match (bar, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                let _ = writeln!(
                    out,
                    "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"/>",
                    s as f32 * module,
                    bars_top,
                    (i - s) as f32 * module,
                    bar_height
                );
                start = None;
            }
            _ => {}
        }
    }

    if barcode.interpretation {
        let baseline = if barcode.interpretation_above {
            text_size * ASCENT
        } else {
            bar_height + 4.0 + text_size * ASCENT
        };
        let _ = writeln!(
            out,
            "<text x=\"{}\" y=\"{}\" font-family=\"{}\" font-size=\"{}\" text-anchor=\"middle\">{}</text>",
            width / 2.0,
            baseline,
            BITMAP_FAMILY,
            text_size,
            escape(&barcode.data)
        );
    }

    out.push_str("</g>\n");
    Ok(())
}

fn box_svg(out: &mut String, gb: &GraphicBox) {
    let (w, h, t) = (gb.width as f32, gb.height as f32, gb.thickness as f32);
    let radius = gb.rounding as f32 / 8.0 * w.min(h) / 2.0;
    let (color, blend) = paint(gb.color, gb.reverse);
    let transform = placement(gb.origin, Orientation::Normal, w, h);

    if t * 2.0 >= w.min(h) {
        let _ = writeln!(
            out,
            "<rect transform=\"{}\" width=\"{}\" height=\"{}\" rx=\"{}\" fill=\"{}\"{}/>",
            transform, w, h, radius, color, blend
        );
    } else {
        let _ = writeln!(
            out,
            "<rect transform=\"{}\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"{}/>",
            transform,
            t / 2.0,
            t / 2.0,
            w - t,
            h - t,
            (radius - t / 2.0).max(0.0),
            color,
            t,
            blend
        );
    }
}

fn circle_svg(out: &mut String, gc: &GraphicCircle) {
    let (d, t) = (gc.diameter as f32, gc.thickness as f32);
    let (color, blend) = paint(gc.color, gc.reverse);
    let transform = placement(gc.origin, Orientation::Normal, d, d);

    if t * 2.0 >= d {
        let _ = writeln!(
            out,
            "<circle transform=\"{}\" cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{}\"{}/>",
            transform,
            d / 2.0,
            d / 2.0,
            d / 2.0,
            color,
            blend
        );
    } else {
        let _ = writeln!(
            out,
            "<circle transform=\"{}\" cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"{}/>",
            transform,
            d / 2.0,
            d / 2.0,
            (d - t) / 2.0,
            color,
            t,
            blend
        );
    }
}

/// Renders one label as a standalone SVG document sized to `size`.
///
/// The viewBox is the printer's dot canvas, so field coordinates are used
/// unchanged; the physical width and height are given in points.
pub fn label_to_svg(label: &Label, size: LabelSize, number: usize) -> Result<String, RenderError> {
    let (width_pt, height_pt) = size.page_points();
    let (width_dots, height_dots) = size.canvas_dots();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}pt\" height=\"{}pt\" viewBox=\"0 0 {} {}\">",
        width_pt, height_pt, width_dots, height_dots
    );
    let _ = writeln!(
        out,
        "<rect width=\"{}\" height=\"{}\" fill=\"white\"/>",
        width_dots, height_dots
    );

    for element in &label.elements {
        match element {
            Element::Text(text) => text_svg(&mut out, text),
            Element::Barcode(barcode) => barcode_svg(&mut out, barcode).map_err(|e| match e {
                RenderError::MalformedInput(reason) => {
                    RenderError::MalformedInput(format!("label {}: {}", number, reason))
                }
                other => other,
            })?,
            Element::Box(gb) => box_svg(&mut out, gb),
            Element::Circle(gc) => circle_svg(&mut out, gc),
        }
    }

    out.push_str("</svg>\n");
    Ok(out)
}
