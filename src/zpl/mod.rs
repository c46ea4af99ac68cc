//! ZPL conversion engine.
//!
//! Rendering happens in three stages:
//!
//! 1. [`lexer`] splits the stream into `^`/`~` commands.
//! 2. [`parser`] groups commands into `^XA … ^XZ` labels and resolves every
//!    field to absolute dot coordinates.
//! 3. [`svg`] lays each label out as one page sized to the [`LabelSize`], and
//!    [`LabelPdfConverter`] assembles the pages, in input order, into a PDF.
//!
//! Any failure aborts the whole render; no partial documents are produced.

pub mod code128;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod svg;

use crate::converter::LabelPdfConverter;
use crate::error::RenderError;
use crate::label::LabelSize;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use model::ParsedDocument;

/// How the engine treats instructions it does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionPolicy {
    /// Skip the instruction and record a warning.
    #[default]
    Lenient,
    /// Fail the render with `UnsupportedInstruction`.
    Strict,
}

/// Rendered PDF and the facts callers need about it.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub pdf: Vec<u8>,
    pub page_count: usize,
    /// Page width and height in PDF points.
    pub page_size: (f32, f32),
    pub label_size: LabelSize,
    pub warnings: Vec<String>,
}

/// Parses ZPL and renders it to PDF. Holds no per-job state.
pub struct ConversionEngine {
    policy: InstructionPolicy,
    converter: LabelPdfConverter,
}

impl ConversionEngine {
    pub fn new(policy: InstructionPolicy) -> Self {
        Self::with_converter(policy, LabelPdfConverter::new())
    }

    pub fn with_converter(policy: InstructionPolicy, converter: LabelPdfConverter) -> Self {
        Self { policy, converter }
    }

    pub fn policy(&self) -> InstructionPolicy {
        self.policy
    }

    /// Parses `content` into labels without rendering.
    pub fn parse(&self, content: &str) -> Result<ParsedDocument, RenderError> {
        parser::parse(content, self.policy)
    }

    pub fn render(&self, content: &str, label_size: LabelSize) -> Result<RenderedDocument, RenderError> {
        self.render_with_progress(content, label_size, &mut |_, _| {})
    }

    /// Renders `content`, reporting `(labels_done, labels_total)` as each
    /// label page is laid out.
    pub fn render_with_progress(
        &self,
        content: &str,
        label_size: LabelSize,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<RenderedDocument, RenderError> {
        let parsed = self.parse(content)?;
        let total = parsed.labels.len();
        for warning in &parsed.warnings {
            warn!("{}", warning);
        }

        let mut pages = Vec::with_capacity(total);
        for (index, label) in parsed.labels.iter().enumerate() {
            pages.push(svg::label_to_svg(label, label_size, index + 1)?);
            progress(index + 1, total);
        }

        let (width_pt, height_pt) = label_size.page_points();
        let pdf = self.converter.convert(&pages, width_pt, height_pt)?;

        info!(
            label_size = %label_size,
            pages = total,
            warnings = parsed.warnings.len(),
            "Rendered ZPL document"
        );

        Ok(RenderedDocument {
            pdf,
            page_count: total,
            page_size: (width_pt, height_pt),
            label_size,
            warnings: parsed.warnings,
        })
    }

    /// Rasterizes label `index` (0-based) to PNG for previews.
    pub fn render_preview_png(
        &self,
        content: &str,
        label_size: LabelSize,
        index: usize,
        scale: f32,
    ) -> Result<Vec<u8>, RenderError> {
        let parsed = self.parse(content)?;
        let label = parsed.labels.get(index).ok_or_else(|| {
            RenderError::Preview(format!(
                "label {} requested, document has {}",
                index + 1,
                parsed.labels.len()
            ))
        })?;
        let page = svg::label_to_svg(label, label_size, index + 1)?;
        self.converter.rasterize(&page, scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usvg::fontdb;

    fn engine(policy: InstructionPolicy) -> ConversionEngine {
        ConversionEngine::with_converter(policy, LabelPdfConverter::with_fonts(fontdb::Database::new()))
    }

    const TWO_LABELS: &str = "^XA^FO50,50^A0N,40,40^FDFirst^FS^FO50,120^BY2^BCN,80^FD12345678^FS^XZ\n\
                              ^XA^FO20,20^GB300,200,4^FS^FO40,40^FDSecond^FS^XZ";

    #[test]
    fn test_render_two_pages() {
        let mut seen = Vec::new();
        let doc = engine(InstructionPolicy::Lenient)
            .render_with_progress(TWO_LABELS, LabelSize::FourBySix, &mut |done, total| {
                seen.push((done, total))
            })
            .unwrap();

        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.page_size, (288.0, 432.0));
        assert_eq!(seen, vec![(1, 2), (2, 2)]);

        let pdf = lopdf::Document::load_mem(&doc.pdf).unwrap();
        assert_eq!(pdf.get_pages().len(), 2);
    }

    #[test]
    fn test_malformed_block_produces_nothing() {
        let result = engine(InstructionPolicy::Lenient).render("^XA^FDok^FS^XZ^XA^FDopen", LabelSize::TwoByOne);
        assert!(matches!(result, Err(RenderError::MalformedInput(_))));
    }

    #[test]
    fn test_policy_is_applied_uniformly() {
        let source = "^XA^FO0,0^GD100,100,3^FS^FO0,0^FDok^FS^XZ";
        let doc = engine(InstructionPolicy::Lenient)
            .render(source, LabelSize::TwoByOne)
            .unwrap();
        assert_eq!(doc.warnings.len(), 1);

        assert!(matches!(
            engine(InstructionPolicy::Strict).render(source, LabelSize::TwoByOne),
            Err(RenderError::UnsupportedInstruction { .. })
        ));
    }

    #[test]
    fn test_preview_png() {
        let png = engine(InstructionPolicy::Lenient)
            .render_preview_png(TWO_LABELS, LabelSize::TwoByOne, 1, 1.0)
            .unwrap();
        assert_eq!(&png[1..4], b"PNG");

        assert!(matches!(
            engine(InstructionPolicy::Lenient).render_preview_png(TWO_LABELS, LabelSize::TwoByOne, 5, 1.0),
            Err(RenderError::Preview(_))
        ));
    }
}
