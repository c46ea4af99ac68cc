//! Label page SVG to PDF conversion with vector fidelity via svg2pdf.

use crate::error::RenderError;
use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, TextStr};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use usvg::fontdb;

const PAGE_XOBJECT: Name<'static> = Name(b"Label");

/// Converts label page SVGs into one multi-page PDF.
///
/// Each page is parsed with usvg and converted by svg2pdf into a form
/// XObject, so text, bars and boxes stay vector graphics.
pub struct LabelPdfConverter {
    fontdb: Arc<fontdb::Database>,
}

impl LabelPdfConverter {
    /// Creates a converter that resolves text against the system fonts.
    pub fn new() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        debug!("Loaded {} font faces", db.len());
        Self::with_fonts(db)
    }

    /// Creates a converter with an explicit font database.
    pub fn with_fonts(db: fontdb::Database) -> Self {
        Self {
            fontdb: Arc::new(db),
        }
    }

    fn parse(&self, svg: &str, page: usize) -> Result<usvg::Tree, RenderError> {
        let mut options = usvg::Options::default();
        options.fontdb = self.fontdb.clone();

        let tree = usvg::Tree::from_str(svg, &options).map_err(|e| RenderError::Svg {
            page,
            reason: e.to_string(),
        })?;

        let size = tree.size();
        if size.width() <= 0.0 || size.height() <= 0.0 {
            return Err(RenderError::Svg {
                page,
                reason: format!("invalid page dimensions {}x{}", size.width(), size.height()),
            });
        }
        Ok(tree)
    }

    /// Converts page SVGs, in order, into a PDF whose pages all measure
    /// `width_pt` by `height_pt`.
    pub fn convert(&self, pages: &[String], width_pt: f32, height_pt: f32) -> Result<Vec<u8>, RenderError> {
        info!(
            "Converting {} label pages to PDF (VECTOR): {}x{} pt",
            pages.len(),
            width_pt,
            height_pt
        );

        let mut alloc = Ref::new(1);
        let catalog_id = alloc.bump();
        let page_tree_id = alloc.bump();
        let info_id = alloc.bump();

        let mut pdf = Pdf::new();
        let mut page_ids = Vec::with_capacity(pages.len());
        let mut chunks = Vec::with_capacity(pages.len());

        for (index, svg) in pages.iter().enumerate() {
            let tree = self.parse(svg, index + 1)?;

            let (chunk, svg_id) = svg2pdf::to_chunk(&tree, svg2pdf::ConversionOptions::default());
            let mut map = HashMap::new();
            let chunk = chunk.renumber(|old| *map.entry(old).or_insert_with(|| alloc.bump()));
            let svg_id = map.get(&svg_id).copied().ok_or_else(|| RenderError::Svg {
                page: index + 1,
                reason: "converted page has no XObject".to_string(),
            })?;

            let page_id = alloc.bump();
            let content_id = alloc.bump();

            let mut page = pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, width_pt, height_pt));
            page.parent(page_tree_id);
            page.contents(content_id);
            page.resources().x_objects().pair(PAGE_XOBJECT, svg_id);
            page.finish();

            // the XObject spans the unit square
            let mut content = Content::new();
            content.transform([width_pt, 0.0, 0.0, height_pt, 0.0, 0.0]);
            content.x_object(PAGE_XOBJECT);
            pdf.stream(content_id, &content.finish());

            page_ids.push(page_id);
            chunks.push(chunk);
        }

        pdf.catalog(catalog_id).pages(page_tree_id);
        pdf.pages(page_tree_id)
            .kids(page_ids.iter().copied())
            .count(page_ids.len() as i32);
        pdf.document_info(info_id)
            .producer(TextStr(concat!("zpl-render-worker ", env!("CARGO_PKG_VERSION"))));

        for chunk in &chunks {
            pdf.extend(chunk);
        }

        let pdf_data = pdf.finish();
        info!("PDF export complete (VECTOR): {} bytes", pdf_data.len());
        Ok(pdf_data)
    }

    /// Rasterizes one page SVG to PNG, `scale` pixels per CSS pixel.
    pub fn rasterize(&self, svg: &str, scale: f32) -> Result<Vec<u8>, RenderError> {
        let tree = self.parse(svg, 1)?;
        let size = tree.size();
        let width = (size.width() * scale).ceil() as u32;
        let height = (size.height() * scale).ceil() as u32;

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
            RenderError::Preview(format!("cannot allocate {}x{} preview", width, height))
        })?;
        pixmap.fill(resvg::tiny_skia::Color::WHITE);
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );

        pixmap
            .encode_png()
            .map_err(|e| RenderError::Preview(e.to_string()))
    }
}

impl Default for LabelPdfConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> LabelPdfConverter {
        LabelPdfConverter::with_fonts(fontdb::Database::new())
    }

    const PAGE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="144pt" height="72pt" viewBox="0 0 406 203">
        <rect x="10" y="10" width="80" height="80" fill="black"/>
    </svg>"#;

    #[test]
    fn test_convert_pages() {
        let pdf = converter()
            .convert(&[PAGE.to_string(), PAGE.to_string()], 144.0, 72.0)
            .unwrap();

        assert!(pdf.starts_with(b"%PDF-"));
        let doc = lopdf::Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_invalid_svg() {
        let result = converter().convert(&["not an svg".to_string()], 144.0, 72.0);
        assert!(matches!(result, Err(RenderError::Svg { page: 1, .. })));
    }

    #[test]
    fn test_zero_dimensions() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="0" height="0"></svg>"#;
        assert!(converter().convert(&[svg.to_string()], 144.0, 72.0).is_err());
    }

    #[test]
    fn test_rasterize_png() {
        let png = converter().rasterize(PAGE, 2.0).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
