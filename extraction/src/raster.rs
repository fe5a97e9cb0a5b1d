use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::DynamicImage;
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};

use crate::error::{ExtractionError, Tool, require_file};

/// How large to render each page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RenderSize {
    /// Fixed width in pixels, height following the page's aspect ratio.
    Width(i32),
    /// Resolution in dots per inch of the page's physical size.
    Dpi(f32),
}

/// Renders PDF pages to images.
pub trait PageRenderer {
    /// Renders every page of the PDF at `pdf_path`, in page order.
    fn render_pages(&self, pdf_path: &Path, size: RenderSize) -> Result<Vec<DynamicImage>>;
}

/// [PageRenderer] backed by the Pdfium library.
pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    pub fn new() -> Result<Self> {
        let bindings = Pdfium::bind_to_statically_linked_library()
            .context(ExtractionError::ToolUnavailable(Tool::Pdfium))?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

/// PDF user space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

impl PageRenderer for PdfiumRenderer {
    fn render_pages(&self, pdf_path: &Path, size: RenderSize) -> Result<Vec<DynamicImage>> {
        require_file(pdf_path)?;
        let document = self
            .pdfium
            .load_pdf_from_file(pdf_path, None)
            .with_context(|| format!("loading PDF {:?}", pdf_path))?;

        let mut images = Vec::with_capacity(document.pages().len() as usize);
        for (page_index, page) in document.pages().iter().enumerate() {
            let target_width = match size {
                RenderSize::Width(width) => width,
                RenderSize::Dpi(dpi) => (page.width().value * dpi / POINTS_PER_INCH).round() as i32,
            };
            let config = PdfRenderConfig::new().set_target_width(target_width);
            let bitmap = page
                .render_with_config(&config)
                .with_context(|| format!("rendering page index {page_index}"))?;
            log::debug!("Rendered page index {page_index} at width {target_width}.");
            images.push(bitmap.as_image());
        }

        Ok(images)
    }
}

/// Renders each page of `pdf_path` as a JPEG next to the PDF, named after the
/// PDF's file stem with the page number appended: `statement.pdf` produces
/// `statement1.jpeg`, `statement2.jpeg` and so on.
pub fn rasterize_to_jpegs(
    renderer: &dyn PageRenderer,
    pdf_path: &Path,
    dpi: f32,
) -> Result<Vec<PathBuf>> {
    let stem = pdf_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let pages = renderer.render_pages(pdf_path, RenderSize::Dpi(dpi))?;
    let mut written = Vec::with_capacity(pages.len());
    for (page_index, page) in pages.into_iter().enumerate() {
        let output_path = pdf_path.with_file_name(format!("{}{}.jpeg", stem, page_index + 1));
        page.into_rgb8()
            .save_with_format(&output_path, image::ImageFormat::Jpeg)
            .with_context(|| format!("writing page image {:?}", output_path))?;
        written.push(output_path);
    }
    Ok(written)
}
