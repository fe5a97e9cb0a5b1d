//! Statement fields from rendered and recognised page images.


use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::{
    config::ExtractConfig,
    document::StatementDocument,
    error::{ExtractionError, Stage},
    fields::{StatementFields, parse_fields},
    ocr::OcrEngine,
    preprocess::Cleanup,
    raster::{PageRenderer, RenderSize},
};

/// Renders a statement's pages to images, recognises their text, and parses
/// the statement fields.
pub struct PageTextExtractor<'a> {
    renderer: &'a dyn PageRenderer,
    ocr: &'a dyn OcrEngine,
    config: &'a ExtractConfig,
}

impl<'a> PageTextExtractor<'a> {
    pub fn new(
        renderer: &'a dyn PageRenderer,
        ocr: &'a dyn OcrEngine,
        config: &'a ExtractConfig,
    ) -> Self {
        Self {
            renderer,
            ocr,
            config,
        }
    }

    /// Extracts the statement fields of `doc`.
    ///
    /// Every page image in the document's image folder is recognised, but the
    /// fields come from the text of the last one only.
    pub fn extract_fields(&self, doc: &StatementDocument) -> Result<StatementFields> {
        self.write_page_images(doc)?;

        let mut last_text: Option<String> = None;
        for image_path in list_page_images(doc)? {
            let text = self
                .recognise_page(&image_path)
                .with_context(|| format!("recognising text in {:?}", image_path))?;
            log::debug!("Recognised {} characters in {:?}.", text.len(), image_path);
            last_text = Some(text);
        }

        let text = last_text
            .ok_or(ExtractionError::EmptyResult(Stage::PageImages))
            .with_context(|| format!("no page images in {:?}", doc.page_images_dir()))?;
        parse_fields(&text).context("parsing statement fields from recognised text")
    }

    /// Renders each page of `doc` into its page image folder, creating the
    /// folder if needed. Returns the paths written.
    pub fn write_page_images(&self, doc: &StatementDocument) -> Result<Vec<PathBuf>> {
        let pages = self
            .renderer
            .render_pages(doc.pdf_path(), RenderSize::Width(self.config.render_width))
            .with_context(|| format!("rendering pages of {:?}", doc.pdf_path()))?;

        let images_dir = doc.page_images_dir();
        if !images_dir.exists() {
            std::fs::create_dir(&images_dir)
                .with_context(|| format!("creating page image folder {:?}", images_dir))?;
        }

        let mut written = Vec::with_capacity(pages.len());
        for (page_index, page) in pages.into_iter().enumerate() {
            let image_path = images_dir.join(doc.page_image_name(page_index + 1));
            page.save_with_format(&image_path, image::ImageFormat::Png)
                .with_context(|| format!("writing page image {:?}", image_path))?;
            written.push(image_path);
        }
        log::info!("Wrote {} page images to {:?}.", written.len(), images_dir);

        Ok(written)
    }

    fn recognise_page(&self, image_path: &std::path::Path) -> Result<String> {
        let cleaned = Cleanup::from(self.config).load_and_apply(image_path)?;

        let scratch = tempfile::Builder::new()
            .prefix("stmtscan-page-")
            .suffix(".png")
            .tempfile()
            .context("creating temporary file for cleaned page image")?;
        cleaned
            .save_with_format(scratch.path(), image::ImageFormat::Png)
            .context("writing cleaned page image")?;

        self.ocr.image_to_string(scratch.path(), &self.config.ocr)
    }
}

/// Lists the page images in the image folder of `doc`, ordered by page number.
/// Images without a page number in their name come last, by file name.
pub fn list_page_images(doc: &StatementDocument) -> Result<Vec<PathBuf>> {
    let images_dir = doc.page_images_dir();
    let mut entries: Vec<(usize, String, PathBuf)> = Vec::new();

    for dir_entry in walkdir::WalkDir::new(&images_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let dir_entry =
            dir_entry.with_context(|| format!("listing page images in {:?}", images_dir))?;
        if !dir_entry.file_type().is_file() {
            continue;
        }
        let file_name = dir_entry.file_name().to_string_lossy().into_owned();
        if !doc.is_page_image_name(&file_name) {
            continue;
        }
        let page_number = doc.page_number_of(&file_name).unwrap_or(usize::MAX);
        entries.push((page_number, file_name, dir_entry.into_path()));
    }

    entries.sort();
    Ok(entries.into_iter().map(|(_, _, path)| path).collect())
}
