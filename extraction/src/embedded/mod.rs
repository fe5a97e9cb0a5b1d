//! Text recognised in the raster images embedded in a statement PDF.

mod decode;


use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::{
    error::require_file,
    ocr::{OcrEngine, OcrOptions},
};
use decode::{Decoded, decode_image};

/// Bound on `/Parent` links followed when looking for inherited resources.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// A decoded raster image from a page's resources.
#[derive(Debug)]
pub struct EmbeddedImage {
    /// 0-based index of the page the image was found on.
    pub page_index: usize,
    /// PDF object number of the image stream.
    pub object_number: u32,
    pub image: DynamicImage,
}

impl EmbeddedImage {
    /// File name the image is exported under.
    pub fn file_name(&self) -> String {
        format!("p{}-{}.png", self.page_index, self.object_number)
    }
}

fn dictionary_of<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Dictionary> {
    match object {
        Object::Reference(id) => Ok(doc.get_dictionary(*id)?),
        other => Ok(other.as_dict()?),
    }
}

/// Resources of a page, including those inherited from its ancestors in the
/// page tree.
fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Option<&Dictionary>> {
    let mut node = doc.get_dictionary(page_id)?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return dictionary_of(doc, resources).map(Some);
        }
        match node.get(b"Parent") {
            Ok(parent) => node = doc.get_dictionary(parent.as_reference()?)?,
            Err(_) => return Ok(None),
        }
    }
    Err(anyhow!("page tree deeper than {MAX_PAGE_TREE_DEPTH} levels"))
}

/// Finds and decodes the raster images referenced from each page's
/// `/XObject` resources, in page order and then resource order. Images in
/// encodings that cannot be decoded are skipped with a warning.
pub fn find_embedded_images(doc: &Document) -> Result<Vec<EmbeddedImage>> {
    let mut images = Vec::new();

    for (page_number, page_id) in doc.get_pages() {
        let page_index = page_number as usize - 1;
        let Some(resources) = page_resources(doc, page_id)
            .with_context(|| format!("reading resources of page index {page_index}"))?
        else {
            continue;
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            continue;
        };
        let xobjects = dictionary_of(doc, xobjects)
            .with_context(|| format!("reading XObjects of page index {page_index}"))?;

        for (name, entry) in xobjects.iter() {
            let Object::Reference(image_id) = entry else {
                continue;
            };
            let Ok(stream) = doc.get_object(*image_id).and_then(Object::as_stream) else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .is_ok_and(|subtype| subtype == b"Image");
            if !is_image {
                continue;
            }

            let object_number = image_id.0;
            match decode_image(doc, stream).with_context(|| {
                format!(
                    "decoding image {} (object {}) on page index {}",
                    String::from_utf8_lossy(name),
                    object_number,
                    page_index,
                )
            })? {
                Decoded::Image(image) => {
                    log::debug!(
                        "Found {}x{} image object {} on page index {}.",
                        image.width(),
                        image.height(),
                        object_number,
                        page_index,
                    );
                    images.push(EmbeddedImage {
                        page_index,
                        object_number,
                        image,
                    });
                }
                Decoded::Unsupported(reason) => {
                    log::warn!(
                        "Skipping image object {} on page index {}: unsupported {}.",
                        object_number,
                        page_index,
                        reason,
                    );
                }
            }
        }
    }

    Ok(images)
}

/// Exports every embedded image of the PDF at `pdf_path` as a PNG in
/// `out_dir`, and returns the text recognised in each, in the same order.
///
/// The exported files are left in place.
pub fn extract_image_text(
    ocr: &dyn OcrEngine,
    pdf_path: &Path,
    out_dir: &Path,
) -> Result<Vec<String>> {
    require_file(pdf_path)?;
    let doc = Document::load(pdf_path).with_context(|| format!("loading PDF {:?}", pdf_path))?;

    let images = find_embedded_images(&doc)?;
    log::info!("Found {} embedded images in {:?}.", images.len(), pdf_path);
    if images.is_empty() {
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating embedded image folder {:?}", out_dir))?;

    let options = OcrOptions::default();
    let mut texts = Vec::with_capacity(images.len());
    for embedded in images {
        let image_path = out_dir.join(embedded.file_name());
        embedded
            .image
            .save_with_format(&image_path, image::ImageFormat::Png)
            .with_context(|| format!("writing embedded image {:?}", image_path))?;
        let text = ocr
            .image_to_string(&image_path, &options)
            .with_context(|| format!("recognising text in {:?}", image_path))?;
        texts.push(text);
    }

    Ok(texts)
}
