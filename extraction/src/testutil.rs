//! Fakes and fixtures shared by tests within this crate.

use std::{
    cell::RefCell,
    collections::VecDeque,
    path::{Path, PathBuf},
};

use anyhow::Result;
use image::DynamicImage;
use lopdf::{Document, Object, Stream, dictionary};

use crate::{
    ocr::{OcrEngine, OcrOptions},
    raster::{PageRenderer, RenderSize},
    tabula_wrapper::TableExporter,
};

/// [PageRenderer] returning blank grey pages.
pub struct FakeRenderer {
    num_pages: usize,
    requested_sizes: RefCell<Vec<RenderSize>>,
}

impl FakeRenderer {
    pub fn with_pages(num_pages: usize) -> Self {
        Self {
            num_pages,
            requested_sizes: RefCell::new(Vec::new()),
        }
    }

    pub fn requested_sizes(&self) -> Vec<RenderSize> {
        self.requested_sizes.borrow().clone()
    }
}

impl PageRenderer for FakeRenderer {
    fn render_pages(&self, _pdf_path: &Path, size: RenderSize) -> Result<Vec<DynamicImage>> {
        self.requested_sizes.borrow_mut().push(size);
        Ok((0..self.num_pages)
            .map(|_| {
                DynamicImage::ImageRgb8(image::RgbImage::from_pixel(8, 4, image::Rgb([90, 160, 200])))
            })
            .collect())
    }
}

/// Record of one call to [FakeOcr].
#[derive(Debug)]
pub struct OcrCall {
    pub image_path: PathBuf,
    pub options: OcrOptions,
    /// Whether every pixel of the image was pure black or white.
    pub black_and_white: bool,
}

/// [OcrEngine] returning queued responses. Once the queue is empty it returns
/// the file name of the image it was given.
#[derive(Default)]
pub struct FakeOcr {
    responses: RefCell<VecDeque<String>>,
    calls: RefCell<Vec<OcrCall>>,
}

impl FakeOcr {
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: RefCell::new(responses.into_iter().map(Into::into).collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> std::cell::Ref<'_, Vec<OcrCall>> {
        self.calls.borrow()
    }
}

impl OcrEngine for FakeOcr {
    fn image_to_string(&self, image_path: &Path, options: &OcrOptions) -> Result<String> {
        let img = image::open(image_path)?.into_luma8();
        self.calls.borrow_mut().push(OcrCall {
            image_path: image_path.to_owned(),
            options: options.clone(),
            black_and_white: img.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255),
        });
        Ok(self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| {
                image_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            }))
    }
}

/// [TableExporter] that writes fixed CSV content.
pub struct FakeTableExporter {
    pub csv: &'static str,
}

impl TableExporter for FakeTableExporter {
    fn export_csv(&self, _pdf_path: &Path, csv_path: &Path) -> Result<()> {
        std::fs::write(csv_path, self.csv)?;
        Ok(())
    }
}

/// Raw image XObject placed on a test PDF page.
pub struct TestImage {
    pub colour_space: Object,
    pub bits_per_component: i64,
    pub width: i64,
    pub height: i64,
    pub samples: Vec<u8>,
}

impl TestImage {
    /// 8-bit image in the named colour space.
    pub fn new(colour_space: &str, width: i64, height: i64, samples: Vec<u8>) -> Self {
        Self {
            colour_space: colour_space.into(),
            bits_per_component: 8,
            width,
            height,
            samples,
        }
    }
}

/// Writes a PDF to `path` with one page per entry of `pages`, each page's
/// resources holding the given images in order. Returns the object number of
/// each image, per page.
pub fn write_test_pdf(path: &Path, pages: Vec<Vec<TestImage>>) -> Result<Vec<Vec<u32>>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut page_ids: Vec<Object> = Vec::new();
    let mut image_numbers = Vec::new();

    for images in pages {
        let mut xobjects = lopdf::Dictionary::new();
        let mut numbers = Vec::new();
        for (index, image) in images.into_iter().enumerate() {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width,
                    "Height" => image.height,
                    "ColorSpace" => image.colour_space,
                    "BitsPerComponent" => image.bits_per_component,
                },
                image.samples,
            ));
            xobjects.set(format!("Im{}", index), image_id);
            numbers.push(image_id.0);
        }
        image_numbers.push(numbers);

        let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects },
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(200),
                Object::Integer(200),
            ],
        });
        page_ids.push(page_id.into());
    }

    let count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;

    Ok(image_numbers)
}
