use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use crate::ocr::OcrOptions;

/// Tunables for a statement extraction run.
///
/// Every field has a default, so a configuration file only needs to name the
/// values it changes.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// Luma cutoff for binary thresholding. Pixels strictly brighter become
    /// white, the rest black.
    pub threshold: u8,
    /// Side length of the square erosion kernel.
    pub erosion_kernel: u8,
    /// Number of times the erosion is applied.
    pub erosion_iterations: u32,
    /// Width in pixels that PDF pages are rendered at for OCR.
    pub render_width: i32,
    /// Name or path of the Tesseract executable.
    pub tesseract_command: PathBuf,
    /// OCR options for recognising rendered pages. Omitted keys keep their
    /// [OcrOptions::page_text] values; `null` leaves the option to Tesseract.
    #[serde(deserialize_with = "deserialize_page_ocr")]
    pub ocr: OcrOptions,
    /// Number of table rows shown in the report.
    pub table_head_rows: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            threshold: 150,
            erosion_kernel: 2,
            erosion_iterations: 1,
            render_width: 2000,
            tesseract_command: PathBuf::from("tesseract"),
            ocr: OcrOptions::page_text(),
            table_head_rows: 5,
        }
    }
}

/// Page OCR options as written in a configuration file.
#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PageOcrOptions {
    language: Option<String>,
    oem: Option<u8>,
    psm: Option<u8>,
}

impl Default for PageOcrOptions {
    fn default() -> Self {
        let OcrOptions { language, oem, psm } = OcrOptions::page_text();
        Self { language, oem, psm }
    }
}

fn deserialize_page_ocr<'de, D>(deserializer: D) -> std::result::Result<OcrOptions, D::Error>
where
    D: Deserializer<'de>,
{
    let PageOcrOptions { language, oem, psm } = PageOcrOptions::deserialize(deserializer)?;
    Ok(OcrOptions { language, oem, psm })
}

/// Loads an [ExtractConfig] from the YAML file at `path`.
pub fn load_config(path: &Path) -> Result<ExtractConfig> {
    let rdr = std::fs::File::open(path)
        .with_context(|| format!("opening configuration file {:?}", path))?;
    parse_config(rdr).with_context(|| format!("parsing configuration file {:?}", path))
}

fn parse_config<R: std::io::Read>(rdr: R) -> Result<ExtractConfig> {
    Ok(serde_yaml_ng::from_reader(rdr)?)
}
