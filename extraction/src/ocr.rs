use std::{
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::error::{ExtractionError, Tool};

/// Options for a single OCR call. Unset options are left to the engine's
/// defaults.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OcrOptions {
    /// Tesseract language code, such as `eng`.
    #[serde(default)]
    pub language: Option<String>,
    /// OCR engine mode. `1` selects the LSTM engine only.
    #[serde(default)]
    pub oem: Option<u8>,
    /// Page segmentation mode. `1` is automatic page segmentation with
    /// orientation and script detection.
    #[serde(default)]
    pub psm: Option<u8>,
}

impl OcrOptions {
    /// Options used to recognise rendered statement pages.
    pub fn page_text() -> Self {
        Self {
            language: Some("eng".to_string()),
            oem: Some(1),
            psm: Some(1),
        }
    }

    /// Command line arguments for Tesseract.
    fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(language) = &self.language {
            args.push("-l".to_string());
            args.push(language.clone());
        }
        if let Some(oem) = self.oem {
            args.push("--oem".to_string());
            args.push(oem.to_string());
        }
        if let Some(psm) = self.psm {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }
        args
    }
}

/// Recognises text in image files.
pub trait OcrEngine {
    /// Returns the text recognised in the image at `image_path`.
    fn image_to_string(&self, image_path: &Path, options: &OcrOptions) -> Result<String>;
}

/// [OcrEngine] that runs the Tesseract executable once per image.
pub struct TesseractCli {
    command: PathBuf,
}

impl TesseractCli {
    pub fn new<P>(command: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            command: command.into(),
        }
    }
}

impl OcrEngine for TesseractCli {
    fn image_to_string(&self, image_path: &Path, options: &OcrOptions) -> Result<String> {
        log::debug!("Running {:?} on {:?}.", self.command, image_path);

        let output = Command::new(&self.command)
            .arg(image_path)
            .arg("stdout")
            .args(options.args())
            .output()
            .context(ExtractionError::ToolUnavailable(Tool::Tesseract))
            .with_context(|| format!("running {:?} on {:?}", self.command, image_path))?;

        if !output.status.success() {
            return Err(anyhow!(ExtractionError::ToolUnavailable(Tool::Tesseract))).with_context(
                || {
                    format!(
                        "{:?} exited with {} on {:?}: {}",
                        self.command,
                        output.status,
                        image_path,
                        String::from_utf8_lossy(&output.stderr).trim(),
                    )
                },
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
