use std::path::Path;

/// Concrete error type for extraction failures that callers might reasonably
/// want to tell apart. Details such as paths are attached as
/// [anyhow::Context] by the code returning the error.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    /// The input document does not exist.
    #[error("input document not found")]
    InputNotFound,
    /// An expected labelled line was absent from the recognised text.
    #[error("no line labelled \"{0}\" found in recognised text")]
    LabelMissing(Label),
    /// The account holder's name did not split into a first and last name.
    #[error("expected account holder name to have 2 space-separated parts, got {tokens}")]
    NameShape { tokens: usize },
    /// An external tool needed for extraction is missing or failed to run.
    #[error("{0} is unavailable or failed")]
    ToolUnavailable(Tool),
    /// A stage produced nothing where at least one result is required.
    #[error("{0} produced no results")]
    EmptyResult(Stage),
}

/// Labels searched for in the recognised statement text.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::AsRefStr, strum_macros::Display)]
pub enum Label {
    #[strum(serialize = "Account Number")]
    AccountNumber,
    #[strum(serialize = "Transaction Date")]
    TransactionDate,
    #[strum(serialize = "Amount")]
    Amount,
    #[strum(serialize = "Cheque number")]
    ChequeNumber,
}

/// External tools invoked during extraction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum Tool {
    #[strum(to_string = "Tesseract OCR")]
    Tesseract,
    #[strum(to_string = "Tabula")]
    Tabula,
    #[strum(to_string = "Pdfium")]
    Pdfium,
}

/// Extraction stages, for reporting empty results.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum Stage {
    #[strum(to_string = "page image extraction")]
    PageImages,
    #[strum(to_string = "embedded image extraction")]
    EmbeddedImages,
}

/// Returns [ExtractionError::InputNotFound] if `path` does not name an
/// existing file.
pub fn require_file(path: &Path) -> anyhow::Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(anyhow::Error::new(ExtractionError::InputNotFound)
            .context(format!("opening {:?}", path)))
    }
}
