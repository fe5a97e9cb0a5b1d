//! Full extraction of a statement: page fields, embedded image text and
//! tables.

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    config::ExtractConfig,
    document::StatementDocument,
    embedded::extract_image_text,
    error::{ExtractionError, Stage},
    fields::StatementFields,
    ocr::OcrEngine,
    pagetext::PageTextExtractor,
    raster::PageRenderer,
    tabula_wrapper::{TableExporter, extract_table},
    table::Table,
};

/// Everything extracted from one statement.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatementReport {
    /// Text of the first embedded image, without trailing whitespace.
    pub bank_name: String,
    /// Text recognised in each embedded image, in page order.
    pub image_texts: Vec<String>,
    pub fields: StatementFields,
    /// Leading rows of the extracted table.
    pub table: Table,
}

impl fmt::Display for StatementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = &self.fields;
        writeln!(f, "Bank Name  {}", self.bank_name)?;
        writeln!(f)?;
        writeln!(f, "Account Number  {}", fields.account_number)?;
        writeln!(f, "Account Holder Information")?;
        writeln!(f, "First Name:  {}", fields.first_name)?;
        writeln!(f, "Last Name:  {}", fields.last_name)?;
        writeln!(f)?;
        writeln!(f, "Transaction Information")?;
        writeln!(
            f,
            "Transaction Dates from {} to {}",
            fields.date_range.start, fields.date_range.end
        )?;
        writeln!(
            f,
            "Transaction Amount from {} to {}",
            fields.amount_range.start, fields.amount_range.end
        )?;
        writeln!(
            f,
            "Cheque Number from {} to {}",
            fields.cheque_range.start, fields.cheque_range.end
        )?;
        write!(f, "{}", self.table)
    }
}

/// Runs every extraction stage over a statement.
pub struct Extractor<'a> {
    pub renderer: &'a dyn PageRenderer,
    pub ocr: &'a dyn OcrEngine,
    pub tables: &'a dyn TableExporter,
    pub config: &'a ExtractConfig,
}

impl Extractor<'_> {
    /// Extracts the page fields, then the embedded image text (exporting the
    /// images into `embedded_image_dir`), then the tables of `doc`.
    pub fn extract(
        &self,
        doc: &StatementDocument,
        embedded_image_dir: &Path,
    ) -> Result<StatementReport> {
        let fields = PageTextExtractor::new(self.renderer, self.ocr, self.config)
            .extract_fields(doc)
            .context("extracting fields from page text")?;
        log::info!("Extracted fields for account {}.", fields.account_number);

        let image_texts = extract_image_text(self.ocr, doc.pdf_path(), embedded_image_dir)
            .context("extracting text from embedded images")?;
        let bank_name = image_texts
            .first()
            .map(|text| text.trim_end().to_string())
            .ok_or(ExtractionError::EmptyResult(Stage::EmbeddedImages))
            .with_context(|| format!("no embedded images in {:?}", doc.pdf_path()))?;

        let table = extract_table(self.tables, doc).context("extracting tables")?;
        log::info!(
            "Extracted table with {} columns and {} rows.",
            table.num_columns(),
            table.rows.len()
        );

        Ok(StatementReport {
            bank_name,
            image_texts,
            fields,
            table: table.head(self.config.table_head_rows),
        })
    }
}
