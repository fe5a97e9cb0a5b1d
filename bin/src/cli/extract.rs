use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use extraction::{
    config::{ExtractConfig, load_config},
    document::StatementDocument,
    ocr::TesseractCli,
    raster::PdfiumRenderer,
    statement::{Extractor, StatementReport},
    tabula_wrapper::LazyTabulaClient,
};

use crate::distpaths;

/// Extracts the account details, bank name and transaction table from a
/// scanned bank statement PDF, and prints them.
#[derive(Args, Debug)]
pub struct Command {
    /// Statement PDF, relative to --base-dir.
    #[arg(default_value = "bank.pdf")]
    pdf: PathBuf,

    /// Directory holding the PDF. Page images and the exported table CSV are
    /// written here too.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Directory that images embedded in the PDF are exported into.
    #[arg(long, default_value = ".")]
    embedded_image_dir: PathBuf,

    /// Path to Tabula JAR file. Defaults to tabula.jar next to this program.
    #[arg(long)]
    tabula_libpath: Option<String>,

    /// Path to a YAML file overriding extraction settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// How to print the extracted details.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    /// Labelled lines followed by the first rows of the table.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Runs the subcommand.
pub fn run(cmd: &Command) -> Result<()> {
    let config = match &cmd.config {
        Some(path) => {
            log::info!("Loading configuration from {:?}.", path);
            load_config(path)?
        }
        None => ExtractConfig::default(),
    };

    let tables = LazyTabulaClient::new(cmd.tabula_libpath.clone().or_else(distpaths::tabula_jar));
    let renderer = PdfiumRenderer::new().with_context(|| "initialising Pdfium")?;
    let ocr = TesseractCli::new(&config.tesseract_command);

    let extractor = Extractor {
        renderer: &renderer,
        ocr: &ocr,
        tables: &tables,
        config: &config,
    };
    let doc = StatementDocument::new(&cmd.base_dir, &cmd.pdf);
    let report = extractor
        .extract(&doc, &cmd.embedded_image_dir)
        .with_context(|| format!("extracting statement {:?}", doc.pdf_path()))?;

    println!("{}", render(&report, cmd.format)?);
    Ok(())
}

fn render(report: &StatementReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(report.to_string()),
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).with_context(|| "encoding report as JSON")
        }
    }
}
