use std::{cell::OnceCell, path::Path};

use anyhow::{Context, Result};

use crate::{
    document::StatementDocument,
    error::{ExtractionError, Tool, require_file},
    table::{Table, load_csv},
};

/// Exports the tables detected in a PDF as CSV.
pub trait TableExporter {
    /// Writes every table found on any page of `pdf_path` to `csv_path`.
    fn export_csv(&self, pdf_path: &Path, csv_path: &Path) -> Result<()>;
}

/// Client wrapper around Tabula.
pub struct TabulaClient {
    vm: tabula::TabulaVM,
}

impl TabulaClient {
    /// Starts a JVM hosting the Tabula JAR at `libpath`.
    pub fn new(libpath: &str) -> Result<Self> {
        if !Path::new(libpath).is_file() {
            return Err(anyhow::Error::new(ExtractionError::ToolUnavailable(
                Tool::Tabula,
            ))
            .context(format!("Tabula JAR not found at {:?}", libpath)));
        }
        let vm = tabula::TabulaVM::new(libpath, false)
            .context(ExtractionError::ToolUnavailable(Tool::Tabula))
            .with_context(|| format!("starting JVM for Tabula JAR {:?}", libpath))?;
        Ok(TabulaClient { vm })
    }
}

impl TableExporter for TabulaClient {
    fn export_csv(&self, pdf_path: &Path, csv_path: &Path) -> Result<()> {
        let env = self.vm.attach().with_context(|| "attaching to TabulaVM")?;

        let tabula = env
            .configure_tabula(
                None,
                None,
                tabula::OutputFormat::Csv,
                true,
                tabula::ExtractionMethod::Decide,
                false,
                None,
            )
            .with_context(|| "configuring Tabula to extract all tables")?;

        tabula
            .parse_document_into(pdf_path, csv_path)
            .with_context(|| format!("extracting tables from {:?} into {:?}", pdf_path, csv_path))?;
        Ok(())
    }
}

/// Starts Tabula on the first export, so that a missing JAR only fails the
/// table stage.
pub struct LazyTabulaClient {
    libpath: Option<String>,
    client: OnceCell<TabulaClient>,
}

impl LazyTabulaClient {
    pub fn new(libpath: Option<String>) -> Self {
        LazyTabulaClient {
            libpath,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> Result<&TabulaClient> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let libpath = self
            .libpath
            .as_deref()
            .ok_or(ExtractionError::ToolUnavailable(Tool::Tabula))
            .context("no Tabula JAR given and tabula.jar is not installed")?;
        let client = TabulaClient::new(libpath).context("initialising Tabula")?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl TableExporter for LazyTabulaClient {
    fn export_csv(&self, pdf_path: &Path, csv_path: &Path) -> Result<()> {
        self.client()?.export_csv(pdf_path, csv_path)
    }
}

/// Exports the tables of `doc` to its CSV path and loads the result.
pub fn extract_table(exporter: &dyn TableExporter, doc: &StatementDocument) -> Result<Table> {
    require_file(doc.pdf_path())?;
    let csv_path = doc.table_csv_path();
    exporter.export_csv(doc.pdf_path(), &csv_path)?;
    log::info!("Exported tables of {:?} to {:?}.", doc.pdf_path(), csv_path);
    load_csv(&csv_path)
}
