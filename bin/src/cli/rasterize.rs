use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use extraction::raster::{PdfiumRenderer, rasterize_to_jpegs};

/// Renders each page of a PDF to a JPEG file next to it, named after the PDF
/// with the page number appended.
#[derive(Args, Debug)]
pub struct Command {
    /// Path to input PDF.
    pdf: PathBuf,

    /// Resolution to render pages at.
    #[arg(long, default_value = "120")]
    dpi: f32,
}

/// Runs the subcommand.
pub fn run(cmd: &Command) -> Result<()> {
    let renderer = PdfiumRenderer::new().with_context(|| "initialising Pdfium")?;
    let written = rasterize_to_jpegs(&renderer, &cmd.pdf, cmd.dpi)
        .with_context(|| format!("rasterizing {:?}", cmd.pdf))?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
