use std::path::{Path, PathBuf};

/// An input statement PDF and the paths of the files derived from it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatementDocument {
    pdf_path: PathBuf,
    base_dir: PathBuf,
    stem: String,
}

impl StatementDocument {
    /// `pdf_name` is resolved relative to `base_dir`, which also receives the
    /// page image folder and the exported table.
    pub fn new<B, P>(base_dir: B, pdf_name: P) -> Self
    where
        B: Into<PathBuf>,
        P: AsRef<Path>,
    {
        let base_dir = base_dir.into();
        let pdf_path = base_dir.join(pdf_name.as_ref());
        let file_name = pdf_name
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = match file_name.split_once('.') {
            Some((stem, _)) => stem.to_string(),
            None => file_name,
        };
        Self {
            pdf_path,
            base_dir,
            stem,
        }
    }

    pub fn pdf_path(&self) -> &Path {
        &self.pdf_path
    }

    /// File name of the document up to its first `.`.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Folder that rendered page images are written to.
    pub fn page_images_dir(&self) -> PathBuf {
        self.base_dir.join(&self.stem)
    }

    /// File name for the rendered image of the page numbered `page_number`,
    /// counting from 1.
    pub fn page_image_name(&self, page_number: usize) -> String {
        format!("{}_{}.png", self.stem, page_number)
    }

    /// Returns true for file names in the page image folder that are treated
    /// as page images.
    pub fn is_page_image_name(&self, file_name: &str) -> bool {
        file_name.ends_with(".png") && file_name.contains(&self.stem)
    }

    /// Page number encoded in a page image file name, if any.
    pub fn page_number_of(&self, file_name: &str) -> Option<usize> {
        file_name
            .strip_suffix(".png")?
            .strip_prefix(&self.stem)?
            .strip_prefix('_')?
            .parse()
            .ok()
    }

    /// Path of the CSV file that tables are exported into.
    pub fn table_csv_path(&self) -> PathBuf {
        self.base_dir.join(format!("{}.csv", self.stem))
    }
}
