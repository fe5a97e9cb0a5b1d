use std::path::PathBuf;

/// File name of the Tabula JAR shipped alongside the executable.
const TABULA_JAR_NAME: &str = "tabula.jar";

/// Returns a possible path to the Tabula JAR file (as a [String] for Tabula's
/// API), assuming that the process is running as part of a distribution.
pub fn tabula_jar() -> Option<String> {
    let path = beside_executable(TABULA_JAR_NAME)?;
    path.to_str().map(str::to_owned)
}

fn beside_executable(file_name: &str) -> Option<PathBuf> {
    let path = std::env::current_exe().ok()?.with_file_name(file_name);
    path.is_file().then_some(path)
}
