//! `.env` loading

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Load variables from a `.env` file in the working directory or its parents
///
/// Existing process variables win over file entries. Returns the path that
/// was loaded, or `None` when no file was found.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            warn!("Ignoring unreadable .env file: {e}");
            None
        }
    }
}

/// Parse a `.env` file into key/value pairs without touching the process
/// environment
pub fn read_dotenv_file(path: &Path) -> Result<Vec<(String, String)>, dotenvy::Error> {
    dotenvy::from_path_iter(path)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_dotenv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "STOCK_LIST=NVDA.US,AAPL.US").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "OUTPUT_DIR=report").unwrap();

        let vars = read_dotenv_file(file.path()).unwrap();
        assert_eq!(
            vars,
            vec![
                ("STOCK_LIST".to_string(), "NVDA.US,AAPL.US".to_string()),
                ("OUTPUT_DIR".to_string(), "report".to_string()),
            ]
        );
    }
}
