use crate::error::BuildError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Enumerates the source files directly inside `folder` carrying the
/// recognized `extension` (matched case-insensitively, without the dot).
///
/// The result is sorted for reproducibility on one filesystem; callers must
/// not rely on the order for correctness.
pub fn list_sources(folder: &Path, extension: &str) -> Result<Vec<PathBuf>, BuildError> {
    if !folder.is_dir() {
        return Err(BuildError::InvalidInput(format!(
            "data folder is not an existing directory: {}",
            folder.display()
        )));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

        if matches {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::list_sources;
    use crate::error::BuildError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn lists_only_matching_extensions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.pdf"), b"%PDF-1.4").unwrap();
        fs::write(dir.path().join("B.PDF"), b"%PDF-1.4").unwrap();
        fs::write(dir.path().join("notes.txt"), b"plain").unwrap();

        let files = list_sources(dir.path(), "pdf").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        }));
    }

    #[test]
    fn does_not_descend_into_subdirectories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("deep.pdf"), b"%PDF-1.4").unwrap();
        fs::write(dir.path().join("top.pdf"), b"%PDF-1.4").unwrap();

        let files = list_sources(dir.path(), "pdf").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("top.pdf"));
    }

    #[test]
    fn empty_folder_yields_an_empty_sequence() {
        let dir = tempdir().unwrap();
        let files = list_sources(dir.path(), "pdf").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn missing_folder_is_invalid_input() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent");
        let error = list_sources(&missing, "pdf").unwrap_err();
        assert!(matches!(error, BuildError::InvalidInput(_)));
    }

    #[test]
    fn listing_is_sorted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.pdf"), b"%PDF-1.4").unwrap();
        fs::write(dir.path().join("a.pdf"), b"%PDF-1.4").unwrap();

        let files = list_sources(dir.path(), "pdf").unwrap();
        assert!(files[0].ends_with("a.pdf"));
        assert!(files[1].ends_with("b.pdf"));
    }
}
