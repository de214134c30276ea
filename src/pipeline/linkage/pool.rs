use std::path::Path;

use super::LinkageError;

/// List the file names in `dir` carrying `extension` (case-insensitive).
/// Sub-directories and non UTF-8 names are skipped.
pub fn collect_identifiers(dir: &Path, extension: &str) -> Result<Vec<String>, LinkageError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LinkageError::SourceDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut identifiers = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LinkageError::SourceDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let matches_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !matches_extension {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => identifiers.push(name),
            Err(raw) => {
                tracing::warn!(name = ?raw, "Skipping file with non UTF-8 name");
            }
        }
    }

    identifiers.sort();
    Ok(identifiers)
}
