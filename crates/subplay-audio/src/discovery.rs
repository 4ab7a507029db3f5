use std::path::{Path, PathBuf};

/// Errors that can occur while listing audio files.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("{0:?} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to read directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Lists the files directly inside `directory` whose extension is one of
/// `extensions`, as absolute paths sorted by path.
///
/// Subdirectories are not descended into.
pub fn find_audio_files(
    directory: &Path,
    extensions: &[String],
) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !directory.is_dir() {
        return Err(DiscoveryError::NotADirectory(directory.to_path_buf()));
    }

    let directory = directory.canonicalize()?;
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
        let path = entry?.path();
        if path.is_file() && crate::has_supported_extension(&path, extensions) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extensions() -> Vec<String> {
        vec![".mp3".to_string(), ".wav".to_string()]
    }

    #[test]
    fn lists_only_supported_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.wav", "a.MP3", "notes.txt", "c.flac"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.mp3")).unwrap();

        let files = find_audio_files(dir.path(), &extensions()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.MP3", "b.wav"]);
        assert!(files.iter().all(|path| path.is_absolute()));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            find_audio_files(&missing, &extensions()),
            Err(DiscoveryError::NotADirectory(_))
        ));
    }
}
