use super::ImageSource;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ImageSource for FileSource {
    fn read_image(&mut self) -> Result<Vec<u8>> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read image from {}", self.path.display()))?;

        tracing::debug!("Read {} bytes from {}", bytes.len(), self.path.display());
        Ok(bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();

        let mut source = FileSource::new(&path);
        assert_eq!(source.read_image().unwrap(), vec![0xFF, 0xD8, 0xFF]);
        assert!(source.describe().ends_with("photo.jpg"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let mut source = FileSource::new("/nonexistent/photo.jpg");
        let err = source.read_image().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/photo.jpg"));
    }
}
