//! Input materialization: get the submitted document onto disk and make sure
//! it disappears again.
//!
//! pdfium only opens files by path, so uploaded bytes are written to a
//! uniquely named temp file inside the upload directory. The returned
//! [`MaterializedInput`] removes the file when dropped, which covers every
//! exit from the pipeline including early returns and panics.

use crate::error::ProofreadError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// A document submitted for analysis.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Raw bytes, e.g. an HTTP upload. `filename` is the client's name for
    /// it, used only to check the extension and to name the report.
    Upload {
        filename: Option<String>,
        bytes: Vec<u8>,
    },
    /// A file already on disk. It is consumed: removed once the run ends.
    Path(PathBuf),
}

impl DocumentSource {
    /// Base name for derived artifacts.
    pub fn stem(&self) -> String {
        let name = match self {
            DocumentSource::Upload { filename, .. } => filename.as_deref().map(Path::new),
            DocumentSource::Path(path) => Some(path.as_path()),
        };
        name.and_then(Path::file_stem)
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("documento")
            .to_string()
    }
}

/// The on-disk input for one run. Deleted on drop.
#[derive(Debug)]
pub enum MaterializedInput {
    Temp(NamedTempFile),
    Owned(PathBuf),
}

impl MaterializedInput {
    pub fn path(&self) -> &Path {
        match self {
            MaterializedInput::Temp(file) => file.path(),
            MaterializedInput::Owned(path) => path,
        }
    }
}

impl Drop for MaterializedInput {
    fn drop(&mut self) {
        let path = self.path().to_path_buf();
        let result = match self {
            // NamedTempFile removes itself on drop too; this only surfaces the error.
            MaterializedInput::Temp(_) => std::fs::remove_file(&path),
            MaterializedInput::Owned(path) => std::fs::remove_file(path),
        };
        match result {
            Ok(()) => debug!("Removed input {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove input {}: {}", path.display(), e),
        }
    }
}

/// Put `source` on disk under `upload_dir`.
///
/// Uploads whose file name carries an extension other than `.pdf` are
/// rejected. A path source is taken over as is; it is not copied.
pub fn materialize(
    source: DocumentSource,
    upload_dir: &Path,
) -> Result<MaterializedInput, ProofreadError> {
    match source {
        DocumentSource::Path(path) => {
            debug!("Using input file {}", path.display());
            Ok(MaterializedInput::Owned(path))
        }
        DocumentSource::Upload { filename, bytes } => {
            if let Some(name) = filename.as_deref() {
                check_extension(name)?;
            }
            write_upload(&bytes, upload_dir).map(MaterializedInput::Temp)
        }
    }
}

fn check_extension(filename: &str) -> Result<(), ProofreadError> {
    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        None => Ok(()),
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => Ok(()),
        Some(ext) => Err(ProofreadError::UnsupportedInputType {
            detail: format!("'{filename}' has extension .{ext}, expected .pdf"),
        }),
    }
}

fn write_upload(bytes: &[u8], upload_dir: &Path) -> Result<NamedTempFile, ProofreadError> {
    let write_err = |source: std::io::Error| ProofreadError::UploadWriteFailed {
        path: upload_dir.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(upload_dir).map_err(write_err)?;

    let mut file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".pdf")
        .tempfile_in(upload_dir)
        .map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.flush().map_err(write_err)?;

    debug!("Stored {} bytes at {}", bytes.len(), file.path().display());
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: Option<&str>) -> DocumentSource {
        DocumentSource::Upload {
            filename: name.map(str::to_string),
            bytes: b"%PDF-1.5\n".to_vec(),
        }
    }

    #[test]
    fn upload_lands_in_upload_dir_and_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");

        let input = materialize(upload(Some("tesis.pdf")), &uploads).unwrap();
        let path = input.path().to_path_buf();
        assert!(path.starts_with(&uploads));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5\n");

        drop(input);
        assert!(!path.exists());
    }

    #[test]
    fn concurrent_uploads_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = materialize(upload(Some("a.pdf")), dir.path()).unwrap();
        let b = materialize(upload(Some("a.pdf")), dir.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn owned_path_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"x").unwrap();

        let input = materialize(DocumentSource::Path(path.clone()), dir.path()).unwrap();
        assert_eq!(input.path(), path);
        drop(input);
        assert!(!path.exists());
    }

    #[test]
    fn missing_owned_path_drops_quietly() {
        let input = MaterializedInput::Owned(PathBuf::from("/nonexistent/doc.pdf"));
        drop(input);
    }

    #[test]
    fn extension_check() {
        let dir = tempfile::tempdir().unwrap();
        assert!(materialize(upload(Some("DOC.PDF")), dir.path()).is_ok());
        assert!(materialize(upload(Some("sin_extension")), dir.path()).is_ok());
        assert!(materialize(upload(None), dir.path()).is_ok());

        let err = materialize(upload(Some("notas.docx")), dir.path()).unwrap_err();
        assert!(matches!(err, ProofreadError::UnsupportedInputType { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unwritable_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let err = materialize(upload(None), &blocker).unwrap_err();
        assert!(matches!(err, ProofreadError::UploadWriteFailed { .. }));
    }

    #[test]
    fn stems() {
        assert_eq!(upload(Some("mi tesis.pdf")).stem(), "mi tesis");
        assert_eq!(upload(None).stem(), "documento");
        assert_eq!(DocumentSource::Path("/tmp/x/informe.pdf".into()).stem(), "informe");
    }
}
