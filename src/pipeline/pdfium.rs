//! Process-wide pdfium binding.
//!
//! pdfium is loaded once and shared by the extractor and the preview
//! generator. With the `thread_safe` and `sync` features of pdfium-render
//! every call is serialised internally, so a single `&'static Pdfium` is
//! safe to use from any `spawn_blocking` thread.
//!
//! Binding happens at most once. Dropping a second `Pdfium` would call
//! `FPDF_DestroyLibrary` under the live instance, so concurrent first
//! callers wait on the cell instead of racing to build their own.
//!
//! Library resolution, first match wins:
//!
//! 1. the explicit path from [`crate::ProofreadConfig::pdfium_lib_path`]
//!    (a library file or the directory holding it)
//! 2. `PDFIUM_LIB_PATH`
//! 3. the platform library name in the working directory
//! 4. the system library search path
//!
//! The first successful binding is kept for the life of the process.

use crate::error::ProofreadError;
use pdfium_render::prelude::*;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// Return the shared pdfium instance, binding it on first use.
///
/// A failed binding leaves the cell empty, so a later call can retry with a
/// different path.
pub fn bind(lib_path: Option<&Path>) -> Result<&'static Pdfium, ProofreadError> {
    bind_in(&PDFIUM, || load_bindings(lib_path).map(Pdfium::new))
}

fn bind_in<T, F>(cell: &'static OnceCell<T>, init: F) -> Result<&'static T, ProofreadError>
where
    F: FnOnce() -> Result<T, ProofreadError>,
{
    cell.get_or_try_init(init)
}

fn load_bindings(
    lib_path: Option<&Path>,
) -> Result<Box<dyn PdfiumLibraryBindings>, ProofreadError> {
    let mut attempts: Vec<String> = Vec::new();

    let explicit = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(p) = explicit {
        candidates.push(library_file(&p));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    for candidate in candidates {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                info!("Bound pdfium from {}", candidate.display());
                return Ok(bindings);
            }
            Err(e) => {
                debug!("pdfium not loadable from {}: {}", candidate.display(), e);
                attempts.push(format!("{}: {}", candidate.display(), e));
            }
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            info!("Bound system pdfium library");
            Ok(bindings)
        }
        Err(e) => {
            attempts.push(format!("system library: {e}"));
            Err(ProofreadError::PdfiumBindingFailed(attempts.join("; ")))
        }
    }
}

/// A directory resolves to the platform library name inside it.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::time::Duration;

    #[test]
    fn concurrent_first_use_initialises_once() {
        static CELL: OnceCell<usize> = OnceCell::new();
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    let value = bind_in(&CELL, || {
                        std::thread::sleep(Duration::from_millis(20));
                        Ok(BUILT.fetch_add(1, Ordering::SeqCst))
                    })
                    .unwrap();
                    *value
                })
            })
            .collect();

        let seen: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(seen.iter().all(|&v| v == 0));
    }

    #[test]
    fn failed_init_leaves_cell_empty() {
        static CELL: OnceCell<u8> = OnceCell::new();

        let err = bind_in(&CELL, || {
            Err(ProofreadError::PdfiumBindingFailed("missing".into()))
        })
        .unwrap_err();
        assert!(matches!(err, ProofreadError::PdfiumBindingFailed(_)));
        assert!(CELL.get().is_none());

        assert_eq!(*bind_in(&CELL, || Ok(7)).unwrap(), 7);
    }

    #[test]
    fn directory_resolves_to_platform_name() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = library_file(dir.path());
        assert_eq!(resolved.parent(), Some(dir.path()));
        assert!(resolved
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains("pdfium")));
    }

    #[test]
    fn file_path_is_kept() {
        let p = Path::new("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(library_file(p), p.to_path_buf());
    }
}
