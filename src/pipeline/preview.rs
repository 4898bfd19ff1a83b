//! Preview generation: rasterise page 1 of the rendered report to PNG.

use crate::error::ProofreadError;
use crate::pipeline::pdfium;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the preview for a given report: `<report file name>.png`.
///
/// The delete endpoint relies on this to find a report's preview.
pub fn preview_file_name(report: &Path) -> String {
    let name = report
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "preview".to_string());
    format!("{name}.png")
}

/// Render the first page of `report` into `preview_dir` at `dpi`.
pub async fn generate_preview(
    report: &Path,
    preview_dir: &Path,
    dpi: u32,
    pdfium_lib: Option<&Path>,
) -> Result<PathBuf, ProofreadError> {
    let report = report.to_path_buf();
    let preview_dir = preview_dir.to_path_buf();
    let lib = pdfium_lib.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || {
        generate_preview_blocking(&report, &preview_dir, dpi, lib.as_deref())
    })
    .await
    .map_err(|e| ProofreadError::Internal(format!("Preview task panicked: {}", e)))?
}

/// Blocking implementation of preview generation.
pub fn generate_preview_blocking(
    report: &Path,
    preview_dir: &Path,
    dpi: u32,
    pdfium_lib: Option<&Path>,
) -> Result<PathBuf, ProofreadError> {
    let preview_err = |detail: String| ProofreadError::PreviewFailure {
        path: report.to_path_buf(),
        detail,
    };

    std::fs::create_dir_all(preview_dir)
        .map_err(|e| preview_err(format!("cannot create preview directory: {e}")))?;

    let pdfium = pdfium::bind(pdfium_lib)?;
    let document = pdfium
        .load_pdf_from_file(report, None)
        .map_err(|e| preview_err(format!("load: {:?}", e)))?;

    let page = document
        .pages()
        .get(0)
        .map_err(|e| preview_err(format!("first page: {:?}", e)))?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| preview_err(format!("render: {:?}", e)))?;
    let image = bitmap.as_image();
    debug!("Rendered preview {}x{} px at {} dpi", image.width(), image.height(), dpi);

    let mut tmp = tempfile::Builder::new()
        .prefix(".preview-")
        .suffix(".png.tmp")
        .tempfile_in(preview_dir)
        .map_err(|e| preview_err(format!("temp file: {e}")))?;
    image
        .write_to(tmp.as_file_mut(), image::ImageFormat::Png)
        .map_err(|e| preview_err(format!("encode: {e}")))?;

    let target = preview_dir.join(preview_file_name(report));
    tmp.persist(&target)
        .map_err(|e| preview_err(format!("rename: {}", e.error)))?;

    info!("Preview written to {}", target.display());
    Ok(target)
}
