//! PDF page rendering
//!
//! Thin adapter over MuPDF. Documents are opened fresh for every call, so no
//! document handle is shared between requests; all MuPDF work runs on the
//! blocking thread pool.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use mupdf::{Colorspace, Document, Matrix};

use crate::error::{AppError, Result};

/// A page rendered to an encoded PNG
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Render one 0-indexed page at `zoom x zoom` scale and encode it as PNG.
///
/// Output pixel dimensions are the page dimensions in points multiplied by
/// the (clamped) zoom factor.
pub async fn render_page(path: PathBuf, page_index: i32, zoom: f32) -> Result<RenderedPage> {
    if !path.exists() {
        return Err(AppError::NotFound(format!("PDF not found: {}", path.display())));
    }

    let zoom = zoom.clamp(0.1, 4.0);

    tokio::task::spawn_blocking(move || {
        let doc = open_document(&path)?;
        let count = doc.page_count()?;
        if page_index < 0 || page_index >= count {
            return Err(AppError::Render(format!(
                "Page {} out of range (document has {} pages)",
                page_index, count
            )));
        }

        let page = doc.load_page(page_index)?;
        let matrix = Matrix::new_scale(zoom, zoom);
        let colorspace = Colorspace::device_rgb();
        let pixmap = page.to_pixmap(&matrix, &colorspace, true, true)?;

        encode_pixmap_png(&pixmap)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Render task join error: {}", e)))?
}

/// Page count of a document, opened solely for the query
pub async fn page_count(path: PathBuf) -> Result<usize> {
    if !path.exists() {
        return Err(AppError::NotFound(format!("PDF not found: {}", path.display())));
    }

    tokio::task::spawn_blocking(move || {
        let doc = open_document(&path)?;
        Ok(doc.page_count()? as usize)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Page count task join error: {}", e)))?
}

fn open_document(path: &Path) -> Result<Document> {
    let path_str = path
        .to_str()
        .ok_or_else(|| AppError::Internal(format!("Non-UTF-8 path: {}", path.display())))?;
    Ok(Document::open(path_str)?)
}

fn encode_pixmap_png(pixmap: &mupdf::Pixmap) -> Result<RenderedPage> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    // MuPDF hands back device-RGB samples, with or without alpha depending
    // on how the pixmap was created. Normalize to RGBA for encoding.
    let mut rgba_buffer = Vec::with_capacity((width * height * 4) as usize);

    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(0);
            let g = samples.get(offset + 1).copied().unwrap_or(0);
            let b = samples.get(offset + 2).copied().unwrap_or(0);
            let a = if n >= 4 {
                samples.get(offset + 3).copied().unwrap_or(255)
            } else {
                255
            };
            rgba_buffer.extend_from_slice(&[r, g, b, a]);
        }
    }

    let img = image::RgbaImage::from_raw(width, height, rgba_buffer)
        .ok_or_else(|| AppError::Render("Failed to create image buffer".to_string()))?;

    let mut data = Vec::new();
    DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)?;

    Ok(RenderedPage {
        data,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = page_count(PathBuf::from("no-such-dir/missing.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = render_page(PathBuf::from("no-such-dir/missing.pdf"), 0, 2.0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
