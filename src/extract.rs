use std::any::Any;
use std::fs::File;
use std::io::Read;
use std::panic;
use std::path::Path;
use std::sync::Arc;

use log::warn;
use tempfile::TempPath;
use zip::ZipArchive;

use crate::error::ExtractError;

/// Turns an uploaded document into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Pdf,
    Presentation,
}

impl DocumentFormat {
    fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "ppt" | "pptx" => Ok(Self::Presentation),
            _ => Err(ExtractError::UnsupportedFormat(extension)),
        }
    }
}

/// Extracts PDFs through `pdf-extract` and PowerPoint decks by reading the
/// slide XML straight out of the archive.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        match DocumentFormat::from_path(path)? {
            DocumentFormat::Pdf => extract_pdf(path),
            DocumentFormat::Presentation => extract_presentation(path),
        }
    }
}

/// Reads the text out of a downloaded document and deletes the file.
///
/// Every failure, including a reader that panics, comes back as empty text so
/// the caller treats it like a document with nothing in it.
pub async fn read_and_discard(extractor: Arc<dyn TextExtractor>, upload: TempPath) -> String {
    let task = tokio::task::spawn_blocking(move || {
        let extracted = extractor.extract(&upload);
        if let Err(err) = upload.close() {
            warn!("Could not remove uploaded file: {}", err);
        }
        extracted
    });

    match task.await {
        Ok(Ok(text)) => text,
        Ok(Err(err)) => {
            warn!("Extraction failed: {}", err);
            String::new()
        }
        // The upload was dropped, and so deleted, while the task unwound.
        Err(err) => {
            warn!("Extraction task failed: {}", err);
            String::new()
        }
    }
}

// pdf-extract panics instead of erroring on some inputs (e.g. a font that
// the page resources never define).
fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    match panic::catch_unwind(|| pdf_extract::extract_text(path)) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(payload) => Err(ExtractError::Pdf(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "reader panicked".to_string()
    }
}

fn extract_presentation(path: &Path) -> Result<String, ExtractError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;

    // Slides are named ppt/slides/slideN.xml; order them by N, not lexically.
    let mut slides = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect::<Vec<_>>();
    if slides.is_empty() {
        return Err(ExtractError::NoSlides);
    }
    slides.sort();

    let mut text = String::new();
    for (_, name) in slides {
        let mut xml = String::new();
        archive.by_name(&name)?.read_to_string(&mut xml)?;
        for line in xml_to_lines(&xml) {
            text.push_str(&line);
            text.push('\n');
        }
    }
    Ok(text)
}

fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

fn xml_to_lines(xml: &str) -> Vec<String> {
    let with_breaks = xml.replace("</a:p>", "\n").replace("<a:br/>", "\n");

    let mut stripped = String::with_capacity(with_breaks.len());
    let mut in_tag = false;
    for ch in with_breaks.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }

    decode_xml_entities(&stripped)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
