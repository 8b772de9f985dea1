//! Corpus loading: plain text, PDF and Word (`.docx`) files.
//!
//! Files are visited recursively in sorted order. Unsupported extensions are
//! skipped; a file that cannot be read is recorded in the report and the load
//! carries on with the rest of the corpus.

use regex::Regex;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{Document, LoadFailure, LoadReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Text,
    Pdf,
    Docx,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(SourceFormat::Text),
            "pdf" => Some(SourceFormat::Pdf),
            "docx" => Some(SourceFormat::Docx),
            _ => None,
        }
    }
}

pub fn load_documents(root: &Path) -> Result<LoadReport> {
    if !root.is_dir() {
        return Err(Error::NotFound(format!("corpus directory {}", root.display())));
    }
    let mut report = LoadReport::default();
    let (files, walk_failures) = list_files(root);
    for failure in walk_failures {
        warn!(path = %failure.path.display(), error = %failure.message, "failed to walk corpus entry");
        report.failures.push(failure);
    }
    for path in files {
        match load_file(&path) {
            Ok(doc) => report.documents.push(doc),
            Err(Error::UnsupportedFormat(_)) => {
                debug!(path = %path.display(), "skipping unsupported file");
                report.skipped.push(path);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load document");
                report.failures.push(LoadFailure { path, message: e.to_string() });
            }
        }
    }
    info!(
        root = %root.display(),
        documents = report.documents.len(),
        failures = report.failures.len(),
        skipped = report.skipped.len(),
        "corpus loaded"
    );
    Ok(report)
}

pub fn load_file(path: &Path) -> Result<Document> {
    let format = SourceFormat::from_path(path)
        .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
    let text = match format {
        SourceFormat::Text => read_txt(path)?,
        SourceFormat::Pdf => read_pdf(path)?,
        SourceFormat::Docx => read_docx(path)?,
    };
    Ok(Document { text, source_path: path.to_string_lossy().into_owned(), page: None })
}

/// Files under `root` in sorted order, following symlinks. Entries the walk
/// cannot read (permissions, broken links, link cycles) come back as failures.
fn list_files(root: &Path) -> (Vec<PathBuf>, Vec<LoadFailure>) {
    let mut files = Vec::new();
    let mut failures = Vec::new();
    for entry in walkdir::WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
            Ok(_) => {}
            Err(e) => failures.push(LoadFailure {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
                message: e.to_string(),
            }),
        }
    }
    files.sort();
    failures.sort_by(|a, b| a.path.cmp(&b.path));
    (files, failures)
}

fn read_txt(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::document_read(path, e))?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(content),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}

fn read_pdf(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::document_read(path, e))?;
    // pdf-extract panics on some malformed inputs
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .map_err(|_| Error::document_read(path, "PDF parser panicked"))?
        .map_err(|e| Error::document_read(path, e))?;
    Ok(pages.join("\n"))
}

fn read_docx(path: &Path) -> Result<String> {
    let file = fs::File::open(path).map_err(|e| Error::document_read(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::document_read(path, e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::document_read(path, e))?
        .read_to_string(&mut xml)
        .map_err(|e| Error::document_read(path, e))?;
    docx_xml_to_text(&xml).map_err(|e| Error::document_read(path, e))
}

const DOCX_TOKENS: &str = r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab\s*/>|<w:(?:br|cr)(?:\s[^>]*)?/>|</w:p>";

/// Flatten WordprocessingML into text: one line per paragraph, tabs and breaks kept.
pub fn docx_xml_to_text(xml: &str) -> Result<String> {
    let re = Regex::new(DOCX_TOKENS).map_err(Error::operation)?;
    let entities = Regex::new(XML_ENTITY).map_err(Error::operation)?;
    let mut out = String::new();
    for cap in re.captures_iter(xml) {
        if let Some(run) = cap.get(1) {
            out.push_str(&decode_entities(&entities, run.as_str()));
            continue;
        }
        let token = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
        if token.starts_with("<w:tab") {
            out.push('\t');
        } else {
            out.push('\n');
        }
    }
    Ok(out.trim_end_matches('\n').to_string())
}

const XML_ENTITY: &str = r"&(?:#x([0-9A-Fa-f]+)|#([0-9]+)|(lt|gt|quot|apos|amp));";

/// Named and numeric (`&#8217;`, `&#x2019;`) references. Anything unrecognised is kept verbatim.
fn decode_entities(re: &Regex, s: &str) -> String {
    re.replace_all(s, |cap: &regex::Captures| {
        let decoded = if let Some(hex) = cap.get(1) {
            u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
        } else if let Some(dec) = cap.get(2) {
            dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
        } else {
            match cap.get(3).map(|m| m.as_str()) {
                Some("lt") => Some('<'),
                Some("gt") => Some('>'),
                Some("quot") => Some('"'),
                Some("apos") => Some('\''),
                Some("amp") => Some('&'),
                _ => None,
            }
        };
        decoded.map_or_else(|| cap[0].to_string(), String::from)
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docx_paragraphs_tabs_and_entities() {
        let xml = r#"<w:document><w:body>
            <w:p><w:pPr><w:jc w:val="left"/></w:pPr><w:r><w:t>Leave &amp; PTO</w:t></w:r></w:p>
            <w:p><w:r><w:t xml:space="preserve">Days:</w:t><w:tab/><w:t>20</w:t></w:r></w:p>
            <w:tbl/>
        </w:body></w:document>"#;
        assert_eq!(docx_xml_to_text(xml).unwrap(), "Leave & PTO\nDays:\t20");
    }

    #[test]
    fn docx_numeric_character_references() {
        let xml = r#"<w:p><w:r><w:t>Employee&#8217;s leave &#x2013; &amp;#38; &#xD800;</w:t></w:r></w:p>"#;
        assert_eq!(docx_xml_to_text(xml).unwrap(), "Employee\u{2019}s leave \u{2013} &#38; &#xD800;");
    }

    #[test]
    fn format_detection_is_case_insensitive() {
        assert_eq!(SourceFormat::from_path(Path::new("a/Handbook.PDF")), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::from_path(Path::new("notes.Txt")), Some(SourceFormat::Text));
        assert_eq!(SourceFormat::from_path(Path::new("policy.docx")), Some(SourceFormat::Docx));
        assert_eq!(SourceFormat::from_path(Path::new("image.png")), None);
        assert_eq!(SourceFormat::from_path(Path::new("README")), None);
    }
}
