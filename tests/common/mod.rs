//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// A paragraph, optionally styled (e.g. `Heading1`).
pub fn para(style: Option<&str>, text: &str) -> String {
    let ppr = style
        .map(|s| format!("<w:pPr><w:pStyle w:val=\"{}\"/></w:pPr>", s))
        .unwrap_or_default();
    format!(
        "<w:p>{}<w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
        ppr, text
    )
}

/// Minimal `.docx` bytes with the given body XML and core properties.
pub fn docx_bytes(body: &str, title: &str, author: &str, modified: Option<&str>) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        let opts = zip::write::SimpleFileOptions::default();
        zip.start_file("word/document.xml", opts).unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"{}\"><w:body>{}</w:body></w:document>",
            W_NS, body
        );
        zip.write_all(xml.as_bytes()).unwrap();

        let modified = modified
            .map(|m| format!("<dcterms:modified xsi:type=\"dcterms:W3CDTF\">{}</dcterms:modified>", m))
            .unwrap_or_default();
        let core = format!(
            "<?xml version=\"1.0\"?>\
<cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:dcterms=\"http://purl.org/dc/terms/\" \
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\
<dc:title>{}</dc:title><dc:creator>{}</dc:creator>{}</cp:coreProperties>",
            title, author, modified
        );
        zip.start_file("docProps/core.xml", opts).unwrap();
        zip.write_all(core.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// Write a two-chapter specification document into `dir`.
pub fn write_spec(dir: &Path, name: &str, modified: Option<&str>) -> PathBuf {
    let body = [
        para(Some("Heading1"), "Scope"),
        para(None, "QMS and BULKmetrix are used on site."),
        para(Some("Heading1"), "Configuration"),
        para(None, "QMS is configured per plant."),
    ]
    .join("");
    let path = dir.join(name);
    std::fs::write(&path, docx_bytes(&body, "Plant Spec", "J. Smith", modified)).unwrap();
    path
}
