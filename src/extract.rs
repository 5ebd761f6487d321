//! Word document reading (OOXML `.docx`).
//!
//! Recovers paragraphs with their styles, headings, tables and the core
//! properties from the ZIP container. Only what the extraction prompts need
//! is parsed; formatting, images and fields are ignored.

use std::io::Read;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::models::{parse_timestamp, DocumentSection, ParsedDocument, SourceDocumentMetadata};
use crate::traits::DocumentReader;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum size of a `.docx` file accepted from disk.
const MAX_DOCX_BYTES: u64 = 200 * 1024 * 1024;

const DOCUMENT_XML: &str = "word/document.xml";
const CORE_XML: &str = "docProps/core.xml";

/// Document read failure. Fatal for that document only.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} exceeds size limit")]
    TooLarge(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Reads `.docx` files from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxReader;

impl DocumentReader for DocxReader {
    fn read(&self, path: &Path) -> Result<ParsedDocument, ReadError> {
        let shown = path.display().to_string();
        let meta = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReadError::NotFound(shown.clone())
            } else {
                ReadError::Io {
                    path: shown.clone(),
                    source: e,
                }
            }
        })?;
        if meta.len() > MAX_DOCX_BYTES {
            return Err(ReadError::TooLarge(shown));
        }
        let bytes = std::fs::read(path).map_err(|e| ReadError::Io {
            path: shown.clone(),
            source: e,
        })?;
        let fallback_title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let (metadata, sections, full_text) = parse_docx(&bytes, &fallback_title)?;
        debug!(
            path = %shown,
            sections = sections.len(),
            chars = full_text.len(),
            "read document"
        );
        Ok(ParsedDocument {
            path: path.to_path_buf(),
            metadata,
            sections,
            full_text,
        })
    }
}

/// Parse an in-memory `.docx`; returns metadata, sections and full text.
pub fn parse_docx(
    bytes: &[u8],
    fallback_title: &str,
) -> Result<(SourceDocumentMetadata, Vec<DocumentSection>, String), ReadError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ReadError::Ooxml(e.to_string()))?;

    let doc_xml = read_zip_entry_bounded(&mut archive, DOCUMENT_XML, MAX_XML_ENTRY_BYTES)?
        .ok_or_else(|| ReadError::Ooxml(format!("{} not found", DOCUMENT_XML)))?;
    let blocks = parse_body(&doc_xml)?;

    let mut metadata = match read_zip_entry_bounded(&mut archive, CORE_XML, MAX_XML_ENTRY_BYTES)? {
        Some(core) => parse_core_properties(&core)?,
        None => SourceDocumentMetadata::default(),
    };
    if metadata.title.trim().is_empty() {
        metadata.title = fallback_title.to_string();
    }

    let (sections, full_text) = build_sections(&blocks);
    Ok((metadata, sections, full_text))
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Option<Vec<u8>>, ReadError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ReadError::Ooxml(e.to_string())),
    };
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ReadError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ReadError::TooLarge(format!("ZIP entry {}", name)));
    }
    Ok(Some(out))
}

/// A top-level body element in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Paragraph { style: Option<String>, text: String },
    Table(Vec<Vec<String>>),
}

/// Walk `word/document.xml` collecting paragraphs and tables.
///
/// Paragraphs nested in table cells contribute to the cell text, not to the
/// paragraph stream.
fn parse_body(xml: &[u8]) -> Result<Vec<Block>, ReadError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut blocks = Vec::new();

    let mut table_depth = 0usize;
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();

    let mut in_paragraph = false;
    let mut in_text = false;
    let mut style: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        rows.clear();
                    }
                }
                b"tr" if table_depth == 1 => row.clear(),
                b"tc" if table_depth == 1 => cell.clear(),
                b"p" => {
                    in_paragraph = true;
                    style = None;
                    text.clear();
                }
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"pStyle" if in_paragraph => style = attr_val(&e),
                b"tab" if in_paragraph => text.push('\t'),
                b"br" | b"cr" if in_paragraph => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let s = t
                    .unescape()
                    .map_err(|e| ReadError::Ooxml(e.to_string()))?;
                text.push_str(&s);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    in_paragraph = false;
                    let para = text.trim().to_string();
                    if table_depth > 0 {
                        if !para.is_empty() {
                            if !cell.is_empty() {
                                cell.push(' ');
                            }
                            cell.push_str(&para);
                        }
                    } else if !para.is_empty() {
                        blocks.push(Block::Paragraph {
                            style: style.take(),
                            text: para,
                        });
                    }
                    text.clear();
                }
                b"tc" if table_depth == 1 => row.push(std::mem::take(&mut cell)),
                b"tr" if table_depth == 1 => rows.push(std::mem::take(&mut row)),
                b"tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 && !rows.is_empty() {
                        blocks.push(Block::Table(std::mem::take(&mut rows)));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ReadError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(blocks)
}

fn attr_val(e: &BytesStart<'_>) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref() == b"val" {
            a.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

/// Heading level for a paragraph style id (`Heading1`, `heading 2`, `Title`).
fn heading_level(style: Option<&str>) -> Option<u8> {
    let style = style?;
    let lower = style.to_ascii_lowercase().replace([' ', '_', '-'], "");
    if lower == "title" {
        return Some(1);
    }
    let rest = lower.strip_prefix("heading")?;
    match rest.parse::<u8>() {
        Ok(n) if (1..=9).contains(&n) => Some(n),
        Ok(_) => Some(5),
        Err(_) if rest.is_empty() => Some(1),
        Err(_) => None,
    }
}

fn render_table(rows: &[Vec<String>]) -> String {
    let mut out = vec!["[TABLE]".to_string()];
    for row in rows {
        out.push(row.join(" | "));
    }
    out.push("[/TABLE]".to_string());
    out.join("\n")
}

/// Group blocks into heading-delimited sections and build the full text.
fn build_sections(blocks: &[Block]) -> (Vec<DocumentSection>, String) {
    let mut sections = Vec::new();
    let mut current = DocumentSection {
        index: 0,
        heading: "Introduction".to_string(),
        level: 0,
        content: String::new(),
    };
    let mut lines: Vec<String> = Vec::new();
    let mut full: Vec<String> = Vec::new();
    let mut next_index = 1usize;

    for block in blocks {
        match block {
            Block::Paragraph { style, text } => {
                full.push(text.clone());
                if let Some(level) = heading_level(style.as_deref()) {
                    current.content = lines.join("\n");
                    if !current.content.is_empty() || current.level > 0 {
                        sections.push(current);
                    }
                    lines.clear();
                    current = DocumentSection {
                        index: next_index,
                        heading: text.clone(),
                        level,
                        content: String::new(),
                    };
                    next_index += 1;
                } else {
                    lines.push(text.clone());
                }
            }
            Block::Table(rows) => {
                let table = render_table(rows);
                full.push(table.clone());
                lines.push(table);
            }
        }
    }
    current.content = lines.join("\n");
    if !current.content.is_empty() || current.level > 0 {
        sections.push(current);
    }
    (sections, full.join("\n\n"))
}

/// Parse `docProps/core.xml` into [`SourceDocumentMetadata`].
fn parse_core_properties(xml: &[u8]) -> Result<SourceDocumentMetadata, ReadError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut meta = SourceDocumentMetadata::default();
    let mut current: Option<Vec<u8>> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => current = Some(e.local_name().as_ref().to_vec()),
            Ok(Event::Text(t)) => {
                if let Some(field) = current.as_deref() {
                    let value = t
                        .unescape()
                        .map_err(|e| ReadError::Ooxml(e.to_string()))?
                        .trim()
                        .to_string();
                    if !value.is_empty() {
                        apply_core_field(&mut meta, field, value);
                    }
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(e) => return Err(ReadError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(meta)
}

fn apply_core_field(meta: &mut SourceDocumentMetadata, field: &[u8], value: String) {
    match field {
        b"title" => meta.title = value,
        b"creator" => meta.author = Some(value),
        b"subject" => meta.subject = Some(value),
        b"lastModifiedBy" => meta.last_modified_by = Some(value),
        b"revision" => meta.revision = Some(value),
        b"created" => meta.created_at = parse_timestamp(&value),
        b"modified" => meta.modified_at = parse_timestamp(&value),
        b"keywords" => {
            meta.keywords = value
                .split([',', ';'])
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn docx(body: &str, core: Option<&str>) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let opts = zip::write::SimpleFileOptions::default();
            zip.start_file(DOCUMENT_XML, opts).unwrap();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"{}\"><w:body>{}</w:body></w:document>",
                W_NS, body
            );
            zip.write_all(xml.as_bytes()).unwrap();
            if let Some(core) = core {
                zip.start_file(CORE_XML, opts).unwrap();
                zip.write_all(core.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    fn para(style: Option<&str>, text: &str) -> String {
        let ppr = style
            .map(|s| format!("<w:pPr><w:pStyle w:val=\"{}\"/></w:pPr>", s))
            .unwrap_or_default();
        format!("<w:p>{}<w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", ppr, text)
    }

    #[test]
    fn invalid_zip_returns_error() {
        let err = parse_docx(b"not a zip", "x").unwrap_err();
        assert!(matches!(err, ReadError::Ooxml(_)));
    }

    #[test]
    fn missing_document_xml_returns_error() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = parse_docx(&buf, "x").unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn headings_split_sections() {
        let body = [
            para(None, "Preamble text."),
            para(Some("Heading1"), "Scope"),
            para(None, "BULKmetrix measures tonnage."),
            para(Some("Heading2"), "Interfaces"),
            para(None, "OPC UA link to QMS."),
            para(Some("Heading1"), "Design"),
            para(None, "Three-tier layout."),
        ]
        .concat();
        let (meta, sections, full) = parse_docx(&docx(&body, None), "Spec").unwrap();
        assert_eq!(meta.title, "Spec");
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0].level, 0);
        assert_eq!(sections[0].content, "Preamble text.");
        assert_eq!(sections[1].heading, "Scope");
        assert_eq!(sections[1].level, 1);
        assert_eq!(sections[2].heading, "Interfaces");
        assert_eq!(sections[2].level, 2);
        assert_eq!(sections[3].index, 3);
        assert!(full.contains("OPC UA link to QMS."));
    }

    #[test]
    fn runs_keep_inner_whitespace() {
        let body = "<w:p><w:r><w:t xml:space=\"preserve\">Hello </w:t></w:r><w:r><w:t>world &amp; more</w:t></w:r></w:p>";
        let (_, sections, _) = parse_docx(&docx(body, None), "x").unwrap();
        assert_eq!(sections[0].content, "Hello world & more");
    }

    #[test]
    fn tables_are_rendered_inline() {
        let table = "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Tag</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Value</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>PLC1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>42</w:t></w:r></w:p></w:tc></w:tr></w:tbl>";
        let body = format!("{}{}", para(Some("Heading1"), "Tags"), table);
        let (_, sections, _) = parse_docx(&docx(&body, None), "x").unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "[TABLE]\nTag | Value\nPLC1 | 42\n[/TABLE]");
    }

    #[test]
    fn core_properties_are_read() {
        let core = r#"<?xml version="1.0"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <dc:title>Conveyor Spec</dc:title>
  <dc:creator>J. Smith</dc:creator>
  <cp:keywords>conveyor, plc; scada</cp:keywords>
  <cp:lastModifiedBy>A. Jones</cp:lastModifiedBy>
  <cp:revision>7</cp:revision>
  <dcterms:created xsi:type="dcterms:W3CDTF">2019-01-02T03:04:05Z</dcterms:created>
  <dcterms:modified xsi:type="dcterms:W3CDTF">2020-07-15T14:30:00Z</dcterms:modified>
</cp:coreProperties>"#;
        let (meta, _, _) = parse_docx(&docx(&para(None, "x"), Some(core)), "fallback").unwrap();
        assert_eq!(meta.title, "Conveyor Spec");
        assert_eq!(meta.author.as_deref(), Some("J. Smith"));
        assert_eq!(meta.last_modified_by.as_deref(), Some("A. Jones"));
        assert_eq!(meta.revision.as_deref(), Some("7"));
        assert_eq!(meta.keywords, vec!["conveyor", "plc", "scada"]);
        assert_eq!(
            meta.modified_at,
            Some(Utc.with_ymd_and_hms(2020, 7, 15, 14, 30, 0).unwrap())
        );
        assert!(meta.created_at.is_some());
    }

    #[test]
    fn heading_styles() {
        assert_eq!(heading_level(Some("Heading1")), Some(1));
        assert_eq!(heading_level(Some("heading 3")), Some(3));
        assert_eq!(heading_level(Some("Title")), Some(1));
        assert_eq!(heading_level(Some("Normal")), None);
        assert_eq!(heading_level(None), None);
    }

    #[test]
    fn reads_document_from_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("pump-station.docx");
        let body = format!("{}{}", para(Some("Heading1"), "Scope"), para(None, "Pumps."));
        std::fs::write(&path, docx(&body, None)).unwrap();

        let doc = DocxReader.read(&path).unwrap();
        assert_eq!(doc.metadata.title, "pump-station");
        assert_eq!(doc.path, path);
        assert!(doc.full_text.contains("Pumps."));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = DocxReader
            .read(Path::new("/definitely/not/here.docx"))
            .unwrap_err();
        assert!(matches!(err, ReadError::NotFound(_)));
    }
}
