//! Minimal WordprocessingML reading and writing.
//!
//! Reading walks `word/document.xml` and emits one line per paragraph.
//! Writing produces the smallest package Word opens: content types, the
//! package relationship, and a body of plain paragraphs.

use std::io::{Cursor, Read, Write};

use quick_xml::escape::{escape, resolve_predefined_entity};
use quick_xml::events::{BytesRef, Event};
use quick_xml::Reader;
use zip::write::SimpleFileOptions;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_CLOSE: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#;

/// Extract paragraph text from a `.docx` package.
pub(crate) fn docx_to_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| format!("failed to open DOCX: {e}"))?;
    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| format!("failed to find document.xml: {e}"))?;

    let mut xml = String::new();
    document_xml
        .read_to_string(&mut xml)
        .map_err(|e| format!("failed to read document.xml: {e}"))?;

    parse_document_xml(&xml)
}

/// The text an entity reference such as `&amp;` or `&#x41;` stands for.
fn resolve_reference(reference: &BytesRef<'_>) -> Option<String> {
    if let Ok(Some(c)) = reference.resolve_char_ref() {
        return Some(c.to_string());
    }
    let name = reference.decode().ok()?;
    resolve_predefined_entity(&name).map(str::to_string)
}

fn parse_document_xml(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let decoded = e
                    .decode()
                    .map_err(|e| format!("XML decoding error: {e}"))?;
                text.push_str(&decoded);
            }
            Ok(Event::GeneralRef(e)) if in_text => {
                if let Some(resolved) = resolve_reference(&e) {
                    text.push_str(&resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parsing error: {e}")),
            _ => {}
        }
    }

    Ok(text)
}

/// Escape a line for a text node, dropping control characters XML forbids.
fn escape_xml(s: &str) -> String {
    let printable: String = s.chars().filter(|c| !c.is_control() || *c == '\t').collect();
    escape(printable).into_owned()
}

/// Build a `.docx` with one paragraph per trimmed, non-empty line of `text`.
pub(crate) fn text_to_docx(text: &str) -> Result<Vec<u8>, String> {
    let mut body = String::from(DOCUMENT_OPEN);
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        body.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
        body.push_str(&escape_xml(line));
        body.push_str("</w:t></w:r></w:p>");
    }
    body.push_str(DOCUMENT_CLOSE);

    let err = |e: zip::result::ZipError| format!("failed to write DOCX: {e}");
    let io_err = |e: std::io::Error| format!("failed to write DOCX: {e}");
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("word/document.xml", body.as_str()),
    ] {
        zip.start_file(name, options).map_err(err)?;
        zip.write_all(content.as_bytes()).map_err(io_err)?;
    }
    let cursor = zip.finish().map_err(err)?;
    Ok(cursor.into_inner())
}
