//! PDF writing, reading and recompression with `lopdf`.

use lopdf::{dictionary, Document, Object, Stream};

/// A4 in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const LINE_HEIGHT: f32 = 14.0;
const FONT_SIZE: f32 = 12.0;

/// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

fn char_width(c: char) -> f32 {
    let units = match c as u32 {
        code @ 32..=126 => HELVETICA_WIDTHS[(code - 32) as usize],
        _ => 556,
    };
    f32::from(units) * FONT_SIZE / 1000.0
}

fn text_width(s: &str) -> f32 {
    s.chars().map(char_width).sum()
}

/// Greedy word wrap: each source line becomes one or more output lines no
/// wider than `max_width`. Blank source lines are dropped.
pub(crate) fn wrap_lines(text: &str, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split(' ') {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if text_width(&candidate) > max_width && !current.is_empty() {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        if !current.trim().is_empty() {
            lines.push(current);
        }
    }

    lines
}

fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            '\t' => "    ".to_string(),
            c if c.is_ascii() && !c.is_control() => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}

fn page_content(lines: &[String]) -> String {
    let mut content = String::new();
    content.push_str("BT\n");
    content.push_str(&format!("/F1 {FONT_SIZE} Tf\n"));
    content.push_str(&format!("{LINE_HEIGHT} TL\n"));
    content.push_str(&format!("{MARGIN} {} Td\n", PAGE_HEIGHT - MARGIN));
    for line in lines {
        content.push_str(&format!("({}) Tj T*\n", escape_pdf_string(line)));
    }
    content.push_str("ET\n");
    content
}

/// Lay plain text out on A4 pages in 12pt Helvetica.
pub(crate) fn text_to_pdf(text: &str) -> Result<Vec<u8>, String> {
    let lines = wrap_lines(text, PAGE_WIDTH - 2.0 * MARGIN);
    let per_page = ((PAGE_HEIGHT - 2.0 * MARGIN) / LINE_HEIGHT).floor() as usize + 1;
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![&[]]
    } else {
        lines.chunks(per_page).collect()
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut page_ids = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            page_content(chunk).into_bytes(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| (*id).into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(|e| e.to_string())?;
    Ok(buffer)
}

/// Extract the text of every page, one trailing newline per page.
pub(crate) fn pdf_to_text(bytes: &[u8]) -> Result<String, String> {
    let doc = Document::load_mem(bytes).map_err(|e| format!("unreadable PDF: {e}"))?;
    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(page_text.trim_end());
                text.push('\n');
            }
            Err(e) => tracing::debug!(page = page_num, "Skipping page without extractable text: {e}"),
        }
    }
    Ok(text)
}

pub(crate) fn page_count(bytes: &[u8]) -> Option<u32> {
    Document::load_mem(bytes)
        .ok()
        .and_then(|doc| u32::try_from(doc.get_pages().len()).ok())
}

/// Drop unreferenced objects and deflate every stream.
pub(crate) fn compress(bytes: &[u8]) -> Result<Vec<u8>, String> {
    let mut doc = Document::load_mem(bytes).map_err(|e| format!("unreadable PDF: {e}"))?;
    doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.compress();
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(|e| e.to_string())?;
    Ok(buffer)
}
