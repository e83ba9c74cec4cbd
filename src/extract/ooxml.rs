//! Text extraction from OOXML containers (docx, pptx, xlsx).
//!
//! Each format is a ZIP archive of XML parts. The extractors walk the
//! relevant parts with a streaming XML reader and collect the text runs,
//! keeping decompressed reads bounded so a hostile archive cannot balloon
//! memory.

use super::ExtractError;
use quick_xml::events::Event;
use std::io::{Cursor, Read};
use zip::ZipArchive;
use zip::result::ZipError;

/// Upper bound on the decompressed size of any single archive entry.
const ENTRY_SIZE_LIMIT: u64 = 32 * 1024 * 1024;
/// Upper bound on worksheets processed per workbook.
const XLSX_MAX_SHEETS: usize = 64;
/// Upper bound on cells collected per worksheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| ExtractError::Ooxml(format!("not a valid OOXML container: {err}")))
}

/// Read one archive entry, bounded by [`ENTRY_SIZE_LIMIT`].
///
/// Returns `Ok(None)` when the entry does not exist, so callers can decide
/// whether absence is an error for their format.
fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Option<Vec<u8>>, ExtractError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(ExtractError::Ooxml(err.to_string())),
    };

    let mut out = Vec::new();
    entry
        .take(ENTRY_SIZE_LIMIT)
        .read_to_end(&mut out)
        .map_err(|err| ExtractError::Ooxml(err.to_string()))?;
    if out.len() as u64 >= ENTRY_SIZE_LIMIT {
        return Err(ExtractError::Ooxml(format!(
            "entry {name} exceeds the {ENTRY_SIZE_LIMIT} byte limit"
        )));
    }
    Ok(Some(out))
}

/// Collect the text of every `<{run}>` element, inserting a line break at the
/// end of each `<{paragraph}>` element.
///
/// Both docx (`w:t` runs inside `w:p` paragraphs) and pptx (`a:t` runs inside
/// `a:p` paragraphs) reduce to this shape once namespaces are stripped via
/// local names.
fn collect_text_runs(xml: &[u8], run: &[u8], paragraph: &[u8]) -> Result<String, ExtractError> {
    // No trim_text here: whitespace inside a run is significant
    // (`xml:space="preserve"`), and text outside runs is never collected.
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == run => in_run = true,
            Ok(Event::Text(text)) if in_run => {
                out.push_str(text.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == run {
                    in_run = false;
                } else if name.as_ref() == paragraph {
                    push_line_break(&mut out);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(ExtractError::Ooxml(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}

fn push_line_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Extract the body text of a word-processor document.
pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let document = read_entry(&mut archive, "word/document.xml")?
        .ok_or_else(|| ExtractError::Ooxml("word/document.xml not found".to_string()))?;
    collect_text_runs(&document, b"t", b"p")
}

/// Extract the slide text of a presentation, in slide order.
pub fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let slides = numbered_entries(&archive, "ppt/slides/slide");

    let mut parts = Vec::with_capacity(slides.len());
    for name in slides {
        let xml = read_entry(&mut archive, &name)?
            .ok_or_else(|| ExtractError::Ooxml(format!("{name} not found")))?;
        let text = collect_text_runs(&xml, b"t", b"p")?;
        if !text.is_empty() {
            parts.push(text);
        }
    }
    Ok(parts.join("\n"))
}

/// Extract the cell text of a workbook: shared strings resolved per cell,
/// inline numeric values kept as written.
pub fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheets = numbered_entries(&archive, "xl/worksheets/sheet");
    let mut parts = Vec::new();
    for name in sheets.into_iter().take(XLSX_MAX_SHEETS) {
        let xml = read_entry(&mut archive, &name)?
            .ok_or_else(|| ExtractError::Ooxml(format!("{name} not found")))?;
        let text = parse_sheet_cells(&xml, &shared)?;
        if !text.is_empty() {
            parts.push(text);
        }
    }
    Ok(parts.join("\n"))
}

/// Entry names matching `{prefix}N.xml`, sorted by their numeric suffix.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with(prefix) && name.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Parse `xl/sharedStrings.xml` into the indexed string table.
///
/// A `<si>` item may contain several `<t>` runs (rich text); they concatenate
/// into one table entry so cell indexes stay aligned.
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" if current.is_some() => in_text = true,
                _ => {}
            },
            Ok(Event::Text(text)) if in_text => {
                if let Some(item) = current.as_mut() {
                    item.push_str(text.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => {
                    if let Some(item) = current.take() {
                        strings.push(item);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(ExtractError::Ooxml(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Parse one worksheet: cells joined by spaces within a row, rows by newlines.
fn parse_sheet_cells(xml: &[u8], shared: &[String]) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_is_shared = false;
    let mut in_value = false;
    let mut cells_seen = 0usize;

    loop {
        if cells_seen >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    cell_is_shared = e.attributes().any(|attr| {
                        attr.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                }
                b"v" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(text)) if in_value => {
                let value = text.unescape().unwrap_or_default();
                let value = value.trim();
                if !value.is_empty() {
                    if cell_is_shared {
                        if let Some(resolved) = value
                            .parse::<usize>()
                            .ok()
                            .and_then(|index| shared.get(index))
                        {
                            row.push(resolved.clone());
                            cells_seen += 1;
                        }
                    } else {
                        row.push(value.to_string());
                        cells_seen += 1;
                    }
                }
                in_value = false;
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"c" => cell_is_shared = false,
                b"row" => {
                    if !row.is_empty() {
                        push_line_break(&mut out);
                        out.push_str(&row.join(" "));
                        row.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(ExtractError::Ooxml(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !row.is_empty() {
        push_line_break(&mut out);
        out.push_str(&row.join(" "));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, body) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn docx_collects_runs_with_paragraph_breaks() {
        let bytes = build_archive(&[(
            "word/document.xml",
            r#"<w:document xmlns:w="ns">
                 <w:body>
                   <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
                   <w:p><w:r><w:t>Second paragraph</w:t></w:r></w:p>
                 </w:body>
               </w:document>"#,
        )]);

        let text = extract_docx(&bytes).unwrap();
        assert_eq!(text, "Hello world\nSecond paragraph");
    }

    #[test]
    fn docx_without_document_part_fails() {
        let bytes = build_archive(&[("word/styles.xml", "<styles/>")]);
        let err = extract_docx(&bytes).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(msg) if msg.contains("document.xml")));
    }

    #[test]
    fn pptx_orders_slides_numerically() {
        let slide = |text: &str| {
            format!(r#"<p:sld xmlns:a="ns"><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:sld>"#)
        };
        let bytes = build_archive(&[
            ("ppt/slides/slide10.xml", &slide("ten")),
            ("ppt/slides/slide2.xml", &slide("two")),
            ("ppt/slides/slide1.xml", &slide("one")),
        ]);

        let text = extract_pptx(&bytes).unwrap();
        assert_eq!(text, "one\ntwo\nten");
    }

    #[test]
    fn xlsx_resolves_shared_strings_and_keeps_numbers() {
        let bytes = build_archive(&[
            (
                "xl/sharedStrings.xml",
                r#"<sst><si><t>alpha</t></si><si><t>be</t><t>ta</t></si></sst>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet>
                     <sheetData>
                       <row><c t="s"><v>0</v></c><c><v>42</v></c></row>
                       <row><c t="s"><v>1</v></c></row>
                     </sheetData>
                   </worksheet>"#,
            ),
        ]);

        let text = extract_xlsx(&bytes).unwrap();
        assert_eq!(text, "alpha 42\nbeta");
    }

    #[test]
    fn xlsx_without_shared_strings_still_reads_inline_values() {
        let bytes = build_archive(&[(
            "xl/worksheets/sheet1.xml",
            r#"<worksheet><sheetData><row><c><v>7</v></c></row></sheetData></worksheet>"#,
        )]);

        let text = extract_xlsx(&bytes).unwrap();
        assert_eq!(text, "7");
    }

    #[test]
    fn truncated_archive_is_rejected() {
        let err = extract_docx(b"PK\x03\x04 garbage").unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }
}
