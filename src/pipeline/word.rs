//! Word text extraction (`.docx` and Word 97–2003 `.doc`).
//!
//! Unlike PDF, a Word document that yields no text is a hard failure: there
//! is no page count or reliable metadata to build a useful fallback from, so
//! the request stops here with [`DocDiffError::DocumentExtraction`].
//!
//! The container is sniffed from its magic bytes rather than trusted from the
//! filename, since `.doc` uploads are often renamed `.docx` files and vice versa.

use crate::document::{ExtractedText, SourceFormat, UploadedDocument};
use crate::error::DocDiffError;
use encoding_rs::WINDOWS_1252;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::io::{BufReader, Cursor, Read};
use tracing::{debug, info, warn};
use zip::ZipArchive;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

// FIB offsets, see [MS-DOC] 2.5.
const FIB_FLAGS: usize = 0x000A;
const FIB_CCP_TEXT: usize = 0x004C;
const FIB_FC_CLX: usize = 0x01A2;
const FIB_LCB_CLX: usize = 0x01A6;
const FIB_MIN_LEN: usize = FIB_LCB_CLX + 4;

const FLAG_ENCRYPTED: u16 = 0x0100;
const FLAG_WHICH_TABLE: u16 = 0x0200;

/// Word variant of the text extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordExtractor;

impl WordExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract raw text, failing hard when nothing readable comes out.
    pub async fn extract(&self, document: UploadedDocument) -> Result<ExtractedText, DocDiffError> {
        let file_name = document.file_name;
        let bytes = document.bytes;
        let size = bytes.len();

        let text = tokio::task::spawn_blocking(move || extract_raw_text(&bytes))
            .await
            .map_err(|e| DocDiffError::DocumentExtraction {
                file_name: file_name.clone(),
                detail: format!("extraction task panicked: {e}"),
            })?
            .map_err(|detail| {
                warn!("Word document '{}' could not be parsed: {}", file_name, detail);
                DocDiffError::DocumentExtraction {
                    file_name: file_name.clone(),
                    detail,
                }
            })?;

        if text.trim().is_empty() {
            warn!("Word document '{}' contains no text", file_name);
            return Err(DocDiffError::DocumentExtraction {
                file_name,
                detail: "no text could be extracted from the document".into(),
            });
        }

        info!(
            "Word document '{}': extracted {} chars ({} bytes)",
            file_name,
            text.len(),
            size
        );
        Ok(ExtractedText::full(text, SourceFormat::Docx))
    }
}

/// Dispatch on the container signature.
pub fn extract_raw_text(bytes: &[u8]) -> Result<String, String> {
    if bytes.starts_with(ZIP_MAGIC) {
        debug!("Word container: OOXML");
        extract_docx_text(bytes)
    } else if bytes.starts_with(OLE_MAGIC) {
        debug!("Word container: OLE2 (Word 97-2003)");
        extract_doc_text(bytes)
    } else {
        Err("not a Word document (neither an OOXML package nor an OLE2 compound file)".into())
    }
}

// ── OOXML ────────────────────────────────────────────────────────────────────

/// Stream `word/document.xml` and collect run text.
///
/// Paragraph ends become blank lines. `w:tab` / `w:br` / `w:cr` are only
/// honoured inside runs; the same local names appear in paragraph
/// properties as tab-stop definitions.
fn extract_docx_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("invalid DOCX package: {e}"))?;
    let document = archive
        .by_name("word/document.xml")
        .map_err(|e| format!("word/document.xml not found: {e}"))?;

    let mut reader = Reader::from_reader(BufReader::new(document));
    let mut buf = Vec::with_capacity(1024);
    let mut text = String::with_capacity(8192);
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" if in_run => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" if in_run => text.push('\t'),
                b"br" | b"cr" if in_run => text.push('\n'),
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let t = e
                    .unescape()
                    .map_err(|e| format!("invalid text in document.xml: {e}"))?;
                text.push_str(&t);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"r" => in_run = false,
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "malformed document.xml at byte {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

// ── Word 97-2003 ─────────────────────────────────────────────────────────────

/// Read the main document text through the piece table.
fn extract_doc_text(bytes: &[u8]) -> Result<String, String> {
    let mut compound = cfb::CompoundFile::open(Cursor::new(bytes))
        .map_err(|e| format!("invalid Word 97-2003 file: {e}"))?;

    let word_document = read_stream(&mut compound, "/WordDocument")?;
    if word_document.len() < FIB_MIN_LEN {
        return Err(format!(
            "WordDocument stream too short ({} bytes)",
            word_document.len()
        ));
    }

    let flags = read_u16_le(&word_document, FIB_FLAGS).unwrap_or(0);
    if flags & FLAG_ENCRYPTED != 0 {
        return Err("document is encrypted".into());
    }
    let table_name = if flags & FLAG_WHICH_TABLE != 0 {
        "/1Table"
    } else {
        "/0Table"
    };
    let table = read_stream(&mut compound, table_name)?;

    let ccp_text = read_u32_le(&word_document, FIB_CCP_TEXT).unwrap_or(0) as usize;
    let fc_clx = read_u32_le(&word_document, FIB_FC_CLX).unwrap_or(0) as usize;
    let lcb_clx = read_u32_le(&word_document, FIB_LCB_CLX).unwrap_or(0) as usize;
    let clx = table
        .get(fc_clx..fc_clx.saturating_add(lcb_clx))
        .ok_or_else(|| format!("Clx at {fc_clx}+{lcb_clx} is outside the table stream"))?;

    let raw = decode_piece_table(&word_document, clx, ccp_text)?;
    Ok(clean_binary_text(&raw))
}

fn read_stream<F: Read + std::io::Seek>(
    compound: &mut cfb::CompoundFile<F>,
    name: &str,
) -> Result<Vec<u8>, String> {
    let mut stream = compound
        .open_stream(name)
        .map_err(|e| format!("stream {name} not found: {e}"))?;
    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .map_err(|e| format!("failed to read stream {name}: {e}"))?;
    Ok(data)
}

/// Walk the Clx: skip Prc entries, decode the Pcdt's pieces.
///
/// Pieces are either UTF-16LE or "compressed" Windows-1252 (bit 30 of the
/// file offset set, offset stored doubled). Decoding stops after `ccp_text`
/// characters, which ends the main document before footnotes and headers.
fn decode_piece_table(word_document: &[u8], clx: &[u8], ccp_text: usize) -> Result<String, String> {
    let mut pos = 0usize;
    while pos < clx.len() {
        match clx[pos] {
            0x01 => {
                let cb = read_u16_le(clx, pos + 1).ok_or("truncated Prc entry")? as usize;
                pos += 3 + cb;
            }
            0x02 => {
                let lcb = read_u32_le(clx, pos + 1).ok_or("truncated Pcdt header")? as usize;
                let plc = clx
                    .get(pos + 5..pos + 5 + lcb)
                    .ok_or("truncated piece table")?;
                return decode_pieces(word_document, plc, ccp_text);
            }
            other => return Err(format!("unexpected Clx entry type 0x{other:02X}")),
        }
    }
    Err("piece table not found".into())
}

fn decode_pieces(word_document: &[u8], plc: &[u8], ccp_text: usize) -> Result<String, String> {
    if plc.len() < 4 {
        return Err("empty piece table".into());
    }
    // n + 1 character positions (4 bytes) followed by n piece descriptors (8 bytes).
    let pieces = (plc.len() - 4) / 12;
    let descriptors = (pieces + 1) * 4;

    let mut text = String::new();
    let mut remaining = ccp_text;

    for i in 0..pieces {
        if remaining == 0 {
            break;
        }
        let cp_start = read_u32_le(plc, i * 4).ok_or("truncated CP array")? as usize;
        let cp_end = read_u32_le(plc, (i + 1) * 4).ok_or("truncated CP array")? as usize;
        if cp_end <= cp_start {
            continue;
        }
        let count = (cp_end - cp_start).min(remaining);

        let fc_raw = read_u32_le(plc, descriptors + i * 8 + 2).ok_or("truncated piece descriptor")?;
        let compressed = fc_raw & 0x4000_0000 != 0;
        let fc = (fc_raw & 0x3FFF_FFFF) as usize;

        if compressed {
            let start = fc / 2;
            let slice = word_document
                .get(start..start + count)
                .ok_or_else(|| format!("piece {i} is outside the WordDocument stream"))?;
            text.push_str(&WINDOWS_1252.decode_without_bom_handling(slice).0);
        } else {
            let slice = word_document
                .get(fc..fc + count * 2)
                .ok_or_else(|| format!("piece {i} is outside the WordDocument stream"))?;
            let units: Vec<u16> = slice
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            text.push_str(&String::from_utf16_lossy(&units));
        }

        remaining -= count;
    }

    Ok(text)
}

/// Map Word's in-band control characters to plain text.
///
/// Field instructions (between 0x13 and 0x14) are dropped, field results
/// (between 0x14 and 0x15) are kept. Fields nest.
fn clean_binary_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    // One entry per open field: `true` while still in its instruction part.
    let mut fields: Vec<bool> = Vec::new();

    for ch in raw.chars() {
        match ch {
            '\u{13}' => fields.push(true),
            '\u{14}' => {
                if let Some(top) = fields.last_mut() {
                    *top = false;
                }
            }
            '\u{15}' => {
                fields.pop();
            }
            _ if fields.iter().any(|&instr| instr) => {}
            '\r' | '\u{0C}' => out.push_str("\n\n"),
            '\u{0B}' => out.push('\n'),
            '\u{07}' => out.push('\t'),
            '\t' | '\n' => out.push(ch),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn read_u16_le(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", FileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn upload(bytes: Vec<u8>) -> UploadedDocument {
        UploadedDocument::new(bytes, "", "contract.docx")
    }

    #[test]
    fn docx_paragraphs_and_runs() {
        let bytes = docx_with_body(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Article 1</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Fees &amp; </w:t></w:r><w:r><w:t>charges</w:t><w:tab/><w:t>apply</w:t></w:r></w:p>"#,
        );
        let text = extract_raw_text(&bytes).unwrap();
        assert!(text.starts_with("Article 1\n\n"), "got: {text:?}");
        assert!(text.contains("Fees & charges\tapply"), "got: {text:?}");
        assert_eq!(text.matches('\t').count(), 1, "tab stops must not leak: {text:?}");
    }

    #[test]
    fn docx_line_breaks() {
        let bytes = docx_with_body(r#"<w:p><w:r><w:t>one</w:t><w:br/><w:t>two</w:t></w:r></w:p>"#);
        let text = extract_raw_text(&bytes).unwrap();
        assert!(text.contains("one\ntwo"));
    }

    #[tokio::test]
    async fn whitespace_only_docx_is_hard_failure() {
        let bytes = docx_with_body(r#"<w:p><w:r><w:t xml:space="preserve">   </w:t></w:r></w:p><w:p/>"#);
        let err = WordExtractor::new().extract(upload(bytes)).await.unwrap_err();
        assert!(matches!(err, DocDiffError::DocumentExtraction { .. }), "{err}");
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn docx_extracts_full_text() {
        let bytes = docx_with_body(r#"<w:p><w:r><w:t>Payment is due in 30 days.</w:t></w:r></w:p>"#);
        let out = WordExtractor::new().extract(upload(bytes)).await.unwrap();
        assert_eq!(out.source_format, SourceFormat::Docx);
        assert!(out.content.contains("Payment is due in 30 days."));
    }

    #[tokio::test]
    async fn garbage_is_hard_failure_with_cause() {
        let err = WordExtractor::new()
            .extract(upload(b"this is plainly not a word file".to_vec()))
            .await
            .unwrap_err();
        match err {
            DocDiffError::DocumentExtraction { file_name, detail } => {
                assert_eq!(file_name, "contract.docx");
                assert!(detail.contains("not a Word document"), "{detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zip_without_document_xml() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("readme.txt", FileOptions::default()).unwrap();
        zip.write_all(b"hello").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        let err = extract_raw_text(&bytes).unwrap_err();
        assert!(err.contains("word/document.xml"), "{err}");
    }

    #[test]
    fn piece_table_mixed_encodings() {
        // WordDocument: "Hello" as cp1252 at 0x100, "Wörld" as UTF-16LE at 0x200.
        let mut word_document = vec![0u8; 0x300];
        word_document[0x100..0x105].copy_from_slice(b"Hello");
        for (i, unit) in "W\u{f6}rld".encode_utf16().enumerate() {
            word_document[0x200 + i * 2..0x200 + i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }

        let mut plc = Vec::new();
        for cp in [0u32, 5, 10] {
            plc.extend_from_slice(&cp.to_le_bytes());
        }
        // Compressed piece: offset doubled, bit 30 set.
        plc.extend_from_slice(&[0, 0]);
        plc.extend_from_slice(&(0x4000_0000u32 | 0x200).to_le_bytes());
        plc.extend_from_slice(&[0, 0]);
        // Unicode piece.
        plc.extend_from_slice(&[0, 0]);
        plc.extend_from_slice(&0x200u32.to_le_bytes());
        plc.extend_from_slice(&[0, 0]);

        let mut clx = vec![0x01, 0x02, 0x00, 0xAA, 0xBB]; // one Prc with 2 bytes of grpprl
        clx.push(0x02);
        clx.extend_from_slice(&(plc.len() as u32).to_le_bytes());
        clx.extend_from_slice(&plc);

        assert_eq!(
            decode_piece_table(&word_document, &clx, 10).unwrap(),
            "HelloW\u{f6}rld"
        );
        // ccpText cuts the main document short.
        assert_eq!(decode_piece_table(&word_document, &clx, 7).unwrap(), "HelloW\u{f6}");
    }

    #[test]
    fn piece_table_rejects_unknown_entry() {
        assert!(decode_piece_table(&[], &[0x07, 0, 0], 1).is_err());
        assert!(decode_piece_table(&[], &[], 1).is_err());
    }

    #[test]
    fn binary_control_characters() {
        let raw = "Title\r\u{13} HYPERLINK \"x\" \u{14}link text\u{15} body\u{07}cell\u{0B}next\u{01}";
        assert_eq!(
            clean_binary_text(raw),
            "Title\n\nlink text body\tcell\nnext"
        );
    }

    #[test]
    fn nested_fields() {
        let raw = "a\u{13}IF \u{13}PAGE\u{14}3\u{15}\u{14}yes\u{15}b";
        assert_eq!(clean_binary_text(raw), "ayesb");
    }
}
