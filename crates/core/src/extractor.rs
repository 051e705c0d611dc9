use crate::error::IngestError;
use chrono::{FixedOffset, NaiveDate, TimeZone};
use lopdf::{Dictionary, Document, Object};
use std::fmt;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-based page number as stored in the PDF page tree.
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub producer: Option<String>,
    pub creator: Option<String>,
    pub author: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractedPdf {
    pub info: DocumentInfo,
    pub total_pages: u32,
    pub pages: Vec<PageText>,
}

pub trait PdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedPdf, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedPdf, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let page_numbers: Vec<u32> = document.get_pages().into_keys().collect();
        let total_pages = page_numbers.len() as u32;

        let pages = collect_page_texts(path, page_numbers, |page_no| {
            document.extract_text(&[page_no])
        })?;

        Ok(ExtractedPdf {
            info: read_document_info(&document),
            total_pages,
            pages,
        })
    }
}

/// Keeps every page whose text can be extracted. Pages that fail are skipped with a
/// warning; the document fails only when no page yields text.
fn collect_page_texts<E: fmt::Display>(
    path: &Path,
    page_numbers: impl IntoIterator<Item = u32>,
    mut extract: impl FnMut(u32) -> Result<String, E>,
) -> Result<Vec<PageText>, IngestError> {
    let mut pages = Vec::new();
    let mut last_error = None;

    for page_no in page_numbers {
        match extract(page_no) {
            Ok(text) if !text.trim().is_empty() => pages.push(PageText {
                number: page_no,
                text,
            }),
            Ok(_) => {}
            Err(error) => {
                warn!(path = %path.display(), page = page_no, %error, "skipping unreadable page");
                last_error = Some(error.to_string());
            }
        }
    }

    if pages.is_empty() {
        let reason = last_error.unwrap_or_else(|| "no readable page text".to_string());
        return Err(IngestError::PdfParse(format!(
            "{}: {reason}",
            path.display()
        )));
    }

    Ok(pages)
}

pub fn extract_pdf(path: &Path) -> Result<ExtractedPdf, IngestError> {
    LopdfExtractor.extract(path)
}

fn read_document_info(document: &Document) -> DocumentInfo {
    let dictionary = match document.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => document.get_object(*id).and_then(Object::as_dict).ok(),
        Ok(Object::Dictionary(dictionary)) => Some(dictionary),
        _ => None,
    };

    let Some(dictionary) = dictionary else {
        return DocumentInfo::default();
    };

    DocumentInfo {
        title: info_string(dictionary, b"Title"),
        producer: info_string(dictionary, b"Producer"),
        creator: info_string(dictionary, b"Creator"),
        author: info_string(dictionary, b"Author"),
        creation_date: info_string(dictionary, b"CreationDate")
            .map(|raw| parse_pdf_date(&raw).unwrap_or(raw)),
        modification_date: info_string(dictionary, b"ModDate")
            .map(|raw| parse_pdf_date(&raw).unwrap_or(raw)),
    }
}

fn info_string(dictionary: &Dictionary, key: &[u8]) -> Option<String> {
    match dictionary.get(key) {
        Ok(Object::String(bytes, _)) => {
            let decoded = decode_pdf_string(bytes);
            let trimmed = decoded.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

/// Decodes a PDF text string: UTF-16BE when it carries a byte order mark, Latin-1 otherwise.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    bytes.iter().map(|byte| char::from(*byte)).collect()
}

/// Converts a PDF date (`D:YYYYMMDDHHmmSSOHH'mm'`) into RFC 3339.
pub fn parse_pdf_date(raw: &str) -> Option<String> {
    let value = raw.trim();
    let value = value.strip_prefix("D:").unwrap_or(value);

    let digits: String = value.chars().take_while(char::is_ascii_digit).collect();
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(slice) => slice.parse().ok(),
            None => Some(default),
        }
    };

    let year = field(0, 4, 1970)? as i32;
    let month = field(4, 2, 1)?;
    let day = field(6, 2, 1)?;
    let hour = field(8, 2, 0)?;
    let minute = field(10, 2, 0)?;
    let second = field(12, 2, 0)?;

    let offset = parse_offset(&value[digits.len()..])?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let stamped = offset.from_local_datetime(&naive).single()?;
    Some(stamped.to_rfc3339())
}

fn parse_offset(rest: &str) -> Option<FixedOffset> {
    let mut chars = rest.chars();
    let sign = match chars.next() {
        None | Some('Z') => return FixedOffset::east_opt(0),
        Some('+') => 1,
        Some('-') => -1,
        Some(_) => return FixedOffset::east_opt(0),
    };

    let digits: String = chars.filter(char::is_ascii_digit).collect();
    let hours: i32 = digits.get(0..2).and_then(|value| value.parse().ok()).unwrap_or(0);
    let minutes: i32 = digits.get(2..4).and_then(|value| value.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
