#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Bytes of filler between planted items, larger than the test candidate window
pub const GAP: usize = 8192;

/// Candidate window used by the integration scenarios
pub const MAX_CANDIDATE: usize = 4096;

fn document_xml(paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    )
}

fn zip_archive(entries: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data, method) in entries {
        let options = SimpleFileOptions::default().compression_method(*method);
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let xml = document_xml(paragraphs);
    zip_archive(&[
        ("[Content_Types].xml", b"<Types/>".as_slice(), CompressionMethod::Deflated),
        ("word/document.xml", xml.as_bytes(), CompressionMethod::Deflated),
    ])
}

/// Document with a stored spreadsheet package placed before its body
pub fn docx_with_embedded_workbook(paragraphs: &[&str]) -> Vec<u8> {
    let workbook = zip_archive(&[("xl/workbook.xml", b"<workbook/>".as_slice(), CompressionMethod::Deflated)]);
    let xml = document_xml(paragraphs);
    zip_archive(&[
        ("[Content_Types].xml", b"<Types/>".as_slice(), CompressionMethod::Deflated),
        ("word/embeddings/Microsoft_Excel_Worksheet.xlsx", workbook.as_slice(), CompressionMethod::Stored),
        ("word/document.xml", xml.as_bytes(), CompressionMethod::Deflated),
    ])
}

/// Dump builder: items separated by `GAP` filler bytes
pub struct DumpBuilder {
    bytes: Vec<u8>,
    offsets: Vec<u64>,
}

impl DumpBuilder {
    pub fn new() -> Self {
        Self {
            bytes: vec![0xEE; GAP],
            offsets: Vec::new(),
        }
    }

    pub fn plant(mut self, item: &[u8]) -> Self {
        self.offsets.push(self.bytes.len() as u64);
        self.bytes.extend_from_slice(item);
        self.bytes.extend(std::iter::repeat(0u8).take(GAP));
        self
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn build(self) -> (Vec<u8>, Vec<u64>) {
        (self.bytes, self.offsets)
    }
}

/// Three distinct documents, a truncated one and a copy of the first
pub fn mixed_dump() -> (Vec<u8>, Vec<u64>) {
    let first = docx(&["Invoice", "2023-11"]);
    let truncated = docx(&["Never", "finished"]);
    DumpBuilder::new()
        .plant(&first)
        .plant(&docx(&["Meeting notes"]))
        .plant(&truncated[..truncated.len() / 2])
        .plant(&docx(&["Payroll", "Q4"]))
        .plant(&first)
        .build()
}

/// Non-overlapping occurrences of `marker`, scanning left to right
pub fn naive_offsets(haystack: &[u8], marker: &[u8]) -> Vec<u64> {
    let mut found = Vec::new();
    let mut pos = 0;
    while pos + marker.len() <= haystack.len() {
        if &haystack[pos..pos + marker.len()] == marker {
            found.push(pos as u64);
            pos += marker.len();
        } else {
            pos += 1;
        }
    }
    found
}
