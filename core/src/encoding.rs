/// Encoding and newline preservation for localisation files
use std::io;
use std::path::Path;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Newline {
    #[default]
    Lf,
    Crlf,
}

impl Newline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::Crlf => "\r\n",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileMetadata {
    pub has_bom: bool,
    pub newline: Newline,
}

impl FileMetadata {
    /// Detect BOM and newline style from raw file content
    pub fn detect(content: &[u8]) -> Self {
        Self {
            has_bom: content.starts_with(&UTF8_BOM),
            newline: Self::detect_newline(content),
        }
    }

    fn detect_newline(content: &[u8]) -> Newline {
        // The first line break decides; mixed files are written back uniformly.
        match content.iter().position(|&b| b == b'\n') {
            Some(idx) if idx > 0 && content[idx - 1] == b'\r' => Newline::Crlf,
            _ => Newline::Lf,
        }
    }
}

/// Decode file bytes as UTF-8, dropping a leading BOM.
pub fn decode_text(bytes: &[u8]) -> Result<(String, FileMetadata), io::Error> {
    let metadata = FileMetadata::detect(bytes);
    let body = if metadata.has_bom {
        &bytes[UTF8_BOM.len()..]
    } else {
        bytes
    };
    let text = std::str::from_utf8(body)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
        .to_string();
    Ok((text, metadata))
}

/// Re-apply the newline style and BOM recorded in `metadata`.
pub fn encode_text(text: &str, metadata: &FileMetadata) -> Vec<u8> {
    let normalized = normalize_newlines(text, metadata.newline);
    let mut bytes = Vec::with_capacity(normalized.len() + UTF8_BOM.len());
    if metadata.has_bom {
        bytes.extend_from_slice(&UTF8_BOM);
    }
    bytes.extend_from_slice(normalized.as_bytes());
    bytes
}

pub fn normalize_newlines(text: &str, style: Newline) -> String {
    let unified = text.replace("\r\n", "\n");
    match style {
        Newline::Lf => unified,
        Newline::Crlf => unified.replace('\n', "\r\n"),
    }
}

/// Read a whole text file asynchronously.
pub async fn read_text_file(path: &Path) -> Result<(String, FileMetadata), io::Error> {
    let bytes = tokio::fs::read(path).await?;
    decode_text(&bytes)
}
