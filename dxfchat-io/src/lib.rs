use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use dxfchat_core::document::Document;

mod parser;
mod reader;
mod writer;

use parser::DxfParser;

/// 二进制 DXF 文件头部的哨兵字符串。
const BINARY_SENTINEL: &[u8] = b"AutoCAD Binary DXF";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// 加载过程中被跳过的实体统计，键为 DXF 实体类型名。
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub skipped: BTreeMap<String, usize>,
}

impl LoadReport {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    fn record_skip(&mut self, kind: &str) {
        *self.skipped.entry(kind.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 解析 ASCII DXF 文本。
    pub fn read_str(&self, source: &str) -> Result<Document, IoError> {
        self.read_str_with_report(source)
            .map(|(document, _report)| document)
    }

    pub fn read_str_with_report(&self, source: &str) -> Result<(Document, LoadReport), IoError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let parser = DxfParser::new(source);
        parser.parse().map_err(IoError::from)
    }

    /// 解析上传得到的原始字节。非 UTF-8 内容按有损方式解码，二进制 DXF 直接拒绝。
    pub fn read_bytes_with_report(&self, bytes: &[u8]) -> Result<(Document, LoadReport), IoError> {
        if bytes.starts_with(BINARY_SENTINEL) {
            return Err(IoError::UnsupportedFeature(
                "binary DXF is not supported, save the drawing as ASCII DXF".to_string(),
            ));
        }
        let text = String::from_utf8_lossy(bytes);
        self.read_str_with_report(&text)
    }

    pub fn read_bytes(&self, bytes: &[u8]) -> Result<Document, IoError> {
        self.read_bytes_with_report(bytes)
            .map(|(document, _report)| document)
    }

    /// 序列化为 ASCII DXF 文本。
    pub fn write_string(&self, document: &Document) -> String {
        writer::write_document(document)
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.read_bytes(&data)
    }
}

impl DocumentSaver for DxfFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        fs::write(path, self.write_string(document)).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug)]
enum DxfError {
    Invalid { message: String },
}

impl DxfError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

impl From<DxfError> for IoError {
    fn from(err: DxfError) -> Self {
        match err {
            DxfError::Invalid { message } => IoError::InvalidDocument(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_dxf_is_rejected() {
        let mut bytes = b"AutoCAD Binary DXF\r\n\x1a\x00".to_vec();
        bytes.extend_from_slice(&[0, 1, 2, 3]);
        let err = DxfFacade::new().read_bytes(&bytes).unwrap_err();
        assert!(matches!(err, IoError::UnsupportedFeature(_)));
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let source = "\u{feff}0\nSECTION\n2\nENTITIES\n0\nENDSEC\n0\nEOF\n";
        let document = DxfFacade::new().read_str(source).expect("parse");
        assert_eq!(document.entity_count(), 0);
    }
}
