use bytes::Bytes;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// A document as received from the client, before it touches any store.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Document {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Checks the magic bytes; the declared content type is not trusted.
    pub fn looks_like_pdf(&self) -> bool {
        self.bytes.starts_with(b"%PDF")
    }

    /// File name without its extension, used to name derived artifacts.
    pub fn stem(&self) -> &str {
        let name = self.file_name.as_str();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }
}

/// Rasterized preview of a document's first page.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub file_name: String,
    pub bytes: Bytes,
}

impl RasterImage {
    pub fn png_for(document: &Document, bytes: Bytes) -> Self {
        let stem = match document.stem() {
            "" => "resume",
            stem => stem,
        };
        Self {
            file_name: format!("{stem}.png"),
            bytes,
        }
    }
}
