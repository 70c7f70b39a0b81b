//! Multipart uploads, validation and download responses

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use axum::{
    extract::Multipart,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use image_tools::ImageKind;
use tracing::debug;

use crate::error::ServerError;

/// How far into a file the `%PDF` marker may appear
const PDF_HEADER_WINDOW: usize = 1024;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

const X_ORIGINAL_SIZE: &str = "x-original-size";
const X_PROCESSED_SIZE: &str = "x-processed-size";

/// The kinds of file a tool accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Pdf,
    Word,
}

impl FileKind {
    pub fn label(self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Pdf => "PDF",
            FileKind::Word => "Word document",
        }
    }

    /// Whether the content's signature matches this kind
    pub fn matches_content(self, data: &[u8]) -> bool {
        match self {
            FileKind::Image => ImageKind::detect(data).is_some(),
            FileKind::Pdf => {
                let window = &data[..data.len().min(PDF_HEADER_WINDOW)];
                window.windows(4).any(|w| w == b"%PDF")
            }
            FileKind::Word => data.starts_with(ZIP_MAGIC),
        }
    }
}

/// One uploaded file, owned by the request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    /// Sanitized client filename
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Lowercase extension without the dot
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    /// Filename without its extension
    pub fn stem(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.filename,
        }
    }

    /// Reject empty files, disallowed extensions and mismatched content
    pub fn validate(&self, kind: FileKind, allowed: &[String]) -> Result<(), ServerError> {
        if self.data.is_empty() {
            return Err(ServerError::InvalidInput(format!(
                "Uploaded file '{}' is empty",
                self.filename
            )));
        }

        let extension = self.extension().unwrap_or_default();
        if !allowed.iter().any(|ext| *ext == extension) {
            return Err(ServerError::InvalidInput(format!(
                "File type not allowed: '{}' (accepted: {})",
                self.filename,
                allowed.join(", ")
            )));
        }

        if !kind.matches_content(&self.data) {
            return Err(ServerError::InvalidInput(format!(
                "'{}' is not a valid {}",
                self.filename,
                kind.label()
            )));
        }

        debug!(
            "Accepted {} '{}' ({} bytes, declared {:?})",
            kind.label(),
            self.filename,
            self.data.len(),
            self.content_type
        );
        Ok(())
    }
}

/// Files and text fields of a multipart submission
#[derive(Debug, Default)]
pub struct UploadForm {
    files: Vec<UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Drain a multipart body
    ///
    /// A file input left empty by the browser (no filename, no content) is
    /// treated as absent.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(raw_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?.to_vec();
                    if raw_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    debug!("Received file '{}' ({} bytes) in '{}'", raw_name, data.len(), name);
                    form.files.push(UploadedFile {
                        field: name,
                        filename: sanitize_filename(&raw_name),
                        content_type,
                        data,
                    });
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Remove the first file uploaded under `field`
    pub fn take_file(&mut self, field: &str) -> Result<UploadedFile, ServerError> {
        let index = self
            .files
            .iter()
            .position(|file| file.field == field)
            .ok_or_else(|| ServerError::InvalidInput(format!("No file uploaded in '{}'", field)))?;
        Ok(self.files.remove(index))
    }

    /// Remove every file uploaded under `field`, in submission order
    pub fn take_files(&mut self, field: &str) -> Vec<UploadedFile> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|file| file.field == field);
        self.files = rest;
        taken
    }

    /// Trimmed text field; blank counts as missing
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Parse an optional field
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>, ServerError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.text(name)
            .map(|value| {
                value.parse::<T>().map_err(|e| {
                    ServerError::InvalidInput(format!("Invalid {} '{}': {}", name, value, e))
                })
            })
            .transpose()
    }

    /// Parse a required field
    pub fn require<T>(&self, name: &str) -> Result<T, ServerError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.parse(name)?
            .ok_or_else(|| ServerError::InvalidInput(format!("Missing field '{}'", name)))
    }
}

/// Reduce a client filename to a safe basename
///
/// Path components are dropped; only ASCII letters, digits, `.`, `-` and `_`
/// survive, and whitespace becomes `_`. Leading dots are stripped so the
/// result is never hidden or a parent reference.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();

    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// A processed artifact sent back as an attachment
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub original_size: usize,
}

impl Download {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
        original_size: usize,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
            original_size,
        }
    }
}

impl IntoResponse for Download {
    fn into_response(self) -> Response {
        let filename = sanitize_filename(&self.filename);
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        headers.insert(X_ORIGINAL_SIZE, HeaderValue::from(self.original_size));
        headers.insert(X_PROCESSED_SIZE, HeaderValue::from(self.data.len()));

        (headers, self.data).into_response()
    }
}
