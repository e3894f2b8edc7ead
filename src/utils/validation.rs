use thiserror::Error;

/// Maximum file size: 100 MiB
pub const MAX_FILE_SIZE: usize = 100 * 1024 * 1024;

/// Media category every accepted upload must belong to
pub const VIDEO_CATEGORY: &str = "video/";

/// Why an upload was refused before anything was stored.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File size must be less than {}MB", .max_size / 1024 / 1024)]
    SizeExceeded { size: usize, max_size: usize },

    #[error("Please select a video file")]
    WrongType,
}

impl ValidationError {
    /// Stable machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            Self::SizeExceeded { .. } => "size_exceeded",
            Self::WrongType => "wrong_type",
        }
    }
}

/// Size and media-type policy applied to every upload attempt.
///
/// The same value is used by the client for early feedback and by the server,
/// where its verdict is the one that gates the storage write.
#[derive(Debug, Clone, Copy)]
pub struct UploadValidator {
    max_size: usize,
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::new(MAX_FILE_SIZE)
    }
}

impl UploadValidator {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Size first, then type.
    pub fn validate(&self, content_type: &str, size: usize) -> Result<(), ValidationError> {
        validate_file_size(size, self.max_size)?;
        validate_mime_type(content_type)
    }
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError::SizeExceeded { size, max_size });
    }
    Ok(())
}

/// Accepts any `video/*` type; parameters such as `; codecs=...` are ignored.
pub fn validate_mime_type(content_type: &str) -> Result<(), ValidationError> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    if normalized.starts_with(VIDEO_CATEGORY) {
        Ok(())
    } else {
        Err(ValidationError::WrongType)
    }
}

/// Extension used in the storage key: text after the last `.` of the original
/// name, lower-cased, restricted to ASCII alphanumerics.
pub fn storage_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if ext.is_empty() { None } else { Some(ext) }
}

/// True for keys and ids that are safe to use as a single path segment.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && !key.contains("..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}
