use thiserror::Error;

/// I/O errors that can occur when reading from the backing object store
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object not found in the backing store
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Errors produced while parsing or resolving an image request selector
#[derive(Debug, Clone, Error)]
pub enum SelectorError {
    /// A selector segment is malformed or out of range.
    ///
    /// `segment` names the offending path segment ("region", "size",
    /// "rotation", "quality" or "format") so callers can report it.
    #[error("Invalid {segment} parameter: {message}")]
    InvalidParameters {
        segment: &'static str,
        message: String,
    },

    /// The requested output format has no registered encoder
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl SelectorError {
    pub fn invalid(segment: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            segment,
            message: message.into(),
        }
    }
}

/// Errors from the decode/transform/encode pipeline
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    /// I/O error while fetching source bytes
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Selector could not be resolved against the source image
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// Source bytes could not be decoded
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// Raster could not be encoded to the target format
    #[error("Failed to encode image: {message}")]
    Encode { message: String },
}

/// Errors from archive construction
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// Worker-pool provisioning or container assembly failed irrecoverably
    #[error("Archive build failed: {message}")]
    FatalBuild { message: String },

    /// A build is already running for this output key
    #[error("Archive build already in progress: {0}")]
    AlreadyRunning(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_error_names_segment() {
        let err = SelectorError::invalid("region", "bad rect");
        assert_eq!(err.to_string(), "Invalid region parameter: bad rect");
    }

    #[test]
    fn test_image_error_from_io() {
        let err: ImageError = IoError::NotFound("Works/ab/x.jpg".to_string()).into();
        assert!(matches!(err, ImageError::Io(IoError::NotFound(_))));
    }

    #[test]
    fn test_unsupported_format_message() {
        let err = SelectorError::UnsupportedFormat("xyz".to_string());
        assert_eq!(err.to_string(), "Unsupported format: xyz");
    }
}
