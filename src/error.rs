//! Error handling for the conversion engine.
//!
//! Mirrors the teacher's `errors.rs`: one `thiserror` enum covering every
//! fatal and recoverable condition the pipeline can hit, plus `From`
//! impls for the external error types the pipeline touches.

use thiserror::Error;

/// Engine-wide result type.
pub type ConvertResult<T> = Result<T, ConvertError>;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("conversion cancelled by user")]
    Cancelled,

    #[error("unsupported source type: {type_token}")]
    UnsupportedType { type_token: String },

    #[error("illegal affinity encountered during value coercion: {affinity}")]
    IllegalAffinity { affinity: String },

    #[error("introspection failed: {message}")]
    Introspection { message: String },

    #[error("DDL execution failed for {object}: {message}")]
    Ddl { object: String, message: String },

    #[error("row copy failed for table {table}: {message}")]
    RowCopy { table: String, message: String },

    #[error("invalid configuration: {message}")]
    Configuration { message: String },
}

impl ConvertError {
    pub fn category(&self) -> &'static str {
        match self {
            ConvertError::Cancelled => "cancelled",
            ConvertError::UnsupportedType { .. } => "unsupported_type",
            ConvertError::IllegalAffinity { .. } => "illegal_affinity",
            ConvertError::Introspection { .. } => "introspection",
            ConvertError::Ddl { .. } => "ddl",
            ConvertError::RowCopy { .. } => "row_copy",
            ConvertError::Configuration { .. } => "configuration",
        }
    }

    /// True iff the message matches the "cancelled" error surface spec.md
    /// §6 requires the progress handler's final message to carry.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConvertError::Cancelled)
    }
}

impl From<rusqlite::Error> for ConvertError {
    fn from(err: rusqlite::Error) -> Self {
        ConvertError::Ddl {
            object: "sqlite".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<tiberius::error::Error> for ConvertError {
    fn from(err: tiberius::error::Error) -> Self {
        ConvertError::Introspection {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_stable() {
        assert_eq!(ConvertError::Cancelled.category(), "cancelled");
        assert_eq!(
            ConvertError::UnsupportedType {
                type_token: "geography".into()
            }
            .category(),
            "unsupported_type"
        );
    }

    #[test]
    fn cancelled_message_matches_cancelled() {
        let err = ConvertError::Cancelled;
        assert!(err.is_cancelled());
        assert!(err.to_string().to_lowercase().contains("cancelled"));
    }
}
