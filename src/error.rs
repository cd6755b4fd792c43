//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for haplograph operations
#[derive(Error, Debug)]
pub enum HaplographError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// VCF parsing errors (malformed records, missing fields)
    #[error("VCF error: {message}")]
    Vcf { message: String },

    /// A k-mer index, read-mapping, or key file violates its format contract
    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    /// A haplotype id has no sequence source, or a sequence contains
    /// non-ACGT bases where validated ACGT was required
    #[error("Missing reference data: {message}")]
    MissingReference { message: String },

    /// Graph corruption (e.g. one gamete mapping to two haplotypes at a range)
    #[error("Graph invariant violated: {message}")]
    InvariantViolation { message: String },

    /// Configuration errors (invalid CLI arguments)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File not found errors
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Parse errors
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Type alias for Results using HaplographError
pub type Result<T> = std::result::Result<T, HaplographError>;

impl HaplographError {
    /// Create a VCF error with a message
    pub fn vcf(message: impl Into<String>) -> Self {
        Self::Vcf {
            message: message.into(),
        }
    }

    /// Create a malformed-input error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    /// Create a missing-reference error
    pub fn missing_reference(message: impl Into<String>) -> Self {
        Self::MissingReference {
            message: message.into(),
        }
    }

    /// Create an invariant-violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Whether this error should abort the whole run rather than one sample
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation { .. } | Self::Config { .. }
        )
    }
}

// Convert noodles VCF header errors to HaplographError
impl From<noodles::vcf::header::ParseError> for HaplographError {
    fn from(err: noodles::vcf::header::ParseError) -> Self {
        Self::Vcf {
            message: err.to_string(),
        }
    }
}
