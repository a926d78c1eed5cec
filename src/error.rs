//! Error types for IMSM platform discovery

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while probing platform capabilities.
///
/// None of these are fatal to discovery: probe boundaries turn them into
/// "this source has nothing" and resolution moves on to the next source.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sysfs attribute, directory or firmware variable does not exist
    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Length, signature or GUID mismatch in firmware-provided data
    #[error("Malformed data in {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    /// Attribute content could not be parsed as a number
    #[error("Failed to parse attribute {}: {value:?}", path.display())]
    AttributeParse { path: PathBuf, value: String },

    /// A VMD bridge has no resolvable PCI bus
    #[error("Unable to resolve VMD bus for {}", path.display())]
    BusResolution { path: PathBuf },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Report serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build a `Malformed` error.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Map an I/O error to `NotFound` when the path is simply absent.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound { path: path.into() }
        } else {
            Error::Io(err)
        }
    }

    /// Whether this error only says the source has nothing to offer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_missing_path() {
        let err = Error::from_io(
            "/sys/bus/pci/drivers/ahci",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: /sys/bus/pci/drivers/ahci");
    }

    #[test]
    fn test_from_io_keeps_other_errors() {
        let err = Error::from_io(
            "/dev/mem",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_not_found());
    }
}
