use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced by the storage engine.
///
/// Parse failures of stored values never show up here: they are recovered
/// locally by substituting module defaults.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage read failed for `{key}`: {reason}")]
    Read { key: String, reason: String },

    #[error("storage write failed for `{key}`: {reason}")]
    Write { key: String, reason: String },

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    #[must_use]
    pub fn write(key: &str, reason: impl Into<String>) -> Self {
        Self::Write {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn read(key: &str, reason: impl Into<String>) -> Self {
        Self::Read {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures of `import_document`. Storage is untouched unless the error is
/// raised from the final save, which is a single write.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import rejected: {0}")]
    Rejected(String),

    #[error("import could not be saved: {0}")]
    Storage(#[from] StoreError),
}

impl ImportError {
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_names_the_key() {
        let err = StoreError::write("organizer-data-v2", "quota exceeded");
        assert_eq!(
            err.to_string(),
            "storage write failed for `organizer-data-v2`: quota exceeded"
        );
    }

    #[test]
    fn import_error_wraps_store_error() {
        let err: ImportError = StoreError::write("k", "denied").into();
        assert!(matches!(err, ImportError::Storage(_)));
        assert!(err.to_string().contains("denied"));
    }
}
