use std::borrow::Cow;

/// An `ErrorMetadata` can be attached to an `anyhow::Error` chain via
/// `.context(e /* ErrorMetadata */)`. It tags an error with the kind of
/// failure that produced it so callers can classify without string-matching
/// on the display message.
///
/// `short_msg` is a stable ScreamingCamelCase tag usable in tests and logs;
/// `msg` is the longer, human-readable message.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{msg}")]
pub struct ErrorMetadata {
    pub code: ErrorCode,
    pub short_msg: Cow<'static, str>,
    pub msg: Cow<'static, str>,
}

/// The error taxonomy for the cache core. None of these ever escape the
/// Facade as exceptions -- every Facade entry point catches the full chain
/// and returns the neutral failure value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Operation attempted before a successful `init`.
    NotInitialized,
    /// JSON parse failure or a required field missing.
    MalformedInput,
    /// The date-key column is absent from `columns`, or isn't typed `TEXT`.
    InvalidSchema,
    /// An unknown downsampling filter name.
    InvalidFilter,
    /// A `CacheStore` insert or query failed.
    StorageError,
    /// A timestamp didn't parse in the canonical format.
    InvalidTime,
}

impl ErrorMetadata {
    pub fn not_initialized(msg: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: ErrorCode::NotInitialized,
            short_msg: Cow::Borrowed("NotInitialized"),
            msg: msg.into(),
        }
    }

    pub fn malformed_input(
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: ErrorCode::MalformedInput,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    pub fn invalid_schema(msg: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: ErrorCode::InvalidSchema,
            short_msg: Cow::Borrowed("InvalidSchema"),
            msg: msg.into(),
        }
    }

    pub fn invalid_filter(msg: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: ErrorCode::InvalidFilter,
            short_msg: Cow::Borrowed("InvalidFilter"),
            msg: msg.into(),
        }
    }

    pub fn storage_error(msg: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: ErrorCode::StorageError,
            short_msg: Cow::Borrowed("StorageError"),
            msg: msg.into(),
        }
    }

    pub fn invalid_time(msg: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: ErrorCode::InvalidTime,
            short_msg: Cow::Borrowed("InvalidTime"),
            msg: msg.into(),
        }
    }
}

/// Extension trait for pulling an [`ErrorMetadata`] back out of an
/// `anyhow::Error` chain, the way callers that need to branch on `code`
/// (rather than just logging and swallowing) do.
pub trait ErrorMetadataAnyhowExt {
    fn error_metadata(&self) -> Option<&ErrorMetadata>;
    fn code(&self) -> Option<ErrorCode> {
        self.error_metadata().map(|e| e.code)
    }
}

impl ErrorMetadataAnyhowExt for anyhow::Error {
    fn error_metadata(&self) -> Option<&ErrorMetadata> {
        self.chain().find_map(|e| e.downcast_ref::<ErrorMetadata>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcasts_through_context_chain() {
        let err = anyhow::Error::msg("boom").context(ErrorMetadata::not_initialized("no init"));
        assert_eq!(err.code(), Some(ErrorCode::NotInitialized));
    }

    #[test]
    fn no_metadata_returns_none() {
        let err = anyhow::Error::msg("boom");
        assert_eq!(err.code(), None);
    }
}
