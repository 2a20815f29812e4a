//! Error types recorded while assembling streams.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors recorded by builders and precompressed writers.
///
/// Builders latch the first error and turn every later append into a no-op,
/// so callers inspect [`Builder::error`](crate::Builder::error) or the
/// result of [`Builder::bytes`](crate::Builder::bytes) once at the end
/// instead of checking each append. The underlying I/O error is held behind
/// an [`Arc`] so the latched value can be returned by value repeatedly.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// The requested compression level falls outside `[-2, 9]`.
    #[error("flate: invalid compression level {0}: want value in range [-2, 9]")]
    InvalidCompressionLevel(i32),

    /// A precompressed segment was produced at a different compression
    /// level than the builder's.
    #[error("gzipbuilder: compression level mismatch")]
    LevelMismatch,

    /// The builder was appended to after the stream was finished.
    #[error("gzipbuilder: cannot modify Builder after Bytes called")]
    ModifyAfterFinish,

    /// An option was set after the first write.
    #[error("gzipbuilder: setting options must be done before writing")]
    OptionAfterWrite,

    /// The sink or the DEFLATE primitive reported a failure.
    #[error(transparent)]
    Io(Arc<io::Error>),
}

impl From<io::Error> for BuildError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_stay_cloneable() {
        let err = BuildError::from(io::Error::other("sink full"));
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
        assert_eq!(copy.to_string(), "sink full");
    }

    #[test]
    fn messages_identify_the_failing_operation() {
        assert_eq!(
            BuildError::LevelMismatch.to_string(),
            "gzipbuilder: compression level mismatch"
        );
        assert_eq!(
            BuildError::OptionAfterWrite.to_string(),
            "gzipbuilder: setting options must be done before writing"
        );
    }
}
