//! Error types for grid extraction.

use thiserror::Error;

/// Errors that can occur while turning decoded rows into a grid frame.
///
/// All variants carry the source file identity so a failing file can be
/// skipped and logged without touching its siblings.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("geometry inference failed for {file}: {reason}")]
    Geometry { file: String, reason: String },

    #[error("row access fault in {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("decode failed for {file}: {reason}")]
    Decode { file: String, reason: String },
}
