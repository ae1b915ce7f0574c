//! Error types for seatboard-core operations.
//!
//! The resolution engine itself never fails; these errors come from the
//! command handler and the record-store seam.

// ═══════════════════════════════════════════════════════════════════════════════
// Core Error
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors that can occur in seatboard-core operations.
#[derive(Debug, thiserror::Error)]
pub enum SeatboardError {
    // ─────────────────────────────────────────────────────────────────────
    // Record Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("No student registered at seat {0}")]
    StudentNotFound(String),

    #[error("Seat already occupied: {0}")]
    SeatOccupied(String),

    #[error("Invalid student record: {seat}: {reason}")]
    InvalidRecord { seat: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // Store Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Record store write failed: {context}: {details}")]
    StoreWrite { context: String, details: String },

    #[error("Record store read failed: {context}: {details}")]
    StoreRead { context: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Parsing Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid evaluation instant: {0}")]
    InvalidInstant(String),

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SeatboardError {
    pub fn store_write(context: &str, details: impl Into<String>) -> Self {
        SeatboardError::StoreWrite {
            context: context.to_string(),
            details: details.into(),
        }
    }

    pub fn store_read(context: &str, details: impl Into<String>) -> Self {
        SeatboardError::StoreRead {
            context: context.to_string(),
            details: details.into(),
        }
    }
}

/// Convenience type alias for Results using SeatboardError.
pub type Result<T> = std::result::Result<T, SeatboardError>;

// Conversion for string error compatibility
impl From<SeatboardError> for String {
    fn from(err: SeatboardError) -> String {
        err.to_string()
    }
}
