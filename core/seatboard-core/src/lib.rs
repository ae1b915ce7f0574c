//! # seatboard-core
//!
//! Core library for Seatboard, the seat board of a study facility. Given each
//! student's weekly schedule, mentoring sessions and administrator-set status,
//! it derives what every seat looks like at a given moment.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The daemon drives the live
//!   board from a plain thread and an `mpsc` channel.
//! - **Time is injected**: [`resolve`] takes the weekday and time explicitly;
//!   only [`clock`] reads the wall clock.
//! - **Graceful degradation**: Malformed windows never match and unknown seats
//!   are unoccupied. Nothing in a bad record blocks the rest of the board.
//! - **Snapshot replace**: The board map is rebuilt from each full store
//!   snapshot; there is no incremental merge.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seatboard_core::{Board, EvalInstant, SeatLayout};
//!
//! let board = Board::from_snapshot(store.snapshot()?);
//! let view = board.evaluate(&SeatLayout::reading_room(), &EvalInstant::parse("WED 13:00")?);
//! println!("{} present", view.summary.present);
//! ```

pub mod board;
pub mod clock;
pub mod commands;
pub mod error;
pub mod layout;
pub mod live;
pub mod resolver;
pub mod store;
pub mod types;
pub mod window;

// Re-export commonly used items at crate root
pub use board::{Board, BoardSummary, BoardView, CellView, OccupantView, SeatView};
pub use clock::{Clock, FixedClock, SystemClock};
pub use commands::{apply, AwayKind, OverrideCommand};
pub use error::{Result, SeatboardError};
pub use layout::{LayoutPosition, SeatCell, SeatLayout};
pub use live::{spawn_ticker, transitions, BoardEvent, LiveBoard, StatusTransition};
pub use resolver::{resolve, resolve_at};
pub use store::{MemoryStore, RecordStore, SnapshotHub};
pub use types::*;
pub use window::{normalize_time, window_contains};
