//! Decode sessions and background streaming

pub mod budget;
pub mod engine;
pub mod scheduler;
pub mod session;
pub mod shared_buffer;

pub use budget::{ContentBudget, PackBudget};
pub use engine::{DecodeEngine, DecodeRequest, ModePreference};
pub use scheduler::StreamingScheduler;
pub use session::{ChunkProgress, DecodeMode, DecodeSession, SessionState, StreamInfo};
pub use shared_buffer::SharedDecodeBuffer;
