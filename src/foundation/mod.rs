/// Shared value types: units, frames, audio buffers, frame rates.
pub mod core;
/// Error taxonomy.
pub mod error;
