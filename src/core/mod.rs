//! Core utilities shared across model architectures

pub mod unified_error;

pub use unified_error::{config_errors, from_candle_error, UnifiedError, UnifiedResult};
