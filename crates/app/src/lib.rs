//! VoxDub application: wiring, configuration, and the transcript store.

pub mod config;
pub mod runtime;
pub mod sink;
pub mod transcript;
