// src/dispatch/mod.rs
// =============================================================================
// Bounded, memory-aware execution of fetch batches.
//
// Submodules:
// - memory: samples host memory pressure and process RSS
// - pool: the adaptive dispatcher that admits fetch tasks
// =============================================================================

pub mod memory;
mod pool;

pub use memory::MemoryMonitor;
pub use pool::{AdaptiveDispatcher, DispatcherConfig};
