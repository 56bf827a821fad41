//! Background Tasks Module
//!
//! Contains the tasks that run alongside foreground cache calls.
//!
//! # Tasks
//! - Revisit scheduler: dispatches due revisit tickets to a worker pool
//! - Janitor: runs the configured eviction strategy on its own clock

pub mod janitor;
pub mod memory;
pub mod revisit;

pub use janitor::{CleanupFn, CleanupStrategy, Janitor};
pub use memory::{MemoryProbe, ProcessMemory};
pub use revisit::{expire, RevisitFn, RevisitQueue, Scheduler, Ticket};
