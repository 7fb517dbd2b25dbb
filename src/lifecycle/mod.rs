//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Open store → Empty registry → Background tasks
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop background tasks → Flush breaker state → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - The registry starts empty; breakers appear on first use
//! - Shutdown flush is bounded by a deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{bootstrap, spawn_background};
