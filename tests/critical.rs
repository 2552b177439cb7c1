//! Critical test matrix: crash recovery and corrupted persisted state.
//!
//! Run with: `cargo test --test critical`

mod support;

#[path = "critical/corrupted_state.rs"]
mod corrupted_state;
#[path = "critical/crash_recovery.rs"]
mod crash_recovery;
