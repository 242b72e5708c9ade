//! Security module for Nimbus — workspace path containment and shell command
//! screening.
//!
//! Provides:
//! - **Path containment**: every file/shell path must resolve inside the
//!   workspace root, symlinks included
//! - **Shell guard**: a deny-list of command patterns the shell tool refuses
//!   to run

pub mod guard;
pub mod path;

pub use guard::{guard_command, GuardError};
pub use path::{resolve_sub_workspace, resolve_within, SecurityError};
