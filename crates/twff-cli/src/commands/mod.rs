//! `twff` subcommand handlers.

pub mod fix;
pub mod keys;
pub mod log;
pub mod pack;
pub mod unpack;
pub mod verify;

/// All checks passed.
pub const EXIT_OK: u8 = 0;
/// Schema or chain violation found.
pub const EXIT_VIOLATION: u8 = 1;
/// Archive or log unreadable; no report could be produced.
pub const EXIT_STRUCTURAL: u8 = 2;
