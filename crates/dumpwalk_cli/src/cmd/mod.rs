/// Image statistics command.
pub mod info;
/// Pattern query command.
pub mod query;
/// Single-object render command.
pub mod show;
/// Shared argument parsing and output helpers.
pub mod util;
