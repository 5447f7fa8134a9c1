//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                    |
//! |------|------------------------------------------------------------|
//! | 0    | Success (rows may still be excluded unless `--strict`)     |
//! | 1    | General error (unspecified)                                |
//! | 2    | CLI usage error (bad args, no sales source)                |
//! | 3    | Config file could not be parsed or failed validation       |
//! | 4    | Reference data unusable (empty/missing table, bad column)  |
//! | 5    | I/O error reading an input or writing an export            |
//! | 6    | `--strict` and at least one row was excluded               |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in [`recon_exit_code`] if a `ReconError` should produce it

use skumap_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required sources.
pub const EXIT_USAGE: u8 = 2;

/// Config parse or validation failure.
pub const EXIT_CONFIG_INVALID: u8 = 3;

/// A reference table is missing, empty, or lacks a required column.
/// Raised before any sales row is processed.
pub const EXIT_FATAL_PRECONDITION: u8 = 4;

/// Reading an input file or writing an export failed.
pub const EXIT_IO: u8 = 5;

/// Run completed but excluded rows (only with `--strict`).
pub const EXIT_ROWS_EXCLUDED: u8 = 6;

/// Map engine errors to exit codes.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_CONFIG_INVALID,
        ReconError::FatalPrecondition(_)
        | ReconError::MissingColumn { .. }
        | ReconError::BadReferenceValue { .. } => EXIT_FATAL_PRECONDITION,
        ReconError::Read { .. } | ReconError::Io(_) => EXIT_IO,
    }
}
