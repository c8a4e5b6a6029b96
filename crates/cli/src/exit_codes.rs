//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | CLI usage error (bad args, unreadable config file)   |
//! | 3    | Invalid config (parse or validation failure)         |
//! | 4    | Source load failure (any configured source)          |
//! | 5    | Merge failure (schema problem at a join step)        |
//! | 6    | Coverage attrition (only with `--fail-on-attrition`) |

use kaitz_io::LoadError;
use kaitz_recon::PanelError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure (e.g. cannot write output).
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, config file missing or unreadable.
pub const EXIT_USAGE: u8 = 2;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// At least one source failed to load.
pub const EXIT_SOURCE_LOAD: u8 = 4;

/// The merge aborted: missing join key, duplicate key, column collision,
/// conflicting measures, or a required source absent at this grain.
pub const EXIT_MERGE: u8 = 5;

/// An inner join dropped rows and `--fail-on-attrition` is set.
pub const EXIT_ATTRITION: u8 = 6;

/// Map an engine error to its exit code.
pub fn panel_exit_code(err: &PanelError) -> u8 {
    match err {
        PanelError::ConfigParse(_) | PanelError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        _ => EXIT_MERGE,
    }
}

/// Map a load error to its exit code.
pub fn load_exit_code(err: &LoadError) -> u8 {
    match err {
        LoadError::Panel(inner) => panel_exit_code(inner),
        LoadError::Json(_) => EXIT_ERROR,
        _ => EXIT_SOURCE_LOAD,
    }
}
