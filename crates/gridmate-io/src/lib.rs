//! Network file codecs and built-in example cases.
//!
//! [`load_network`] and [`save_network`] dispatch on the file extension:
//! `.json` is the pandapower-style interchange format (load and save), `.p`
//! is the native binary snapshot (load only from the tool surface).

pub mod binary;
pub mod cases;
pub mod format;
pub mod json;

use std::path::Path;

use gridmate_core::{Diagnostics, GridError, GridResult, PowerNet};

pub use cases::CaseName;
pub use format::Format;

/// A loaded network together with the issues found while reading it.
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub network: PowerNet,
    pub diagnostics: Diagnostics,
}

/// Loads a network file. The extension is checked before the file system is
/// touched, so an unsupported extension is reported even for missing files.
pub fn load_network(path: &Path) -> GridResult<ImportResult> {
    let format = Format::from_path(path)?;
    if !path.is_file() {
        return Err(GridError::NotFound(path.to_path_buf()));
    }
    match format {
        Format::Json => json::read_json(path),
        Format::Binary => binary::read_snapshot(path),
    }
}

/// Saves a network in the format implied by the extension.
pub fn save_network(net: &PowerNet, path: &Path) -> GridResult<()> {
    match Format::for_save(path)? {
        Format::Json => json::write_json(net, path),
        Format::Binary => binary::write_snapshot(net, path),
    }
}
