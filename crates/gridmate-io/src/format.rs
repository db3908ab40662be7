//! File format dispatch by extension.

use std::path::Path;

use gridmate_core::{GridError, GridResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// pandapower-style table JSON
    Json,
    /// Native binary snapshot
    Binary,
}

impl Format {
    pub const ALL: &'static [Format] = &[Format::Json, Format::Binary];

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Binary => "p",
        }
    }

    pub fn supports_save(&self) -> bool {
        matches!(self, Format::Json)
    }

    /// Format for a path, judged on its extension only.
    pub fn from_path(path: &Path) -> GridResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.extension() == extension)
            .ok_or_else(|| GridError::UnsupportedFormat {
                extension: display_extension(&extension),
                supported: Self::supported_list(false),
            })
    }

    /// Format for saving to `path`; load-only formats are refused.
    pub fn for_save(path: &Path) -> GridResult<Self> {
        let format = Self::from_path(path).map_err(|err| match err {
            GridError::UnsupportedFormat { extension, .. } => GridError::UnsupportedFormat {
                extension,
                supported: Self::supported_list(true),
            },
            other => other,
        })?;
        if format.supports_save() {
            Ok(format)
        } else {
            Err(GridError::UnsupportedFormat {
                extension: format!(".{}", format.extension()),
                supported: Self::supported_list(true),
            })
        }
    }

    /// Comma-separated extensions, e.g. ".json, .p".
    pub fn supported_list(save: bool) -> String {
        Self::ALL
            .iter()
            .filter(|f| !save || f.supports_save())
            .map(|f| format!(".{}", f.extension()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn display_extension(extension: &str) -> String {
    if extension.is_empty() {
        "(none)".to_string()
    } else {
        format!(".{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(Format::from_path(Path::new("grid.json")).unwrap(), Format::Json);
        assert_eq!(Format::from_path(Path::new("grid.P")).unwrap(), Format::Binary);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = Format::from_path(Path::new("grid.csv")).unwrap_err();
        match err {
            GridError::UnsupportedFormat {
                extension,
                supported,
            } => {
                assert_eq!(extension, ".csv");
                assert_eq!(supported, ".json, .p");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(Format::from_path(Path::new("grid")).is_err());
    }

    #[test]
    fn test_binary_is_load_only() {
        assert!(Format::for_save(Path::new("out.json")).is_ok());
        let err = Format::for_save(Path::new("out.p")).unwrap_err();
        assert!(err.to_string().contains(".json"));
    }
}
