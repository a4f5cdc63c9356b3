//! Reads engine data files from a directory.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and the
//! [`load_engine_data`] entry point. Both data files are optional; a
//! missing file means defaults.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use nodenet_core::config::EngineConfig;
use nodenet_core::engine::Engine;
use nodenet_vis::{Rgb, TypeStyle, VisPalette};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::schema::GraphTypeData;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for `{base_name}.ron`, `.toml` or `.json`.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }
    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its format.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. TOML has no top-level arrays, so there
/// the list is read from the array at `toml_key`.
pub fn deserialize_list<T: DeserializeOwned>(path: &Path, toml_key: &str) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// EngineData
// ===========================================================================

/// Everything loaded from a data directory.
#[derive(Debug, Clone, Default)]
pub struct EngineData {
    pub config: EngineConfig,
    pub graph_types: Vec<GraphTypeData>,
}

impl EngineData {
    /// Colours and default visibility for debug viewers.
    pub fn palette(&self) -> VisPalette {
        let mut palette = VisPalette::new();
        for graph_type in &self.graph_types {
            palette.insert(
                graph_type.name.clone(),
                TypeStyle {
                    color: graph_type.color.map(|[r, g, b]| Rgb::new(r, g, b)),
                    visible: graph_type.visible,
                },
            );
        }
        palette
    }

    /// A fresh engine using the loaded configuration.
    pub fn build_engine(&self) -> Engine {
        Engine::with_config(self.config.clone())
    }
}

/// Load `engine.*` and `graph_types.*` from `dir`.
pub fn load_engine_data(dir: &Path) -> Result<EngineData, DataLoadError> {
    let config = match find_data_file(dir, "engine")? {
        Some(path) => deserialize_file(&path)?,
        None => EngineConfig::default(),
    };

    let mut graph_types = Vec::new();
    if let Some(path) = find_data_file(dir, "graph_types")? {
        graph_types = deserialize_list::<GraphTypeData>(&path, "graph_types")?;
        let mut seen = BTreeSet::new();
        for graph_type in &graph_types {
            if graph_type.name.is_empty() {
                return Err(parse_error(&path, "graph type with an empty name"));
            }
            if !seen.insert(graph_type.name.as_str()) {
                return Err(DataLoadError::DuplicateName {
                    file: path.clone(),
                    name: graph_type.name.clone(),
                });
            }
        }
    }

    debug!(
        dir = %dir.display(),
        max_iterations = config.max_iterations,
        graph_types = graph_types.len(),
        "loaded engine data"
    );
    Ok(EngineData { config, graph_types })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nodenet_core::event::EventKind;
    use nodenet_core::id::{GraphId, GraphProto};
    use nodenet_core::test_utils::spawn_ids;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "nodenet_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    // -----------------------------------------------------------------------
    // detect_format / find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("engine.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("engine.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("engine.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("engine.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("engine")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("conflict");
        fs::write(dir.join("engine.ron"), "()").unwrap();
        fs::write(dir.join("engine.json"), "{}").unwrap();

        let result = find_data_file(&dir, "engine");
        assert!(matches!(result, Err(DataLoadError::ConflictingFormats { .. })));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // load_engine_data
    // -----------------------------------------------------------------------

    #[test]
    fn empty_dir_gives_defaults() {
        let dir = make_test_dir("empty");
        let data = load_engine_data(&dir).unwrap();
        assert_eq!(data.config, EngineConfig::default());
        assert!(data.graph_types.is_empty());
        cleanup(&dir);
    }

    #[test]
    fn engine_config_ron() {
        let dir = make_test_dir("config_ron");
        fs::write(
            dir.join("engine.ron"),
            "(max_iterations: 12, suppressed_events: [EdgeChanged])",
        )
        .unwrap();

        let data = load_engine_data(&dir).unwrap();
        assert_eq!(data.config.max_iterations, 12);
        assert_eq!(data.config.event_buffer_capacity, 1024);
        assert_eq!(data.config.suppressed_events, vec![EventKind::EdgeChanged]);

        let engine = data.build_engine();
        assert!(engine.event_bus.is_suppressed(EventKind::EdgeChanged));
        cleanup(&dir);
    }

    #[test]
    fn engine_config_toml_and_json() {
        let dir = make_test_dir("config_toml");
        fs::write(dir.join("engine.toml"), "event_buffer_capacity = 16\n").unwrap();
        let data = load_engine_data(&dir).unwrap();
        assert_eq!(data.config.event_buffer_capacity, 16);
        cleanup(&dir);

        let dir = make_test_dir("config_json");
        fs::write(dir.join("engine.json"), r#"{"max_iterations": 3}"#).unwrap();
        let data = load_engine_data(&dir).unwrap();
        assert_eq!(data.config.max_iterations, 3);
        cleanup(&dir);
    }

    #[test]
    fn graph_types_toml() {
        let dir = make_test_dir("types_toml");
        fs::write(
            dir.join("graph_types.toml"),
            r#"
[[graph_types]]
name = "pipe"
color = [0, 128, 255]

[[graph_types]]
name = "gas"
visible = false
"#,
        )
        .unwrap();

        let data = load_engine_data(&dir).unwrap();
        assert_eq!(data.graph_types.len(), 2);
        assert_eq!(data.graph_types[0].color, Some([0, 128, 255]));
        assert!(data.graph_types[0].visible);
        assert!(!data.graph_types[1].visible);
        cleanup(&dir);
    }

    #[test]
    fn graph_types_ron_build_palette() {
        let dir = make_test_dir("types_ron");
        fs::write(
            dir.join("graph_types.ron"),
            r#"[(name: "cable", color: Some((255, 200, 0))), (name: "pipe")]"#,
        )
        .unwrap();

        let palette = load_engine_data(&dir).unwrap().palette();
        assert_eq!(palette.len(), 2);
        let any_graph = GraphId(spawn_ids(1)[0]);
        assert_eq!(
            palette.color_for(any_graph, &GraphProto::from("cable")),
            Rgb::new(255, 200, 0)
        );
        cleanup(&dir);
    }

    #[test]
    fn duplicate_graph_type_is_an_error() {
        let dir = make_test_dir("types_dup");
        fs::write(
            dir.join("graph_types.json"),
            r#"[{"name": "pipe"}, {"name": "pipe"}]"#,
        )
        .unwrap();

        let result = load_engine_data(&dir);
        assert!(matches!(
            result,
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "pipe"
        ));
        cleanup(&dir);
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = make_test_dir("parse_err");
        fs::write(dir.join("engine.json"), "{ not json").unwrap();

        let err = load_engine_data(&dir).unwrap_err();
        assert!(matches!(err, DataLoadError::Parse { .. }));
        assert!(err.to_string().contains("engine.json"));
        cleanup(&dir);
    }

    #[test]
    fn toml_list_without_key_is_an_error() {
        let dir = make_test_dir("types_nokey");
        fs::write(dir.join("graph_types.toml"), "[[types]]\nname = \"pipe\"\n").unwrap();

        let err = load_engine_data(&dir).unwrap_err();
        assert!(err.to_string().contains("missing key 'graph_types'"));
        cleanup(&dir);
    }
}
