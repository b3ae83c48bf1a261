// Warning groups (as of rust 1.55)
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2021_compatibility,
    rust_2018_idioms,
    unused
)]

//! YAML run parameters.
//!
//! Loading happens in two phases: the raw YAML document is merged with the
//! defaults declared in `resources/params_schema.json`, then the merged
//! document is validated against the same schema and deserialized into
//! [`Parameters`].

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

const PARAMS_SCHEMA: &str = include_str!("../resources/params_schema.json");

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("could not read parameter file {path:?}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parameter file is not valid YAML")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid parameter schema: {0}")]
    Schema(String),

    #[error("invalid parameter {path}: {message}")]
    Invalid { path: String, message: String },

    #[error("parameters do not match the expected structure")]
    Structure(#[source] serde_json::Error),

    #[error("unknown demultiplex backend {0:?}, expected novobarcode or sabre")]
    UnknownBackend(String),
}

/// The external program used to split reads by barcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemuxBackend {
    #[default]
    Novobarcode,
    Sabre,
}

impl FromStr for DemuxBackend {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "novobarcode" => Ok(DemuxBackend::Novobarcode),
            "sabre" => Ok(DemuxBackend::Sabre),
            _ => Err(ParamsError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for DemuxBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DemuxBackend::Novobarcode => "novobarcode",
            DemuxBackend::Sabre => "sabre",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadParams {
    /// Rename the single directory created by the download to `dir_name`.
    pub rename_dir: bool,
    pub dir_name: String,
}

impl Default for DownloadParams {
    fn default() -> Self {
        DownloadParams {
            rename_dir: false,
            dir_name: "download".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemultiplexParams {
    pub backend: DemuxBackend,
    /// Delete the staged FASTQ copies after the demultiplexer ran.
    pub delete_fastqs: bool,
    /// Delete the directory of reads without a barcode after the demultiplexer ran.
    pub delete_non_barcoded: bool,
}

impl Default for DemultiplexParams {
    fn default() -> Self {
        DemultiplexParams {
            backend: DemuxBackend::Novobarcode,
            delete_fastqs: true,
            delete_non_barcoded: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMultiParams {
    /// Parameter file passed through to every rna-map invocation.
    pub rna_map_params_file: Option<PathBuf>,
    pub hide_rna_map_output: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    pub download: DownloadParams,
    pub demultiplex: DemultiplexParams,
    pub runmulti: RunMultiParams,
}

static SCHEMA: OnceLock<Result<Value, String>> = OnceLock::new();

/// The embedded parameter schema.
fn schema() -> Result<&'static Value, ParamsError> {
    SCHEMA
        .get_or_init(|| serde_json::from_str(PARAMS_SCHEMA).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| ParamsError::Schema(e.clone()))
}

impl Parameters {
    /// The parameters obtained from an empty document.
    pub fn defaults() -> Result<Self, ParamsError> {
        Self::from_value(Value::Object(Map::new()))
    }

    /// Load parameters from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ParamsError> {
        let s = std::fs::read_to_string(path).map_err(|source| ParamsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("loading parameters from {}", path.display());
        Self::from_yaml_str(&s)
    }

    /// Load parameters from a YAML document. An empty document yields the defaults.
    pub fn from_yaml_str(s: &str) -> Result<Self, ParamsError> {
        let value: Value = serde_yaml::from_str(s)?;
        let value = match value {
            Value::Null => Value::Object(Map::new()),
            v => v,
        };
        Self::from_value(value)
    }

    fn from_value(mut value: Value) -> Result<Self, ParamsError> {
        let schema = schema()?;
        apply_schema_defaults(schema, &mut value);
        validate_against_schema(schema, &value, "params")?;

        let mut defaults = Value::Object(Map::new());
        apply_schema_defaults(schema, &mut defaults);
        log_non_defaults(&defaults, &value, "params");

        serde_json::from_value(value).map_err(ParamsError::Structure)
    }
}

/// Recursively insert the `default` of every property missing from `instance`.
pub fn apply_schema_defaults(schema: &Value, instance: &mut Value) {
    let (Some(properties), Value::Object(fields)) = (
        schema.get("properties").and_then(Value::as_object),
        instance,
    ) else {
        return;
    };
    for (name, subschema) in properties {
        if !fields.contains_key(name) {
            if let Some(default) = subschema.get("default") {
                fields.insert(name.clone(), default.clone());
            }
        }
        if let Some(field) = fields.get_mut(name) {
            apply_schema_defaults(subschema, field);
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    let actual = type_name(value);
    expected == actual || (expected == "number" && actual == "integer")
}

/// Check `instance` against the subset of JSON schema used by the parameter schema:
/// `type`, `enum`, `properties` and `additionalProperties: false`.
pub fn validate_against_schema(
    schema: &Value,
    instance: &Value,
    path: &str,
) -> Result<(), ParamsError> {
    let invalid = |message: String| ParamsError::Invalid {
        path: path.to_string(),
        message,
    };

    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(t) => vec![t.as_str()],
            Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| type_matches(t, instance)) {
            return Err(invalid(format!(
                "{instance} is not of type {}",
                allowed.join(" or ")
            )));
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum") {
        if !options.contains(instance) {
            return Err(invalid(format!(
                "{instance} is not one of {}",
                Value::Array(options.clone())
            )));
        }
    }

    if let Value::Object(fields) = instance {
        let properties = schema.get("properties").and_then(Value::as_object);
        let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));
        for (name, field) in fields {
            match properties.and_then(|p| p.get(name)) {
                Some(subschema) => {
                    validate_against_schema(subschema, field, &format!("{path}.{name}"))?
                }
                None if closed => {
                    return Err(invalid(format!("additional property {name:?} is not allowed")))
                }
                None => (),
            }
        }
    }
    Ok(())
}

fn log_non_defaults(defaults: &Value, value: &Value, path: &str) {
    match (defaults, value) {
        (Value::Object(d), Value::Object(v)) => {
            for (name, field) in v {
                let default = d.get(name).unwrap_or(&Value::Null);
                log_non_defaults(default, field, &format!("{path}.{name}"));
            }
        }
        (d, v) if d != v => info!("using non-default {path} = {v}"),
        _ => (),
    }
}
