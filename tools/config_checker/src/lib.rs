use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use config_validator::{
    ConfigDocument, Kind, Number, RuleSet, ValidationReport, Value, attach_locations,
    validate_config,
};
use thiserror::Error;
use tracing::{debug, info};

/// Supported configuration encodings, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "json" => Ok(ConfigFormat::Json),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(LoadError::UnsupportedFormat(extension)),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{what} file not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },
    #[error("I/O error reading {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("Unsupported configuration file format: {0:?}")]
    UnsupportedFormat(String),
    #[error("Error decoding JSON in {what} file: {source}")]
    Json {
        what: &'static str,
        source: serde_json::Error,
    },
    #[error("Error decoding YAML in configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Configuration root must be a mapping, got {0}")]
    NotAMapping(Kind),
    #[error("Unsupported mapping key in configuration: {0}")]
    UnsupportedKey(String),
}

#[derive(Debug)]
pub struct CheckOutput {
    pub report: ValidationReport,
    pub rule_count: usize,
}

/// Loads both files and validates the configuration against the rules.
pub fn check_paths(
    config_path: impl AsRef<Path>,
    rules_path: impl AsRef<Path>,
) -> Result<CheckOutput, LoadError> {
    let config_path = config_path.as_ref();
    let (document, source) = load_document(config_path)?;
    let rules = load_rules(rules_path)?;

    let report = validate_config(&document, &rules);
    let issues = attach_locations(&source, report.issues);
    Ok(CheckOutput {
        report: ValidationReport { issues },
        rule_count: rules.len(),
    })
}

/// Reads and decodes a configuration file, returning the raw text alongside
/// for location lookups.
pub fn load_document(path: impl AsRef<Path>) -> Result<(ConfigDocument, String), LoadError> {
    let path = path.as_ref();
    let content = read_file(path, "Configuration")?;
    let format = ConfigFormat::from_path(path)?;
    let document = parse_document_str(&content, format)?;
    info!(
        "Configuration loaded from {} ({} parameters)",
        path.display(),
        document.len()
    );
    Ok((document, content))
}

pub fn load_rules(path: impl AsRef<Path>) -> Result<RuleSet, LoadError> {
    let path = path.as_ref();
    let content = read_file(path, "Rules")?;
    let rules = parse_rules_str(&content)?;
    info!("Rules loaded from {} ({} rules)", path.display(), rules.len());
    Ok(rules)
}

fn read_file(path: &Path, what: &'static str) -> Result<String, LoadError> {
    debug!("reading {}", path.display());
    fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound {
            what,
            path: path.to_path_buf(),
        },
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

pub fn parse_document_str(src: &str, format: ConfigFormat) -> Result<ConfigDocument, LoadError> {
    let root = match format {
        ConfigFormat::Json => {
            let value: serde_json::Value =
                serde_json::from_str(src).map_err(|source| LoadError::Json {
                    what: "configuration",
                    source,
                })?;
            from_json(value)
        }
        ConfigFormat::Yaml => {
            let value: serde_yaml::Value = serde_yaml::from_str(src)?;
            from_yaml(value)?
        }
    };

    match root {
        Value::Mapping(entries) => Ok(ConfigDocument::from(entries)),
        other => Err(LoadError::NotAMapping(other.kind())),
    }
}

/// Rules are always JSON: a top-level array of rule records.
pub fn parse_rules_str(src: &str) -> Result<RuleSet, LoadError> {
    serde_json::from_str(src).map_err(|source| LoadError::Json {
        what: "rules",
        source,
    })
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match Number::from(n) {
            Number::Integer(i) => Value::Integer(i),
            Number::Float(f) => Value::Float(f),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::Mapping(
            map.into_iter()
                .map(|(key, value)| (key, from_json(value)))
                .collect(),
        ),
    }
}

// YAML 1.2 core schema: `yes`, `no`, `on` and `off` are plain strings.
fn from_yaml(value: serde_yaml::Value) -> Result<Value, LoadError> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Boolean(b),
        serde_yaml::Value::Number(n) => yaml_number(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::List(
            items
                .into_iter()
                .map(from_yaml)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        serde_yaml::Value::Mapping(map) => {
            let mut entries = BTreeMap::new();
            for (key, value) in map {
                entries.insert(yaml_key(key)?, from_yaml(value)?);
            }
            Value::Mapping(entries)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value)?,
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Integer(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Integer(u.into())
    } else {
        Value::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, LoadError> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(LoadError::UnsupportedKey(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("app.JSON")).unwrap(),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("app.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("conf/app.yaml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("app.toml")),
            Err(LoadError::UnsupportedFormat(ext)) if ext == "toml"
        ));
        assert!(matches!(
            ConfigFormat::from_path(Path::new("app")),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn json_and_yaml_decode_to_same_document() {
        let json = r#"{"port": 8080, "ratio": 0.5, "enabled": true, "name": "MyServer", "hosts": ["a", "b"], "tls": {"cert": "x"}}"#;
        let yaml = r#"port: 8080
ratio: 0.5
enabled: true
name: "MyServer"
hosts: [a, b]
tls:
  cert: x
"#;
        let from_json = parse_document_str(json, ConfigFormat::Json).expect("json");
        let from_yaml = parse_document_str(yaml, ConfigFormat::Yaml).expect("yaml");
        assert_eq!(from_json, from_yaml);
        assert_eq!(from_json.get("port"), Some(&Value::Integer(8080)));
        assert_eq!(from_json.get("enabled"), Some(&Value::Boolean(true)));
        assert_eq!(from_json.get("tls").map(Value::kind), Some(Kind::Mapping));
    }

    #[test]
    fn yaml_keeps_booleans_distinct_from_integers() {
        let doc = parse_document_str("flag: false\ncount: 1\n", ConfigFormat::Yaml).expect("yaml");
        assert_eq!(doc.get("flag"), Some(&Value::Boolean(false)));
        assert_eq!(doc.get("count"), Some(&Value::Integer(1)));
    }

    #[test]
    fn yaml_one_one_boolean_words_stay_strings() {
        let doc = parse_document_str("enabled: yes\nlegacy: on\nquoted: \"true\"\n", ConfigFormat::Yaml)
            .expect("yaml");
        assert_eq!(doc.get("enabled"), Some(&Value::from("yes")));
        assert_eq!(doc.get("legacy"), Some(&Value::from("on")));
        assert_eq!(doc.get("quoted"), Some(&Value::from("true")));
    }

    #[test]
    fn yaml_scalar_keys_are_stringified() {
        let doc = parse_document_str("nested:\n  80: http\n  true: on\n", ConfigFormat::Yaml)
            .expect("yaml");
        let Some(Value::Mapping(nested)) = doc.get("nested") else {
            panic!("expected mapping");
        };
        assert!(nested.contains_key("80"));
        assert!(nested.contains_key("true"));
    }

    #[test]
    fn non_mapping_root_is_rejected() {
        assert!(matches!(
            parse_document_str("[1, 2]", ConfigFormat::Json),
            Err(LoadError::NotAMapping(Kind::List))
        ));
        assert!(matches!(
            parse_document_str("~\n", ConfigFormat::Yaml),
            Err(LoadError::NotAMapping(Kind::Null))
        ));
    }

    #[test]
    fn invalid_json_config_is_a_load_error() {
        let err = parse_document_str("{\"port\": ", ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, LoadError::Json { what: "configuration", .. }));
    }

    #[test]
    fn rules_must_be_an_array() {
        assert!(matches!(
            parse_rules_str(r#"{"parameter": "port"}"#),
            Err(LoadError::Json { what: "rules", .. })
        ));
        assert!(parse_rules_str("[oops").is_err());
        let rules = parse_rules_str(r#"[{"parameter": "port"}, 7]"#).expect("rules");
        assert_eq!(rules.len(), 2);
    }
}
