use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an override config file
pub const CONFIG_ENV_VAR: &str = "OPENLINEAGE_CONFIG";

/// File name probed in the working directory and the home config directory
pub const CONFIG_FILE_NAME: &str = "openlineage.yml";

/// Directory under `$HOME` holding the user-level config file
pub const HOME_CONFIG_DIR: &str = ".openlineage";

/// Client configuration document
///
/// Sections are parsed independently: a malformed `transport` section still
/// reaches the transport factory (which rejects it), and a malformed filter
/// entry is dropped without affecting its neighbours.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(from = "RawConfig")]
pub struct Config {
    /// Transport selection; absent means the default transport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportConfig>,
    /// Filters, evaluated in the order listed
    pub filters: Vec<FilterConfig>,
}

/// Top-level shape of the document before the sections are checked
#[derive(Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    transport: Option<serde_yaml::Value>,
    filters: Option<serde_yaml::Value>,
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        let transport = raw.transport.filter(|v| !v.is_null()).map(|section| {
            serde_yaml::from_value::<TransportConfig>(section).unwrap_or_else(|e| {
                log::warn!("Malformed transport section: {}", e);
                TransportConfig::default()
            })
        });

        let filters = match raw.filters {
            None | Some(serde_yaml::Value::Null) => Vec::new(),
            Some(serde_yaml::Value::Sequence(entries)) => entries
                .into_iter()
                .filter_map(|entry| match serde_yaml::from_value::<FilterConfig>(entry) {
                    Ok(filter) => Some(filter),
                    Err(e) => {
                        log::warn!("Skipping malformed filter entry: {}", e);
                        None
                    }
                })
                .collect(),
            Some(_) => {
                log::warn!("Ignoring 'filters': expected a list");
                Vec::new()
            }
        };

        Self { transport, filters }
    }
}

/// Read a scalar as a string; anything else counts as absent
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => None,
        other => {
            log::warn!("Ignoring non-scalar config value {:?}", other);
            None
        }
    })
}

/// The `transport` section: a type tag plus transport-specific settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TransportConfig {
    /// `None` when the section has no usable `type`
    #[serde(rename = "type", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub settings: serde_yaml::Mapping,
}

impl TransportConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            settings: serde_yaml::Mapping::new(),
        }
    }

    /// Add a transport-specific setting
    pub fn with(mut self, key: &str, value: impl Into<serde_yaml::Value>) -> Self {
        self.settings.insert(serde_yaml::Value::from(key), value.into());
        self
    }

    /// Deserialize the transport-specific settings into a typed struct
    pub fn settings_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_yaml::Error> {
        serde_yaml::from_value(serde_yaml::Value::Mapping(self.settings.clone()))
    }
}

/// One entry of the `filters` section
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    #[serde(rename = "type", deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "match", deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub match_: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

impl FilterConfig {
    pub fn exact(name: impl Into<String>) -> Self {
        Self {
            kind: Some("exact".to_string()),
            match_: Some(name.into()),
            regex: None,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            kind: Some("regex".to_string()),
            match_: None,
            regex: Some(pattern.into()),
        }
    }
}

/// Candidate locations for the config file, in precedence order
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    pub explicit: Option<PathBuf>,
    pub env: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub home: Option<PathBuf>,
}

impl SearchPaths {
    /// Capture the locations from the running process
    pub fn from_process(explicit: Option<&Path>) -> Self {
        Self {
            explicit: explicit.map(Path::to_path_buf),
            env: std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()).map(PathBuf::from),
            cwd: std::env::current_dir().ok(),
            home: dirs::home_dir(),
        }
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(4);
        if let Some(path) = &self.explicit {
            candidates.push(path.clone());
        }
        if let Some(path) = &self.env {
            candidates.push(path.clone());
        }
        if let Some(cwd) = &self.cwd {
            candidates.push(cwd.join(CONFIG_FILE_NAME));
        }
        if let Some(home) = &self.home {
            candidates.push(home.join(HOME_CONFIG_DIR).join(CONFIG_FILE_NAME));
        }
        candidates
    }
}

/// Return the first candidate that is a readable regular file.
///
/// Probing errors (missing directories, permissions) move on to the next candidate.
pub fn find_config_file(paths: &SearchPaths) -> Option<PathBuf> {
    paths.candidates().into_iter().find(|path| is_readable_file(path))
}

fn is_readable_file(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => fs::File::open(path).is_ok(),
        Ok(_) => false,
        Err(e) => {
            log::trace!("Skipping config candidate {}: {}", path.display(), e);
            false
        }
    }
}

impl Config {
    /// Load configuration with fallback chain.
    ///
    /// Never fails: a missing, unreadable or malformed file yields the default
    /// (empty) configuration.
    pub fn load(explicit: Option<&Path>) -> Self {
        Self::load_with(&SearchPaths::from_process(explicit)).0
    }

    /// Load from the given search paths, returning the file that was used
    pub fn load_with(paths: &SearchPaths) -> (Self, Option<PathBuf>) {
        let Some(path) = find_config_file(paths) else {
            log::debug!("No lineage config file found, using defaults");
            return (Self::default(), None);
        };

        match Self::load_from_file(&path) {
            Ok(config) => (config, Some(path)),
            Err(e) => {
                log::warn!("Ignoring lineage config {}: {}", path.display(), e);
                (Self::default(), None)
            }
        }
    }

    /// Read and parse a single config file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        use eyre::Context;

        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        // An empty document parses as null; treat it like an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded lineage config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
transport:
  type: http
  url: http://localhost:5000
  timeout: 2.5
filters:
  - type: exact
    match: job
  - type: regex
    regex: "whatever.*"
  - match: untyped
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let transport = config.transport.unwrap();
        assert_eq!(transport.kind.as_deref(), Some("http"));
        assert_eq!(
            transport.settings.get("url").and_then(|v| v.as_str()),
            Some("http://localhost:5000")
        );
        assert_eq!(config.filters.len(), 3);
        assert_eq!(config.filters[0], FilterConfig::exact("job"));
        assert_eq!(config.filters[1], FilterConfig::regex("whatever.*"));
        assert_eq!(config.filters[2].kind, None);
    }

    #[test]
    fn test_env_beats_cwd_and_home() {
        let tmp = TempDir::new().unwrap();
        let env_file = write(tmp.path(), "env/custom.yml", "filters: []\n");
        let cwd = tmp.path().join("cwd");
        write(&cwd, CONFIG_FILE_NAME, "filters: []\n");
        let home = tmp.path().join("home");
        write(&home, &format!("{}/{}", HOME_CONFIG_DIR, CONFIG_FILE_NAME), "filters: []\n");

        let paths = SearchPaths {
            explicit: None,
            env: Some(env_file.clone()),
            cwd: Some(cwd.clone()),
            home: Some(home.clone()),
        };
        assert_eq!(find_config_file(&paths), Some(env_file));

        let paths = SearchPaths { env: None, ..paths };
        assert_eq!(find_config_file(&paths), Some(cwd.join(CONFIG_FILE_NAME)));

        let paths = SearchPaths { cwd: None, ..paths };
        assert_eq!(
            find_config_file(&paths),
            Some(home.join(HOME_CONFIG_DIR).join(CONFIG_FILE_NAME))
        );
    }

    #[test]
    fn test_explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        let explicit = write(tmp.path(), "explicit.yml", "filters: []\n");
        let env_file = write(tmp.path(), "env.yml", "filters: []\n");

        let paths = SearchPaths {
            explicit: Some(explicit.clone()),
            env: Some(env_file),
            ..Default::default()
        };
        assert_eq!(find_config_file(&paths), Some(explicit));
    }

    #[test]
    fn test_missing_candidates_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let paths = SearchPaths {
            explicit: Some(tmp.path().join("nope.yml")),
            env: Some(tmp.path().to_path_buf()),
            cwd: Some(tmp.path().join("does-not-exist")),
            home: None,
        };
        assert_eq!(find_config_file(&paths), None);

        let (config, source) = Config::load_with(&paths);
        assert_eq!(config, Config::default());
        assert!(source.is_none());
    }

    #[test]
    fn test_malformed_file_fails_open() {
        let tmp = TempDir::new().unwrap();
        let bad = write(tmp.path(), "bad.yml", "transport: [unclosed\n  - :\n");
        let paths = SearchPaths {
            explicit: Some(bad),
            ..Default::default()
        };

        let (config, source) = Config::load_with(&paths);
        assert_eq!(config, Config::default());
        assert!(source.is_none());
    }

    #[test]
    fn test_empty_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let empty = write(tmp.path(), "empty.yml", "\n");
        let paths = SearchPaths {
            explicit: Some(empty.clone()),
            ..Default::default()
        };

        let (config, source) = Config::load_with(&paths);
        assert_eq!(config, Config::default());
        assert_eq!(source, Some(empty));
    }

    #[test]
    fn test_transport_without_type_is_kept() {
        let config: Config = serde_yaml::from_str("transport:\n  url: http://marquez:5000\n").unwrap();
        let transport = config.transport.unwrap();
        assert_eq!(transport.kind, None);
        assert_eq!(
            transport.settings.get("url").and_then(|v| v.as_str()),
            Some("http://marquez:5000")
        );

        let config: Config = serde_yaml::from_str("transport:\n  type: [http]\n").unwrap();
        assert_eq!(config.transport.unwrap().kind, None);

        let config: Config = serde_yaml::from_str("transport: http\n").unwrap();
        assert_eq!(config.transport, Some(TransportConfig::default()));
    }

    #[test]
    fn test_bad_filter_entry_keeps_neighbours() {
        let yaml = r#"
transport:
  type: noop
filters:
  - type: exact
    match: [a, b]
  - just a string
  - type: regex
    regex: "tmp_.*"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.transport, Some(TransportConfig::new("noop")));
        assert_eq!(config.filters.len(), 2);
        assert_eq!(config.filters[0].kind.as_deref(), Some("exact"));
        assert_eq!(config.filters[0].match_, None);
        assert_eq!(config.filters[1], FilterConfig::regex("tmp_.*"));
    }

    #[test]
    fn test_non_list_filters_are_ignored() {
        let config: Config = serde_yaml::from_str("transport:\n  type: noop\nfilters: exact\n").unwrap();
        assert!(config.filters.is_empty());
        assert!(config.transport.is_some());
    }

    #[test]
    fn test_transport_settings_as() {
        #[derive(Deserialize)]
        struct Settings {
            url: String,
        }

        let config = TransportConfig::new("http").with("url", "http://example.com");
        let settings: Settings = config.settings_as().unwrap();
        assert_eq!(settings.url, "http://example.com");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config {
            transport: Some(TransportConfig::new("console")),
            filters: vec![FilterConfig::exact("job")],
        };
        let yaml_str = serde_yaml::to_string(&config).expect("Failed to serialize");
        let parsed: Config = serde_yaml::from_str(&yaml_str).expect("Failed to deserialize");
        assert_eq!(parsed, config);
    }
}
