//! Configuration loader: .env file, config.toml, then env var overrides.

use common::{CollectorConfig, Error};
use std::collections::HashSet;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn parse_positive_usize(raw: &str, env_name: &str) -> Result<usize, Error> {
    let parsed = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &CollectorConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.api_key.trim().is_empty() {
        issues.push("GOOGLE_MAPS_API_KEY is required (set in .env or environment)".into());
    }

    if config.locations.is_empty() {
        issues.push("locations must contain at least one location".into());
    }
    let mut seen = HashSet::new();
    for loc in &config.locations {
        if loc.id.trim().is_empty() {
            issues.push("locations[].id must not be empty".into());
        } else if !seen.insert(loc.id.as_str()) {
            issues.push(format!("locations: duplicate id {:?}", loc.id));
        }
        if !loc.has_valid_coordinates() {
            issues.push(format!(
                "locations.{}: lat must be in [-90,90] and lon in [-180,180]",
                loc.id
            ));
        }
    }

    for (name, family) in [("weather", &config.weather), ("pollen", &config.pollen)] {
        if family.base_url.trim().is_empty() {
            issues.push(format!("{name}.base_url must not be empty"));
        }
        if family.cache_collection.trim().is_empty() {
            issues.push(format!("{name}.cache_collection must not be empty"));
        }
        if family.raw_collection.trim().is_empty() {
            issues.push(format!("{name}.raw_collection must not be empty"));
        }
        if family.cache_collection == family.raw_collection {
            issues.push(format!(
                "{name}.cache_collection and {name}.raw_collection must differ"
            ));
        }
        if family.history_cap == 0 {
            issues.push(format!("{name}.history_cap must be > 0"));
        }
    }

    if config.retry.request_timeout_secs == 0 {
        issues.push("retry.request_timeout_secs must be > 0".into());
    }

    if config.analytics.delta_tolerance_mins <= 0 {
        issues.push("analytics.delta_tolerance_mins must be > 0".into());
    }
    let threshold = config.analytics.trend_threshold_mb;
    if threshold.is_nan() || threshold < 0.0 {
        issues.push("analytics.trend_threshold_mb must be >= 0".into());
    }

    if config.store.dir.trim().is_empty() {
        issues.push("store.dir must not be empty".into());
    }
    if config.store.transaction_attempts == 0 {
        issues.push("store.transaction_attempts must be > 0".into());
    }

    if config.concurrency == 0 {
        issues.push("concurrency must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

fn read_config_file(path: &Path) -> Result<CollectorConfig, Error> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Environment overrides (highest priority). `lookup` is `std::env::var`
/// outside of tests.
fn apply_env_overrides<F>(config: &mut CollectorConfig, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup("GOOGLE_MAPS_API_KEY") {
        config.api_key = key.trim().to_string();
    }
    if let Some(dir) = lookup("COLLECTOR_STORE_DIR") {
        config.store.dir = dir;
    }
    if let Some(raw) = lookup("COLLECTOR_CONCURRENCY") {
        config.concurrency = parse_positive_usize(&raw, "COLLECTOR_CONCURRENCY")?;
    }
    Ok(())
}

/// Command-line flags take precedence over the environment.
fn apply_cli_overrides(config: &mut CollectorConfig, store_dir: Option<&str>) {
    if let Some(dir) = store_dir {
        config.store.dir = dir.to_string();
    }
}

/// Load collector configuration.
///
/// An explicit `path` must exist; otherwise `config.toml` is read only when
/// present. `store_dir` comes from the command line and is validated with
/// the rest.
pub fn load_config(
    path: Option<&Path>,
    store_dir: Option<&str>,
) -> Result<CollectorConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Defaults, or the config file.
    let mut config = match path {
        Some(p) => read_config_file(p)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                read_config_file(default_path)?
            } else {
                CollectorConfig::default()
            }
        }
    };

    // 3. Environment.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    // 4. Command line.
    apply_cli_overrides(&mut config, store_dir);

    // 5. Validate.
    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::LocationConfig;
    use std::collections::HashMap;

    fn valid() -> CollectorConfig {
        CollectorConfig {
            api_key: "test-key".into(),
            ..CollectorConfig::default()
        }
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_with_key_are_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_missing_key_rejected() {
        let err = validate_config(&CollectorConfig::default()).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_MAPS_API_KEY"));
    }

    #[test]
    fn test_collects_every_issue() {
        let mut config = valid();
        config.locations = vec![
            LocationConfig::new("a", 91.0, 0.0),
            LocationConfig::new("a", 0.0, 0.0),
        ];
        config.weather.history_cap = 0;
        config.analytics.delta_tolerance_mins = 0;
        config.concurrency = 0;

        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("Invalid config:"));
        assert!(msg.contains("lat must be in [-90,90]"));
        assert!(msg.contains("duplicate id \"a\""));
        assert!(msg.contains("weather.history_cap"));
        assert!(msg.contains("analytics.delta_tolerance_mins"));
        assert!(msg.contains("concurrency must be > 0"));
    }

    #[test]
    fn test_empty_locations_rejected() {
        let mut config = valid();
        config.locations.clear();
        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("at least one location"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CollectorConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("GOOGLE_MAPS_API_KEY", " abc "),
                ("COLLECTOR_STORE_DIR", "/tmp/collector"),
                ("COLLECTOR_CONCURRENCY", "3"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_key, "abc");
        assert_eq!(config.store.dir, "/tmp/collector");
        assert_eq!(config.concurrency, 3);
    }

    #[test]
    fn test_bad_concurrency_env_rejected() {
        let mut config = CollectorConfig::default();
        for raw in ["0", "-1", "many"] {
            let err = apply_env_overrides(&mut config, env(&[("COLLECTOR_CONCURRENCY", raw)]))
                .unwrap_err();
            assert!(matches!(err, Error::Config(_)));
        }
    }

    #[test]
    fn test_store_dir_flag_is_validated() {
        let mut config = valid();
        apply_env_overrides(&mut config, env(&[("COLLECTOR_STORE_DIR", "/srv/env")])).unwrap();

        apply_cli_overrides(&mut config, Some("/srv/flag"));
        assert_eq!(config.store.dir, "/srv/flag");
        assert!(validate_config(&config).is_ok());

        apply_cli_overrides(&mut config, None);
        assert_eq!(config.store.dir, "/srv/flag");

        apply_cli_overrides(&mut config, Some("  "));
        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("store.dir must not be empty"));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let err = read_config_file(Path::new("/nonexistent/collector.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.toml");
        std::fs::write(
            &path,
            r#"
concurrency = 2

[[locations]]
id = "office"
lat = 30.27
lon = -97.74

[pollen]
base_url = "http://localhost:9000/v1"
cache_collection = "pc"
raw_collection = "pr"
history_cap = 14
"#,
        )
        .unwrap();

        let config = read_config_file(&path).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.locations.len(), 1);
        assert_eq!(config.pollen.history_cap, 14);
        assert_eq!(config.weather.history_cap, 48);
        assert!(config.api_key.is_empty());
    }
}
