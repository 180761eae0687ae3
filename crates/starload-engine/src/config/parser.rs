//! Config YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::types::PipelineConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error if any referenced environment variable is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                missing.push(var_name.to_string());
            }
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result)
}

/// Parse a config YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_config_str(yaml_str: &str) -> Result<PipelineConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: PipelineConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse config YAML")?;
    Ok(config)
}

/// Parse a config YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_YAML: &str = r"
warehouse:
  path: /var/lib/starload/warehouse.db
sources:
  orders:
    url: postgresql://etl:pw@localhost:5432/shop
  customers:
    url: mysql://etl:pw@localhost:3306/crm
  reviews:
    uri: mongodb://localhost:27017
    database: feedback
";

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SL_TEST_HOST", "myhost.example.com");
        let input = "host: ${SL_TEST_HOST}\nport: 5432";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("myhost.example.com"));
        assert!(!result.contains("${SL_TEST_HOST}"));
        std::env::remove_var("SL_TEST_HOST");
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "host: localhost\nport: 5432";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_multiple_missing_env_vars_all_reported() {
        let input = "${SL_MISSING_X} and ${SL_MISSING_Y}";
        let result = substitute_env_vars(input);
        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("SL_MISSING_X"));
        assert!(err_msg.contains("SL_MISSING_Y"));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_config_str(MINIMAL_YAML).unwrap();
        assert_eq!(
            config.warehouse.path.to_str().unwrap(),
            "/var/lib/starload/warehouse.db"
        );
        assert_eq!(config.sources.reviews.database, "feedback");
        assert_eq!(config.sources.reviews.collection, "reviews");
        assert_eq!(config.limits.batch_size, 5_000);
    }

    #[test]
    fn test_parse_config_with_env_vars() {
        std::env::set_var("SL_TEST_PG_PASS", "secret");
        let yaml = MINIMAL_YAML.replace("etl:pw@localhost:5432", "etl:${SL_TEST_PG_PASS}@db:5432");
        let config = parse_config_str(&yaml).unwrap();
        assert!(config.sources.orders.url.contains("secret"));
        assert!(!config.sources.orders.url.contains("${"));
        std::env::remove_var("SL_TEST_PG_PASS");
    }

    #[test]
    fn test_parse_invalid_yaml_errors() {
        let yaml = "this is not: [valid: yaml: {{{}}}";
        assert!(parse_config_str(yaml).is_err());
    }

    #[test]
    fn test_parse_config_file_not_found() {
        let result = parse_config(Path::new("/nonexistent/starload.yaml"));
        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Failed to read config file"));
    }
}
