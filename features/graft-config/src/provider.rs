use crate::{
    config::{PartialResolverConfig, ResolverConfig},
    errors::ConfigError,
};

/// Prefix of every environment variable the provider understands
pub const ENV_PREFIX: &str = "GRAFT_";

/// A provider layering all config sources.
///
/// Layers are applied in the order they were added, on top of
/// [`ResolverConfig::default`]. Later layers win.
pub struct ConfigProvider {
    layers: Vec<(String, PartialResolverConfig)>,
}
impl Default for ConfigProvider {
    fn default() -> Self {
        Self::initialize()
    }
}

impl ConfigProvider {
    /// Initializes a provider without any layers
    pub fn initialize() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a JSON document as a layer.
    ///
    /// Unknown keys are rejected with a [`ConfigError::Malformed`]
    pub fn add_json(&mut self, layer: &str, document: &str) -> Result<&mut Self, ConfigError> {
        let values = serde_json::from_str::<PartialResolverConfig>(document).map_err(|e| {
            ConfigError::Malformed {
                layer: layer.to_string(),
                message: e.to_string(),
            }
        })?;

        tracing::debug!("Added config layer '{layer}'");
        self.layers.push((layer.to_string(), values));
        Ok(self)
    }

    /// Can optionally add a JSON document as a layer.
    ///
    /// If the document is `Some`, it is the same as calling [`ConfigProvider::add_json`]
    /// If it is `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_json(
        &mut self,
        layer: &str,
        document: Option<&str>,
    ) -> Result<&mut Self, ConfigError> {
        match document {
            Some(document) => self.add_json(layer, document),
            None => Ok(self),
        }
    }

    /// Add a layer from `GRAFT_*` variables.
    ///
    /// Variables without the prefix are ignored, unknown `GRAFT_*` variables are logged and ignored.
    pub fn add_env_vars<I, K, V>(&mut self, vars: I) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut values = PartialResolverConfig::default();
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match name {
                "AUTO_BINDING" => values.auto_binding = Some(parse_bool(key, value)?),
                "PARALLEL" => values.parallel = Some(parse_bool(key, value)?),
                "WORKER_THREADS" => values.worker_threads = Some(parse_number(key, value)?),
                "TIMEOUT_MS" => values.timeout_ms = Some(parse_number(key, value)?),
                _ => tracing::warn!("Ignoring unknown config variable '{key}'"),
            }
        }

        self.layers.push(("environment".to_string(), values));
        Ok(self)
    }

    /// Add a layer from the process environment
    pub fn add_environment(&mut self) -> Result<&mut Self, ConfigError> {
        self.add_env_vars(std::env::vars())
    }

    /// Collapse all layers into the final config
    pub fn resolve(&self) -> ResolverConfig {
        let mut config = ResolverConfig::default();
        for (layer, values) in &self.layers {
            tracing::trace!("Applying config layer '{layer}'");
            config.apply(values);
        }
        config
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn no_layers_yield_defaults() {
        assert_eq!(ConfigProvider::initialize().resolve(), ResolverConfig::default());
    }

    #[rstest]
    fn later_layers_win() {
        let mut provider = ConfigProvider::initialize();
        provider
            .add_json("file", r#"{ "parallel": true, "worker_threads": 2 }"#)
            .unwrap()
            .add_env_vars([("GRAFT_WORKER_THREADS", "8"), ("PATH", "/usr/bin")])
            .unwrap();

        let config = provider.resolve();
        assert!(config.parallel);
        assert!(config.auto_binding);
        assert_eq!(config.worker_threads, Some(8));
    }

    #[rstest]
    fn absent_json_layer_is_skipped() {
        let mut provider = ConfigProvider::initialize();
        provider.maybe_add_json("optional", None).unwrap();
        assert_eq!(provider.resolve(), ResolverConfig::default());
    }

    #[rstest]
    #[case("1", true)]
    #[case("TRUE", true)]
    #[case("off", false)]
    #[case(" no ", false)]
    fn env_booleans(#[case] value: &str, #[case] expected: bool) {
        let mut provider = ConfigProvider::initialize();
        provider
            .add_env_vars([("GRAFT_AUTO_BINDING", value)])
            .unwrap();
        assert_eq!(provider.resolve().auto_binding, expected);
    }

    #[rstest]
    fn invalid_env_value_is_reported() {
        let error = ConfigProvider::initialize()
            .add_env_vars([("GRAFT_TIMEOUT_MS", "soon")])
            .err()
            .unwrap();

        assert_eq!(
            error,
            ConfigError::InvalidValue {
                key: "GRAFT_TIMEOUT_MS".to_string(),
                value: "soon".to_string(),
            }
        );
    }

    #[rstest]
    fn unknown_json_key_is_rejected() {
        let error = ConfigProvider::initialize()
            .add_json("file", r#"{ "auto_bind": false }"#)
            .err()
            .unwrap();

        assert!(matches!(error, ConfigError::Malformed { layer, .. } if layer == "file"));
    }
}
