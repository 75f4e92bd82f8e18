pub mod schema;

pub use schema::{ChatLogConfig, Config, GatewayConfig, InferenceConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reexported_config_default_is_constructible() {
        let config = Config::default();

        assert!(!config.inference.model.is_empty());
        assert!(config.gateway.port > 0);
    }
}
