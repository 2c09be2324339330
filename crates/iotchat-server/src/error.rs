use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets a dotted settings path
pub fn to_env_var(field_path: &str) -> String {
    format!("IOTCHAT_{}", field_path.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("provider.type"), "IOTCHAT_PROVIDER__TYPE");
        assert_eq!(
            to_env_var("thingsboard.default_entity_id"),
            "IOTCHAT_THINGSBOARD__DEFAULT_ENTITY_ID"
        );
    }

    #[test]
    fn test_missing_env_var_message() {
        let err = ConfigError::MissingEnvVar {
            env_var: "IOTCHAT_PROVIDER__API_KEY".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: IOTCHAT_PROVIDER__API_KEY"
        );
    }
}
