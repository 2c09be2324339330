pub const THINGSBOARD_URL: &str = "https://thingsboard.cloud";
pub const THINGSBOARD_ENTITY_TYPE: &str = "DEVICE";

#[derive(Debug, Clone)]
pub struct ThingsBoardConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Device used when a query does not name one
    pub default_entity_id: String,
    pub entity_type: String,
    /// Preset JWT used before falling back to a login
    pub access_token: Option<String>,
}

impl ThingsBoardConfig {
    pub fn new<U, P>(username: U, password: P) -> Self
    where
        U: Into<String>,
        P: Into<String>,
    {
        Self {
            url: THINGSBOARD_URL.to_string(),
            username: username.into(),
            password: password.into(),
            default_entity_id: String::new(),
            entity_type: THINGSBOARD_ENTITY_TYPE.to_string(),
            access_token: None,
        }
    }

    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_default_entity_id<S: Into<String>>(mut self, entity_id: S) -> Self {
        self.default_entity_id = entity_id.into();
        self
    }

    /// The explicit entity id when given and non-empty, otherwise the default
    pub fn resolve_entity_id(&self, entity_id: Option<&str>) -> Option<String> {
        entity_id
            .filter(|id| !id.is_empty())
            .or(Some(self.default_entity_id.as_str()))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
