use config::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub ai: AiSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub token_expiry: i64, // seconds (e.g., 3600 for 1 hour)
    pub issuer: String,
}

/// Text-generation service settings.
///
/// `api_key` is optional: without one the service falls back to the
/// deterministic built-in procedure generator, which is also the test path.
#[derive(serde::Deserialize, Clone)]
pub struct AiSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout_seconds: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: None,
            model: "claude-3-sonnet-20240229".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("CLIENTDESK").separator("__"))
        .build()?;
    settings.try_deserialize::<Settings>()
}
