pub mod config {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Clone)]
    pub struct Config {
        pub db_url: String,
        #[serde(default = "default_port")]
        pub port: u16,
        pub jwt_secret: String,
        /// Lifetime of issued tokens, in minutes.
        #[serde(default = "default_token_ttl_minutes")]
        pub token_ttl_minutes: i64,
    }

    impl Config {
        /// Loads configuration from environment variables.
        pub fn from_env() -> anyhow::Result<Self> {
            let settings = config::Config::builder()
                .add_source(config::Environment::default())
                .build()?;

            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }
    }

    fn default_port() -> u16 {
        3000
    }

    fn default_token_ttl_minutes() -> i64 {
        15
    }
}
pub mod auth;
pub mod entities;
pub mod task;
pub mod user;
pub mod validation;
pub mod web;
