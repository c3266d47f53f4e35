pub mod config;

pub use config::{
    AppConfig, ConfigError, Environment, StorageBackend, DEFAULT_BIND_ADDR, DEFAULT_DATABASE_URL,
};

/// Loads environment variables from `.env` when present; a missing file is not an error.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{LazyLock, Mutex};

    /// Serializes tests that touch process environment variables.
    pub static ENV_GUARD: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
}
