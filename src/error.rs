use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionError),

    #[error("Behavior error: {0}")]
    Behavior(#[from] crate::behavior::BehaviorError),
}

pub type Result<T> = std::result::Result<T, Error>;
