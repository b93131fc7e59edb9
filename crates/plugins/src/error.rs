use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The host assigned a plugin id twice without a shutdown in between.
    #[error("plugin id already registered as {current:?}")]
    AlreadyRegistered { current: String },

    /// An operation needed the plugin id before the host assigned one.
    #[error("plugin id not registered")]
    NotRegistered,

    /// Another global tracing subscriber is already installed.
    #[error(transparent)]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

pub type Result<T> = std::result::Result<T, Error>;
