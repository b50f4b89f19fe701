/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type so the bot
/// core can handle failures consistently (user-facing message vs retryable
/// vs fatal).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("translation provider error: {0}")]
    Provider(String),

    /// Provider-side block of the automation session (the one session fault
    /// the resilience supervisor is allowed to retry).
    #[error("session blocked: {0}")]
    Blocked(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_layer() {
        let err = Error::Blocked("TOSBLOCK".to_string());
        assert_eq!(err.to_string(), "session blocked: TOSBLOCK");

        let err = Error::Provider("timeout".to_string());
        assert_eq!(err.to_string(), "translation provider error: timeout");

        let err = Error::Config("DEFAULT_TARGET_LANG".to_string());
        assert_eq!(err.to_string(), "config error: DEFAULT_TARGET_LANG");
    }
}
