//! Error types for the relay client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required configuration value: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Session file not found: {0}")]
    SessionNotFound(String),

    #[error("Session is locked by another process")]
    SessionLocked,

    #[error("Failed to acquire session lock: {0}")]
    LockError(String),

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Sign-up required: this client only works with existing accounts")]
    SignUpRequired,

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        Error::TelegramError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_missing_config() {
        let err = Error::MissingConfig("USER_PHONE_NUMBER".to_string());
        assert!(err.to_string().contains("Missing required configuration"));
        assert!(err.to_string().contains("USER_PHONE_NUMBER"));
    }

    #[test]
    fn test_error_display_invalid_config() {
        let err = Error::InvalidConfig("CHATS is empty".to_string());
        assert!(err.to_string().contains("Invalid configuration"));
        assert!(err.to_string().contains("CHATS"));
    }

    #[test]
    fn test_error_display_session_locked() {
        let err = Error::SessionLocked;
        assert!(err.to_string().contains("locked by another process"));
    }

    #[test]
    fn test_error_display_sign_up_required() {
        let err = Error::SignUpRequired;
        assert!(err.to_string().contains("Sign-up required"));
    }

    #[test]
    fn test_error_display_not_implemented() {
        let err = Error::NotImplemented("sign up".to_string());
        assert_eq!(err.to_string(), "Not implemented: sign up");
    }

    #[test]
    fn test_error_display_telegram_error() {
        let err = Error::TelegramError("FLOOD_WAIT_5".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Telegram API error"));
        assert!(msg.contains("FLOOD_WAIT_5"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_from_serde_yaml() {
        let yaml_err = serde_yaml::from_str::<Vec<i32>>("{not: [a list").unwrap_err();
        let err: Error = yaml_err.into();
        assert!(matches!(err, Error::SerializationError(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::SerializationError(_)));
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_error_debug_impl() {
        let err = Error::AuthorizationFailed("PHONE_CODE_INVALID".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("AuthorizationFailed"));
    }
}
