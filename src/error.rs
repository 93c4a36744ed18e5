use thiserror::Error;

use crate::access::Module;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The store rejected or failed a read/write. Local state is left as it was.
    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("Acceso denegado al módulo: {}", module.key())]
    AccessDenied { module: Module },

    #[error("{0}")]
    Invalid(String),

    #[error("login required")]
    NoSession,

    #[error("Usuario o contraseña incorrectos")]
    AuthFailed,

    #[error("only an administrator may {0}")]
    AdminOnly(&'static str),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Persistence(_) => "persistence_failed",
            CoreError::AccessDenied { .. } => "access_denied",
            CoreError::Invalid(_) => "bad_params",
            CoreError::NoSession => "no_session",
            CoreError::AuthFailed => "auth_failed",
            CoreError::AdminOnly(_) => "access_denied",
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        CoreError::Invalid(message.into())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Persistence(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
