use thiserror::Error;

/// Failure inside one pipeline stage. The router converts these into degraded
/// results; they never reach router callers.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("intent classification failed: {0}")]
    Classification(String),
    #[error("entity extraction failed: {0}")]
    Extraction(String),
    #[error("response generation failed: {0}")]
    Generation(String),
    #[error("provider `{provider}` unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },
}

impl StageError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Classification(_) => "classification",
            Self::Extraction(_) => "extraction",
            Self::Generation(_) => "generation",
            Self::ProviderUnavailable { .. } => "provider",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The assistant is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Configuration(message) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Stage(StageError::ProviderUnavailable { provider, reason }) => {
                Self::ServiceUnavailable {
                    message: format!("{provider}: {reason}"),
                    correlation_id: "unassigned".to_owned(),
                }
            }
            ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Stage(stage) => {
                Self::Internal { message: stage.to_string(), correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
