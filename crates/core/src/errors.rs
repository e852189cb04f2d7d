use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("routing failure: {0}")]
    Routing(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("unknown command: {command}")]
    UnknownCommand { command: String, correlation_id: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn invalid_input(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into(), correlation_id: correlation_id.into() }
    }

    /// Text shown to the invoking user. Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownCommand { .. } => "Error: Unknown command".to_owned(),
            Self::InvalidInput { message, .. } => format!(
                "❌ **Validation Error**\n\n{message}\n\nPlease check your input and try again."
            ),
            Self::Internal { .. } => "Error: Internal error processing command".to_owned(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::UnknownCommand { correlation_id, .. }
            | Self::InvalidInput { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::UnknownCommand { correlation_id: id, .. }
            | InterfaceError::InvalidInput { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::UnknownCommand(command) => {
                Self::UnknownCommand { command, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Routing(message) | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
