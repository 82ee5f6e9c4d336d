use crate::schema::DocumentKind;
use std::fmt;

#[derive(Debug)]
pub enum FormPressError {
    UnknownTemplate(DocumentKind),
    Load(String),
    InvalidConfiguration(String),
    Serialization(String),
    Io(std::io::Error),
}

impl fmt::Display for FormPressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormPressError::UnknownTemplate(kind) => {
                write!(f, "no template registered for document kind: {}", kind.as_str())
            }
            FormPressError::Load(message) => write!(f, "template load error: {}", message),
            FormPressError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            FormPressError::Serialization(message) => {
                write!(f, "serialization error: {}", message)
            }
            FormPressError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for FormPressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FormPressError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FormPressError {
    fn from(value: std::io::Error) -> Self {
        FormPressError::Io(value)
    }
}
