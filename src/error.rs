use reqwest::StatusCode;

/// Error returned by every COS operation
#[derive(Debug, thiserror::Error)]
pub enum CosError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("COS error: status={status}, code={code}, message={message}, request_id={request_id}")]
    Service {
        status: StatusCode,
        code: String,
        message: String,
        request_id: String,
        resource: String,
    },

    #[error("XML error: {0}")]
    Xml(String),

    /// A well-formed response COS should not have sent
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CosError {
    /// HTTP status of a service error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CosError::Service { status, .. } => Some(*status),
            CosError::Http(e) => e.status(),
            _ => None,
        }
    }

    /// COS error code (e.g. `NoSuchKey`) of a service error
    pub fn code(&self) -> Option<&str> {
        match self {
            CosError::Service { code, .. } if !code.is_empty() => Some(code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }
}

impl From<quick_xml::DeError> for CosError {
    fn from(value: quick_xml::DeError) -> Self {
        CosError::Xml(value.to_string())
    }
}

impl From<quick_xml::SeError> for CosError {
    fn from(value: quick_xml::SeError) -> Self {
        CosError::Xml(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CosError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn service_error(status: StatusCode, code: &str) -> CosError {
        CosError::Service {
            status,
            code: code.to_string(),
            message: String::new(),
            request_id: String::new(),
            resource: String::new(),
        }
    }

    #[test]
    fn test_status_helpers() {
        let err = service_error(StatusCode::NOT_FOUND, "NoSuchKey");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
        assert_eq!(err.code(), Some("NoSuchKey"));

        let err = service_error(StatusCode::CONFLICT, "");
        assert!(err.is_conflict());
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_non_service_errors_have_no_status() {
        let err = CosError::InvalidArgument("empty key".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "Invalid argument: empty key");
    }
}
