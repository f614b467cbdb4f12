use super::types::AttestorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassification {
    /// Stable machine-readable code for clients.
    pub code: &'static str,
    /// HTTP status the error maps to.
    pub status: u16,
}

impl AttestorError {
    /// Classify this error into a stable error code and HTTP status.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            AttestorError::NotFound(_) => ErrorClassification {
                code: "NOT_FOUND",
                status: 404,
            },
            AttestorError::Conflict(_) => ErrorClassification {
                code: "CONFLICT",
                status: 409,
            },
            AttestorError::Validation(_) => ErrorClassification {
                code: "VALIDATION_ERROR",
                status: 400,
            },
            AttestorError::Config(_) => ErrorClassification {
                code: "CONFIG_ERROR",
                status: 400,
            },
            AttestorError::Cancelled(_) => ErrorClassification {
                code: "ANALYSIS_CANCELLED",
                status: 409,
            },
            AttestorError::Timeout(_) => ErrorClassification {
                code: "PHASE_TIMEOUT",
                status: 504,
            },
            AttestorError::Database(_) => ErrorClassification {
                code: "DATABASE_ERROR",
                status: 500,
            },
            AttestorError::Detector(_) => ErrorClassification {
                code: "DETECTOR_ERROR",
                status: 500,
            },
            AttestorError::Io(_) => ErrorClassification {
                code: "IO_ERROR",
                status: 500,
            },
            AttestorError::Json(_) => ErrorClassification {
                code: "SERIALIZATION_ERROR",
                status: 500,
            },
            AttestorError::Yaml(_) => ErrorClassification {
                code: "SERIALIZATION_ERROR",
                status: 500,
            },
            AttestorError::Internal(_) => ErrorClassification {
                code: "INTERNAL_ERROR",
                status: 500,
            },
        }
    }

    /// Client-side errors are the caller's fault and are not logged as failures.
    pub fn is_client_error(&self) -> bool {
        self.classify().status < 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let class = AttestorError::not_found("Snapshot", "s-1").classify();
        assert_eq!(class.status, 404);
        assert_eq!(class.code, "NOT_FOUND");
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let err = AttestorError::Conflict("already analyzing".into());
        assert_eq!(err.classify().status, 409);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_database_error_is_server_error() {
        let err = AttestorError::Database("disk I/O error".into());
        let class = err.classify();
        assert_eq!(class.status, 500);
        assert_eq!(class.code, "DATABASE_ERROR");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_validation_maps_to_400() {
        let err = AttestorError::Validation("unknown framework".into());
        assert_eq!(err.classify().status, 400);
    }

    #[test]
    fn test_timeout_has_stable_code() {
        let err = AttestorError::Timeout("phase exceeded 600s".into());
        assert_eq!(err.classify().code, "PHASE_TIMEOUT");
    }

    #[test]
    fn test_not_found_message() {
        let err = AttestorError::not_found("Run", "r-9");
        assert_eq!(err.to_string(), "Not found: Run r-9 not found");
    }
}
