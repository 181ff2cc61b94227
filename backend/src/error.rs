//! Backend error types and gateway reject-code translation.

/// Errors that can occur talking to the trading backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("order rejected [{code}]: {message}")]
    Rejected { code: String, message: String },

    #[error("failed to parse backend response: {0}")]
    Parse(String),
}

impl BackendError {
    /// True when the backend understood the request and said no. These
    /// errors are per-order; the batch around them keeps going.
    pub fn is_reject(&self) -> bool {
        matches!(self, BackendError::Rejected { .. })
    }
}

/// Translate a gateway reject code into an operator-facing message.
///
/// The brokerage gateway answers with numeric codes; operators see the
/// translated text in reports and the audit log. Unknown codes fall back
/// to whatever message the gateway sent.
pub fn describe_reject_code(code: &str) -> Option<&'static str> {
    let message = match code {
        "1001" => "instrument not found on exchange",
        "1002" => "insufficient balance in account",
        "1003" => "market closed for this instrument",
        "1004" => "price outside allowed band",
        "1005" => "duplicate order",
        "1006" => "quantity below minimum lot",
        "1007" => "account blocked for trading",
        _ => return None,
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_translated() {
        assert_eq!(
            describe_reject_code("1001"),
            Some("instrument not found on exchange")
        );
        assert_eq!(
            describe_reject_code("1002"),
            Some("insufficient balance in account")
        );
    }

    #[test]
    fn unknown_code_passes_through() {
        assert_eq!(describe_reject_code("9999"), None);
    }

    #[test]
    fn reject_display() {
        let err = BackendError::Rejected {
            code: "1002".into(),
            message: "insufficient balance in account".into(),
        };
        assert!(err.is_reject());
        assert_eq!(
            err.to_string(),
            "order rejected [1002]: insufficient balance in account"
        );
    }

    #[test]
    fn connection_is_not_reject() {
        assert!(!BackendError::Connection("refused".into()).is_reject());
    }
}
