/// Errors surfaced by the SIAD client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The backend answered with a non-success status. `message` is the
    /// envelope message, empty when the body carried none.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// A response arrived but its body was not the expected envelope.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The request was superseded or cancelled before it completed.
    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Message to show the user: the backend's envelope message, then the
    /// error's own message, then `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        let own = match self {
            ClientError::Api { message, .. } => message.as_str(),
            ClientError::Transport(message) | ClientError::Decode(message) => message.as_str(),
            ClientError::Cancelled => "",
        };
        if own.trim().is_empty() {
            fallback.to_string()
        } else {
            own.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_message_wins() {
        let e = ClientError::Api {
            status: 409,
            message: "El archivador contiene documentos".to_string(),
        };
        assert_eq!(e.user_message("Error"), "El archivador contiene documentos");
        assert_eq!(e.status(), Some(409));
    }

    #[test]
    fn empty_api_message_falls_back() {
        let e = ClientError::Api {
            status: 500,
            message: "  ".to_string(),
        };
        assert_eq!(e.user_message("Error al cargar"), "Error al cargar");
    }

    #[test]
    fn transport_message_precedes_fallback() {
        let e = ClientError::Transport("Connection refused".to_string());
        assert_eq!(e.user_message("Error al cargar"), "Connection refused");
        assert_eq!(ClientError::Cancelled.user_message("Error al cargar"), "Error al cargar");
    }
}
