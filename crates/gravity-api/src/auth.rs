use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};

/// Credentials for authenticating with a portal.
///
/// The portal accepts HTTP Basic auth (user + password or API key) and
/// Bearer tokens (agent/install tokens).
#[derive(Debug, Clone)]
pub enum Credentials {
    /// No authentication header.
    None,
    /// HTTP Basic auth.
    Basic {
        username: String,
        password: SecretString,
    },
    /// `Authorization: Bearer <token>`.
    Bearer { token: SecretString },
}

impl Credentials {
    /// Attach these credentials to an outgoing request.
    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::None => request,
            Self::Basic { username, password } => {
                request.basic_auth(username, Some(password.expose_secret()))
            }
            Self::Bearer { token } => request.bearer_auth(token.expose_secret()),
        }
    }

    /// The raw `Authorization` header value, for transports that cannot
    /// use the reqwest builder (websocket upgrades).
    pub(crate) fn header_value(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Basic { username, password } => {
                let raw = format!("{username}:{}", password.expose_secret());
                Some(format!("Basic {}", STANDARD.encode(raw.as_bytes())))
            }
            Self::Bearer { token } => Some(format!("Bearer {}", token.expose_secret())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_header_value() {
        let creds = Credentials::Basic {
            username: "admin".into(),
            password: SecretString::from("secret".to_string()),
        };
        assert_eq!(
            creds.header_value().as_deref(),
            Some("Basic YWRtaW46c2VjcmV0")
        );
    }

    #[test]
    fn bearer_header_value() {
        let creds = Credentials::Bearer {
            token: SecretString::from("tok".to_string()),
        };
        assert_eq!(creds.header_value().as_deref(), Some("Bearer tok"));
        assert!(Credentials::None.header_value().is_none());
    }
}
