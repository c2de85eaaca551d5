use secrecy::SecretString;

// -------------------------------------------------------------------------------------------------
// Auth
// -------------------------------------------------------------------------------------------------
/// Supported forms of authentication
pub enum Auth {
    /// No authentication
    Unauthenticated,

    /// Authenticate with a GitLab personal, project, or group access token
    PrivateToken(SecretString),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Unauthenticated => write!(f, "Unauthenticated"),
            Auth::PrivateToken(_) => write!(f, "PrivateToken([REDACTED])"),
        }
    }
}
