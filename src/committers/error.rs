// -------------------------------------------------------------------------------------------------
// Error
// -------------------------------------------------------------------------------------------------
/// Failures reported by a `CommitSource` or `IdentityResolver`.
///
/// Each variant carries a human-readable message, which is what gets displayed; for HTTP-backed
/// collaborators this is of the form `API request <url> failed with status <code>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The credential was missing, invalid, or lacks access
    Auth(String),

    /// The repository or merge request does not exist
    NotFound(String),

    /// The collaborator refused the request because too many were made
    RateLimited(String),

    /// Any other failure to talk to the collaborator
    Transport(String),

    /// The collaborator answered, but with data missing required fields
    MalformedData(String),
}

impl Error {
    /// Should this failure abort a whole pipeline run, even when it happens for a single identity
    /// lookup?
    ///
    /// Authentication failures and rate limiting would fail every other lookup in the run as well.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::RateLimited(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Auth(m)
            | Error::NotFound(m)
            | Error::RateLimited(m)
            | Error::Transport(m)
            | Error::MalformedData(m) => m,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
