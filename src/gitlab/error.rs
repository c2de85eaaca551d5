use chrono::Duration;
use reqwest::{StatusCode, Url};

/// A failed GitLab API request.
#[derive(Debug)]
pub enum Error {
    RateLimited {
        /// The message returned by GitLab, if any
        message: String,

        /// The duration to wait until trying again
        wait: Option<Duration>,
    },
    RequestFailed {
        /// The URL that was requested
        url: Url,

        /// The non-success status GitLab responded with
        status: StatusCode,
    },
    UrlBaseError(Url),
    UrlSlashError(String),
    InvalidTokenEnvVar(String),
    ReqwestError(reqwest::Error),
}

impl Error {
    /// Is this the result of GitLab rejecting the credentials used?
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Error::RequestFailed { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }

    /// Is this the result of requesting a project, merge request, or file that does not exist?
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::RequestFailed { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    /// Did the response body fail to decode?
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Error::ReqwestError(e) if e.is_decode())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::RateLimited{message, ..} => write!(f, "request was rate-limited: {message}"),
            Error::RequestFailed{url, status} => write!(f, "API request {url} failed with status {}", status.as_u16()),
            Error::UrlBaseError(u) => write!(f, "error building URL: {u} cannot be a base"),
            Error::UrlSlashError(p) => write!(f, "error building URL: component {p:?} contains a slash"),
            Error::InvalidTokenEnvVar(v) => write!(f, "error loading token: ill-formed value of {v} environment variable"),
            Error::ReqwestError(e) => write!(f, "error making request: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::RateLimited{..} => None,
            Error::RequestFailed{..} => None,
            Error::UrlBaseError(_) => None,
            Error::UrlSlashError(_) => None,
            Error::InvalidTokenEnvVar(_) => None,
            Error::ReqwestError(e) => Some(e),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::ReqwestError(err)
    }
}
