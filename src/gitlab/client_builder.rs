use reqwest::{IntoUrl, Url};
use secrecy::SecretString;
use tracing::debug;

use super::{Auth, Client, Error, Result};

/// Configures and creates a [`Client`].
pub struct ClientBuilder {
    base_url: Url,
    auth: Auth,
    ignore_certs: bool,
}

impl ClientBuilder {
    /// Sent as the `User-Agent` of every API request
    const USER_AGENT: &'static str = "gitlab-cla-bot";

    /// The GitLab instance used unless another is given
    pub const DEFAULT_BASE_URL: &'static str = "https://gitlab.com/api/v4";

    /// Where [`Self::private_token_from_env`] looks for an access token
    pub const TOKEN_ENV_VAR: &'static str = "GITLAB_ACCESS_TOKEN";

    /// Start from unauthenticated access to [`Self::DEFAULT_BASE_URL`].
    pub fn new() -> Self {
        ClientBuilder {
            base_url: Url::parse(Self::DEFAULT_BASE_URL).expect("default base URL should parse"),
            auth: Auth::Unauthenticated,
            ignore_certs: false,
        }
    }

    /// Talk to another GitLab instance, given the root of its REST API, e.g.,
    /// `https://gitlab.example.com/api/v4`.
    pub fn base_url<T: IntoUrl>(self, url: T) -> Result<Self> {
        Ok(ClientBuilder {
            base_url: url.into_url()?,
            ..self
        })
    }

    pub fn auth(self, auth: Auth) -> Self {
        ClientBuilder { auth, ..self }
    }

    /// Authenticate with the token in `GITLAB_ACCESS_TOKEN`, if that variable is set.
    pub fn private_token_from_env(self) -> Result<Self> {
        self.private_token_from_env_var(Self::TOKEN_ENV_VAR)
    }

    fn private_token_from_env_var(self, var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(token) => {
                debug!("Using GitLab access token from {var} environment variable");
                Ok(self.auth(Auth::PrivateToken(SecretString::from(token))))
            }
            Err(std::env::VarError::NotPresent) => {
                debug!("No GitLab access token provided; using unauthenticated API access");
                Ok(self)
            }
            Err(std::env::VarError::NotUnicode(_)) => Err(Error::InvalidTokenEnvVar(var.to_string())),
        }
    }

    /// Accept any TLS certificate the server presents.
    pub fn ignore_certs(self, ignore_certs: bool) -> Self {
        ClientBuilder {
            ignore_certs,
            ..self
        }
    }

    pub fn build(self) -> Result<Client> {
        let ClientBuilder {
            base_url,
            auth,
            ignore_certs,
        } = self;
        let inner = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .danger_accept_invalid_certs(ignore_certs)
            .build()?;
        Ok(Client {
            base_url,
            inner,
            auth,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
