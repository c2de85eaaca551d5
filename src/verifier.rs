//! Deciding which committers have signed the CLA.

use std::collections::HashSet;

use crate::committers::ResolvedCommitter;
use crate::config::BotConfig;

/// A CLA policy.
pub trait ContributionVerifier: Send + Sync {
    /// Get the logins of the given committers that have not signed, without duplicates, in the
    /// order the committers were given.
    fn non_contributors(&self, committers: &[ResolvedCommitter]) -> Vec<String>;
}

// -------------------------------------------------------------------------------------------------
// ContributorList
// -------------------------------------------------------------------------------------------------
/// A CLA policy backed by a fixed list of signers.
///
/// Each entry is one of:
///
/// - a login, compared exactly
/// - an email address, compared ignoring ASCII case
/// - a domain wildcard like `*@example.com`, which covers every email address at that domain
#[derive(Debug, Default)]
pub struct ContributorList {
    logins: HashSet<String>,
    emails: HashSet<String>,
    domains: HashSet<String>,
}

impl ContributorList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = ContributorList::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if let Some(domain) = entry.strip_prefix("*@") {
                list.domains.insert(domain.to_ascii_lowercase());
            } else if entry.contains('@') {
                list.emails.insert(entry.to_ascii_lowercase());
            } else if !entry.is_empty() {
                list.logins.insert(entry.to_string());
            }
        }
        list
    }

    pub fn has_signed(&self, committer: &ResolvedCommitter) -> bool {
        if self.logins.contains(&committer.login) {
            return true;
        }
        let email = committer.email.to_ascii_lowercase();
        if self.emails.contains(&email) {
            return true;
        }
        match email.rsplit_once('@') {
            Some((_, domain)) => self.domains.contains(domain),
            None => false,
        }
    }
}

impl ContributionVerifier for ContributorList {
    fn non_contributors(&self, committers: &[ResolvedCommitter]) -> Vec<String> {
        let mut seen = HashSet::new();
        committers
            .iter()
            .filter(|c| !self.has_signed(c))
            .filter(|c| seen.insert(c.login.as_str()))
            .map(|c| c.login.clone())
            .collect()
    }
}

// -------------------------------------------------------------------------------------------------
// Error
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Unspecified,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Unspecified => {
                write!(f, "A mechanism for verifying contributors has not been specified")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Choose the CLA policy a project's configuration asks for.
pub fn verifier_for(config: &BotConfig) -> Result<Box<dyn ContributionVerifier>, Error> {
    match &config.contributors {
        Some(contributors) => Ok(Box::new(ContributorList::new(contributors))),
        None => Err(Error::Unspecified),
    }
}
