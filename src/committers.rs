//! Working out who contributed to a merge request.
//!
//! A merge request's commits are collapsed into distinct committers, whose platform identities are
//! then looked up by email address. The resulting [`PipelineResult`] separates committers that can
//! be checked against a CLA policy from those that cannot be identified at all.

use async_trait::async_trait;
use futures::future::join_all;
use secrecy::SecretString;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

mod error;
pub use error::{Error, Result};

/// The credential handed through to the collaborators.
pub type Credential = SecretString;

/// The linked identity provider whose external ID is reported by default.
pub const DEFAULT_EXTERNAL_PROVIDER: &str = "github";

// -------------------------------------------------------------------------------------------------
// RawCommit
// -------------------------------------------------------------------------------------------------
/// The authorship of one commit of a merge request, as reported by a `CommitSource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawCommit {
    pub author_name: String,

    /// `None` for commits authored without a configured email address
    pub author_email: Option<String>,
}

impl RawCommit {
    pub fn new<N: Into<String>>(author_name: N, author_email: Option<&str>) -> Self {
        RawCommit {
            author_name: author_name.into(),
            author_email: author_email.map(String::from),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// IdentityRecord
// -------------------------------------------------------------------------------------------------
/// A platform account, as reported by an `IdentityResolver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub username: String,

    /// Accounts on other identity providers linked to this one
    pub identities: Vec<LinkedIdentity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedIdentity {
    pub provider: String,
    pub extern_uid: String,
}

// -------------------------------------------------------------------------------------------------
// CommitterCandidate
// -------------------------------------------------------------------------------------------------
/// One distinct author of a merge request whose identity has not been looked up yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitterCandidate {
    pub email: Option<String>,
    pub name: String,
}

// -------------------------------------------------------------------------------------------------
// ResolvedCommitter
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCommitter {
    pub email: String,
    pub name: String,

    /// The platform username
    pub login: String,

    /// The committer's ID on the linked external identity provider, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

// -------------------------------------------------------------------------------------------------
// PipelineResult
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Sorted, distinct names of committers that could not be identified
    pub unresolved_login_names: Vec<String>,

    /// Identified committers, sorted by email
    pub distinct_users_to_verify: Vec<ResolvedCommitter>,
}

impl PipelineResult {
    /// Was every committer identified?
    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved_login_names.is_empty()
    }
}

// -------------------------------------------------------------------------------------------------
// Ports
// -------------------------------------------------------------------------------------------------
/// Something that can list the commits of a merge request.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Get the commits of the given merge request, in the order the source reports them.
    async fn fetch_commits(
        &self,
        project_id: u64,
        merge_request_iid: u64,
        credential: &Credential,
    ) -> Result<Vec<RawCommit>>;
}

/// Something that can find the platform account belonging to an email address.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Find the accounts matching `email`. An empty list means no account was found.
    async fn lookup_identity(
        &self,
        email: &str,
        credential: &Credential,
    ) -> Result<Vec<IdentityRecord>>;
}

// -------------------------------------------------------------------------------------------------
// CommitterPipeline
// -------------------------------------------------------------------------------------------------
pub struct CommitterPipeline<'a> {
    source: &'a dyn CommitSource,
    resolver: &'a dyn IdentityResolver,
    external_provider: String,
}

impl<'a> CommitterPipeline<'a> {
    pub fn new(source: &'a dyn CommitSource, resolver: &'a dyn IdentityResolver) -> Self {
        Self {
            source,
            resolver,
            external_provider: DEFAULT_EXTERNAL_PROVIDER.to_string(),
        }
    }

    /// Use the linked identity from the given provider to fill in `external_id`.
    pub fn external_provider<S: Into<String>>(mut self, provider: S) -> Self {
        self.external_provider = provider.into();
        self
    }

    /// Determine the distinct committers of the given merge request.
    ///
    /// If any commit lacks an email address, no identities are looked up at all, and only the
    /// names of those committers are reported. Otherwise every distinct email address is looked
    /// up concurrently; committers without a matching account are reported by name alongside the
    /// ones that were found.
    pub async fn resolve(
        &self,
        project_id: u64,
        merge_request_iid: u64,
        credential: &Credential,
    ) -> Result<PipelineResult> {
        info!("Obtaining the list of commits for merge request !{merge_request_iid} of project {project_id}");
        let commits = self
            .source
            .fetch_commits(project_id, merge_request_iid, credential)
            .await?;
        info!("Total commits: {}, retrieving required information for committers", commits.len());

        let candidates = deduplicate(&commits);

        let unresolved_login_names = names_without_email(&candidates);
        if !unresolved_login_names.is_empty() {
            debug!("{} committers have no email address; skipping identity lookups", unresolved_login_names.len());
            return Ok(PipelineResult {
                unresolved_login_names,
                distinct_users_to_verify: Vec::new(),
            });
        }

        let resolver = self.resolver;
        let lookups = candidates
            .into_iter()
            .filter_map(|c| c.email.map(|email| (email, c.name)))
            .map(|(email, name)| async move {
                let outcome = resolver.lookup_identity(&email, credential).await;
                (email, name, outcome)
            });
        let outcomes = join_all(lookups).await;

        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        let mut fatal = None;
        for (email, name, outcome) in outcomes {
            match outcome {
                Ok(records) => match records.into_iter().next() {
                    Some(record) => resolved.push(self.hydrate(email, name, record)),
                    None => {
                        debug!("No account found for committer {name}");
                        unresolved.push(name);
                    }
                },
                Err(e) if e.is_fatal() => {
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    warn!("Failed to look up account for committer {name}: {e}");
                    unresolved.push(name);
                }
            }
        }
        if let Some(e) = fatal {
            return Err(e);
        }

        unresolved.sort();
        unresolved.dedup();
        resolved.sort_by(|a, b| a.email.cmp(&b.email));

        Ok(PipelineResult {
            unresolved_login_names: unresolved,
            distinct_users_to_verify: resolved,
        })
    }

    fn hydrate(&self, email: String, name: String, record: IdentityRecord) -> ResolvedCommitter {
        let external_id = record
            .identities
            .into_iter()
            .find(|i| i.provider == self.external_provider)
            .map(|i| i.extern_uid);
        ResolvedCommitter {
            email,
            name,
            login: record.username,
            external_id,
        }
    }
}

/// Collapse commits into distinct candidates, in order of first appearance.
///
/// Commits sharing an email address (compared exactly) become one candidate named after the first
/// of them. Commits without an email address, which includes an empty one, are never merged.
pub fn deduplicate(commits: &[RawCommit]) -> Vec<CommitterCandidate> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut candidates = Vec::new();
    for commit in commits {
        match commit.author_email.as_deref() {
            Some(email) if !email.is_empty() => {
                if seen.insert(email) {
                    candidates.push(CommitterCandidate {
                        email: Some(email.to_string()),
                        name: commit.author_name.clone(),
                    });
                }
            }
            _ => candidates.push(CommitterCandidate {
                email: None,
                name: commit.author_name.clone(),
            }),
        }
    }
    candidates
}

/// The sorted, distinct names of the candidates lacking an email address.
pub fn names_without_email(candidates: &[CommitterCandidate]) -> Vec<String> {
    let mut names: Vec<String> = candidates
        .iter()
        .filter(|c| c.email.is_none())
        .map(|c| c.name.clone())
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeSource(Result<Vec<RawCommit>>);

    #[async_trait]
    impl CommitSource for FakeSource {
        async fn fetch_commits(&self, _: u64, _: u64, _: &Credential) -> Result<Vec<RawCommit>> {
            self.0.clone()
        }
    }

    /// Answers lookups from a table; unknown emails match an account named after the email when
    /// `match_unknown` is set, and nothing otherwise.
    #[derive(Default)]
    struct FakeResolver {
        table: HashMap<String, Result<Vec<IdentityRecord>>>,
        match_unknown: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeResolver {
        fn matching_everyone() -> Self {
            FakeResolver { match_unknown: true, ..Default::default() }
        }

        fn with(mut self, email: &str, outcome: Result<Vec<IdentityRecord>>) -> Self {
            self.table.insert(email.to_string(), outcome);
            self
        }

        fn calls(&self) -> Vec<String> {
            let mut calls = self.calls.lock().unwrap().clone();
            calls.sort();
            calls
        }
    }

    #[async_trait]
    impl IdentityResolver for FakeResolver {
        async fn lookup_identity(&self, email: &str, _: &Credential) -> Result<Vec<IdentityRecord>> {
            self.calls.lock().unwrap().push(email.to_string());
            match self.table.get(email) {
                Some(outcome) => outcome.clone(),
                None if self.match_unknown => Ok(vec![account(&format!("login-{email}"))]),
                None => Ok(vec![]),
            }
        }
    }

    fn account(username: &str) -> IdentityRecord {
        IdentityRecord { username: username.to_string(), identities: vec![] }
    }

    fn credential() -> Credential {
        SecretString::from("mad3u9t0k3n".to_string())
    }

    fn run(commits: Vec<RawCommit>, resolver: &FakeResolver) -> Result<PipelineResult> {
        let source = FakeSource(Ok(commits));
        let pipeline = CommitterPipeline::new(&source, resolver);
        block_on(pipeline.resolve(12345, 3, &credential()))
    }

    fn committer(email: &str, name: &str, login: &str) -> ResolvedCommitter {
        ResolvedCommitter {
            email: email.to_string(),
            name: name.to_string(),
            login: login.to_string(),
            external_id: None,
        }
    }

    #[test]
    fn empty_commit_list() {
        let resolver = FakeResolver::matching_everyone();
        assert_eq!(run(vec![], &resolver).unwrap(), PipelineResult::default());
        assert_eq!(resolver.calls(), Vec::<String>::new());
    }

    #[test]
    fn single_resolved_committer() {
        let resolver = FakeResolver::default().with("bob@x.com", Ok(vec![account("bbob")]));
        let result = run(vec![RawCommit::new("Bob", Some("bob@x.com"))], &resolver).unwrap();
        insta::assert_json_snapshot!(result, @r###"
        {
          "unresolvedLoginNames": [],
          "distinctUsersToVerify": [
            {
              "email": "bob@x.com",
              "name": "Bob",
              "login": "bbob"
            }
          ]
        }
        "###);
    }

    #[test]
    fn missing_email_short_circuits() {
        let resolver = FakeResolver::matching_everyone();
        let result = run(vec![RawCommit::new("Bob", None)], &resolver).unwrap();
        assert_eq!(
            result,
            PipelineResult {
                unresolved_login_names: vec!["Bob".to_string()],
                distinct_users_to_verify: vec![],
            }
        );
        assert_eq!(resolver.calls(), Vec::<String>::new());
    }

    #[test]
    fn missing_email_anywhere_skips_all_lookups() {
        let resolver = FakeResolver::matching_everyone();
        let commits = vec![
            RawCommit::new("Bob Bobbity", Some("bbobbity@badgertime.com")),
            RawCommit::new("zed", None),
            RawCommit::new("Clarinda Mvula", Some("clarinda@badgertime.com")),
            RawCommit::new("Amy", Some("")),
            RawCommit::new("zed", None),
        ];
        let result = run(commits, &resolver).unwrap();
        assert_eq!(result.unresolved_login_names, vec!["Amy", "zed"]);
        assert!(result.distinct_users_to_verify.is_empty());
        assert_eq!(resolver.calls(), Vec::<String>::new());
    }

    #[test]
    fn same_email_different_names_collapse_to_first() {
        let resolver = FakeResolver::matching_everyone();
        let commits = vec![
            RawCommit::new("A", Some("a@x.com")),
            RawCommit::new("A2", Some("a@x.com")),
        ];
        let result = run(commits, &resolver).unwrap();
        assert_eq!(result.distinct_users_to_verify, vec![committer("a@x.com", "A", "login-a@x.com")]);
        assert_eq!(resolver.calls(), vec!["a@x.com"]);
    }

    #[test]
    fn same_name_different_emails_stay_distinct() {
        let resolver = FakeResolver::matching_everyone();
        let commits = vec![
            RawCommit::new("Stevey", Some("stevey.steve@gmail.com")),
            RawCommit::new("Stevey", Some("steve@work.example")),
        ];
        let result = run(commits, &resolver).unwrap();
        assert_eq!(
            result.distinct_users_to_verify,
            vec![
                committer("steve@work.example", "Stevey", "login-steve@work.example"),
                committer("stevey.steve@gmail.com", "Stevey", "login-stevey.steve@gmail.com"),
            ]
        );
    }

    #[test]
    fn emails_are_compared_exactly() {
        let candidates = deduplicate(&[
            RawCommit::new("Bob", Some("Bob@x.com")),
            RawCommit::new("Bob", Some("bob@x.com")),
            RawCommit::new("Bob", Some("bob@x.com ")),
        ]);
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn emailless_commits_are_not_merged() {
        let candidates = deduplicate(&[
            RawCommit::new("Bob", None),
            RawCommit::new("Bob", None),
            RawCommit::new("Bob", Some("bob@x.com")),
            RawCommit::new("Bob 2", Some("bob@x.com")),
        ]);
        assert_eq!(
            candidates,
            vec![
                CommitterCandidate { email: None, name: "Bob".into() },
                CommitterCandidate { email: None, name: "Bob".into() },
                CommitterCandidate { email: Some("bob@x.com".into()), name: "Bob".into() },
            ]
        );
        assert_eq!(names_without_email(&candidates), vec!["Bob"]);
    }

    #[test]
    fn accounts_not_found_are_reported_by_name() {
        let resolver = FakeResolver::default()
            .with("bob@x.com", Ok(vec![account("bbob")]))
            .with("carol@x.com", Ok(vec![]));
        let commits = vec![
            RawCommit::new("Carol", Some("carol@x.com")),
            RawCommit::new("Bob", Some("bob@x.com")),
            RawCommit::new("Dave", Some("dave@x.com")),
        ];
        let result = run(commits, &resolver).unwrap();
        assert_eq!(result.unresolved_login_names, vec!["Carol", "Dave"]);
        assert_eq!(result.distinct_users_to_verify, vec![committer("bob@x.com", "Bob", "bbob")]);
        assert!(!result.is_fully_resolved());
    }

    #[test]
    fn first_matching_account_wins() {
        let resolver = FakeResolver::default()
            .with("bob@x.com", Ok(vec![account("bbob"), account("bobby")]));
        let result = run(vec![RawCommit::new("Bob", Some("bob@x.com"))], &resolver).unwrap();
        assert_eq!(result.distinct_users_to_verify[0].login, "bbob");
    }

    #[test]
    fn external_id_from_linked_identity() {
        let linked = IdentityRecord {
            username: "bbob".to_string(),
            identities: vec![
                LinkedIdentity { provider: "ldapmain".into(), extern_uid: "cn=bob".into() },
                LinkedIdentity { provider: "github".into(), extern_uid: "4242".into() },
            ],
        };
        let resolver = FakeResolver::default().with("bob@x.com", Ok(vec![linked]));
        let commits = vec![RawCommit::new("Bob", Some("bob@x.com"))];

        let result = run(commits.clone(), &resolver).unwrap();
        assert_eq!(result.distinct_users_to_verify[0].external_id.as_deref(), Some("4242"));

        let source = FakeSource(Ok(commits.clone()));
        let pipeline = CommitterPipeline::new(&source, &resolver).external_provider("ldapmain");
        let result = block_on(pipeline.resolve(1, 1, &credential())).unwrap();
        assert_eq!(result.distinct_users_to_verify[0].external_id.as_deref(), Some("cn=bob"));

        let pipeline = CommitterPipeline::new(&source, &resolver).external_provider("saml");
        let result = block_on(pipeline.resolve(1, 1, &credential())).unwrap();
        assert_eq!(result.distinct_users_to_verify[0].external_id, None);
    }

    #[test]
    fn commit_source_error_propagates_verbatim() {
        let message = "API request http://foo.com/user/testproject failed with status 404";
        let source = FakeSource(Err(Error::NotFound(message.to_string())));
        let resolver = FakeResolver::matching_everyone();
        let pipeline = CommitterPipeline::new(&source, &resolver);
        let err = block_on(pipeline.resolve(0, 3, &credential())).unwrap_err();
        assert_eq!(err, Error::NotFound(message.to_string()));
        assert_eq!(err.to_string(), message);
        assert_eq!(resolver.calls(), Vec::<String>::new());
    }

    #[test]
    fn transient_lookup_failure_degrades_to_unresolved() {
        let resolver = FakeResolver::matching_everyone()
            .with("bob@x.com", Err(Error::Transport("connection reset".into())));
        let commits = vec![
            RawCommit::new("Bob", Some("bob@x.com")),
            RawCommit::new("Carol", Some("carol@x.com")),
        ];
        let result = run(commits, &resolver).unwrap();
        assert_eq!(result.unresolved_login_names, vec!["Bob"]);
        assert_eq!(
            result.distinct_users_to_verify,
            vec![committer("carol@x.com", "Carol", "login-carol@x.com")]
        );
    }

    #[test]
    fn auth_failure_during_lookup_is_fatal_after_all_lookups_settle() {
        let message = "API request https://gitlab.com/api/v4/users?search=bob%40x.com failed with status 401";
        let resolver = FakeResolver::matching_everyone()
            .with("bob@x.com", Err(Error::Auth(message.into())));
        let commits = vec![
            RawCommit::new("Bob", Some("bob@x.com")),
            RawCommit::new("Carol", Some("carol@x.com")),
        ];
        let err = run(commits, &resolver).unwrap_err();
        assert_eq!(err, Error::Auth(message.into()));
        assert_eq!(resolver.calls(), vec!["bob@x.com", "carol@x.com"]);
    }

    fn arb_email() -> impl Strategy<Value = String> {
        "[a-c]{1,2}@(x|y)\\.com"
    }

    fn arb_name() -> impl Strategy<Value = String> {
        "[A-Ca-c]{1,3}"
    }

    fn arb_commits_with_email() -> impl Strategy<Value = Vec<RawCommit>> {
        prop::collection::vec(
            (arb_name(), arb_email()).prop_map(|(n, e)| RawCommit::new(n, Some(&e))),
            0..12,
        )
    }

    fn arb_commits() -> impl Strategy<Value = Vec<RawCommit>> {
        prop::collection::vec(
            (arb_name(), prop::option::of(arb_email()))
                .prop_map(|(n, e)| RawCommit::new(n, e.as_deref())),
            0..12,
        )
    }

    proptest! {
        #[test]
        fn every_distinct_email_is_verified(commits in arb_commits_with_email()) {
            let distinct: HashSet<&str> = commits
                .iter()
                .filter_map(|c| c.author_email.as_deref())
                .collect();
            let result = run(commits.clone(), &FakeResolver::matching_everyone()).unwrap();
            prop_assert_eq!(result.distinct_users_to_verify.len(), distinct.len());
            prop_assert!(result.unresolved_login_names.is_empty());
        }

        #[test]
        fn any_missing_email_reports_only_names(commits in arb_commits()) {
            let mut expected: Vec<String> = commits
                .iter()
                .filter(|c| c.author_email.is_none())
                .map(|c| c.author_name.clone())
                .collect();
            prop_assume!(!expected.is_empty());
            expected.sort();
            expected.dedup();

            let result = run(commits, &FakeResolver::matching_everyone()).unwrap();
            prop_assert_eq!(result.unresolved_login_names, expected);
            prop_assert!(result.distinct_users_to_verify.is_empty());
        }

        #[test]
        fn deduplication_is_idempotent(commits in arb_commits()) {
            let doubled: Vec<RawCommit> = commits.iter().chain(commits.iter()).cloned().collect();
            let once = run(commits, &FakeResolver::matching_everyone()).unwrap();
            let twice = run(doubled, &FakeResolver::matching_everyone()).unwrap();
            prop_assert_eq!(once.unresolved_login_names, twice.unresolved_login_names);
            prop_assert_eq!(once.distinct_users_to_verify, twice.distinct_users_to_verify);
        }
    }
}
