use anyhow::bail;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::models::CommitState;
use super::{Auth, Client, Error};
use crate::committers::{
    self, CommitSource, Credential, IdentityRecord, IdentityResolver, LinkedIdentity, RawCommit,
};
use crate::defaults::CLABOT_FILE;
use crate::handler::{MergeRequestApi, MergeRequestInfo};

impl From<Error> for committers::Error {
    fn from(e: Error) -> Self {
        let message = e.to_string();
        if e.is_auth_error() {
            committers::Error::Auth(message)
        } else if e.is_not_found() {
            committers::Error::NotFound(message)
        } else if e.is_decode_error() {
            committers::Error::MalformedData(message)
        } else if let Error::RateLimited { .. } = e {
            committers::Error::RateLimited(message)
        } else {
            committers::Error::Transport(message)
        }
    }
}

/// The authentication to use for requests made on behalf of the given credential.
fn auth_for(credential: &Credential) -> Auth {
    let token = credential.expose_secret();
    if token.is_empty() {
        Auth::Unauthenticated
    } else {
        Auth::PrivateToken(SecretString::from(token.clone()))
    }
}

impl Client {
    /// The token this client sends, as a pipeline credential; empty when unauthenticated.
    pub fn credential(&self) -> Credential {
        match &self.auth {
            Auth::PrivateToken(token) => SecretString::from(token.expose_secret().clone()),
            Auth::Unauthenticated => SecretString::from(String::new()),
        }
    }
}

#[async_trait]
impl CommitSource for Client {
    async fn fetch_commits(
        &self,
        project_id: u64,
        merge_request_iid: u64,
        credential: &Credential,
    ) -> committers::Result<Vec<RawCommit>> {
        let commits = self
            .with_auth(auth_for(credential))
            .get_all_merge_request_commits(project_id, merge_request_iid)
            .await?;
        commits
            .into_iter()
            .map(|commit| match commit.author_name {
                Some(author_name) => Ok(RawCommit {
                    author_name,
                    author_email: commit.author_email,
                }),
                None => Err(committers::Error::MalformedData(format!(
                    "commit {} has no author name",
                    commit.id
                ))),
            })
            .collect()
    }
}

#[async_trait]
impl IdentityResolver for Client {
    async fn lookup_identity(
        &self,
        email: &str,
        credential: &Credential,
    ) -> committers::Result<Vec<IdentityRecord>> {
        let users = self.with_auth(auth_for(credential)).search_users(email).await?;
        Ok(users
            .into_iter()
            .map(|user| IdentityRecord {
                username: user.username,
                identities: user
                    .identities
                    .into_iter()
                    .map(|i| LinkedIdentity {
                        provider: i.provider,
                        extern_uid: i.extern_uid,
                    })
                    .collect(),
            })
            .collect())
    }
}

#[async_trait]
impl MergeRequestApi for Client {
    async fn get_merge_request(
        &self,
        project_id: u64,
        merge_request_iid: u64,
    ) -> anyhow::Result<MergeRequestInfo> {
        let mr = Client::get_merge_request(self, project_id, merge_request_iid).await?;
        let sha = match mr.sha {
            Some(sha) => sha,
            None => bail!("Merge request !{} of project {} has no head commit", mr.iid, mr.project_id),
        };
        Ok(MergeRequestInfo {
            sha,
            labels: mr.labels,
            target_branch: mr.target_branch,
        })
    }

    async fn get_cla_file(&self, project_id: u64, git_ref: &str) -> anyhow::Result<Option<String>> {
        Ok(self.get_raw_file(project_id, CLABOT_FILE, git_ref).await?)
    }

    async fn project_label_exists(&self, project_id: u64, label: &str) -> anyhow::Result<bool> {
        let labels = self.get_project_labels(project_id, label).await?;
        Ok(labels.iter().any(|l| l.name == label))
    }

    async fn create_project_label(&self, project_id: u64, label: &str) -> anyhow::Result<()> {
        Client::create_project_label(self, project_id, label).await?;
        Ok(())
    }

    async fn update_merge_request_labels(
        &self,
        project_id: u64,
        merge_request_iid: u64,
        labels: &[String],
    ) -> anyhow::Result<()> {
        Client::update_merge_request_labels(self, project_id, merge_request_iid, labels).await?;
        Ok(())
    }

    async fn add_comment(&self, project_id: u64, merge_request_iid: u64, body: &str) -> anyhow::Result<()> {
        self.add_merge_request_note(project_id, merge_request_iid, body).await?;
        Ok(())
    }

    async fn set_commit_status(
        &self,
        project_id: u64,
        sha: &str,
        state: CommitState,
        context: &str,
    ) -> anyhow::Result<()> {
        Client::set_commit_status(self, project_id, sha, state, context).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::{StatusCode, Url};

    fn failed(status: StatusCode) -> Error {
        Error::RequestFailed {
            url: Url::parse("https://gitlab.com/api/v4/users?search=bob%40x.com").unwrap(),
            status,
        }
    }

    #[test]
    fn error_kinds() {
        let e: committers::Error = failed(StatusCode::UNAUTHORIZED).into();
        assert_eq!(
            e,
            committers::Error::Auth(
                "API request https://gitlab.com/api/v4/users?search=bob%40x.com failed with status 401".into()
            )
        );
        assert!(matches!(committers::Error::from(failed(StatusCode::FORBIDDEN)), committers::Error::Auth(_)));
        assert!(matches!(committers::Error::from(failed(StatusCode::NOT_FOUND)), committers::Error::NotFound(_)));
        assert!(matches!(
            committers::Error::from(failed(StatusCode::BAD_GATEWAY)),
            committers::Error::Transport(_)
        ));
        assert!(matches!(
            committers::Error::from(Error::RateLimited { message: "slow down".into(), wait: None }),
            committers::Error::RateLimited(_)
        ));
    }

    #[test]
    fn empty_credential_is_unauthenticated() {
        assert!(matches!(auth_for(&SecretString::from(String::new())), Auth::Unauthenticated));
        assert!(matches!(auth_for(&SecretString::from("tok".to_string())), Auth::PrivateToken(_)));
    }
}
