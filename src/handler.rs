//! Acting on a webhook event: checking a merge request's committers and reporting the outcome on
//! the merge request through labels, comments, and commit status.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{error, info};

use crate::committers::{CommitSource, CommitterPipeline, Credential, IdentityResolver};
use crate::config::{BotConfig, ConfigError};
use crate::defaults::{BOT_NAME, CLABOT_FILE};
use crate::gitlab::models::CommitState;
use crate::template;
use crate::verifier::verifier_for;
use crate::webhook::{summons_bot, MergeRequestTarget, WebhookEvent};

/// What the bot needs to know about a merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestInfo {
    /// The head commit
    pub sha: String,
    pub labels: Vec<String>,
    pub target_branch: String,
}

/// The merge request operations the bot performs.
#[async_trait]
pub trait MergeRequestApi: Send + Sync {
    async fn get_merge_request(&self, project_id: u64, merge_request_iid: u64) -> Result<MergeRequestInfo>;

    /// Get the project's `.clabot` file at the given ref, if there is one.
    async fn get_cla_file(&self, project_id: u64, git_ref: &str) -> Result<Option<String>>;

    async fn project_label_exists(&self, project_id: u64, label: &str) -> Result<bool>;

    async fn create_project_label(&self, project_id: u64, label: &str) -> Result<()>;

    async fn update_merge_request_labels(&self, project_id: u64, merge_request_iid: u64, labels: &[String]) -> Result<()>;

    async fn add_comment(&self, project_id: u64, merge_request_iid: u64, body: &str) -> Result<()>;

    async fn set_commit_status(&self, project_id: u64, sha: &str, state: CommitState, context: &str) -> Result<()>;
}

// -------------------------------------------------------------------------------------------------
// Handler
// -------------------------------------------------------------------------------------------------
pub struct Handler<'a> {
    api: &'a dyn MergeRequestApi,
    source: &'a dyn CommitSource,
    resolver: &'a dyn IdentityResolver,
    credential: Credential,
    external_provider: Option<String>,
}

impl<'a> Handler<'a> {
    pub fn new(
        api: &'a dyn MergeRequestApi,
        source: &'a dyn CommitSource,
        resolver: &'a dyn IdentityResolver,
        credential: Credential,
    ) -> Self {
        Handler {
            api,
            source,
            resolver,
            credential,
            external_provider: None,
        }
    }

    pub fn external_provider<S: Into<String>>(mut self, provider: S) -> Self {
        self.external_provider = Some(provider.into());
        self
    }

    /// Handle one webhook event, returning a description of what was done.
    pub async fn handle(&self, event: &WebhookEvent) -> Result<String> {
        if !event.is_actionable() {
            return Ok(format!("ignored action of type {}", event.object_kind));
        }

        if event.is_note() {
            let note = event.note().unwrap_or_default();
            if !summons_bot(note) {
                return Ok(format!(
                    "the following comment didn't summon the cla-bot because the string pattern to summon was not met: {note}"
                ));
            }
            info!("The cla-bot has been summoned by a comment");
        }

        let target = event.target().context("Failed to determine the merge request")?;
        let (message, config) = self.check_with_config(&target).await?;

        if event.is_note() {
            self.api
                .add_comment(target.project_id, target.merge_request_iid, &config.recheck_comment)
                .await?;
        }

        Ok(message)
    }

}

// private implementation
impl<'a> Handler<'a> {
    async fn check_with_config(&self, target: &MergeRequestTarget) -> Result<(String, BotConfig)> {
        let project_id = target.project_id;
        let merge_request_iid = target.merge_request_iid;
        let merge_request_url = target.merge_request_url();

        let mr = self.merge_request(target).await?;
        let config = self.load_config(target, &mr).await?;

        if !self.api.project_label_exists(project_id, &config.label).await? {
            info!("Creating label {} on project {project_id}", config.label);
            self.api.create_project_label(project_id, &config.label).await?;
        }

        let pipeline = CommitterPipeline::new(self.source, self.resolver);
        let pipeline = match &self.external_provider {
            Some(provider) => pipeline.external_provider(provider.as_str()),
            None => pipeline,
        };
        let committers = pipeline
            .resolve(project_id, merge_request_iid, &self.credential)
            .await
            .context("Failed to determine the committers of the merge request")?;

        if !committers.is_fully_resolved() {
            let unidentified = committers.unresolved_login_names.join(", ");
            info!("Some commits from the following contributors are not signed with a valid email address: {unidentified}");
            let comment = template::render(
                &config.message_missing_email,
                &[("unidentifiedUsers", unidentified.as_str())],
            );
            self.api.add_comment(project_id, merge_request_iid, &comment).await?;
            self.reject(target, &mr, &config).await?;
            let message = format!(
                "Unable to determine CLA status for users {unidentified}, added a comment to {merge_request_url}"
            );
            return Ok((message, config));
        }

        let verifier = verifier_for(&config)?;
        let non_contributors = verifier.non_contributors(&committers.distinct_users_to_verify);

        if non_contributors.is_empty() {
            info!("All contributors have a signed CLA, adding success status to the commit and a label");
            if !mr.labels.contains(&config.label) {
                let mut labels = mr.labels.clone();
                labels.push(config.label.clone());
                self.api
                    .update_merge_request_labels(project_id, merge_request_iid, &labels)
                    .await?;
            }
            self.api
                .set_commit_status(project_id, &mr.sha, CommitState::Success, BOT_NAME)
                .await?;
            let message = format!(
                "Updated commit status and added label {} to {merge_request_url}",
                config.label
            );
            return Ok((message, config));
        }

        let users_without_cla = non_contributors
            .iter()
            .map(|login| format!("@{login}"))
            .collect::<Vec<_>>()
            .join(", ");
        info!("The contributors {users_without_cla} have not signed the CLA");
        let comment = template::render(&config.message, &[("usersWithoutCLA", users_without_cla.as_str())]);
        self.api.add_comment(project_id, merge_request_iid, &comment).await?;
        self.reject(target, &mr, &config).await?;
        let message = format!(
            "CLA has not been signed by users {users_without_cla}, added a comment to {merge_request_url}"
        );
        Ok((message, config))
    }

    async fn merge_request(&self, target: &MergeRequestTarget) -> Result<MergeRequestInfo> {
        self.api
            .get_merge_request(target.project_id, target.merge_request_iid)
            .await
            .context("Failed to get merge request")
    }

    /// Load the project's configuration from the merge request's target branch.
    ///
    /// An unusable `.clabot` file fails the merge request's commit status.
    async fn load_config(&self, target: &MergeRequestTarget, mr: &MergeRequestInfo) -> Result<BotConfig> {
        let text = self
            .api
            .get_cla_file(target.project_id, &mr.target_branch)
            .await
            .with_context(|| format!("Failed to get the {CLABOT_FILE} file"))?;
        let text = match text {
            Some(text) => text,
            None => return Ok(BotConfig::defaults()),
        };
        match BotConfig::from_project_file(&text) {
            Ok(config) => Ok(config),
            Err(e) => {
                error!("{e}");
                self.api
                    .set_commit_status(target.project_id, &mr.sha, CommitState::Failed, BOT_NAME)
                    .await?;
                match e {
                    ConfigError::InvalidJson(_) | ConfigError::NotAnObject => {
                        bail!("The .clabot file is not valid JSON")
                    }
                    ConfigError::InvalidField(_) => Err(e.into()),
                }
            }
        }
    }

    /// Remove the bot's label, if present, and fail the commit status.
    async fn reject(&self, target: &MergeRequestTarget, mr: &MergeRequestInfo, config: &BotConfig) -> Result<()> {
        if mr.labels.contains(&config.label) {
            let labels: Vec<String> = mr
                .labels
                .iter()
                .filter(|l| **l != config.label)
                .cloned()
                .collect();
            self.api
                .update_merge_request_labels(target.project_id, target.merge_request_iid, &labels)
                .await?;
        }
        self.api
            .set_commit_status(target.project_id, &mr.sha, CommitState::Failed, BOT_NAME)
            .await?;
        Ok(())
    }
}
