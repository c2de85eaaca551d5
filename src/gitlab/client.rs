use chrono::{DateTime, Duration, TimeDelta, TimeZone, Utc};
use reqwest::{header, RequestBuilder, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::models::{
    Commit, CommitState, CommitStatus, Label, MergeRequest, Note, Page, User,
};
use super::{Auth, Error, Result};

// TODO: retry rate-limited requests once `Error::RateLimited::wait` has elapsed

/// A client for the parts of the GitLab v4 REST API the bot uses.
///
/// Create one with [`super::ClientBuilder`].
pub struct Client {
    pub(super) base_url: Url,
    pub(super) inner: reqwest::Client,
    pub(super) auth: Auth,
}

/// GitLab's largest page size
const PER_PAGE: (&str, &str) = ("per_page", "100");

/// The color given to labels the bot creates
const DEFAULT_LABEL_COLOR: &str = "#428BCA";

impl Client {
    /// Get a client that shares this one's connection pool and base URL but uses the given
    /// authentication instead.
    pub fn with_auth(&self, auth: Auth) -> Client {
        Client {
            base_url: self.base_url.clone(),
            inner: self.inner.clone(),
            auth,
        }
    }

    /// Get the first page of commits of the given merge request.
    pub async fn get_merge_request_commits(
        &self,
        project_id: u64,
        merge_request_iid: u64,
    ) -> Result<Page<Commit>> {
        let project_id = project_id.to_string();
        let merge_request_iid = merge_request_iid.to_string();
        self.get_paginated_with_params(
            &["projects", project_id.as_str(), "merge_requests", merge_request_iid.as_str(), "commits"],
            &[PER_PAGE],
        )
        .await
    }

    /// Get every commit of the given merge request, following pagination.
    pub async fn get_all_merge_request_commits(
        &self,
        project_id: u64,
        merge_request_iid: u64,
    ) -> Result<Vec<Commit>> {
        let page = self.get_merge_request_commits(project_id, merge_request_iid).await?;
        self.get_all(page).await
    }

    /// Search for users by email address, username, or name.
    ///
    /// Only the first page of results is returned.
    pub async fn search_users(&self, search: &str) -> Result<Vec<User>> {
        let page = self
            .get_paginated_with_params(&["users"], &[("search", search), PER_PAGE])
            .await?;
        Ok(page.items)
    }

    pub async fn get_merge_request(
        &self,
        project_id: u64,
        merge_request_iid: u64,
    ) -> Result<MergeRequest> {
        let project_id = project_id.to_string();
        let merge_request_iid = merge_request_iid.to_string();
        let response = self
            .get(&["projects", project_id.as_str(), "merge_requests", merge_request_iid.as_str()])
            .await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Get the raw contents of a file in a project's repository at the given ref.
    ///
    /// Returns `None` if the file does not exist at that ref.
    pub async fn get_raw_file(
        &self,
        project_id: u64,
        file_path: &str,
        git_ref: &str,
    ) -> Result<Option<String>> {
        let project_id = project_id.to_string();
        let result = self
            .get_with_params(
                &["projects", project_id.as_str(), "repository", "files", file_path, "raw"],
                &[("ref", git_ref)],
            )
            .await;
        match result {
            Ok(response) => Ok(Some(response.text().await?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get every label of the given project whose name contains `search`.
    pub async fn get_project_labels(&self, project_id: u64, search: &str) -> Result<Vec<Label>> {
        let project_id = project_id.to_string();
        let page = self
            .get_paginated_with_params(
                &["projects", project_id.as_str(), "labels"],
                &[("search", search), PER_PAGE],
            )
            .await?;
        self.get_all(page).await
    }

    pub async fn create_project_label(&self, project_id: u64, name: &str) -> Result<Label> {
        let project_id = project_id.to_string();
        let url = self.make_url(&["projects", project_id.as_str(), "labels"], &[])?;
        let body = json!({ "name": name, "color": DEFAULT_LABEL_COLOR });
        let response = self.send(self.inner.post(url).json(&body)).await?;
        Ok(response.json().await?)
    }

    /// Replace the full set of labels on the given merge request.
    pub async fn update_merge_request_labels(
        &self,
        project_id: u64,
        merge_request_iid: u64,
        labels: &[String],
    ) -> Result<MergeRequest> {
        let project_id = project_id.to_string();
        let merge_request_iid = merge_request_iid.to_string();
        let url = self.make_url(&["projects", project_id.as_str(), "merge_requests", merge_request_iid.as_str()], &[])?;
        let body = json!({ "labels": labels.join(",") });
        let response = self.send(self.inner.put(url).json(&body)).await?;
        Ok(response.json().await?)
    }

    pub async fn add_merge_request_note(
        &self,
        project_id: u64,
        merge_request_iid: u64,
        body: &str,
    ) -> Result<Note> {
        let project_id = project_id.to_string();
        let merge_request_iid = merge_request_iid.to_string();
        let url = self.make_url(
            &["projects", project_id.as_str(), "merge_requests", merge_request_iid.as_str(), "notes"],
            &[],
        )?;
        let body = json!({ "body": body });
        let response = self.send(self.inner.post(url).json(&body)).await?;
        Ok(response.json().await?)
    }

    pub async fn set_commit_status(
        &self,
        project_id: u64,
        sha: &str,
        state: CommitState,
        context: &str,
    ) -> Result<CommitStatus> {
        let project_id = project_id.to_string();
        let url = self.make_url(&["projects", project_id.as_str(), "statuses", sha], &[])?;
        let body = json!({ "state": state, "context": context });
        let response = self.send(self.inner.post(url).json(&body)).await?;
        Ok(response.json().await?)
    }

    /// Fetch the page after `page`, if there is one.
    pub async fn next_page<T: DeserializeOwned>(&self, page: &Page<T>) -> Result<Option<Page<T>>> {
        match &page.links.next {
            Some(url) => Ok(Some(Page::from_response(self.get_url(url.clone()).await?).await?)),
            None => Ok(None),
        }
    }

    /// Collect the items of `first` and of every page after it.
    pub async fn get_all<T: DeserializeOwned>(&self, first: Page<T>) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = Some(first);
        while let Some(current) = page {
            page = self.next_page(&current).await?;
            items.extend(current.items);
        }
        Ok(items)
    }
}

/// Append `path_parts` as path segments to `base_url`, followed by `params` as the query string.
///
/// A part containing a slash is rejected rather than escaped.
fn endpoint_url(base_url: &Url, path_parts: &[&str], params: &[(&str, &str)]) -> Result<Url> {
    if let Some(part) = path_parts.iter().find(|p| p.contains('/')) {
        return Err(Error::UrlSlashError(part.to_string()));
    }

    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|()| Error::UrlBaseError(base_url.clone()))?
        .pop_if_empty()
        .extend(path_parts);
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

/// Work out how long to wait before retrying a rate-limited request.
///
/// GitLab sends `Retry-After` in seconds; failing that, `RateLimit-Reset` holds the epoch second
/// at which the window resets, which is compared against the response's `Date`.
fn rate_limit_wait(headers: &header::HeaderMap) -> Option<Duration> {
    if let Some(retry_after) = headers.get(header::RETRY_AFTER) {
        return atoi::atoi::<i64>(retry_after.as_bytes()).and_then(TimeDelta::try_seconds);
    }

    let date = headers.get(header::DATE)?.to_str().ok()?;
    let date = DateTime::parse_from_rfc2822(date).ok()?.with_timezone(&Utc);

    let reset_time = headers
        .get("ratelimit-reset")?
        .to_str()
        .ok()?
        .parse::<i64>()
        .ok()?;
    let reset_time = Utc.timestamp_opt(reset_time, 0).single()?;

    Some(reset_time - date)
}


impl Client {
    fn make_url(&self, path_parts: &[&str], params: &[(&str, &str)]) -> Result<Url> {
        endpoint_url(&self.base_url, path_parts, params)
    }

    async fn get(&self, path_parts: &[&str]) -> Result<reqwest::Response> {
        self.get_with_params(path_parts, &[]).await
    }

    async fn get_with_params(&self, path_parts: &[&str], params: &[(&str, &str)]) -> Result<reqwest::Response> {
        self.get_url(self.make_url(path_parts, params)?).await
    }

    async fn get_paginated_with_params<T: DeserializeOwned>(
        &self,
        path_parts: &[&str],
        params: &[(&str, &str)],
    ) -> Result<Page<T>> {
        Page::from_response(self.get_with_params(path_parts, params).await?).await
    }

    async fn get_url(&self, url: Url) -> Result<reqwest::Response> {
        self.send(self.inner.get(url)).await
    }

    async fn send(&self, request_builder: RequestBuilder) -> Result<reqwest::Response> {
        let request_builder = request_builder.header(header::ACCEPT, "application/json");
        let response = match &self.auth {
            Auth::PrivateToken(token) => request_builder.header("PRIVATE-TOKEN", token.expose_secret().as_str()),
            Auth::Unauthenticated => request_builder,
        }
        .send()
        .await?;
        debug!("{} {}", response.status().as_u16(), response.url());

        // GitLab signals rate limiting with HTTP 429, and the body is not necessarily JSON
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let wait = rate_limit_wait(response.headers());
            let message = response.text().await?;
            return Err(Error::RateLimited { message, wait });
        }

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(Error::RequestFailed {
                url: response.url().clone(),
                status,
            });
        }

        Ok(response)
    }
}
