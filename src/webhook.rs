//! GitLab webhook payloads, and deciding which of them the bot acts on.
//!
//! Only the fields the bot needs are modeled; everything else in a payload is ignored.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::defaults::BOT_NAME;

// -------------------------------------------------------------------------------------------------
// WebhookEvent
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// `merge_request`, `note`, `push`, ...
    pub object_kind: String,

    pub project: Option<Project>,

    /// Present on note events for comments on merge requests
    pub merge_request: Option<MergeRequestRef>,

    #[serde(default)]
    pub object_attributes: ObjectAttributes,
}

#[derive(Debug, Deserialize)]
pub struct Project {
    pub id: u64,
    pub web_url: String,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequestRef {
    pub iid: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectAttributes {
    /// The merge request's IID, on merge request events
    pub iid: Option<u64>,

    /// What was commented on, on note events
    pub noteable_type: Option<String>,

    /// The comment text, on note events
    pub note: Option<String>,
}

/// The merge request an event is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestTarget {
    pub project_id: u64,
    pub merge_request_iid: u64,
    pub project_url: String,
}

impl MergeRequestTarget {
    pub fn merge_request_url(&self) -> String {
        format!("{}/merge_requests/{}", self.project_url, self.merge_request_iid)
    }
}

impl WebhookEvent {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn is_note(&self) -> bool {
        self.object_kind == "note"
    }

    /// Is this an event the bot should act on at all?
    ///
    /// That is the case for merge request events, and for comments on merge requests.
    pub fn is_actionable(&self) -> bool {
        match self.object_kind.as_str() {
            "merge_request" => true,
            "note" => self.object_attributes.noteable_type.as_deref() == Some("MergeRequest"),
            _ => false,
        }
    }

    pub fn note(&self) -> Option<&str> {
        self.object_attributes.note.as_deref()
    }

    /// Work out which merge request this event is about.
    pub fn target(&self) -> Result<MergeRequestTarget, Error> {
        let project = self.project.as_ref().ok_or(Error::MissingField("project"))?;
        let merge_request_iid = if self.is_note() {
            self.merge_request
                .as_ref()
                .map(|mr| mr.iid)
                .ok_or(Error::MissingField("merge_request.iid"))?
        } else {
            self.object_attributes
                .iid
                .ok_or(Error::MissingField("object_attributes.iid"))?
        };
        Ok(MergeRequestTarget {
            project_id: project.id,
            merge_request_iid,
            project_url: project.web_url.trim_end_matches('/').to_string(),
        })
    }
}

lazy_static! {
    static ref SUMMON_PATTERN: Regex =
        Regex::new(&format!(r"@{}(\[bot\])?\s*check", regex::escape(BOT_NAME)))
            .expect("summon regex should compile");
}

/// Does the given comment ask the bot to check the merge request again?
pub fn summons_bot(note: &str) -> bool {
    SUMMON_PATTERN.is_match(note)
}

// -------------------------------------------------------------------------------------------------
// Error
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    MissingField(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MissingField(name) => write!(f, "webhook payload has no {name} field"),
        }
    }
}

impl std::error::Error for Error {}
