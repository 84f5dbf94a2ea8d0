use serde::{Deserialize, Serialize};

/// Input document submitted to the scraping actor.
///
/// The instagram-scraper actor accepts a batch of usernames; we always send
/// exactly one.
#[derive(Debug, Clone, Serialize)]
pub struct ActorInput {
    pub usernames: Vec<String>,
}

impl ActorInput {
    pub fn single(username: &str) -> Self {
        ActorInput {
            usernames: vec![username.to_string()],
        }
    }
}

/// Lifecycle states of an actor run, as reported by the Apify API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RunStatus {
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCEEDED")]
    Succeeded,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "TIMING-OUT")]
    TimingOut,
    #[serde(rename = "TIMED-OUT")]
    TimedOut,
    #[serde(rename = "ABORTING")]
    Aborting,
    #[serde(rename = "ABORTED")]
    Aborted,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::TimedOut | RunStatus::Aborted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Ready => "READY",
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
            RunStatus::TimingOut => "TIMING-OUT",
            RunStatus::TimedOut => "TIMED-OUT",
            RunStatus::Aborting => "ABORTING",
            RunStatus::Aborted => "ABORTED",
            RunStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Metadata for one execution of a remote actor.
///
/// Only the fields the lookup needs; the API returns many more.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRun {
    pub id: String,
    pub status: RunStatus,
    pub default_dataset_id: String,
}
