use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::types::{ActorInput, ActorRun, RunStatus};

pub const DEFAULT_BASE_URL: &str = "https://api.apify.com";

/// Seconds the API holds a request open waiting for the run to finish.
/// Apify caps this parameter at 60 per request; longer waits poll.
const WAIT_FOR_FINISH_SECS: u64 = 60;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The narrow two-operation contract this program needs from a remote
/// scraping-job provider. Everything behind it (queueing, billing, the
/// scraper itself) is opaque.
pub trait ScrapeProvider {
    /// Starts the named actor with the given input and blocks until the run
    /// reaches a terminal state. `Ok(None)` means the provider accepted the
    /// call but returned no run metadata.
    fn call_actor(&self, actor_id: &str, input: &ActorInput) -> Result<Option<ActorRun>>;

    /// Lists all items in a run's result set.
    fn list_dataset_items(&self, dataset_id: &str) -> Result<Vec<Value>>;
}

/// All Apify responses wrap their payload in a `data` envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

pub struct ApifyClient {
    http: Client,
    base_url: String,
    token: String,
    /// Overall cap on waiting for a run to finish.
    run_timeout: Duration,
    verbose: bool,
}

impl ApifyClient {
    pub fn new(token: String, run_timeout: Duration, verbose: bool) -> Self {
        let base_url = std::env::var("APIFY_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        ApifyClient {
            http: Client::new(),
            base_url,
            token,
            run_timeout,
            verbose,
        }
    }

    fn get_run(&self, run_id: &str) -> Result<Option<ActorRun>> {
        let url = format!(
            "{}/v2/actor-runs/{}?waitForFinish={}",
            self.base_url, run_id, WAIT_FOR_FINISH_SECS
        );
        let envelope: Envelope<ActorRun> = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .context("poll actor run")?
            .error_for_status()
            .context("poll actor run")?
            .json()
            .context("decode actor run")?;
        Ok(envelope.data)
    }
}

impl ScrapeProvider for ApifyClient {
    fn call_actor(&self, actor_id: &str, input: &ActorInput) -> Result<Option<ActorRun>> {
        let url = format!(
            "{}/v2/acts/{}/runs?waitForFinish={}",
            self.base_url, actor_id, WAIT_FOR_FINISH_SECS
        );
        let envelope: Envelope<ActorRun> = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .context("start actor run")?
            .error_for_status()
            .context("start actor run")?
            .json()
            .context("decode actor run")?;

        let Some(mut run) = envelope.data else {
            return Ok(None);
        };
        if self.verbose {
            eprintln!("Started run {} ({})", run.id, run.status.as_str());
        }

        let deadline = Instant::now() + self.run_timeout;
        while !run.status.is_terminal() {
            if Instant::now() >= deadline {
                bail!(
                    "actor run {} did not finish within {} seconds",
                    run.id,
                    self.run_timeout.as_secs()
                );
            }
            thread::sleep(POLL_INTERVAL);
            match self.get_run(&run.id)? {
                Some(latest) => run = latest,
                None => return Ok(None),
            }
            if self.verbose {
                eprintln!("Run {} is {}", run.id, run.status.as_str());
            }
        }

        if run.status != RunStatus::Succeeded {
            bail!(
                "actor run {} finished with status {}",
                run.id,
                run.status.as_str()
            );
        }
        Ok(Some(run))
    }

    fn list_dataset_items(&self, dataset_id: &str) -> Result<Vec<Value>> {
        let url = format!("{}/v2/datasets/{}/items?clean=true", self.base_url, dataset_id);
        let items: Vec<Value> = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .context("fetch dataset items")?
            .error_for_status()
            .context("fetch dataset items")?
            .json()
            .context("decode dataset items")?;
        Ok(items)
    }
}
