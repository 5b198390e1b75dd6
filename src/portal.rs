//! Read-only client for the HackPortal informational endpoints.
//!
//! The About and FAQ pages render straight from these responses; the only
//! processing is ordering the organizing team by rank.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::constants::{FAQ_PATH, HTTP_REQUEST_TIMEOUT, MEMBERS_PATH};

/// A member of the organizing team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    /// Display name.
    pub name: String,
    /// Role or short bio.
    #[serde(default)]
    pub description: String,
    /// Display order; lower ranks first.
    #[serde(default)]
    pub rank: i64,
    /// LinkedIn profile URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    /// GitHub profile URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    /// Personal website URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_site: Option<String>,
    /// Headshot file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// A question with a published answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    /// The question as asked.
    pub question: String,
    /// The organizers' answer.
    pub answer: String,
}

/// HTTP client for the portal's public API.
#[derive(Debug, Clone)]
pub struct PortalClient {
    client: reqwest::Client,
    site_url: String,
}

impl PortalClient {
    /// Creates a client for `site_url`.
    pub fn new(client: reqwest::Client, site_url: &str) -> Self {
        Self {
            client,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Creates a client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client, &config.site_url))
    }

    /// Organizing team, ordered by ascending rank.
    pub async fn members(&self) -> Result<Vec<TeamMember>> {
        let mut members: Vec<TeamMember> = self.get(MEMBERS_PATH).await?;
        members.sort_by_key(|m| m.rank);
        Ok(members)
    }

    /// Answered FAQ entries, in backend order.
    pub async fn faqs(&self) -> Result<Vec<AnsweredQuestion>> {
        self.get(FAQ_PATH).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.site_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }
        response
            .json()
            .await
            .with_context(|| format!("Invalid response from {url}"))
    }
}

/// "Hosted by" line for an event spotlight card.
///
/// Returns `None` for zero speakers and for more than three, which the
/// card leaves blank.
pub fn hosted_by(speakers: &[String]) -> Option<String> {
    match speakers {
        [one] => Some(format!("Hosted by {one}")),
        [one, two] => Some(format!("Hosted by {one} & {two}")),
        [one, two, three] => Some(format!("Hosted by {one}, {two}, and {three}")),
        _ => None,
    }
}
