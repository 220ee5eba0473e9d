use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{FeedId, FeedQuote};
use crate::error::FetchError;

/// Source of decoded anchor feed quotes.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// One batched lookup. Every requested id is present in the returned map;
    /// ids the service did not report map to [`FeedQuote::missing`].
    async fn fetch_quotes(&self, ids: &[FeedId]) -> Result<HashMap<FeedId, FeedQuote>, FetchError>;
}

/// Client for the data-availability "anchor feeds with proof" endpoint.
#[derive(Clone)]
pub struct FdcClient {
    url: String,
    http: Client,
}

impl FdcClient {
    pub fn new(base_url: &str, anchor_feeds_path: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                anchor_feeds_path.trim_start_matches('/')
            ),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedSource for FdcClient {
    async fn fetch_quotes(&self, ids: &[FeedId]) -> Result<HashMap<FeedId, FeedQuote>, FetchError> {
        if ids.is_empty() {
            return Err(FetchError::EmptyRequest);
        }

        let resp = self
            .http
            .post(&self.url)
            .json(&AnchorFeedsRequest { feed_ids: ids })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let raw = resp.text().await?;
        let items: Vec<AnchorFeed> = serde_json::from_str(&raw)?;
        debug!(requested = ids.len(), returned = items.len(), "fdc.anchor_feeds");

        decode_quotes(ids, &items)
    }
}

#[derive(Debug, Serialize)]
struct AnchorFeedsRequest<'a> {
    feed_ids: &'a [FeedId],
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnchorFeed {
    pub body: AnchorFeedBody,

    /// Merkle proof of the value. Carried through, never verified here.
    #[serde(default)]
    pub proof: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnchorFeedBody {
    pub id: FeedId,
    pub value: i128,
    pub decimals: i32,

    #[serde(rename = "votingRoundId", default)]
    pub voting_round_id: Option<u64>,

    #[serde(rename = "turnoutBIPS", default)]
    pub turnout_bips: Option<u32>,
}

/// Maps response items onto the requested ids.
///
/// The first item for an id wins; items for ids that were not requested are ignored.
pub fn decode_quotes(
    ids: &[FeedId],
    items: &[AnchorFeed],
) -> Result<HashMap<FeedId, FeedQuote>, FetchError> {
    let mut out = HashMap::with_capacity(ids.len());
    for id in ids {
        let quote = match items.iter().find(|item| &item.body.id == id) {
            Some(item) => {
                debug!(
                    feed = %id,
                    value = %item.body.value,
                    decimals = item.body.decimals,
                    voting_round = ?item.body.voting_round_id,
                    "fdc.feed"
                );
                FeedQuote::from_raw(id.clone(), item.body.value, item.body.decimals)?
            }
            None => FeedQuote::missing(id.clone()),
        };
        out.insert(id.clone(), quote);
    }
    Ok(out)
}
