//! Per-shard traversal state machine
//!
//! A shard is walked ascending by submission date until one of:
//!
//! - a record id repeats (the cursor wrapped; the shard is done),
//! - a short page comes back (`max > size`),
//! - there is no `next` link,
//! - the `next` link reaches the offset ceiling.
//!
//! At the ceiling the walk restarts from the newest run going backwards,
//! keeping the ids already seen, so the backward walk ends as soon as it
//! meets runs captured going forward. Hitting the ceiling a second time
//! means more runs sit between the two walks than either can reach, and the
//! shard is abandoned with what it has.
//!
//! Any repeated id ends the shard, including a genuine upstream duplicate
//! that has nothing to do with the cursor wrapping.

use reqwest::Url;
use std::collections::HashSet;
use tracing::debug;

use super::config::{FetchConfig, ORDER_BY};
use super::page::{link_offset, Page};
use super::{FetcherError, FetcherResult, Partition};
use crate::{record_id, Record};

/// Sort direction of a walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Oldest first
    Ascending,
    /// Newest first
    Descending,
}

impl Direction {
    /// Query-string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        }
    }
}

/// How a shard walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardStatus {
    /// Short page or no `next` link
    Exhausted,
    /// A record id was seen twice
    LoopDetected,
    /// Offset ceiling hit in both directions; the result is partial
    Abandoned,
}

impl ShardStatus {
    /// Whether every reachable record was collected
    pub fn is_complete(&self) -> bool {
        !matches!(self, ShardStatus::Abandoned)
    }
}

/// What to do after absorbing a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Request `next_url` next
    Continue,
    /// Stop walking the shard
    Done(ShardStatus),
}

/// First-page URL of `partition` walked in `direction`
///
/// # Errors
/// [`FetcherError::InvalidUrl`] if the configured API base is not a URL
pub fn shard_url(
    config: &FetchConfig,
    partition: &Partition,
    direction: Direction,
) -> FetcherResult<String> {
    let base = format!("{}/runs", config.api_base);
    let page_size = config.page_size.to_string();
    let url = Url::parse_with_params(
        &base,
        &[
            ("category", partition.category_id.as_str()),
            ("status", partition.status.as_str()),
            ("orderby", ORDER_BY),
            ("direction", direction.as_str()),
            ("max", page_size.as_str()),
        ],
    )
    .map_err(|e| FetcherError::InvalidUrl(format!("{base}: {e}")))?;
    Ok(url.into())
}

/// Mutable state of one shard walk
#[derive(Debug)]
pub struct TraversalState {
    /// URL to request next
    pub next_url: String,
    /// Current walk direction
    pub direction: Direction,
    /// Ids seen in either direction; only ever grows
    pub seen_ids: HashSet<String>,
    /// Collected records in first-seen order
    pub records: Vec<Record>,
    descending_url: String,
    offset_ceiling: u64,
    pages: usize,
}

impl TraversalState {
    /// Fresh state positioned at the first ascending page of `partition`
    ///
    /// # Errors
    /// [`FetcherError::InvalidUrl`] if the configured API base is not a URL
    pub fn new(config: &FetchConfig, partition: &Partition) -> FetcherResult<Self> {
        Ok(Self {
            next_url: shard_url(config, partition, Direction::Ascending)?,
            direction: Direction::Ascending,
            seen_ids: HashSet::new(),
            records: Vec::new(),
            descending_url: shard_url(config, partition, Direction::Descending)?,
            offset_ceiling: config.offset_ceiling,
            pages: 0,
        })
    }

    /// Pages absorbed so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Fold one page into the state and decide what happens next
    ///
    /// # Errors
    /// [`FetcherError::InvalidResponse`] if a record has no id
    pub fn absorb(&mut self, page: Page) -> FetcherResult<Step> {
        self.pages += 1;
        let is_last = page.is_last();
        let next = page.next_link().map(str::to_string);

        for record in page.records {
            let id = record_id(&record).ok_or_else(|| {
                FetcherError::InvalidResponse(format!(
                    "record without an id on page {} of {}",
                    self.pages, self.next_url
                ))
            })?;

            if !self.seen_ids.insert(id.clone()) {
                debug!(
                    id = %id,
                    page = self.pages,
                    direction = self.direction.as_str(),
                    "Repeated run id, ending shard"
                );
                return Ok(Step::Done(ShardStatus::LoopDetected));
            }
            self.records.push(record);
        }

        if is_last {
            return Ok(Step::Done(ShardStatus::Exhausted));
        }

        let Some(next) = next else {
            return Ok(Step::Done(ShardStatus::Exhausted));
        };

        let at_ceiling = link_offset(&next).is_some_and(|offset| offset >= self.offset_ceiling);
        if !at_ceiling {
            self.next_url = next;
            return Ok(Step::Continue);
        }

        match self.direction {
            Direction::Ascending => {
                debug!(
                    page = self.pages,
                    collected = self.records.len(),
                    "Offset ceiling reached, walking backwards"
                );
                self.direction = Direction::Descending;
                self.next_url = self.descending_url.clone();
                Ok(Step::Continue)
            }
            Direction::Descending => Ok(Step::Done(ShardStatus::Abandoned)),
        }
    }
}
