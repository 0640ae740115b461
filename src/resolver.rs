//! Leaderboard resolution
//!
//! Turns a validated leaderboard URL into the game id and category ids the
//! fetcher shards over. Two single-shot requests go through the dispatcher
//! (so they count against the rate budget) but are never retried: a non-2xx
//! answer, or a game/category list with nothing usable in it, fails
//! immediately.

use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use crate::dispatcher::{DispatchError, Dispatcher, TransportError};
use crate::fetcher::Partition;
use crate::identifier::LeaderboardUrl;
use crate::RunStatus;

/// Errors raised while resolving a leaderboard
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Upstream answered with a non-success status
    #[error("request to {url} failed with HTTP status {status}")]
    Http {
        /// Requested URL
        url: String,
        /// Status received
        status: u16,
    },

    /// Request never produced a status
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL
        url: String,
        /// Underlying failure
        #[source]
        source: TransportError,
    },

    /// Response body could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// No game matched the URL
    #[error("can't find the game for {0}")]
    GameNotFound(String),

    /// The game has no categories
    #[error("can't find the categories for game ID {0}")]
    NoCategories(String),

    /// Dispatch was interrupted
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// A resolved leaderboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaderboard {
    /// Game id
    pub game_id: String,
    /// Category ids, in upstream order
    pub category_ids: Vec<String>,
}

impl Leaderboard {
    /// Every `(category, status)` shard, category-major
    pub fn partitions(&self, statuses: &[RunStatus]) -> Vec<Partition> {
        self.category_ids
            .iter()
            .flat_map(|category| {
                statuses
                    .iter()
                    .map(move |status| Partition::new(category.clone(), *status))
            })
            .collect()
    }
}

impl std::fmt::Display for Leaderboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Leaderboard(game_id={}, category_ids=[{}])",
            self.game_id,
            self.category_ids.join(", ")
        )
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Game {
    id: String,
    weblink: String,
}

#[derive(Debug, Deserialize)]
struct Category {
    id: String,
}

/// Resolves leaderboard URLs through a [`Dispatcher`]
#[derive(Debug, Clone)]
pub struct LeaderboardResolver {
    dispatcher: Dispatcher,
    api_base: String,
}

impl LeaderboardResolver {
    /// Create a resolver against `api_base` (e.g. `https://www.speedrun.com/api/v1`)
    pub fn new(dispatcher: Dispatcher, api_base: impl Into<String>) -> Self {
        Self {
            dispatcher,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Look up the game behind `url` and its categories
    ///
    /// # Errors
    /// Any non-success response, an unmatched game, or an empty category list
    pub async fn resolve(&self, url: &LeaderboardUrl) -> Result<Leaderboard, ResolveError> {
        let games_url = Url::parse_with_params(
            &format!("{}/games", self.api_base),
            &[("name", url.abbreviation())],
        )
        .map_err(|e| ResolveError::ParseError(format!("invalid API base: {e}")))?;

        let games: Envelope<Game> = self.get_json(games_url.as_str()).await?;
        let game_id = games
            .data
            .into_iter()
            .find(|game| url.as_str().starts_with(&game.weblink))
            .map(|game| game.id)
            .ok_or_else(|| ResolveError::GameNotFound(url.to_string()))?;
        debug!(game_id = %game_id, "Resolved game");

        let categories_url = format!("{}/games/{}/categories", self.api_base, game_id);
        let categories: Envelope<Category> = self.get_json(&categories_url).await?;
        let category_ids: Vec<String> = categories.data.into_iter().map(|c| c.id).collect();

        if category_ids.is_empty() {
            return Err(ResolveError::NoCategories(game_id));
        }

        let leaderboard = Leaderboard {
            game_id,
            category_ids,
        };
        info!("Resolved {}", leaderboard);
        Ok(leaderboard)
    }

    async fn get_json<T>(&self, url: &str) -> Result<T, ResolveError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .dispatcher
            .fetch(url)
            .await?
            .map_err(|source| ResolveError::Transport {
                url: url.to_string(),
                source,
            })?;

        if !response.is_success() {
            return Err(ResolveError::Http {
                url: url.to_string(),
                status: response.status,
            });
        }

        serde_json::from_slice(&response.body)
            .map_err(|e| ResolveError::ParseError(format!("{url}: {e}")))
    }
}
