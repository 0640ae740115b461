//! Leaderboard URL parsing and validation
//!
//! Accepts URLs of the form `https://www.speedrun.com/<abbrev>[/...]`, where
//! the abbreviation starts with at least one word character.

use std::fmt;

/// Site prefix every leaderboard URL must start with
pub const SITE_PREFIX: &str = "https://www.speedrun.com/";

/// A validated speedrun.com leaderboard URL
///
/// # Examples
///
/// ```
/// use srcom_dump::identifier::LeaderboardUrl;
///
/// let url = LeaderboardUrl::parse("https://www.speedrun.com/sms/full_game").unwrap();
/// assert_eq!(url.abbreviation(), "sms");
/// assert_eq!(url.as_str(), "https://www.speedrun.com/sms/full_game");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaderboardUrl {
    url: String,
    abbreviation: String,
}

impl LeaderboardUrl {
    /// Parse and validate a leaderboard URL
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not on speedrun.com, contains
    /// whitespace, or has no game abbreviation.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let invalid = || IdentifierError::InvalidUrl(s.to_string());

        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid());
        }

        let rest = s.strip_prefix(SITE_PREFIX).ok_or_else(invalid)?;

        if !rest.chars().next().is_some_and(is_word_char) {
            return Err(invalid());
        }

        let abbreviation = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            url: s.to_string(),
            abbreviation,
        })
    }

    /// Game abbreviation (first path segment)
    pub fn abbreviation(&self) -> &str {
        &self.abbreviation
    }

    /// The URL as given
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for LeaderboardUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Errors that can occur during URL validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// Not a speedrun.com leaderboard URL
    #[error("'{0}' is not a valid URL")]
    InvalidUrl(String),
}
