//! Join links
//!
//! A join link looks like `ludo://join?game=127.0.0.1:7878`. The `game` query
//! parameter is the host endpoint. A bare `host:port` is accepted as well.

use crate::error::JoinLinkError;
use std::fmt;

pub const SCHEME: &str = "ludo://join";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLink {
    pub host: String,
}

impl JoinLink {
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            host: endpoint.into(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, JoinLinkError> {
        let input = input.trim();

        let Some((_, query)) = input.split_once('?') else {
            if input.contains("://") {
                return Err(JoinLinkError::MissingGame);
            }
            return endpoint(input);
        };

        let game = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "game")
            .map(|(_, value)| value)
            .ok_or(JoinLinkError::MissingGame)?;

        endpoint(game)
    }
}

fn endpoint(value: &str) -> Result<JoinLink, JoinLinkError> {
    let value = value.trim();
    if value.is_empty() {
        Err(JoinLinkError::EmptyEndpoint)
    } else {
        Ok(JoinLink::for_endpoint(value))
    }
}

impl fmt::Display for JoinLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?game={}", SCHEME, self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_link() {
        let link = JoinLink::parse("ludo://join?game=127.0.0.1:7878").unwrap();
        assert_eq!(link.host, "127.0.0.1:7878");
    }

    #[test]
    fn test_parse_link_with_extra_parameters() {
        let link = JoinLink::parse("ludo://join?lang=en&game=10.0.0.2:9000").unwrap();
        assert_eq!(link.host, "10.0.0.2:9000");
    }

    #[test]
    fn test_parse_bare_endpoint() {
        let link = JoinLink::parse(" localhost:7878 ").unwrap();
        assert_eq!(link.host, "localhost:7878");
    }

    #[test]
    fn test_parse_rejects_missing_or_empty_game() {
        assert_eq!(
            JoinLink::parse("ludo://join?lang=en"),
            Err(JoinLinkError::MissingGame)
        );
        assert_eq!(JoinLink::parse("ludo://join"), Err(JoinLinkError::MissingGame));
        assert_eq!(
            JoinLink::parse("ludo://join?game="),
            Err(JoinLinkError::EmptyEndpoint)
        );
        assert_eq!(JoinLink::parse(""), Err(JoinLinkError::EmptyEndpoint));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let link = JoinLink::for_endpoint("127.0.0.1:40000");
        assert_eq!(link.to_string(), "ludo://join?game=127.0.0.1:40000");
        assert_eq!(JoinLink::parse(&link.to_string()).unwrap(), link);
    }
}
