//! Ticker universe parsing.

use std::collections::HashSet;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Splits a comma separated ticker list, upper-casing each entry.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tickers_basic() {
        let result = parse_tickers("NVDA,GOOGL,AMZN,AAPL").unwrap();
        assert_eq!(result, vec!["NVDA", "GOOGL", "AMZN", "AAPL"]);
    }

    #[test]
    fn parse_tickers_with_whitespace() {
        let result = parse_tickers("  TSLA , PYPL ,META").unwrap();
        assert_eq!(result, vec!["TSLA", "PYPL", "META"]);
    }

    #[test]
    fn parse_tickers_uppercase() {
        let result = parse_tickers("nvda,meta").unwrap();
        assert_eq!(result, vec!["NVDA", "META"]);
    }

    #[test]
    fn parse_tickers_empty_token() {
        let result = parse_tickers("NVDA,,META");
        assert!(matches!(result, Err(UniverseError::EmptyToken)));
    }

    #[test]
    fn parse_tickers_duplicate() {
        let result = parse_tickers("NVDA,META,nvda");
        assert!(matches!(result, Err(UniverseError::DuplicateTicker(s)) if s == "NVDA"));
    }
}
