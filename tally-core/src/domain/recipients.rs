//! Recipient list parsing

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Destination addresses for one run
///
/// Order and duplicates from the input are preserved. Use
/// [`Recipients::distinct`] to get the addresses that should each receive
/// exactly one copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipients(Vec<String>);

impl Recipients {
    /// Parses a comma-separated address list
    ///
    /// Each token is trimmed. An empty token or a token that is not a plain
    /// `local@domain` address rejects the whole list.
    pub fn parse(input: &str) -> Result<Self> {
        let mut addresses = Vec::new();

        for (idx, token) in input.split(',').enumerate() {
            let address = token.trim();
            if address.is_empty() {
                return Err(PipelineError::InvalidRecipients(format!(
                    "entry {} in '{}' is empty",
                    idx + 1,
                    input
                )));
            }
            if !looks_like_address(address) {
                return Err(PipelineError::InvalidRecipients(format!(
                    "'{}' is not a valid address",
                    address
                )));
            }
            addresses.push(address.to_string());
        }

        Ok(Self(addresses))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Addresses with later duplicates removed, first-seen order kept
    ///
    /// Comparison ignores ASCII case, since mail domains are case-insensitive
    /// and most servers treat local parts the same way.
    pub fn distinct(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.0
            .iter()
            .filter(|address| seen.insert(address.to_ascii_lowercase()))
            .map(String::as_str)
            .collect()
    }
}

impl std::fmt::Display for Recipients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

fn looks_like_address(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !address.chars().any(|c| c.is_whitespace() || c == ',')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let recipients = Recipients::parse(" a@example.com ,b@example.com,\tc@example.org ").unwrap();
        assert_eq!(
            recipients.as_slice(),
            &["a@example.com", "b@example.com", "c@example.org"]
        );
    }

    #[test]
    fn test_parse_rejects_empty_entry() {
        let err = Recipients::parse("a@example.com, ,b@example.com").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRecipients(_)));

        assert!(Recipients::parse("").is_err());
        assert!(Recipients::parse("a@example.com,").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_address() {
        assert!(Recipients::parse("not-an-address").is_err());
        assert!(Recipients::parse("a@@example.com").is_err());
        assert!(Recipients::parse("@example.com").is_err());
    }

    #[test]
    fn test_duplicates_kept_but_distinct_collapses() {
        let recipients =
            Recipients::parse("a@example.com, b@example.com, A@example.com").unwrap();
        assert_eq!(recipients.len(), 3);
        assert_eq!(recipients.distinct(), vec!["a@example.com", "b@example.com"]);
    }

    fn arb_address() -> impl Strategy<Value = String> {
        ("[a-z0-9._]{1,12}", "[a-z0-9]{1,10}\\.[a-z]{2,4}")
            .prop_map(|(local, domain)| format!("{}@{}", local, domain))
    }

    proptest! {
        #[test]
        fn prop_parse_matches_split_and_trim(
            parts in prop::collection::vec((arb_address(), "[ \t]{0,3}", "[ \t]{0,3}"), 1..8)
        ) {
            let input = parts
                .iter()
                .map(|(address, before, after)| format!("{}{}{}", before, address, after))
                .collect::<Vec<_>>()
                .join(",");

            let parsed = Recipients::parse(&input).unwrap();
            let expected: Vec<String> = input.split(',').map(|s| s.trim().to_string()).collect();

            prop_assert_eq!(parsed.len(), parts.len());
            prop_assert_eq!(parsed.as_slice(), expected.as_slice());
        }
    }
}
