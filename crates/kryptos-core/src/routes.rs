//! Intent routing for the fast path

use crate::slots::SlotTemplate;

/// One intent mapped to a single agent operation, with the slot template the
/// resolver fills at dispatch time
#[derive(Debug, Clone)]
pub struct Route {
    /// Intent label this route serves, matched case-insensitively
    pub intent: String,
    /// Target agent name
    pub agent: String,
    /// Canonical operation on that agent
    pub operation: String,
    /// Parameter slots and their candidate names
    pub slots: SlotTemplate,
}

/// Immutable intent lookup table, built once from configuration
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Build a table from configured routes.
    #[must_use]
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The single route serving `intent`.
    ///
    /// Returns `None` when the intent is unknown or matches more than one
    /// route; an ambiguous intent takes the complex path instead.
    #[must_use]
    pub fn unique_match(&self, intent: &str) -> Option<&Route> {
        let mut found = None;
        for route in &self.routes {
            if route.intent.eq_ignore_ascii_case(intent) {
                if found.is_some() {
                    return None;
                }
                found = Some(route);
            }
        }
        found
    }

    /// Number of configured routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no routes are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(intent: &str, agent: &str, operation: &str) -> Route {
        Route {
            intent: intent.to_string(),
            agent: agent.to_string(),
            operation: operation.to_string(),
            slots: SlotTemplate::new(),
        }
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let table = RouteTable::new(vec![route("encryption", "crypto_executor", "aes_encrypt")]);
        let found = table.unique_match("Encryption").unwrap();
        assert_eq!(found.agent, "crypto_executor");
        assert_eq!(found.operation, "aes_encrypt");
    }

    #[test]
    fn test_unknown_intent() {
        let table = RouteTable::new(vec![route("primality", "prime_checker", "isprime")]);
        assert!(table.unique_match("encryption").is_none());
    }

    #[test]
    fn test_ambiguous_intent_matches_nothing() {
        let table = RouteTable::new(vec![
            route("encryption", "crypto_executor", "aes_encrypt"),
            route("encryption", "crypto_executor", "rsa_encrypt"),
        ]);
        assert!(table.unique_match("encryption").is_none());
    }

    #[test]
    fn test_empty_table() {
        let table = RouteTable::default();
        assert!(table.is_empty());
        assert!(table.unique_match("anything").is_none());
    }
}
