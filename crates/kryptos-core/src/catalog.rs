//! Agent operation catalog
//!
//! The allow-list of agents the platform knows, the operations each accepts,
//! and the alias spellings planners tend to produce instead of the canonical
//! names. Plans are validated against this catalog before anything runs.

use std::collections::BTreeMap;

/// How an operation reaches its agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRoute {
    /// URL path under the agent's base URL
    pub path: String,
    /// Post `{"operation": .., "params": ..}` instead of the bare params
    pub envelope: bool,
}

impl OperationRoute {
    /// Route posting the params object directly
    #[must_use]
    pub fn plain(path: &str) -> Self {
        Self {
            path: path.to_string(),
            envelope: false,
        }
    }

    /// Route posting an `{operation, params}` envelope
    #[must_use]
    pub fn enveloped(path: &str) -> Self {
        Self {
            path: path.to_string(),
            envelope: true,
        }
    }
}

/// Immutable agent/operation allow-list with alias normalization
#[derive(Debug, Clone)]
pub struct Catalog {
    operations: BTreeMap<String, BTreeMap<String, OperationRoute>>,
    aliases: BTreeMap<String, BTreeMap<String, String>>,
}

impl Catalog {
    /// Catalog with no agents registered
    #[must_use]
    pub fn empty() -> Self {
        Self {
            operations: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }

    /// Register an agent and its operations, replacing any existing entry.
    pub fn add_agent(&mut self, name: &str, operations: Vec<(&str, OperationRoute)>) {
        let ops = operations
            .into_iter()
            .map(|(op, route)| (op.to_lowercase(), route))
            .collect();
        self.operations.insert(name.to_lowercase(), ops);
    }

    /// Register an alias spelling for one of an agent's operations.
    pub fn add_alias(&mut self, agent: &str, alias: &str, canonical: &str) {
        self.aliases
            .entry(agent.to_lowercase())
            .or_default()
            .insert(alias.to_lowercase(), canonical.to_lowercase());
    }

    /// Map an operation name onto its canonical spelling for `agent`.
    ///
    /// Unknown names pass through unchanged so the caller can report them.
    #[must_use]
    pub fn normalize_operation(&self, agent: &str, operation: &str) -> String {
        let agent = agent.trim().to_lowercase();
        let operation = operation.trim().to_lowercase();
        if operation.is_empty() {
            return operation;
        }
        if let Some(mapped) = self.aliases.get(&agent).and_then(|a| a.get(&operation)) {
            return mapped.clone();
        }
        operation
    }

    /// True when `agent` accepts the canonical `operation`
    #[must_use]
    pub fn supports(&self, agent: &str, operation: &str) -> bool {
        self.route(agent, operation).is_some()
    }

    /// The wire route for `agent`/`operation`, if registered
    #[must_use]
    pub fn route(&self, agent: &str, operation: &str) -> Option<&OperationRoute> {
        self.operations
            .get(&agent.trim().to_lowercase())?
            .get(&operation.trim().to_lowercase())
    }

    /// Registered agent names, sorted
    #[must_use]
    pub fn agent_names(&self) -> Vec<&str> {
        self.operations.keys().map(String::as_str).collect()
    }

    /// Canonical operations of `agent`, sorted
    #[must_use]
    pub fn operations_for(&self, agent: &str) -> Vec<&str> {
        self.operations
            .get(&agent.trim().to_lowercase())
            .map(|ops| ops.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let mut catalog = Self::empty();

        catalog.add_agent("password_checker", vec![("score", OperationRoute::plain("/score"))]);
        for alias in [
            "evaluate_strength",
            "password_strength",
            "check_password",
            "strength",
            "score_password",
        ] {
            catalog.add_alias("password_checker", alias, "score");
        }

        let crypto_ops = [
            "base64_encode",
            "base64_decode",
            "hex_encode",
            "hex_decode",
            "hash",
            "hmac",
            "random_bytes",
            "random_hex",
            "aes_keygen",
            "aes_encrypt",
            "aes_decrypt",
            "rsa_keygen",
            "rsa_pubkey",
            "rsa_sign",
            "rsa_verify",
            "rsa_encrypt",
            "rsa_decrypt",
        ];
        catalog.add_agent(
            "crypto_executor",
            crypto_ops
                .iter()
                .map(|op| (*op, OperationRoute::enveloped("/execute")))
                .collect(),
        );
        for (alias, canonical) in [
            ("encrypt", "aes_encrypt"),
            ("decrypt", "aes_decrypt"),
            ("sign", "rsa_sign"),
            ("verify", "rsa_verify"),
            ("digest", "hash"),
            ("keygen", "aes_keygen"),
        ] {
            catalog.add_alias("crypto_executor", alias, canonical);
        }

        catalog.add_agent("prime_checker", vec![("isprime", OperationRoute::plain("/isprime"))]);
        for alias in ["primality_test", "factor", "factorization"] {
            catalog.add_alias("prime_checker", alias, "isprime");
        }

        catalog.add_agent(
            "theory_specialist",
            vec![("generate", OperationRoute::plain("/generate"))],
        );
        for alias in ["ask", "query", "answer"] {
            catalog.add_alias("theory_specialist", alias, "generate");
        }

        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_operation() {
        let catalog = Catalog::default();
        assert_eq!(
            catalog.normalize_operation("password_checker", "evaluate_strength"),
            "score"
        );
        assert_eq!(
            catalog.normalize_operation("prime_checker", "primality_test"),
            "isprime"
        );
        assert_eq!(
            catalog.normalize_operation("crypto_executor", "  Encrypt  "),
            "aes_encrypt"
        );
        // Unknown agents pass the operation through untouched.
        assert_eq!(catalog.normalize_operation("unknown", "score"), "score");
    }

    #[test]
    fn test_supports_canonical_names_only() {
        let catalog = Catalog::default();
        assert!(catalog.supports("password_checker", "score"));
        assert!(!catalog.supports("password_checker", "evaluate_strength"));
        assert!(!catalog.supports("unknown", "score"));
    }

    #[test]
    fn test_routes() {
        let catalog = Catalog::default();

        let score = catalog.route("password_checker", "score").unwrap();
        assert_eq!(score.path, "/score");
        assert!(!score.envelope);

        let encrypt = catalog.route("crypto_executor", "aes_encrypt").unwrap();
        assert_eq!(encrypt.path, "/execute");
        assert!(encrypt.envelope);
    }

    #[test]
    fn test_listings_sorted() {
        let catalog = Catalog::default();
        assert_eq!(
            catalog.agent_names(),
            vec![
                "crypto_executor",
                "password_checker",
                "prime_checker",
                "theory_specialist"
            ]
        );
        assert_eq!(catalog.operations_for("prime_checker"), vec!["isprime"]);
        assert!(catalog.operations_for("nobody").is_empty());
    }
}
