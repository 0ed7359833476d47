//! Deterministic signal extraction from raw text
//!
//! The analyzer is pure pattern matching, no I/O and no error path. It spots
//! the domain hints the classifier routinely misses: algorithm names
//! (including key-size variants like "aes-256"), hex and base64 literals,
//! bare integers, and IPv4 addresses.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Strongest extracted value per signal kind
pub type SignalMap = BTreeMap<String, String>;

/// Known algorithm names, hyphenated variants ahead of their bases so the
/// scanner prefers the longer, more specific form.
const ALGORITHMS: &[&str] = &[
    "aes-128", "aes-192", "aes-256", "aes", "rsa", "3des", "des", "blowfish", "twofish",
    "chacha20", "sha-1", "sha-256", "sha-512", "sha1", "sha256", "sha512", "md5", "bcrypt",
    "scrypt", "argon2", "pbkdf2", "base64", "hex", "hmac", "ecdsa", "ed25519",
];

static ALGORITHM_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)\b(?:{})\b", ALGORITHMS.join("|"));
    Regex::new(&pattern).expect("valid algorithm regex")
});

// Hex runs must pair up: an odd-length run is noise, not data.
static HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:0x)?(?:[0-9a-fA-F]{2}){4,}\b").expect("valid hex regex"));

static BASE64_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9+/]{12,}={0,2}").expect("valid base64 regex"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2,}\b").expect("valid number regex"));

static IP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("valid ip regex"));

/// Every match the analyzer saw, per kind, in text order with duplicates
/// removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signals {
    /// Algorithm names, lowercased
    pub algorithms: Vec<String>,
    /// Hex literals (optional 0x prefix retained)
    pub hex: Vec<String>,
    /// Base64-shaped literals
    pub base64: Vec<String>,
    /// Standalone integers
    pub numbers: Vec<String>,
    /// IPv4 literals
    pub ips: Vec<String>,
}

impl Signals {
    /// True when nothing was extracted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
            && self.hex.is_empty()
            && self.base64.is_empty()
            && self.numbers.is_empty()
            && self.ips.is_empty()
    }

    /// Collapse to the strongest value per kind: longest match wins, ties
    /// break by earliest position.
    #[must_use]
    pub fn to_map(&self) -> SignalMap {
        let mut map = SignalMap::new();
        for (kind, values) in [
            ("algorithm", &self.algorithms),
            ("hex", &self.hex),
            ("base64", &self.base64),
            ("number", &self.numbers),
            ("ip", &self.ips),
        ] {
            if let Some(strongest) = strongest(values) {
                map.insert(kind.to_string(), strongest.to_string());
            }
        }
        map
    }
}

// Values arrive in text order, so strictly-greater keeps the earliest of a
// given length.
fn strongest(values: &[String]) -> Option<&String> {
    let mut best: Option<&String> = None;
    for value in values {
        if best.is_none_or(|b| value.len() > b.len()) {
            best = Some(value);
        }
    }
    best
}

/// Collapse interior whitespace runs and trim the ends.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run the fixed battery of checks over `text`.
#[must_use]
pub fn analyze(text: &str) -> Signals {
    Signals {
        algorithms: collect(&ALGORITHM_RE, text, true),
        hex: collect(&HEX_RE, text, false),
        base64: collect(&BASE64_RE, text, false),
        numbers: collect(&NUMBER_RE, text, false),
        ips: collect(&IP_RE, text, false),
    }
}

fn collect(re: &Regex, text: &str, lowercase: bool) -> Vec<String> {
    let mut seen = Vec::new();
    for m in re.find_iter(text) {
        let value = if lowercase {
            m.as_str().to_lowercase()
        } else {
            m.as_str().to_string()
        };
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}
