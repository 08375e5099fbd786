//! Risk advisor.
//!
//! Scores a message body and recipient and recommends a security tier.
//! Purely lexical: keywords are matched as case-insensitive substrings and
//! each keyword counts at most once. Recipients outside the trusted domains
//! add a fixed penalty; domains are compared exactly.

use crate::envelope::Tier;

/// Domains that carry no recipient penalty unless configured otherwise.
pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &["qumail.local", "command.local", "node.5"];

const DEFAULT_KEYWORDS: &[(&str, u32)] = &[
    ("secret", 50),
    ("confidential", 40),
    ("contract", 30),
    ("finance", 25),
    ("password", 35),
    ("operation", 50),
    ("auth", 20),
];

/// Tier recommendation and the score behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recommendation {
    pub tier: Tier,
    pub score: u32,
}

/// Scoring table, allow-list and thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskPolicy {
    /// Lowercase keywords and their weights.
    pub keywords: Vec<(String, u32)>,
    /// Lowercase recipient domains exempt from the penalty.
    pub trusted_domains: Vec<String>,
    pub untrusted_penalty: u32,
    /// Score at or above which tier 3 is recommended.
    pub pqc_threshold: u32,
    /// Score at or above which tier 2 is recommended.
    pub qaes_threshold: u32,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|(k, w)| (k.to_string(), *w)).collect(),
            trusted_domains: DEFAULT_TRUSTED_DOMAINS.iter().map(|d| d.to_string()).collect(),
            untrusted_penalty: 30,
            pqc_threshold: 60,
            qaes_threshold: 30,
        }
    }
}

/// Text after the last `@`, or empty when there is none.
pub fn recipient_domain(recipient: &str) -> &str {
    match recipient.rfind('@') {
        Some(at) => &recipient[at + 1..],
        None => "",
    }
}

impl RiskPolicy {
    /// Default weights with a different allow-list.
    pub fn with_trusted_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trusted_domains: domains.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Exact, case-sensitive match of the recipient domain against the allow-list.
    pub fn is_trusted(&self, recipient: &str) -> bool {
        let domain = recipient_domain(recipient);
        self.trusted_domains.iter().any(|d| d == domain)
    }

    pub fn score(&self, body: &str, recipient: &str) -> u32 {
        let body = body.to_lowercase();
        let mut score: u32 = self
            .keywords
            .iter()
            .filter(|(keyword, _)| body.contains(keyword.as_str()))
            .map(|(_, weight)| *weight)
            .fold(0, u32::saturating_add);

        if !self.is_trusted(recipient) {
            score = score.saturating_add(self.untrusted_penalty);
        }
        score
    }

    pub fn tier_for(&self, score: u32) -> Tier {
        if score >= self.pqc_threshold {
            Tier::Pqc
        } else if score >= self.qaes_threshold {
            Tier::QuantumAes
        } else {
            Tier::Otp
        }
    }

    pub fn recommend(&self, body: &str, recipient: &str) -> Recommendation {
        let score = self.score(body, recipient);
        Recommendation {
            tier: self.tier_for(score),
            score,
        }
    }
}

/// [`RiskPolicy::recommend`] under the default policy.
pub fn recommend(body: &str, recipient: &str) -> Recommendation {
    RiskPolicy::default().recommend(body, recipient)
}
