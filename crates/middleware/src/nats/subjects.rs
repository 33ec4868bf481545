use std::sync::Arc;

use dashmap::DashMap;

/// Builds bus subjects of the form `{exchange}.{routing_key}`.
/// Caches formatted subjects to avoid repeated allocations in hot path.
pub struct SubjectBuilder {
    /// Pre-computed prefix: "{exchange}."
    prefix: Arc<str>,
    /// Pre-computed wildcard subject
    wildcard: Arc<str>,
    /// Cache of routing key -> full subject
    cache: DashMap<Arc<str>, Arc<str>>,
}

impl SubjectBuilder {
    pub fn new(exchange: impl Into<String>) -> Self {
        let exchange = exchange.into();
        let prefix: Arc<str> = format!("{}.", exchange).into();
        let wildcard: Arc<str> = format!("{}.>", exchange).into();

        Self {
            prefix,
            wildcard,
            cache: DashMap::new(),
        }
    }

    /// Exchange name without the trailing separator
    pub fn exchange(&self) -> &str {
        &self.prefix[..self.prefix.len() - 1]
    }

    /// Full subject for a routing key.
    /// Cached - first call allocates, subsequent calls return Arc clone (cheap).
    #[inline]
    pub fn subject(&self, routing_key: &str) -> Arc<str> {
        if let Some(cached) = self.cache.get(routing_key) {
            return Arc::clone(cached.value());
        }

        let key: Arc<str> = routing_key.into();
        let subject: Arc<str> = format!("{}{}", self.prefix, routing_key).into();
        self.cache.insert(key, Arc::clone(&subject));
        subject
    }

    /// Wildcard covering everything under the exchange: {exchange}.>
    #[inline]
    pub fn all(&self) -> &str {
        &self.wildcard
    }
}

/// NATS-style subject matching: `*` matches one token, a trailing `>` matches
/// one or more remaining tokens.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(">"), Some(_)) => return pattern_tokens.next().is_none(),
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject() {
        let builder = SubjectBuilder::new("market.data");
        assert_eq!(
            builder.subject("upbit.ticker.KRW-BTC").as_ref(),
            "market.data.upbit.ticker.KRW-BTC"
        );
    }

    #[test]
    fn test_subject_cached() {
        let builder = SubjectBuilder::new("market.data");
        let first = builder.subject("upbit.trade.KRW-ETH");
        let second = builder.subject("upbit.trade.KRW-ETH");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_wildcard_subject() {
        let builder = SubjectBuilder::new("market.data");
        assert_eq!(builder.all(), "market.data.>");
        assert_eq!(builder.exchange(), "market.data");
    }

    #[test]
    fn test_exact_match() {
        assert!(subject_matches("a.b.c", "a.b.c"));
        assert!(!subject_matches("a.b.c", "a.b"));
        assert!(!subject_matches("a.b", "a.b.c"));
    }

    #[test]
    fn test_single_token_wildcard() {
        assert!(subject_matches("upbit.*.KRW-BTC", "upbit.ticker.KRW-BTC"));
        assert!(!subject_matches("upbit.*.KRW-BTC", "upbit.ticker.KRW-ETH"));
        assert!(!subject_matches("upbit.*", "upbit.ticker.KRW-BTC"));
    }

    #[test]
    fn test_tail_wildcard() {
        assert!(subject_matches("market.data.>", "market.data.upbit.ticker.KRW-BTC"));
        assert!(!subject_matches("market.data.>", "market.data"));
        assert!(!subject_matches("market.>.x", "market.data.x"));
    }
}
