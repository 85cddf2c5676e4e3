pub mod cache {
    use serde::Serialize;
    use shared::config::CacheSettings;
    use std::collections::{BTreeMap, HashMap};
    use std::fmt;
    use std::time::Duration;

    /// Cache type tags used by the billing views.
    pub mod types {
        pub const USER_PLAN: &str = "userPlan";
        pub const USAGE_STATS: &str = "usageStats";
        pub const SUBSCRIPTION_PLANS: &str = "subscriptionPlans";
        pub const CODES: &str = "codes";
        pub const ANALYTICS: &str = "analytics";
        pub const INVOICES: &str = "invoices";
        pub const REFUNDS: &str = "refunds";
    }

    /// Composite key: a caller-supplied identifier scoped by a cache type.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct CacheKey {
        identifier: String,
        cache_type: String,
    }

    impl CacheKey {
        /// # Panics
        ///
        /// Panics if either part is empty. A key without an identifier or a
        /// type is a programming error, not a cache miss.
        pub fn new(identifier: impl Into<String>, cache_type: impl Into<String>) -> Self {
            let identifier = identifier.into();
            let cache_type = cache_type.into();
            assert!(!identifier.is_empty(), "cache key identifier must not be empty");
            assert!(!cache_type.is_empty(), "cache key type must not be empty");
            Self {
                identifier,
                cache_type,
            }
        }

        pub fn identifier(&self) -> &str {
            &self.identifier
        }

        pub fn cache_type(&self) -> &str {
            &self.cache_type
        }
    }

    impl fmt::Display for CacheKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}", self.cache_type, self.identifier)
        }
    }

    /// Per-type expiration windows with a fallback for unknown types.
    #[derive(Clone, Debug, PartialEq)]
    pub struct TtlTable {
        default_ttl: Duration,
        per_type: HashMap<String, Duration>,
    }

    impl TtlTable {
        pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

        /// An empty table: every type resolves to `default_ttl`.
        pub fn new(default_ttl: Duration) -> Self {
            Self {
                default_ttl,
                per_type: HashMap::new(),
            }
        }

        /// The built-in table for the billing views.
        pub fn builtin() -> Self {
            Self::new(Self::DEFAULT_TTL)
                .with_ttl(types::USER_PLAN, Duration::from_secs(5 * 60))
                .with_ttl(types::USAGE_STATS, Duration::from_secs(60))
                .with_ttl(types::SUBSCRIPTION_PLANS, Duration::from_secs(30 * 60))
                .with_ttl(types::CODES, Duration::from_secs(2 * 60))
                .with_ttl(types::ANALYTICS, Duration::from_secs(10 * 60))
                .with_ttl(types::INVOICES, Duration::from_secs(15 * 60))
                .with_ttl(types::REFUNDS, Duration::from_secs(5 * 60))
        }

        /// Built-in table with the configured default and overrides applied.
        pub fn from_settings(settings: &CacheSettings) -> Self {
            let mut table = Self::builtin();
            table.default_ttl = settings.default_ttl.as_duration();
            for (cache_type, ttl) in &settings.ttl_overrides {
                table
                    .per_type
                    .insert(cache_type.clone(), ttl.as_duration());
            }
            table
        }

        pub fn with_ttl(mut self, cache_type: impl Into<String>, ttl: Duration) -> Self {
            self.per_type.insert(cache_type.into(), ttl);
            self
        }

        /// A zero TTL means entries of that type are always expired.
        pub fn resolve(&self, cache_type: &str) -> Duration {
            self.per_type
                .get(cache_type)
                .copied()
                .unwrap_or(self.default_ttl)
        }

        pub fn default_ttl(&self) -> Duration {
            self.default_ttl
        }
    }

    impl Default for TtlTable {
        fn default() -> Self {
            Self::builtin()
        }
    }

    /// Diagnostic snapshot. Memory is estimated from serialized sizes.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CacheStats {
        pub total_entries: usize,
        pub entries_by_type: BTreeMap<String, usize>,
        pub approximate_memory_bytes: usize,
    }
}

pub mod bulk {
    use crate::error::OperationFailure;
    use serde::Serialize;
    use std::fmt;

    /// The canonical admin operations. The dispatch table is keyed by
    /// string so callers can register further kinds.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum OperationKind {
        Activate,
        Deactivate,
        Update,
    }

    impl OperationKind {
        pub fn as_str(&self) -> &'static str {
            match self {
                OperationKind::Activate => "activate",
                OperationKind::Deactivate => "deactivate",
                OperationKind::Update => "update",
            }
        }
    }

    impl fmt::Display for OperationKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl From<OperationKind> for String {
        fn from(kind: OperationKind) -> Self {
            kind.as_str().to_string()
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    #[serde(tag = "status", rename_all = "snake_case")]
    pub enum TargetOutcome<R> {
        Succeeded {
            #[serde(rename = "targetId")]
            target_id: String,
            value: R,
        },
        Failed {
            #[serde(rename = "targetId")]
            target_id: String,
            error: OperationFailure,
        },
    }

    impl<R> TargetOutcome<R> {
        pub fn target_id(&self) -> &str {
            match self {
                TargetOutcome::Succeeded { target_id, .. } => target_id,
                TargetOutcome::Failed { target_id, .. } => target_id,
            }
        }

        pub fn is_success(&self) -> bool {
            matches!(self, TargetOutcome::Succeeded { .. })
        }
    }

    /// Aggregate of a bulk run. `results` follows the input order and
    /// `successful + failed == total` always holds.
    #[derive(Clone, Debug, PartialEq, Serialize)]
    pub struct BulkOperationResult<R> {
        pub total: usize,
        pub successful: usize,
        pub failed: usize,
        pub results: Vec<TargetOutcome<R>>,
    }

    impl<R> BulkOperationResult<R> {
        pub fn from_outcomes(results: Vec<TargetOutcome<R>>) -> Self {
            let successful = results.iter().filter(|o| o.is_success()).count();
            Self {
                total: results.len(),
                successful,
                failed: results.len() - successful,
                results,
            }
        }

        /// Identifiers of the failed targets, in input order.
        pub fn failed_ids(&self) -> Vec<&str> {
            self.results
                .iter()
                .filter(|o| !o.is_success())
                .map(TargetOutcome::target_id)
                .collect()
        }

        pub fn is_complete_success(&self) -> bool {
            self.failed == 0
        }
    }
}
