use std::time::Duration;

/// Which state the daily reset clears.
///
/// `StagingOnly` preserves the read log as a durable daily archive and only
/// clears the staging queue and its membership set. `Full` additionally
/// clears the read log and its membership set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    StagingOnly,
    Full,
}

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Key namespace prefix in the record store (default: "relaylog")
    pub namespace: String,

    /// Time-to-live of the promotion lock (default: 30s)
    pub lock_ttl: Duration,

    /// How often the background flush task runs (default: 60s)
    pub flush_interval: Duration,

    /// Yield to the scheduler every N drained items during a flush (default: 25)
    pub drain_yield_every: usize,

    /// Page size when a read query omits a limit (default: 20)
    pub default_page_size: usize,

    /// Upper bound any requested page size is clamped to (default: 100)
    pub max_page_size: usize,

    /// Batch size when a batch-index query omits one (default: 10)
    pub default_batch_size: usize,

    /// Upper bound any requested batch size is clamped to (default: 50)
    pub max_batch_size: usize,

    /// What the daily reset clears (default: staging only)
    pub reset_policy: ResetPolicy,

    /// Shared secret required to trigger a flush; `None` disables the check
    pub flush_secret: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            namespace: "relaylog".to_string(),
            lock_ttl: Duration::from_secs(30),
            flush_interval: Duration::from_secs(60),
            drain_yield_every: 25,
            default_page_size: 20,
            max_page_size: 100,
            default_batch_size: 10,
            max_batch_size: 50,
            reset_policy: ResetPolicy::StagingOnly,
            flush_secret: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new config with the given key namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Set the promotion lock time-to-live
    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Set the background flush interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set how many drained items are processed between scheduler yields
    pub fn drain_yield_every(mut self, every: usize) -> Self {
        self.drain_yield_every = every;
        self
    }

    /// Set default and maximum page sizes for cursor reads
    pub fn page_sizes(mut self, default: usize, max: usize) -> Self {
        self.default_page_size = default;
        self.max_page_size = max;
        self
    }

    /// Set default and maximum batch sizes for batch-index reads
    pub fn batch_sizes(mut self, default: usize, max: usize) -> Self {
        self.default_batch_size = default;
        self.max_batch_size = max;
        self
    }

    /// Set the daily reset policy
    pub fn reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.reset_policy = policy;
        self
    }

    /// Require a shared secret on flush triggers
    pub fn flush_secret(mut self, secret: impl Into<String>) -> Self {
        self.flush_secret = Some(secret.into());
        self
    }
}
