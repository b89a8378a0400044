/// Key layout of one pipeline inside the record store.
///
/// Every key is prefixed with a namespace so two pipelines can share a
/// single store without colliding.
#[derive(Debug, Clone)]
pub struct Keyspace {
    /// FIFO list of serialized records awaiting promotion
    pub staging: String,
    /// Set of identifiers currently staged
    pub staging_seen: String,
    /// Transient list holding records mid-promotion
    pub inflight: String,
    /// Append-only list of confirmed records
    pub read_log: String,
    /// Set of identifiers confirmed into the read log
    pub read_seen: String,
    /// Promotion lock key
    pub lock: String,
    /// Last daily-reset date (UTC, `YYYY-MM-DD`)
    pub last_reset: String,
}

impl Keyspace {
    pub fn new(namespace: &str) -> Self {
        Self {
            staging: format!("{}:staging", namespace),
            staging_seen: format!("{}:staging:seen", namespace),
            inflight: format!("{}:inflight", namespace),
            read_log: format!("{}:log", namespace),
            read_seen: format!("{}:log:seen", namespace),
            lock: format!("{}:flush:lock", namespace),
            last_reset: format!("{}:reset:date", namespace),
        }
    }
}
