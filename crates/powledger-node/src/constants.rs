pub const DEFAULT_LISTEN: &str = "127.0.0.1:6000";
/// Submissions are refused once this many transactions are waiting.
pub const DEFAULT_MAX_PENDING: usize = 10_000;
