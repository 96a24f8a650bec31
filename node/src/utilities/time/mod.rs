use chrono::Utc;

pub struct ChainTime;

impl ChainTime {
    /// Milliseconds since the unix epoch.
    pub fn now() -> u64 {
        Utc::now().timestamp_millis() as u64
    }
}
