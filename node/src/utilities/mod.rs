pub mod encoding;
pub mod hash;
pub mod id;
pub mod time;

pub use encoding::to_hex;
pub use hash::blake2_256;
pub use id::{generate_correlation_id, CorrelationId};
pub use time::ChainTime;
