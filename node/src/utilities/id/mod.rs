use uuid::Uuid;

/// Token chosen by the originator of a message and echoed back in every reply to it.
pub type CorrelationId = String;

pub fn generate_correlation_id() -> CorrelationId {
    Uuid::new_v4().to_string()
}
