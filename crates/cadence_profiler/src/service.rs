//! Debug service boundary.
//!
//! A profiling session hands its data over as batches of opaque, serialized
//! messages. How they travel further (socket, file, in-process viewer) is up
//! to the [`DebugService`] implementation.

use crate::error::{ProfilerError, Result};
use crate::events::TimestampedEvent;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// One serialized profile event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugMessage {
    /// Application that produced the message.
    pub app_name: String,
    /// Position of the message within its session.
    pub sequence: u64,
    /// JSON encoded payload.
    pub payload: String,
}

impl DebugMessage {
    /// Encode an event as a message.
    pub fn encode(app_name: &str, sequence: u64, event: &TimestampedEvent) -> Result<Self> {
        Ok(Self {
            app_name: app_name.to_string(),
            sequence,
            payload: serde_json::to_string(event)?,
        })
    }

    /// Decode the payload back into an event.
    pub fn decode(&self) -> Result<TimestampedEvent> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Receiver of profile data.
pub trait DebugService: Send + Sync {
    /// Accept one batch of messages.
    fn send_messages(&self, messages: Vec<DebugMessage>) -> Result<()>;
}

/// Keeps every batch in memory. Used by in-process viewers and tests.
#[derive(Debug)]
pub struct MemoryDebugService {
    batches: Mutex<Vec<Vec<DebugMessage>>>,
    available: AtomicBool,
}

impl Default for MemoryDebugService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDebugService {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Refuse (or accept again) incoming batches.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of batches received.
    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// All received messages in arrival order.
    pub fn messages(&self) -> Vec<DebugMessage> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// All received events, decoded.
    pub fn events(&self) -> Result<Vec<TimestampedEvent>> {
        self.messages().iter().map(DebugMessage::decode).collect()
    }

    pub fn clear(&self) {
        self.batches.lock().clear();
    }
}

impl DebugService for MemoryDebugService {
    fn send_messages(&self, messages: Vec<DebugMessage>) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ProfilerError::ServiceUnavailable(
                "memory service is offline".to_string(),
            ));
        }
        self.batches.lock().push(messages);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ProfileEvent, Timestamp};

    fn frame(delta_ms: i64) -> TimestampedEvent {
        TimestampedEvent::new(
            Timestamp::from_micros(10),
            ProfileEvent::AnimationFrame {
                delta_ms,
                running: 1,
            },
        )
    }

    #[test]
    fn test_message_decodes_to_event() -> Result<()> {
        let message = DebugMessage::encode("app", 7, &frame(16))?;
        assert_eq!(message.sequence, 7);
        assert_eq!(message.decode()?, frame(16));
        Ok(())
    }

    #[test]
    fn test_offline_service_rejects_batches() -> Result<()> {
        let service = MemoryDebugService::new();
        service.set_available(false);
        let batch = vec![DebugMessage::encode("app", 0, &frame(16))?];
        assert!(matches!(
            service.send_messages(batch.clone()),
            Err(ProfilerError::ServiceUnavailable(_))
        ));

        service.set_available(true);
        service.send_messages(batch)?;
        assert_eq!(service.batch_count(), 1);
        Ok(())
    }
}
