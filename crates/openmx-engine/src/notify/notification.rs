//! Notification events and the wire strings that tag them

use openmx_sdk::{ObjectName, OpenValue};
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// Notification Types
// ============================================================================

/// Notification type tags. These strings are part of the wire contract.
pub mod types {
    /// Pool usage crossed its usage threshold
    pub const MEMORY_THRESHOLD_EXCEEDED: &str = "memory-threshold-exceeded";
    /// Pool usage after a collection crossed its collection-usage threshold
    pub const MEMORY_COLLECTION_THRESHOLD_EXCEEDED: &str = "memory-collection-threshold-exceeded";
    /// A garbage collector finished a collection
    pub const GC_COLLECTION_COMPLETED: &str = "gc-collection-completed";
    /// Processor count changed
    pub const AVAILABLE_PROCESSORS_CHANGE: &str = "available-processors-change";
    /// Processing capacity changed
    pub const PROCESSING_CAPACITY_CHANGE: &str = "processing-capacity-change";
    /// Physical memory changed
    pub const TOTAL_PHYSICAL_MEMORY_CHANGE: &str = "total-physical-memory-change";
}

// ============================================================================
// Notification
// ============================================================================

/// Decoded content of a native event, before it is numbered
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationBody {
    /// Type tag (see [`types`])
    pub notification_type: &'static str,
    /// Human-readable message
    pub message: String,
    /// Payload record
    pub user_data: OpenValue,
}

/// A numbered, timestamped notification as delivered to listeners
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    notification_type: &'static str,
    source: Option<ObjectName>,
    sequence: u64,
    timestamp: u64,
    message: String,
    user_data: OpenValue,
}

impl Notification {
    /// Stamp a body with its source, sequence number and the current time
    pub fn new(body: NotificationBody, source: Option<ObjectName>, sequence: u64) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0);
        Notification {
            notification_type: body.notification_type,
            source,
            sequence,
            timestamp,
            message: body.message,
            user_data: body.user_data,
        }
    }

    /// Type tag
    pub fn notification_type(&self) -> &'static str {
        self.notification_type
    }

    /// Emitting bean, if it has a name
    pub fn source(&self) -> Option<&ObjectName> {
        self.source.as_ref()
    }

    /// Per-source sequence number, strictly increasing
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Milliseconds since the epoch
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Message text
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Payload record
    pub fn user_data(&self) -> &OpenValue {
        &self.user_data
    }
}

/// Catalogue entry: which notification types a bean emits, and their payload
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationInfo {
    /// Type tags
    pub types: Vec<&'static str>,
    /// Payload record name
    pub payload: &'static str,
    /// Description
    pub description: &'static str,
}

impl NotificationInfo {
    /// Create a catalogue entry
    pub fn new(types: &[&'static str], payload: &'static str, description: &'static str) -> Self {
        NotificationInfo {
            types: types.to_vec(),
            payload,
            description,
        }
    }
}
