//! Statistics tracking for dispatchers and hubs

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// Per-dispatcher counters and structure sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    /// Dispatcher identity
    pub id: NodeId,
    /// Name given at creation
    pub name: CompactString,
    /// Publish calls that originated on this dispatcher
    pub messages_published: u64,
    /// Publish passes that visited this dispatcher, forwarded ones included
    pub messages_received: u64,
    /// Listener invocations performed by this dispatcher
    pub listener_invocations: u64,
    /// Listener tables, one per subscribed category
    pub tables: usize,
    /// Listeners across all tables
    pub listeners: usize,
    /// Concrete types with a dispatch cache entry
    pub cached_types: usize,
    /// Outgoing forward edges
    pub forwards: usize,
}

/// Hub-wide totals
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubStats {
    /// Live dispatchers, the global one included
    pub dispatchers: usize,
    /// Message types known to the type registry
    pub registered_types: usize,
    /// Memoized compatibility answers
    pub memoized_answers: usize,
    /// Idle pooled instances across all message types
    pub pooled_instances: usize,
    /// Listeners across all dispatchers
    pub listeners: usize,
    /// Publish calls across all dispatchers
    pub messages_published: u64,
}
