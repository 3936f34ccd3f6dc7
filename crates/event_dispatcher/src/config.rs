//! Hub configuration

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// Settings applied when a [`DispatchHub`](crate::DispatchHub) is created.
///
/// Missing fields fall back to their defaults, so an empty JSON object is a
/// valid configuration:
///
/// ```rust
/// use event_dispatcher::HubConfig;
///
/// let config = HubConfig::from_json(r#"{ "max_pooled_per_type": 16 }"#)?;
/// assert_eq!(config.global_name, "global");
/// assert_eq!(config.max_pooled_per_type, Some(16));
/// # Ok::<(), event_dispatcher::EventError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Name of the global dispatcher
    pub global_name: CompactString,
    /// Emit a `trace` event summarising every publish pass
    pub trace_publishes: bool,
    /// Idle instances kept per pooled message type; `None` keeps all of them
    pub max_pooled_per_type: Option<usize>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            global_name: CompactString::new("global"),
            trace_publishes: false,
            max_pooled_per_type: None,
        }
    }
}

impl HubConfig {
    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, EventError> {
        serde_json::from_str(json).map_err(|e| EventError::InvalidConfig(e.to_string()))
    }

    /// Set the name of the global dispatcher
    pub fn with_global_name(mut self, name: &str) -> Self {
        self.global_name = CompactString::new(name);
        self
    }

    /// Enable or disable per-publish tracing
    pub fn with_trace_publishes(mut self, enabled: bool) -> Self {
        self.trace_publishes = enabled;
        self
    }

    /// Cap the number of idle pooled instances per message type
    pub fn with_max_pooled_per_type(mut self, max: usize) -> Self {
        self.max_pooled_per_type = Some(max);
        self
    }
}
