//! Actor configuration.

/// Settings of one [`Actor`](crate::Actor).
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Name used in log records.
    pub name: String,

    /// Log every decoded header at debug level.
    pub trace_frames: bool,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            name: "actor".to_string(),
            trace_frames: false,
        }
    }
}

impl ActorConfig {
    /// Configuration with a custom name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Configuration that traces every request, for debugging a pairing.
    pub fn verbose(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trace_frames: true,
        }
    }
}
