//! Bring-up configuration for a hosted device node.

use crate::HostError;

/// Node name used by the reference device.
pub const DEFAULT_NODE_NAME: &str = "virtual_device";

/// Device class the reference node is registered under.
pub const DEFAULT_CLASS_NAME: &str = "virtual";

/// Default cap on concurrently open sessions.
pub const DEFAULT_SESSION_LIMIT: usize = 64;

/// Longest accepted node or class name.
pub const MAX_NAME_LEN: usize = 32;

/// Immutable bring-up configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DeviceConfig {
    /// Name under which the node is registered (`/dev/<node_name>`).
    pub node_name: String,
    /// Device class that owns the node.
    pub class_name: String,
    /// Maximum number of sessions open at the same time.
    pub session_limit: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            node_name: DEFAULT_NODE_NAME.to_string(),
            class_name: DEFAULT_CLASS_NAME.to_string(),
            session_limit: DEFAULT_SESSION_LIMIT,
        }
    }
}

impl DeviceConfig {
    /// Replaces the node name.
    #[must_use]
    pub fn with_node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = name.into();
        self
    }

    /// Replaces the class name.
    #[must_use]
    pub fn with_class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = name.into();
        self
    }

    /// Replaces the session limit.
    #[must_use]
    pub const fn with_session_limit(mut self, limit: usize) -> Self {
        self.session_limit = limit;
        self
    }

    /// Path at which a filesystem host would expose the node.
    #[must_use]
    pub fn node_path(&self) -> String {
        format!("/dev/{}", self.node_name)
    }

    /// Checks names and limits before any resource is acquired.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidConfig`] for empty, overlong or
    /// path-like names, or a zero session limit.
    pub fn validate(&self) -> Result<(), HostError> {
        validate_name("node", &self.node_name)?;
        validate_name("class", &self.class_name)?;
        if self.session_limit == 0 {
            return Err(HostError::InvalidConfig(
                "session limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_name(kind: &str, name: &str) -> Result<(), HostError> {
    if name.is_empty() {
        return Err(HostError::InvalidConfig(format!("{kind} name is empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(HostError::InvalidConfig(format!(
            "{kind} name exceeds {MAX_NAME_LEN} bytes"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(HostError::InvalidConfig(format!(
            "{kind} name {name:?} contains characters outside [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}
