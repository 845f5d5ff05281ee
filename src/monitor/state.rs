use serde::Serialize;

/// Last observed lifecycle state of the watched container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    Running,
    Paused,
    Stopped,
    Unknown,
    /// The container has to be recreated, restarting is not enough.
    NotFound,
}

impl ContainerState {
    /// Map a runtime status string. Unrecognised strings become `Unknown`.
    pub fn from_status(status: &str) -> Self {
        match status {
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "stopped" | "exited" => ContainerState::Stopped,
            _ => ContainerState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Stopped => "stopped",
            ContainerState::Unknown => "unknown",
            ContainerState::NotFound => "not_found",
        }
    }

    /// States that unpausing cannot fix.
    pub fn needs_manual_intervention(&self) -> bool {
        matches!(self, ContainerState::Stopped | ContainerState::NotFound)
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
