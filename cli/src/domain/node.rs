//! Node naming and status mapping.

use kmachine_common::{MachineState, NodeStatus};

use crate::domain::error::NodeError;

/// Machine backing `node` in `cluster`: `<cluster>-<node>`.
#[must_use]
pub fn machine_name(cluster: &str, node: &str) -> String {
    format!("{cluster}-{node}")
}

/// Worker machine `index` (1-based) of a bulk start: `<base>-<index>`.
#[must_use]
pub fn worker_machine_name(base: &str, index: usize) -> String {
    format!("{base}-{index}")
}

/// Default name for a node appended to a profile that already has `existing`.
#[must_use]
pub fn next_node_name(existing: usize) -> String {
    format!("node-{}", existing + 1)
}

/// Collapses a driver-reported state into a node status.
///
/// # Errors
///
/// `Error` and `Timeout` yield [`NodeError::ErrorState`]; an unrecognised
/// state yields [`NodeError::UnknownState`]. Neither is coerced into a status.
pub fn node_status(state: MachineState) -> Result<NodeStatus, NodeError> {
    match state {
        MachineState::Running | MachineState::Starting | MachineState::Stopping => {
            Ok(NodeStatus::Running)
        }
        MachineState::Stopped | MachineState::Paused | MachineState::Saved => {
            Ok(NodeStatus::Stopped)
        }
        MachineState::Error | MachineState::Timeout => Err(NodeError::ErrorState(state)),
        MachineState::None => Err(NodeError::UnknownState(state.to_string())),
    }
}
