use serde::{Deserialize, Serialize};

/// Default guest memory in MiB.
pub const DEFAULT_MEMORY_MIB: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmState {
    Running,
    Shutoff,
}

/// A virtual machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vm {
    pub name: String,
    pub state: VmState,
    /// Guest memory in MiB.
    pub memory: u64,
    pub cpus: u64,
}

impl Vm {
    pub fn new(name: impl Into<String>, memory: u64, cpus: u64) -> Self {
        Self {
            name: name.into(),
            state: VmState::Shutoff,
            memory,
            cpus,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == VmState::Running
    }
}
