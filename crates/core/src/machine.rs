// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-machine persistent state row.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime status of a machine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Running,
    Stopped,
    Failed,
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Running => "running",
            MachineStatus::Stopped => "stopped",
            MachineStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(MachineStatus::Running),
            "stopped" => Some(MachineStatus::Stopped),
            "failed" => Some(MachineStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per named machine instance, updated with every accepted
/// transition. `config_type` is the descriptor's declared name, used by
/// observers to look up the right diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    pub machine_name: String,
    pub config_type: String,
    pub current_state: String,
    pub last_heartbeat_at: u64,
    pub status: MachineStatus,
}
