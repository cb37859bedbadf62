//! Door state machine and actuator contract

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Physical lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorState {
    Locked,
    Unlocked,
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoorState::Locked => write!(f, "locked"),
            DoorState::Unlocked => write!(f, "unlocked"),
        }
    }
}

/// Drives the door actuator.
///
/// Both mutators must be idempotent: locking a locked door is safe.
pub trait DoorController: Send {
    /// Current lock state
    fn state(&self) -> DoorState;

    /// Engage the lock
    fn lock(&mut self) -> Result<()>;

    /// Release the lock
    fn unlock(&mut self) -> Result<()>;
}

/// In-memory door, used for bench setups and tests
#[derive(Debug)]
pub struct SimulatedDoor {
    state: DoorState,
    actuations: usize,
}

impl SimulatedDoor {
    pub fn new(initial: DoorState) -> Self {
        Self {
            state: initial,
            actuations: 0,
        }
    }

    /// Number of lock/unlock commands issued so far
    pub fn actuations(&self) -> usize {
        self.actuations
    }
}

impl Default for SimulatedDoor {
    fn default() -> Self {
        Self::new(DoorState::Locked)
    }
}

impl DoorController for SimulatedDoor {
    fn state(&self) -> DoorState {
        self.state
    }

    fn lock(&mut self) -> Result<()> {
        self.actuations += 1;
        self.state = DoorState::Locked;
        info!("Simulated door locked");
        Ok(())
    }

    fn unlock(&mut self) -> Result<()> {
        self.actuations += 1;
        self.state = DoorState::Unlocked;
        info!("Simulated door unlocked");
        Ok(())
    }
}
