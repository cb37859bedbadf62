//! Door actuator attached to a serial device

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use doorlock_core::{DoorController, DoorState, Error};

/// Single-byte commands understood by the actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorCommands {
    pub lock: u8,
    pub unlock: u8,
}

/// Door driven by writing command bytes to a device.
///
/// The line settings of the device are expected to be configured by the
/// system. The door is locked when opened so its state is known.
pub struct SerialDoor {
    device: File,
    path: PathBuf,
    commands: DoorCommands,
    state: DoorState,
}

impl SerialDoor {
    /// Open the device and lock the door
    pub fn open(path: &Path, commands: DoorCommands) -> doorlock_core::Result<Self> {
        let device = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| Error::Door(format!("Failed to open {}: {}", path.display(), e)))?;

        let mut door = Self {
            device,
            path: path.to_path_buf(),
            commands,
            state: DoorState::Locked,
        };
        door.send(commands.lock)?;

        info!("Door actuator opened at {}", path.display());
        Ok(door)
    }

    fn send(&mut self, command: u8) -> doorlock_core::Result<()> {
        self.device
            .write_all(&[command])
            .and_then(|_| self.device.flush())
            .map_err(|e| Error::Door(format!("Write to {} failed: {}", self.path.display(), e)))
    }
}

impl DoorController for SerialDoor {
    fn state(&self) -> DoorState {
        self.state
    }

    fn lock(&mut self) -> doorlock_core::Result<()> {
        self.send(self.commands.lock)?;
        self.state = DoorState::Locked;
        debug!("Sent lock command");
        Ok(())
    }

    fn unlock(&mut self) -> doorlock_core::Result<()> {
        self.send(self.commands.unlock)?;
        self.state = DoorState::Unlocked;
        debug!("Sent unlock command");
        Ok(())
    }
}
