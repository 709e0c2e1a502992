//! Machine arena and plant-floor membership.
//!
//! ```text
//!   machines: [ M1 | M2 | M3 | M4 ]      arena, one entry per configured id
//!                  ▲         ▲
//!   floor:      [ h(M4), h(M2) ]         active subset, insertion order
//! ```
//!
//! Every configured machine is stored exactly once in the arena and is
//! addressed through a [`MachineHandle`]. The floor holds handles, never
//! copies. Membership is the only route to `ON` and therefore the only
//! route to `OP`.

use std::collections::HashMap;

use log::info;

use crate::config::MachineConfig;
use crate::error::RegistryError;
use crate::fsm::{StateId, Transition};
use crate::machine::Machine;

/// Stable index into the machine arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MachineHandle(usize);

#[derive(Default)]
pub struct Registry {
    machines: Vec<Machine>,
    by_id: HashMap<u32, MachineHandle>,
    floor: Vec<MachineHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding every machine in `configs`, all `OFF`.
    pub fn from_configs(
        configs: impl IntoIterator<Item = MachineConfig>,
    ) -> Result<Self, RegistryError> {
        let mut reg = Self::new();
        for c in configs {
            reg.configure(c)?;
        }
        Ok(reg)
    }

    /// Place a machine in the arena. It starts `OFF` and off the floor.
    pub fn configure(&mut self, config: MachineConfig) -> Result<MachineHandle, RegistryError> {
        let id = config.id;
        if self.by_id.contains_key(&id) {
            return Err(RegistryError::AlreadyPresent(id));
        }
        let handle = MachineHandle(self.machines.len());
        self.machines.push(Machine::new(config));
        self.by_id.insert(id, handle);
        Ok(handle)
    }

    /// Power a configured machine on and put it on the floor (`OFF → ON`).
    pub fn add(&mut self, id: u32) -> Result<MachineHandle, RegistryError> {
        let handle = self.handle(id).ok_or(RegistryError::NotFound(id))?;
        if self.floor.contains(&handle) {
            return Err(RegistryError::AlreadyPresent(id));
        }
        self.machines[handle.0]
            .apply(Transition::PowerOn)
            .map_err(|_| RegistryError::AlreadyPresent(id))?;
        self.floor.push(handle);
        info!("floor: machine {} added", id);
        Ok(handle)
    }

    /// Take a machine off the floor (`ON → OFF`).
    ///
    /// Fails with `Busy` while the machine is `OP`; its state is left
    /// untouched. Buffered samples are discarded on success.
    pub fn remove(&mut self, id: u32) -> Result<MachineHandle, RegistryError> {
        let handle = self.floor_handle(id).ok_or(RegistryError::NotFound(id))?;
        let machine = &mut self.machines[handle.0];
        if machine.state() == StateId::Op {
            return Err(RegistryError::Busy(id));
        }
        machine
            .apply(Transition::PowerOff)
            .map_err(|_| RegistryError::Busy(id))?;
        machine.reset_windows();
        self.floor.retain(|h| *h != handle);
        info!("floor: machine {} removed", id);
        Ok(handle)
    }

    /// Active machines in floor order (order of `add`, not of id).
    pub fn list(&self) -> impl Iterator<Item = &Machine> + '_ {
        self.floor.iter().map(|h| &self.machines[h.0])
    }

    pub fn floor_ids(&self) -> Vec<u32> {
        self.list().map(Machine::id).collect()
    }

    /// Every configured machine, on the floor or not.
    pub fn configured(&self) -> impl Iterator<Item = &Machine> + '_ {
        self.machines.iter()
    }

    pub fn is_on_floor(&self, id: u32) -> bool {
        self.floor_handle(id).is_some()
    }

    pub fn handle(&self, id: u32) -> Option<MachineHandle> {
        self.by_id.get(&id).copied()
    }

    fn floor_handle(&self, id: u32) -> Option<MachineHandle> {
        self.handle(id).filter(|h| self.floor.contains(h))
    }

    /// Any configured machine.
    pub fn get(&self, id: u32) -> Option<&Machine> {
        self.handle(id).map(|h| &self.machines[h.0])
    }

    /// A machine currently on the floor.
    pub fn active(&self, id: u32) -> Option<&Machine> {
        self.floor_handle(id).map(|h| &self.machines[h.0])
    }

    pub fn active_mut(&mut self, id: u32) -> Option<&mut Machine> {
        let h = self.floor_handle(id)?;
        Some(&mut self.machines[h.0])
    }

    pub fn machine(&self, handle: MachineHandle) -> &Machine {
        &self.machines[handle.0]
    }

    pub fn machine_mut(&mut self, handle: MachineHandle) -> &mut Machine {
        &mut self.machines[handle.0]
    }

    pub fn configured_len(&self) -> usize {
        self.machines.len()
    }

    pub fn floor_len(&self) -> usize {
        self.floor.len()
    }
}
