// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-side facade: global memory, the builtin table, and kernel launches.

use alloc::string::String;
use alloc::vec::Vec;

use crate::address::Address;
use crate::builtins::BuiltinTable;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::invocation::{self, Kernel, NdRange, RunSummary};
use crate::memory::Memory;
use crate::observer::Observer;
use crate::types::AddressSpace;

/// A simulated device.
///
/// Global memory outlives kernel launches, so buffers written by one kernel can be read by the
/// next or by the host.
#[derive(Debug)]
pub struct Simulator {
    global: Memory,
    builtins: BuiltinTable,
    config: SimConfig,
}

impl Simulator {
    /// A device with the standard builtin table.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self::with_builtins(config, BuiltinTable::standard())
    }

    /// A device with a custom builtin table.
    #[must_use]
    pub fn with_builtins(config: SimConfig, builtins: BuiltinTable) -> Self {
        Self {
            global: Memory::new(AddressSpace::Global),
            builtins,
            config,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Builtin table used to resolve external calls.
    #[must_use]
    pub fn builtins(&self) -> &BuiltinTable {
        &self.builtins
    }

    /// Device global memory.
    #[must_use]
    pub fn global_memory(&self) -> &Memory {
        &self.global
    }

    /// Allocates a zero-filled global buffer.
    pub fn create_buffer(&mut self, size: u64) -> Result<Address, SimError> {
        Ok(self.global.allocate(size)?)
    }

    /// Allocates a global buffer holding `bytes`.
    pub fn create_buffer_init(&mut self, bytes: &[u8]) -> Result<Address, SimError> {
        Ok(self.global.allocate_init(AddressSpace::Global, bytes)?)
    }

    /// Writes `bytes` at `address`.
    pub fn write_buffer(&mut self, address: Address, bytes: &[u8]) -> Result<(), SimError> {
        Ok(self.global.store(address, bytes)?)
    }

    /// Reads `size` bytes at `address`.
    pub fn read_buffer(&self, address: Address, size: u64) -> Result<Vec<u8>, SimError> {
        Ok(self.global.load(address, size)?)
    }

    /// Releases a buffer.
    pub fn free_buffer(&mut self, address: Address) -> Result<(), SimError> {
        Ok(self.global.free(address)?)
    }

    /// Runs `kernel` over `ndrange`, reporting events to `observer`.
    ///
    /// Diagnostics do not fail the launch; they are counted in the returned summary.
    pub fn run(
        &mut self,
        kernel: &Kernel<'_>,
        ndrange: NdRange,
        observer: Option<&mut dyn Observer>,
    ) -> Result<RunSummary, SimError> {
        invocation::run(
            kernel,
            &ndrange,
            &mut self.global,
            &self.builtins,
            &self.config,
            observer,
        )
    }

    /// Hex dump of every live global buffer.
    #[must_use]
    pub fn dump_global(&self) -> String {
        self.global.dump()
    }
}
