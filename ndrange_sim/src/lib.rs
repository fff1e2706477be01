// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Functional simulator for data-parallel kernels (the OpenCL NDRange execution model).
//!
//! `ndrange_sim` interprets a kernel's instructions directly instead of compiling them, so every
//! memory access, synchronization point, and numeric operation can be observed and checked.
//!
//! The engine is organized leaves first:
//!
//! - [`value`]: lane-structured [`TypedValue`]s used for every operand and result.
//! - [`address`] and [`memory`]: tagged 64-bit addresses and the per-address-space byte store.
//! - [`builtins`]: the read-only table of kernel-language builtin functions.
//! - [`work_item`]: the per-thread interpreter.
//! - [`work_group`]: the cooperative scheduler (barriers and async copies).
//! - [`invocation`] and [`simulator`]: NDRange geometry, argument binding, and the host facade.
//!
//! Programs are consumed through the [`program`] model, which any front end can produce; the
//! [`builder`] module is a small assembler for constructing programs by hand.
//!
//! ## Example
//! ```ignore
//! use ndrange_sim::{Kernel, KernelArg, NdRange, SimConfig, Simulator};
//!
//! let mut sim = Simulator::new(SimConfig::default());
//! let a = sim.create_buffer(32)?;
//! let mut kernel = Kernel::new(&program, "fill")?;
//! kernel.set_arg(0, KernelArg::Buffer(a))?;
//! sim.run(&kernel, NdRange::new_1d(8, 4), None)?;
//! # Ok::<(), ndrange_sim::SimError>(())
//! ```

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod address;
pub mod builder;
pub mod builtins;
pub mod config;
pub mod error;
pub mod half;
pub mod invocation;
pub mod memory;
pub mod observer;
pub mod program;
pub mod simulator;
pub mod types;
pub mod value;
pub mod work_group;
pub mod work_item;

pub use address::Address;
pub use builtins::BuiltinTable;
pub use config::SimConfig;
pub use error::{Diagnostic, SimError};
pub use invocation::{Kernel, KernelArg, NdRange, RunSummary};
pub use memory::{Memory, MemoryError};
pub use observer::{EventMask, Observer};
pub use simulator::Simulator;
pub use types::{AddressSpace, Type};
pub use value::TypedValue;
pub use work_group::FenceFlags;
pub use work_item::{ItemIds, Size3};
