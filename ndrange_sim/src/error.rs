// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fatal simulation errors and recoverable diagnostics.
//!
//! A [`SimError`] aborts the current kernel invocation. A [`Diagnostic`] is reported through the
//! observer log channel (and `tracing`) and execution continues with the most benign result.

use alloc::boxed::Box;
use core::fmt;

use crate::address::Address;
use crate::memory::MemoryError;
use crate::program::{FuncId, GlobalId, ValueId};
use crate::work_item::Size3;

/// Why a work-group could not make progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StuckReason {
    /// A work-item exceeded the configured instruction budget.
    StepLimit {
        /// Local id of the offending work-item.
        local_id: Size3,
        /// The configured limit.
        limit: u64,
    },
}

/// Fatal simulation error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    /// The NDRange geometry is invalid (bad dimension count, zero size, or a local size that does
    /// not divide the global size).
    InvalidNdRange {
        /// Human-readable reason.
        reason: &'static str,
    },
    /// Work-items of one group reached different barriers, or the same barrier with different
    /// fence flags or events.
    DivergentBarrier {
        /// Group in which the divergence happened.
        group: Size3,
        /// What differed.
        reason: &'static str,
    },
    /// The work-group cannot make progress.
    StuckKernel {
        /// Group that is stuck.
        group: Size3,
        /// Detail.
        reason: StuckReason,
    },
    /// A called function is not in the builtin table.
    UnknownBuiltin {
        /// Demangled name.
        name: Box<str>,
    },
    /// A builtin exists but cannot handle the given overload.
    UnsupportedOverload {
        /// Demangled name.
        name: Box<str>,
        /// Mangled overload suffix.
        overload: Box<str>,
    },
    /// `llvm.trap` was executed.
    Trap {
        /// Global id of the trapping work-item.
        global_id: Size3,
    },
    /// An `unreachable` terminator was executed.
    Unreachable {
        /// Global id of the work-item.
        global_id: Size3,
    },
    /// An instruction read an SSA value that was never defined.
    UndefinedValue {
        /// The value.
        value: ValueId,
    },
    /// An operand named a program-scope variable that does not exist.
    UnknownGlobal {
        /// The id.
        global: GlobalId,
    },
    /// A function id did not name a function in the program.
    BadFunction {
        /// The id.
        func: FuncId,
    },
    /// No function with the requested kernel name exists.
    UnknownKernel {
        /// Name looked up.
        name: Box<str>,
    },
    /// A kernel argument was missing or did not match its parameter.
    InvalidArgument {
        /// Argument index.
        index: usize,
        /// Reason.
        reason: &'static str,
    },
    /// A host-side memory operation failed.
    Memory(MemoryError),
}

impl fmt::Display for StuckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepLimit { local_id, limit } => write!(
                f,
                "work-item {local_id} exceeded {limit} instructions (infinite loop?)"
            ),
        }
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNdRange { reason } => write!(f, "invalid ndrange: {reason}"),
            Self::DivergentBarrier { group, reason } => {
                write!(f, "divergent barrier in work-group {group}: {reason}")
            }
            Self::StuckKernel { group, reason } => {
                write!(f, "work-group {group} is stuck: {reason}")
            }
            Self::UnknownBuiltin { name } => write!(f, "unknown builtin function: {name}"),
            Self::UnsupportedOverload { name, overload } => {
                write!(f, "unsupported overload of {name}: {overload}")
            }
            Self::Trap { global_id } => write!(f, "work-item {global_id} executed a trap"),
            Self::Unreachable { global_id } => {
                write!(f, "work-item {global_id} reached an unreachable instruction")
            }
            Self::UndefinedValue { value } => write!(f, "undefined value: %{}", value.0),
            Self::UnknownGlobal { global } => write!(f, "unknown global: @{}", global.0),
            Self::BadFunction { func } => write!(f, "bad function id: {}", func.0),
            Self::UnknownKernel { name } => write!(f, "unknown kernel: {name}"),
            Self::InvalidArgument { index, reason } => {
                write!(f, "invalid kernel argument {index}: {reason}")
            }
            Self::Memory(e) => write!(f, "memory error: {e}"),
        }
    }
}

impl core::error::Error for SimError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Memory(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MemoryError> for SimError {
    fn from(e: MemoryError) -> Self {
        Self::Memory(e)
    }
}

/// Kind of memory access a diagnostic refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// Load.
    Load,
    /// Store.
    Store,
    /// Atomic read-modify-write.
    Atomic,
    /// Bulk copy (async copy, memcpy, memset).
    Copy,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Store => "store",
            Self::Atomic => "atomic",
            Self::Copy => "copy",
        })
    }
}

/// Recoverable condition reported during execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// An access fell outside an allocation or hit an invalid buffer. The access was skipped.
    InvalidAccess {
        /// Access kind.
        kind: AccessKind,
        /// Underlying memory error.
        error: MemoryError,
    },
    /// A load, store, or atomic was not aligned to its natural alignment.
    Misaligned {
        /// Access kind.
        kind: AccessKind,
        /// Address accessed.
        address: Address,
        /// Required alignment.
        align: u64,
    },
    /// `inttoptr` produced a pointer not aligned for its pointee.
    InvalidPointerCast {
        /// Resulting address.
        address: Address,
        /// Required alignment.
        align: u64,
    },
    /// Bytes were read before ever being written.
    UninitializedRead {
        /// Address read.
        address: Address,
        /// Bytes read.
        size: u64,
    },
    /// An instruction kind the interpreter does not implement; its result was zero-filled.
    UnsupportedInstruction {
        /// Instruction name.
        opcode: Box<str>,
    },
    /// Work-items registered the same async copy with different parameters.
    AsyncCopyDivergence {
        /// The parameter that differed.
        field: &'static str,
    },
    /// `wait_group_events` named an event that does not exist.
    InvalidWaitEvent {
        /// Event id.
        event: u64,
    },
    /// The work-group finished with async copies nobody waited for.
    UnwaitedEvents {
        /// Number of outstanding copies.
        count: usize,
    },
    /// Some work-items finished while others waited at a barrier.
    PartialBarrier {
        /// Work-items waiting at the barrier.
        waiting: usize,
        /// Work-items in the group.
        total: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAccess { kind, error } => write!(f, "invalid {kind}: {error}"),
            Self::Misaligned {
                kind,
                address,
                align,
            } => write!(
                f,
                "misaligned {kind} at {address:?} (requires {align}-byte alignment)"
            ),
            Self::InvalidPointerCast { address, align } => write!(
                f,
                "invalid pointer cast: {address:?} is not {align}-byte aligned"
            ),
            Self::UninitializedRead { address, size } => {
                write!(f, "uninitialized read of {size} bytes at {address:?}")
            }
            Self::UnsupportedInstruction { opcode } => {
                write!(f, "unsupported instruction: {opcode}")
            }
            Self::AsyncCopyDivergence { field } => {
                write!(f, "work-group divergence detected (async copy): {field} differs")
            }
            Self::InvalidWaitEvent { event } => write!(f, "invalid wait event: {event}"),
            Self::UnwaitedEvents { count } => {
                write!(f, "work-group finished without waiting for {count} event(s)")
            }
            Self::PartialBarrier { waiting, total } => write!(
                f,
                "only {waiting} of {total} work-items reached the barrier before the rest finished"
            ),
        }
    }
}

impl core::error::Error for Diagnostic {}
