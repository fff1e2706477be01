// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-work-item interpreter.
//!
//! A [`WorkItem`] is an explicit state machine: a current call frame, a stack of suspended
//! callers, and a [`WorkItemState`]. [`WorkItem::step`] executes exactly one instruction, so the
//! work-group scheduler can interleave work-items and park them at barriers without any host
//! threads.
//!
//! SSA results live in a dense per-frame arena indexed by [`ValueId`]. Phi nodes at the top of a
//! block are evaluated against the values of the predecessor and committed together when the
//! first non-phi instruction runs, which gives them the required parallel-assignment semantics.

mod arith;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::address::Address;
use crate::builtins::{BuiltinCall, BuiltinTable, demangle};
use crate::config::SimConfig;
use crate::error::{AccessKind, Diagnostic, SimError, StuckReason};
use crate::invocation::{NdRange, materialize_global};
use crate::memory::{AtomicOp, Memory, Signedness};
use crate::observer::{EventMask, Notifier};
use crate::program::{
    BlockId, CallArg, Callee, CastOp, FuncId, Function, Instr, Op, Operand, Program, ValueId,
};
use crate::types::{AddressSpace, Type};
use crate::value::TypedValue;
use crate::work_group::{CopyRequest, FenceFlags, GroupShared};

/// A three-component size or index.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size3 {
    /// First dimension.
    pub x: usize,
    /// Second dimension.
    pub y: usize,
    /// Third dimension.
    pub z: usize,
}

impl Size3 {
    /// Creates a size from its components.
    #[must_use]
    #[inline]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Component `dim`, or `None` for `dim >= 3`.
    #[must_use]
    pub const fn get(self, dim: u64) -> Option<usize> {
        match dim {
            0 => Some(self.x),
            1 => Some(self.y),
            2 => Some(self.z),
            _ => None,
        }
    }

    /// `x * y * z`, or `None` on overflow.
    #[must_use]
    pub const fn volume(self) -> Option<usize> {
        match self.x.checked_mul(self.y) {
            Some(xy) => xy.checked_mul(self.z),
            None => None,
        }
    }

    /// Linear index of `self` within a box of `size`, x fastest.
    #[must_use]
    pub const fn linear_in(self, size: Self) -> usize {
        self.x + (self.y + self.z * size.y) * size.x
    }
}

impl fmt::Display for Size3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

/// Identity of one work-item.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ItemIds {
    /// Global id (including the NDRange's global offset).
    pub global_id: Size3,
    /// Id within the work-group.
    pub local_id: Size3,
    /// Id of the owning work-group.
    pub group_id: Size3,
}

/// Scheduling state of a work-item.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum WorkItemState {
    /// Can execute its next instruction.
    Ready,
    /// Parked at a barrier or `wait_group_events`.
    Barrier,
    /// Returned from its kernel.
    Finished,
}

/// Program point of an instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Location {
    pub(crate) func: FuncId,
    pub(crate) block: BlockId,
    pub(crate) index: usize,
}

/// What a parked work-item is waiting for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BarrierRequest {
    pub(crate) location: Location,
    pub(crate) fence: FenceFlags,
    pub(crate) events: Vec<u64>,
}

#[derive(Clone, Debug)]
struct Frame {
    func: FuncId,
    block: BlockId,
    prev_block: Option<BlockId>,
    next: usize,
    args: Vec<TypedValue>,
    values: Vec<Option<TypedValue>>,
    ret_to: Option<ValueId>,
    allocas: Vec<Address>,
}

impl Frame {
    fn new(func: FuncId, function: &Function, args: Vec<TypedValue>, ret_to: Option<ValueId>) -> Self {
        Self {
            func,
            block: BlockId(0),
            prev_block: None,
            next: 0,
            args,
            values: vec![None; function.value_count as usize],
            ret_to,
            allocas: Vec::new(),
        }
    }

    fn set(&mut self, id: ValueId, value: TypedValue) -> Result<(), SimError> {
        let slot = self
            .values
            .get_mut(id.0 as usize)
            .ok_or(SimError::UndefinedValue { value: id })?;
        *slot = Some(value);
        Ok(())
    }
}

/// One logical thread of a kernel invocation.
#[derive(Debug)]
pub(crate) struct WorkItem {
    ids: ItemIds,
    local_index: usize,
    state: WorkItemState,
    private: Memory,
    globals: Vec<Address>,
    current: Frame,
    callers: Vec<Frame>,
    phis: Vec<(ValueId, TypedValue)>,
    steps: u64,
    barrier: Option<BarrierRequest>,
}

impl WorkItem {
    /// Creates a work-item about to execute `kernel` with bound `args`.
    ///
    /// `shared_globals` holds the addresses of program-scope variables that live outside private
    /// memory; private ones (`None`) are materialized here.
    pub(crate) fn new(
        ids: ItemIds,
        local_index: usize,
        program: &Program,
        kernel: FuncId,
        args: Vec<TypedValue>,
        shared_globals: &[Option<Address>],
    ) -> Result<Self, SimError> {
        let function = program
            .function(kernel)
            .ok_or(SimError::BadFunction { func: kernel })?;
        let mut private = Memory::new(AddressSpace::Private);
        let mut globals = Vec::with_capacity(shared_globals.len());
        for (var, shared) in program.globals.iter().zip(shared_globals) {
            let address = match shared {
                Some(address) => *address,
                None => materialize_global(&mut private, AddressSpace::Private, var)?,
            };
            globals.push(address);
        }
        Ok(Self {
            ids,
            local_index,
            state: WorkItemState::Ready,
            private,
            globals,
            current: Frame::new(kernel, function, args, None),
            callers: Vec::new(),
            phis: Vec::new(),
            steps: 0,
            barrier: None,
        })
    }

    pub(crate) fn ids(&self) -> &ItemIds {
        &self.ids
    }

    pub(crate) fn state(&self) -> WorkItemState {
        self.state
    }

    /// Instructions executed so far.
    pub(crate) fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn barrier(&self) -> Option<&BarrierRequest> {
        self.barrier.as_ref()
    }

    /// Resumes a work-item parked at a released barrier.
    pub(crate) fn release(&mut self) {
        if self.state == WorkItemState::Barrier {
            self.state = WorkItemState::Ready;
            self.barrier = None;
        }
    }

    /// Executes one instruction.
    pub(crate) fn step(&mut self, exec: &mut Exec<'_, '_>) -> Result<(), SimError> {
        if self.state != WorkItemState::Ready {
            return Ok(());
        }
        let program = exec.program;
        let func = self.current.func;
        let instr = program
            .function(func)
            .and_then(|f| f.block(self.current.block))
            .and_then(|b| b.instrs.get(self.current.next))
            .ok_or(SimError::BadFunction { func })?;

        self.steps += 1;
        if let Some(limit) = exec.config.max_steps_per_work_item {
            if self.steps > limit {
                return Err(SimError::StuckKernel {
                    group: self.ids.group_id,
                    reason: StuckReason::StepLimit {
                        local_id: self.ids.local_id,
                        limit,
                    },
                });
            }
        }
        if !matches!(instr.op, Op::Phi { .. }) {
            for (id, value) in core::mem::take(&mut self.phis) {
                self.current.set(id, value)?;
            }
        }
        self.current.next += 1;
        tracing::trace!(opcode = %instr.op.opcode(), "dispatch");

        let mut ctx = Ctx { item: self, exec };
        let result = ctx.execute(instr)?;
        if let Some(o) = ctx.exec.notify.wants(EventMask::INSTRUCTION) {
            o.instruction_executed(&ctx.item.ids, instr, result.as_ref());
        }
        if let (Some(id), Some(value)) = (instr.result, result) {
            ctx.item.current.set(id, value)?;
        }

        if ctx.item.state == WorkItemState::Finished {
            if let Some(o) = ctx.exec.notify.wants(EventMask::WORK_ITEM) {
                o.work_item_end(&ctx.item.ids);
            }
        } else if ctx.item.barrier.is_some() {
            ctx.item.state = WorkItemState::Barrier;
        }
        Ok(())
    }

    /// Runs until the work-item finishes or parks at a barrier.
    pub(crate) fn run(&mut self, exec: &mut Exec<'_, '_>) -> Result<(), SimError> {
        while self.state == WorkItemState::Ready {
            self.step(exec)?;
        }
        Ok(())
    }
}

/// Shared state a work-item executes against.
pub(crate) struct Exec<'a, 'o> {
    pub(crate) program: &'a Program,
    pub(crate) builtins: &'a BuiltinTable,
    pub(crate) config: &'a SimConfig,
    pub(crate) ndrange: &'a NdRange,
    pub(crate) global: &'a mut Memory,
    pub(crate) group: &'a mut GroupShared,
    pub(crate) notify: &'a mut Notifier<'o>,
}

/// A work-item plus everything it can reach; what builtin handlers receive.
pub(crate) struct Ctx<'c, 'a, 'o> {
    pub(crate) item: &'c mut WorkItem,
    pub(crate) exec: &'c mut Exec<'a, 'o>,
}

impl Ctx<'_, '_, '_> {
    pub(crate) fn ids(&self) -> &ItemIds {
        &self.item.ids
    }

    pub(crate) fn ndrange(&self) -> &NdRange {
        self.exec.ndrange
    }

    pub(crate) fn group_size(&self) -> Size3 {
        self.exec.group.group_size
    }

    /// Location of the instruction being executed.
    pub(crate) fn location(&self) -> Location {
        Location {
            func: self.item.current.func,
            block: self.item.current.block,
            index: self.item.current.next.saturating_sub(1),
        }
    }

    fn memory(&mut self, space: AddressSpace) -> &mut Memory {
        match space {
            AddressSpace::Private => &mut self.item.private,
            AddressSpace::Local => &mut self.exec.group.local,
            AddressSpace::Global | AddressSpace::Constant => self.exec.global,
        }
    }

    pub(crate) fn diagnostic(&mut self, diagnostic: Diagnostic) {
        self.exec.notify.diagnostic(Some(&self.item.ids), &diagnostic);
    }

    fn check_alignment(&mut self, kind: AccessKind, address: Address, align: u64) {
        if self.exec.config.check_alignment && Memory::check_alignment(address, align).is_err() {
            self.diagnostic(Diagnostic::Misaligned {
                kind,
                address,
                align,
            });
        }
    }

    /// Loads `size` bytes at `address`, reporting misalignment, invalid accesses, and (when
    /// enabled) uninitialized bytes. Returns `None` if nothing could be read.
    pub(crate) fn load(&mut self, address: Address, size: u64, align: u64) -> Option<Vec<u8>> {
        self.check_alignment(AccessKind::Load, address, align);
        self.read(AccessKind::Load, address, size)
    }

    fn read(&mut self, kind: AccessKind, address: Address, size: u64) -> Option<Vec<u8>> {
        let track = self.exec.config.track_uninitialized;
        let memory = self.memory(address.space());
        let loaded = memory.load(address, size).map(|bytes| {
            let uninitialized = track && !memory.is_initialized(address, size).unwrap_or(true);
            (bytes, uninitialized)
        });
        match loaded {
            Ok((bytes, uninitialized)) => {
                if uninitialized {
                    self.diagnostic(Diagnostic::UninitializedRead { address, size });
                }
                self.exec.notify.load(Some(&self.item.ids), address, size);
                Some(bytes)
            }
            Err(error) => {
                self.diagnostic(Diagnostic::InvalidAccess { kind, error });
                None
            }
        }
    }

    /// Stores `bytes` at `address`. Returns `false` (after reporting) if the store was skipped.
    pub(crate) fn store(&mut self, address: Address, bytes: &[u8], align: u64) -> bool {
        self.check_alignment(AccessKind::Store, address, align);
        self.write(AccessKind::Store, address, bytes)
    }

    fn write(&mut self, kind: AccessKind, address: Address, bytes: &[u8]) -> bool {
        match self.memory(address.space()).store(address, bytes) {
            Ok(()) => {
                self.exec.notify.store(Some(&self.item.ids), address, bytes);
                true
            }
            Err(error) => {
                self.diagnostic(Diagnostic::InvalidAccess { kind, error });
                false
            }
        }
    }

    /// Copies `size` bytes between any two address spaces.
    pub(crate) fn copy(&mut self, dst: Address, src: Address, size: u64) {
        if let Some(bytes) = self.read(AccessKind::Copy, src, size) {
            self.write(AccessKind::Copy, dst, &bytes);
        }
    }

    /// Fills `size` bytes at `address` with `byte`.
    pub(crate) fn fill(&mut self, address: Address, byte: u8, size: u64) {
        match self.memory(address.space()).fill(address, byte, size) {
            Ok(()) => {
                if let Some(o) = self.exec.notify.wants(EventMask::MEMORY) {
                    let data = vec![byte; usize::try_from(size).unwrap_or(0)];
                    o.memory_store(Some(&self.item.ids), address, &data);
                }
            }
            Err(error) => self.diagnostic(Diagnostic::InvalidAccess {
                kind: AccessKind::Copy,
                error,
            }),
        }
    }

    /// Atomic read-modify-write; returns the prior value (0 if the access was invalid).
    ///
    /// A misaligned address is reported and the operation is still performed.
    pub(crate) fn atomic(
        &mut self,
        op: AtomicOp,
        address: Address,
        width: usize,
        signedness: Signedness,
        operand: u64,
        compare: u64,
    ) -> u64 {
        let size = width as u64;
        if Memory::check_alignment(address, size).is_err() {
            self.diagnostic(Diagnostic::Misaligned {
                kind: AccessKind::Atomic,
                address,
                align: size,
            });
        }
        let memory = self.memory(address.space());
        match memory.atomic(op, address, width, signedness, operand, compare) {
            Ok(old) => {
                if let Some(o) = self.exec.notify.wants(EventMask::MEMORY) {
                    o.memory_atomic(&self.item.ids, op, address, size);
                }
                old
            }
            Err(error) => {
                self.diagnostic(Diagnostic::InvalidAccess {
                    kind: AccessKind::Atomic,
                    error,
                });
                0
            }
        }
    }

    /// Reads a NUL-terminated string, stopping early at the end of the buffer.
    pub(crate) fn read_c_string(&mut self, address: Address) -> String {
        let memory = self.memory(address.space());
        let mut bytes = Vec::new();
        let mut cursor = address;
        let mut byte = [0_u8; 1];
        while memory.load_into(cursor, &mut byte).is_ok() && byte[0] != 0 {
            bytes.push(byte[0]);
            cursor = cursor.offset_by(1);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Sends kernel output to the observer.
    pub(crate) fn output(&mut self, text: &str) {
        if let Some(o) = self.exec.notify.wants(EventMask::OUTPUT) {
            o.output(text);
        }
    }

    /// Parks the work-item after the current instruction.
    pub(crate) fn suspend(&mut self, fence: FenceFlags, events: Vec<u64>) {
        let location = self.location();
        self.item.barrier = Some(BarrierRequest {
            location,
            fence,
            events,
        });
    }

    /// Registers an async copy with the work-group and returns its event.
    pub(crate) fn register_copy(&mut self, request: CopyRequest) -> u64 {
        let (event, divergent) = self
            .exec
            .group
            .register_copy(self.item.local_index, request);
        if let Some(field) = divergent {
            self.diagnostic(Diagnostic::AsyncCopyDivergence { field });
        }
        event
    }

    /// Returns `true` if `event` names an outstanding async copy.
    pub(crate) fn has_event(&self, event: u64) -> bool {
        self.exec.group.has_event(event)
    }

    pub(crate) fn trap(&self) -> SimError {
        SimError::Trap {
            global_id: self.item.ids.global_id,
        }
    }

    fn operand(&self, operand: &Operand) -> Result<TypedValue, SimError> {
        match operand {
            Operand::Value(id) => self
                .item
                .current
                .values
                .get(id.0 as usize)
                .and_then(Clone::clone)
                .ok_or(SimError::UndefinedValue { value: *id }),
            Operand::Arg(index) => self
                .item
                .current
                .args
                .get(*index as usize)
                .cloned()
                .ok_or(SimError::InvalidArgument {
                    index: *index as usize,
                    reason: "argument not bound",
                }),
            Operand::Const(value) => Ok(value.clone()),
            Operand::Global(global) => self
                .item
                .globals
                .get(global.0 as usize)
                .map(|address| TypedValue::from_address(*address))
                .ok_or(SimError::UnknownGlobal { global: *global }),
        }
    }

    fn jump(&mut self, target: BlockId) {
        let frame = &mut self.item.current;
        frame.prev_block = Some(frame.block);
        frame.block = target;
        frame.next = 0;
    }

    fn execute(&mut self, instr: &Instr) -> Result<Option<TypedValue>, SimError> {
        let ty = &instr.ty;
        let value = match &instr.op {
            Op::Binary { op, lhs, rhs } => {
                arith::binary(*op, ty, &self.operand(lhs)?, &self.operand(rhs)?)
            }
            Op::FNeg { value } => arith::fneg(&self.operand(value)?),
            Op::ICmp {
                pred,
                lhs,
                rhs,
                operand_ty,
            } => arith::icmp(*pred, operand_ty, ty, &self.operand(lhs)?, &self.operand(rhs)?),
            Op::FCmp { pred, lhs, rhs } => {
                arith::fcmp(*pred, ty, &self.operand(lhs)?, &self.operand(rhs)?)
            }
            Op::Cast { op, value, from } => {
                let out = arith::cast(*op, from, ty, &self.operand(value)?);
                if *op == CastOp::IntToPtr {
                    self.check_pointer_cast(ty, &out);
                }
                out
            }
            Op::Select {
                cond,
                if_true,
                if_false,
            } => arith::select(
                &self.operand(cond)?,
                &self.operand(if_true)?,
                &self.operand(if_false)?,
            ),
            Op::Alloca { allocated } => self.alloca(allocated)?,
            Op::Load { ptr, align } => {
                let address = self.operand(ptr)?.get_address(0);
                let shape = ty.shape();
                let align = if *align == 0 {
                    ty.align() as u64
                } else {
                    u64::from(*align)
                };
                match self.load(address, shape.bytes() as u64, align) {
                    Some(bytes) => TypedValue::from_bytes(shape.lane_size, shape.lanes, &bytes),
                    None => TypedValue::with_shape(shape),
                }
            }
            Op::Store {
                value,
                ptr,
                value_ty,
                align,
            } => {
                let value = self.operand(value)?;
                let address = self.operand(ptr)?.get_address(0);
                let align = if *align == 0 {
                    value_ty.align() as u64
                } else {
                    u64::from(*align)
                };
                self.store(address, value.bytes(), align);
                return Ok(None);
            }
            Op::Gep {
                base,
                source,
                indices,
            } => self.gep(base, source, indices)?,
            Op::ExtractElement { vector, index } => {
                let index = self.operand(index)?.get_u(0);
                arith::extract_element(ty, &self.operand(vector)?, index)
            }
            Op::InsertElement {
                vector,
                element,
                index,
            } => {
                let index = self.operand(index)?.get_u(0);
                arith::insert_element(&self.operand(vector)?, &self.operand(element)?, index)
            }
            Op::ShuffleVector { lhs, rhs, mask } => {
                arith::shuffle(ty, &self.operand(lhs)?, &self.operand(rhs)?, mask)
            }
            Op::ExtractValue {
                aggregate,
                aggregate_ty,
                indices,
            } => arith::extract_value(ty, aggregate_ty, &self.operand(aggregate)?, indices),
            Op::InsertValue {
                aggregate,
                element,
                aggregate_ty,
                indices,
            } => arith::insert_value(
                aggregate_ty,
                &self.operand(aggregate)?,
                &self.operand(element)?,
                indices,
            ),
            Op::Phi { incoming } => {
                let Some(id) = instr.result else {
                    return Ok(None);
                };
                let prev = self.item.current.prev_block;
                let (_, operand) = incoming
                    .iter()
                    .find(|(block, _)| Some(*block) == prev)
                    .ok_or(SimError::UndefinedValue { value: id })?;
                let value = self.operand(operand)?;
                self.item.phis.push((id, value));
                return Ok(None);
            }
            Op::Call { callee, args } => return self.call(instr, callee, args),
            Op::Br { target } => {
                self.jump(*target);
                return Ok(None);
            }
            Op::CondBr {
                cond,
                if_true,
                if_false,
            } => {
                let taken = self.operand(cond)?.get_u(0) & 1 != 0;
                self.jump(if taken { *if_true } else { *if_false });
                return Ok(None);
            }
            Op::Switch {
                value,
                default,
                cases,
            } => {
                let value = self.operand(value)?;
                let mask = arith::mask(u32::try_from(value.lane_size() * 8).unwrap_or(64));
                let selector = value.get_u(0) & mask;
                let target = cases
                    .iter()
                    .find(|(case, _)| case & mask == selector)
                    .map_or(*default, |(_, block)| *block);
                self.jump(target);
                return Ok(None);
            }
            Op::Ret { value } => {
                let value = value.as_ref().map(|v| self.operand(v)).transpose()?;
                self.ret(value)?;
                return Ok(None);
            }
            Op::Unreachable => {
                return Err(SimError::Unreachable {
                    global_id: self.item.ids.global_id,
                });
            }
            Op::Unsupported { name } => {
                self.diagnostic(Diagnostic::UnsupportedInstruction {
                    opcode: name.clone(),
                });
                TypedValue::zero_of(ty)
            }
        };
        Ok(Some(value))
    }

    fn check_pointer_cast(&mut self, ty: &Type, value: &TypedValue) {
        if !self.exec.config.check_alignment {
            return;
        }
        let align = ty.element().map_or(1, Type::align) as u64;
        let address = value.get_address(0);
        if !address.is_null() && Memory::check_alignment(address, align).is_err() {
            self.diagnostic(Diagnostic::InvalidPointerCast { address, align });
        }
    }

    fn alloca(&mut self, allocated: &Type) -> Result<TypedValue, SimError> {
        let size = allocated.size() as u64;
        let address = self.item.private.allocate(size)?;
        self.item.current.allocas.push(address);
        self.exec
            .notify
            .allocated(AddressSpace::Private, address, size);
        Ok(TypedValue::from_address(address))
    }

    fn gep(
        &self,
        base: &Operand,
        source: &Type,
        indices: &[Operand],
    ) -> Result<TypedValue, SimError> {
        let address = self.operand(base)?.get_address(0);
        let mut offset = 0_i64;
        let mut ty = source;
        for (n, index) in indices.iter().enumerate() {
            let index = self.operand(index)?.get_s(0);
            if n == 0 {
                offset = offset.wrapping_add(index.wrapping_mul(source.size() as i64));
                continue;
            }
            let member = usize::try_from(index).unwrap_or(0);
            let step = match ty {
                Type::Struct { .. } => ty.field_offset(member) as i64,
                _ => ty
                    .element()
                    .map_or(0, |elem| elem.size() as i64)
                    .wrapping_mul(index),
            };
            offset = offset.wrapping_add(step);
            match ty.field(member) {
                Some(next) => ty = next,
                None => break,
            }
        }
        Ok(TypedValue::from_address(address.offset_by(offset)))
    }

    fn call(
        &mut self,
        instr: &Instr,
        callee: &Callee,
        params: &[CallArg],
    ) -> Result<Option<TypedValue>, SimError> {
        let args = params
            .iter()
            .map(|arg| self.operand(&arg.value))
            .collect::<Result<Vec<_>, _>>()?;
        match callee {
            Callee::Function(func) => {
                let program = self.exec.program;
                let function = program
                    .function(*func)
                    .ok_or(SimError::BadFunction { func: *func })?;
                let frame = Frame::new(*func, function, args, instr.result);
                let caller = core::mem::replace(&mut self.item.current, frame);
                self.item.callers.push(caller);
                Ok(None)
            }
            Callee::External(symbol) => {
                let (name, overload) = demangle(symbol);
                let builtins = self.exec.builtins;
                let builtin = builtins
                    .resolve(name)
                    .ok_or_else(|| SimError::UnknownBuiltin { name: name.into() })?;
                let call = BuiltinCall {
                    name,
                    overload,
                    args: &args,
                    params,
                    ret_ty: &instr.ty,
                    aux: builtin.aux,
                };
                let mut result = TypedValue::zero_of(&instr.ty);
                (builtin.handler)(self, &call, &mut result)?;
                Ok(Some(result))
            }
        }
    }

    fn ret(&mut self, value: Option<TypedValue>) -> Result<(), SimError> {
        for address in core::mem::take(&mut self.item.current.allocas) {
            if self.item.private.free(address).is_ok() {
                self.exec.notify.freed(AddressSpace::Private, address);
            }
        }
        match self.item.callers.pop() {
            Some(caller) => {
                let callee = core::mem::replace(&mut self.item.current, caller);
                if let (Some(id), Some(value)) = (callee.ret_to, value) {
                    self.item.current.set(id, value)?;
                }
            }
            None => self.item.state = WorkItemState::Finished,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::builder::{FunctionBuilder, ProgramBuilder};
    use crate::program::{BinOp, IntPredicate};
    use crate::work_group::GroupShared;

    struct Harness {
        program: Program,
        builtins: BuiltinTable,
        config: SimConfig,
        ndrange: NdRange,
        global: Memory,
        group: GroupShared,
    }

    impl Harness {
        fn new(program: Program) -> Self {
            let ndrange = NdRange::new_1d(1, 1);
            Self {
                program,
                builtins: BuiltinTable::standard(),
                config: SimConfig::default(),
                ndrange,
                global: Memory::new(AddressSpace::Global),
                group: GroupShared::new(Size3::default(), Size3::new(1, 1, 1)),
            }
        }

        fn run(&mut self, args: Vec<TypedValue>) -> Result<WorkItem, SimError> {
            let kernel = FuncId(0);
            let mut item = WorkItem::new(ItemIds::default(), 0, &self.program, kernel, args, &[])?;
            let mut notify = Notifier::new(None);
            let mut exec = Exec {
                program: &self.program,
                builtins: &self.builtins,
                config: &self.config,
                ndrange: &self.ndrange,
                global: &mut self.global,
                group: &mut self.group,
                notify: &mut notify,
            };
            item.run(&mut exec)?;
            Ok(item)
        }
    }

    fn single(f: FunctionBuilder) -> Program {
        let mut p = ProgramBuilder::new();
        p.add_function(f).unwrap();
        p.finish().unwrap()
    }

    #[test]
    fn loop_with_phis_sums_range() {
        // out[0] = sum(0..10)
        let ptr = Type::ptr(AddressSpace::Global, Type::I32);
        let mut f = FunctionBuilder::kernel("sum", [ptr]);
        let entry = f.current_block();
        let body = f.new_block();
        let exit = f.new_block();
        f.br(body);
        f.switch_to(body);
        let i = f.phi(Type::I32, alloc::vec![(entry, Operand::i32(0))]);
        let acc = f.phi(Type::I32, alloc::vec![(entry, Operand::i32(0))]);
        let acc2 = f.binary(BinOp::Add, Type::I32, acc.clone(), i.clone());
        let i2 = f.binary(BinOp::Add, Type::I32, i.clone(), Operand::i32(1));
        let more = f.icmp(IntPredicate::Slt, Type::I32, i2.clone(), Operand::i32(10));
        f.add_incoming(&i, body, i2);
        f.add_incoming(&acc, body, acc2.clone());
        f.cond_br(more, body, exit);
        f.switch_to(exit);
        f.store(Type::I32, acc2, f.arg(0));
        f.ret_void();

        let mut h = Harness::new(single(f));
        let out = h.global.allocate(4).unwrap();
        let item = h.run(alloc::vec![TypedValue::from_address(out)]).unwrap();
        assert_eq!(item.state(), WorkItemState::Finished);
        assert_eq!(h.global.load(out, 4).unwrap(), 45_i32.to_le_bytes(), "0 + 1 + ... + 9");
    }

    #[test]
    fn calls_push_and_pop_frames() {
        let mut p = ProgramBuilder::new();
        let kernel_id = p.next_function_id();
        let helper_id = FuncId(kernel_id.0 + 1);
        let ptr = Type::ptr(AddressSpace::Global, Type::I32);
        let mut k = FunctionBuilder::kernel("k", [ptr]);
        let r = k.call(helper_id, Type::I32, [(Operand::i32(20), Type::I32)]);
        k.store(Type::I32, r, k.arg(0));
        k.ret_void();
        p.add_function(k).unwrap();

        let mut h = FunctionBuilder::function("twice_plus_one", [Type::I32]);
        let slot = h.alloca(Type::I32);
        let d = h.binary(BinOp::Mul, Type::I32, h.arg(0), Operand::i32(2));
        h.store(Type::I32, d, slot.clone());
        let v = h.load(Type::I32, slot);
        let v = h.binary(BinOp::Add, Type::I32, v, Operand::i32(1));
        h.ret(v);
        p.add_function(h).unwrap();

        let mut harness = Harness::new(p.finish().unwrap());
        let out = harness.global.allocate(4).unwrap();
        let item = harness
            .run(alloc::vec![TypedValue::from_address(out)])
            .unwrap();
        assert_eq!(harness.global.load(out, 4).unwrap(), 41_i32.to_le_bytes());
        assert_eq!(item.private.live_buffers(), 0, "allocas are freed on return");
    }

    #[test]
    fn step_limit_reports_stuck_kernel() {
        let mut f = FunctionBuilder::kernel("spin", []);
        let body = f.new_block();
        f.br(body);
        f.switch_to(body);
        f.br(body);
        let mut h = Harness::new(single(f));
        h.config = SimConfig::default().with_max_steps(100);
        let err = h.run(Vec::new()).unwrap_err();
        assert!(
            matches!(
                err,
                SimError::StuckKernel {
                    reason: StuckReason::StepLimit { limit: 100, .. },
                    ..
                }
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn unreachable_is_fatal() {
        let mut f = FunctionBuilder::kernel("bad", []);
        f.unreachable();
        let mut h = Harness::new(single(f));
        assert!(matches!(
            h.run(Vec::new()),
            Err(SimError::Unreachable { .. })
        ));
    }

    #[test]
    fn unknown_builtin_is_fatal() {
        let mut f = FunctionBuilder::kernel("bad", []);
        f.call_builtin("frobnicate", "i", Type::I32, [(Operand::i32(1), Type::I32)]);
        f.ret_void();
        let mut h = Harness::new(single(f));
        assert_eq!(
            h.run(Vec::new()).unwrap_err(),
            SimError::UnknownBuiltin {
                name: "frobnicate".into()
            }
        );
    }

    #[test]
    fn out_of_bounds_load_yields_zero() {
        let ptr = Type::ptr(AddressSpace::Global, Type::I32);
        let mut f = FunctionBuilder::kernel("oob", [ptr.clone(), ptr]);
        let p = f.gep(Type::I8, f.arg(0), [Operand::i32(8)]);
        let v = f.load(Type::I32, p);
        f.store(Type::I32, v, f.arg(1));
        f.ret_void();
        let mut h = Harness::new(single(f));
        let src = h.global.allocate(10).unwrap();
        h.global.store(src, &[0xff; 10]).unwrap();
        let dst = h.global.allocate(4).unwrap();
        h.global.store(dst, &[7; 4]).unwrap();
        h.run(alloc::vec![
            TypedValue::from_address(src),
            TypedValue::from_address(dst)
        ])
        .unwrap();
        assert_eq!(h.global.load(dst, 4).unwrap(), [0; 4], "failed load reads as zero");
    }

    #[test]
    fn size3_linear_and_display() {
        let size = Size3::new(4, 3, 2);
        assert_eq!(size.volume(), Some(24));
        assert_eq!(Size3::new(1, 2, 1).linear_in(size), 21);
        assert_eq!(size.get(3), None);
        assert_eq!(std::format!("{size}"), "(4,3,2)");
    }
}
