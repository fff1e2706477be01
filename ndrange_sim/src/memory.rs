// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Byte-addressable memory for one address space.
//!
//! A [`Memory`] is a table of independently sized buffers. Addresses name a buffer index and an
//! offset into it (see [`Address`]), so every access is bounds-checked against exactly one
//! allocation and freed slots can be reused without fragmenting anything.
//!
//! The simulator holds one `Memory` for global and constant data, one per work-group for local
//! data, and one per work-item for private data. Execution inside a group is single-threaded, so
//! an atomic read-modify-write here is indivisible by construction.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{self, Write as _};

use crate::address::{Address, MAX_BUFFER, MAX_OFFSET};
use crate::types::AddressSpace;

/// Memory access failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemoryError {
    /// The requested size is too large, or every buffer slot is in use.
    AllocationFailed {
        /// Requested size in bytes.
        size: u64,
    },
    /// The address names a buffer that is not allocated (including the null buffer).
    InvalidBuffer {
        /// Address accessed.
        address: Address,
    },
    /// `[address, address + size)` is not inside the buffer.
    OutOfBounds {
        /// Address accessed.
        address: Address,
        /// Access size in bytes.
        size: u64,
    },
    /// The address is tagged with a space this memory does not serve.
    WrongSpace {
        /// Address accessed.
        address: Address,
        /// Space this memory serves.
        expected: AddressSpace,
    },
    /// The address is not a multiple of the required alignment.
    Misaligned {
        /// Address accessed.
        address: Address,
        /// Required alignment.
        align: u64,
    },
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed { size } => write!(f, "failed to allocate {size} bytes"),
            Self::InvalidBuffer { address } => write!(f, "invalid buffer at {address:?}"),
            Self::OutOfBounds { address, size } => {
                write!(f, "out-of-bounds access of {size} bytes at {address:?}")
            }
            Self::WrongSpace { address, expected } => {
                write!(f, "address {address:?} is not in {expected} memory")
            }
            Self::Misaligned { address, align } => {
                write!(f, "address {address:?} is not {align}-byte aligned")
            }
        }
    }
}

impl core::error::Error for MemoryError {}

/// Atomic read-modify-write operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AtomicOp {
    /// `old + operand`.
    Add,
    /// `old - operand`.
    Sub,
    /// `old & operand`.
    And,
    /// `old | operand`.
    Or,
    /// `old ^ operand`.
    Xor,
    /// `min(old, operand)`.
    Min,
    /// `max(old, operand)`.
    Max,
    /// `operand`.
    Exchange,
    /// `old == compare ? operand : old`.
    CompareExchange,
    /// `old + 1`.
    Increment,
    /// `old - 1`.
    Decrement,
}

/// Whether min/max compare lanes as signed or unsigned integers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Signedness {
    /// Two's-complement signed.
    Signed,
    /// Unsigned.
    Unsigned,
}

#[derive(Clone, Debug)]
struct Buffer {
    data: Vec<u8>,
    // One bit per byte: set once the byte has been written.
    init: Vec<u64>,
}

impl Buffer {
    fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            init: vec![0; size.div_ceil(64)],
        }
    }

    fn mark_initialized(&mut self, start: usize, len: usize) {
        for i in start..start + len {
            if let Some(word) = self.init.get_mut(i / 64) {
                *word |= 1 << (i % 64);
            }
        }
    }

    fn initialized(&self, start: usize, len: usize) -> bool {
        (start..start + len).all(|i| {
            self.init
                .get(i / 64)
                .is_some_and(|word| word & (1 << (i % 64)) != 0)
        })
    }
}

/// Memory for one address space.
#[derive(Clone, Debug)]
pub struct Memory {
    space: AddressSpace,
    // Slot 0 is permanently empty so that buffer index 0 is the null pointer.
    buffers: Vec<Option<Buffer>>,
    free_slots: Vec<u32>,
    total_allocated: u64,
}

impl Memory {
    /// Creates an empty memory serving `space`.
    ///
    /// A memory created for [`AddressSpace::Global`] also serves [`AddressSpace::Constant`]
    /// addresses.
    #[must_use]
    pub fn new(space: AddressSpace) -> Self {
        Self {
            space,
            buffers: vec![None],
            free_slots: Vec::new(),
            total_allocated: 0,
        }
    }

    /// Address space served by this memory.
    #[must_use]
    #[inline]
    pub fn space(&self) -> AddressSpace {
        self.space
    }

    /// Returns `true` if addresses tagged with `space` resolve here.
    #[must_use]
    pub fn serves(&self, space: AddressSpace) -> bool {
        space == self.space
            || (self.space == AddressSpace::Global && space == AddressSpace::Constant)
    }

    /// Allocates a zero-filled buffer of `size` bytes and returns its base address.
    ///
    /// The returned address carries this memory's space tag. Freed buffer slots are reused.
    pub fn allocate(&mut self, size: u64) -> Result<Address, MemoryError> {
        self.allocate_in(self.space, size)
    }

    /// Like [`Memory::allocate`], tagging the result with `space` (which must be served here).
    pub fn allocate_in(&mut self, space: AddressSpace, size: u64) -> Result<Address, MemoryError> {
        if !self.serves(space) || size > MAX_OFFSET {
            return Err(MemoryError::AllocationFailed { size });
        }
        let len = usize::try_from(size).map_err(|_| MemoryError::AllocationFailed { size })?;
        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                let next = u32::try_from(self.buffers.len()).unwrap_or(u32::MAX);
                if next > MAX_BUFFER {
                    return Err(MemoryError::AllocationFailed { size });
                }
                self.buffers.push(None);
                next
            }
        };
        self.buffers[slot as usize] = Some(Buffer::new(len));
        self.total_allocated += size;
        Ok(Address::new(space, slot, 0))
    }

    /// Allocates a buffer holding a copy of `bytes` (marked initialized).
    pub fn allocate_init(&mut self, space: AddressSpace, bytes: &[u8]) -> Result<Address, MemoryError> {
        let address = self.allocate_in(space, bytes.len() as u64)?;
        self.store(address, bytes)?;
        Ok(address)
    }

    /// Frees the buffer `address` points into.
    pub fn free(&mut self, address: Address) -> Result<(), MemoryError> {
        self.check_space(address)?;
        let slot = address.buffer();
        let entry = self
            .buffers
            .get_mut(slot as usize)
            .filter(|b| b.is_some() && slot != 0)
            .ok_or(MemoryError::InvalidBuffer { address })?;
        if let Some(buffer) = entry.take() {
            self.total_allocated -= buffer.data.len() as u64;
        }
        self.free_slots.push(slot);
        Ok(())
    }

    /// Frees every buffer.
    pub fn clear(&mut self) {
        self.buffers.truncate(1);
        self.free_slots.clear();
        self.total_allocated = 0;
    }

    /// Sum of the sizes of all live buffers.
    #[must_use]
    #[inline]
    pub fn total_allocated(&self) -> u64 {
        self.total_allocated
    }

    /// Number of live buffers.
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }

    /// Size of the buffer `address` points into.
    #[must_use]
    pub fn buffer_size(&self, address: Address) -> Option<u64> {
        if !self.serves(address.space()) {
            return None;
        }
        self.buffer(address.buffer())
            .map(|b| b.data.len() as u64)
    }

    /// Returns an error unless `address` is a multiple of `align`.
    pub fn check_alignment(address: Address, align: u64) -> Result<(), MemoryError> {
        if align > 1 && address.offset() % align != 0 {
            return Err(MemoryError::Misaligned { address, align });
        }
        Ok(())
    }

    /// Reads `size` bytes at `address`.
    pub fn load(&self, address: Address, size: u64) -> Result<Vec<u8>, MemoryError> {
        let (buffer, start, len) = self.resolve(address, size)?;
        Ok(buffer.data[start..start + len].to_vec())
    }

    /// Reads `out.len()` bytes at `address` into `out`.
    pub fn load_into(&self, address: Address, out: &mut [u8]) -> Result<(), MemoryError> {
        let (buffer, start, len) = self.resolve(address, out.len() as u64)?;
        out.copy_from_slice(&buffer.data[start..start + len]);
        Ok(())
    }

    /// Writes `bytes` at `address`.
    pub fn store(&mut self, address: Address, bytes: &[u8]) -> Result<(), MemoryError> {
        let (slot, start, len) = self.locate(address, bytes.len() as u64)?;
        let buffer = self.buffer_mut(slot, address)?;
        buffer.data[start..start + len].copy_from_slice(bytes);
        buffer.mark_initialized(start, len);
        Ok(())
    }

    /// Fills `size` bytes at `address` with `byte`.
    pub fn fill(&mut self, address: Address, byte: u8, size: u64) -> Result<(), MemoryError> {
        let (slot, start, len) = self.locate(address, size)?;
        let buffer = self.buffer_mut(slot, address)?;
        buffer.data[start..start + len].fill(byte);
        buffer.mark_initialized(start, len);
        Ok(())
    }

    /// Copies `size` bytes from `src` to `dst`, both in this memory. Overlap is allowed.
    pub fn copy(&mut self, dst: Address, src: Address, size: u64) -> Result<(), MemoryError> {
        let bytes = self.load(src, size)?;
        self.store(dst, &bytes)
    }

    /// Returns whether every byte of `[address, address + size)` has been written.
    pub fn is_initialized(&self, address: Address, size: u64) -> Result<bool, MemoryError> {
        let (buffer, start, len) = self.resolve(address, size)?;
        Ok(buffer.initialized(start, len))
    }

    /// Atomically applies `op` to the `width`-byte integer at `address` and returns its previous
    /// value (zero-extended).
    ///
    /// `signedness` selects the comparison used by [`AtomicOp::Min`] and [`AtomicOp::Max`];
    /// `compare` is only used by [`AtomicOp::CompareExchange`]. Alignment is checked separately
    /// (see [`Memory::check_alignment`]) so that a misaligned atomic can be reported and still
    /// performed.
    pub fn atomic(
        &mut self,
        op: AtomicOp,
        address: Address,
        width: usize,
        signedness: Signedness,
        operand: u64,
        compare: u64,
    ) -> Result<u64, MemoryError> {
        let width = width.clamp(1, 8);
        let mut raw = [0_u8; 8];
        self.load_into(address, &mut raw[..width])?;
        let old = u64::from_le_bytes(raw);
        let bits = (width * 8) as u32;
        let mask = if bits == 64 { u64::MAX } else { (1 << bits) - 1 };
        let sext = |v: u64| -> i64 {
            let shift = 64 - bits;
            ((v << shift) as i64) >> shift
        };
        let operand = operand & mask;
        let new = match op {
            AtomicOp::Add => old.wrapping_add(operand),
            AtomicOp::Sub => old.wrapping_sub(operand),
            AtomicOp::And => old & operand,
            AtomicOp::Or => old | operand,
            AtomicOp::Xor => old ^ operand,
            AtomicOp::Min => match signedness {
                Signedness::Signed => sext(old).min(sext(operand)) as u64,
                Signedness::Unsigned => old.min(operand),
            },
            AtomicOp::Max => match signedness {
                Signedness::Signed => sext(old).max(sext(operand)) as u64,
                Signedness::Unsigned => old.max(operand),
            },
            AtomicOp::Exchange => operand,
            AtomicOp::CompareExchange => {
                if old == compare & mask {
                    operand
                } else {
                    old
                }
            }
            AtomicOp::Increment => old.wrapping_add(1),
            AtomicOp::Decrement => old.wrapping_sub(1),
        } & mask;
        self.store(address, &new.to_le_bytes()[..width])?;
        Ok(old)
    }

    /// Hex dump of every live buffer, 16 bytes per row.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (slot, buffer) in self.buffers.iter().enumerate() {
            let Some(buffer) = buffer else { continue };
            let _ = writeln!(
                out,
                "{} buffer {slot} ({} bytes):",
                self.space,
                buffer.data.len()
            );
            for (row, chunk) in buffer.data.chunks(16).enumerate() {
                let _ = write!(out, "  {:08x}:", row * 16);
                for byte in chunk {
                    let _ = write!(out, " {byte:02x}");
                }
                out.push('\n');
            }
        }
        out
    }

    fn check_space(&self, address: Address) -> Result<(), MemoryError> {
        if self.serves(address.space()) {
            Ok(())
        } else {
            Err(MemoryError::WrongSpace {
                address,
                expected: self.space,
            })
        }
    }

    fn buffer(&self, slot: u32) -> Option<&Buffer> {
        if slot == 0 {
            return None;
        }
        self.buffers.get(slot as usize).and_then(Option::as_ref)
    }

    fn buffer_mut(&mut self, slot: u32, address: Address) -> Result<&mut Buffer, MemoryError> {
        self.buffers
            .get_mut(slot as usize)
            .and_then(Option::as_mut)
            .ok_or(MemoryError::InvalidBuffer { address })
    }

    // Validates `[address, address + size)` and returns (slot, start, len).
    fn locate(&self, address: Address, size: u64) -> Result<(u32, usize, usize), MemoryError> {
        self.check_space(address)?;
        let slot = address.buffer();
        let buffer = self
            .buffer(slot)
            .ok_or(MemoryError::InvalidBuffer { address })?;
        let end = address.offset().checked_add(size);
        match end {
            Some(end) if end <= buffer.data.len() as u64 => {
                Ok((slot, address.offset() as usize, size as usize))
            }
            _ => Err(MemoryError::OutOfBounds { address, size }),
        }
    }

    fn resolve(&self, address: Address, size: u64) -> Result<(&Buffer, usize, usize), MemoryError> {
        let (slot, start, len) = self.locate(address, size)?;
        let buffer = self
            .buffer(slot)
            .ok_or(MemoryError::InvalidBuffer { address })?;
        Ok((buffer, start, len))
    }
}
