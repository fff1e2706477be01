// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tagged 64-bit device addresses.
//!
//! Layout (most significant bit first):
//!
//! ```text
//! | 63..62 space | 61..46 buffer index | 45..0 byte offset |
//! ```
//!
//! Buffer index 0 is never handed out, so the all-zero address is the null pointer in every space.

use core::fmt;

use crate::types::AddressSpace;

/// Number of bits used for the byte offset.
pub const OFFSET_BITS: u32 = 46;
/// Number of bits used for the buffer index.
pub const BUFFER_BITS: u32 = 16;
/// Largest byte offset representable in an address.
pub const MAX_OFFSET: u64 = (1 << OFFSET_BITS) - 1;
/// Largest buffer index representable in an address.
pub const MAX_BUFFER: u32 = (1 << BUFFER_BITS) - 1;

const SPACE_SHIFT: u32 = OFFSET_BITS + BUFFER_BITS;

/// A device address.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(u64);

impl Address {
    /// The null address.
    pub const NULL: Self = Self(0);

    /// Builds an address from its parts. Out-of-range parts are masked.
    #[must_use]
    #[inline]
    pub const fn new(space: AddressSpace, buffer: u32, offset: u64) -> Self {
        Self(
            (space.tag() << SPACE_SHIFT)
                | (((buffer & MAX_BUFFER) as u64) << OFFSET_BITS)
                | (offset & MAX_OFFSET),
        )
    }

    /// Reinterprets a raw 64-bit pattern as an address.
    #[must_use]
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw 64-bit pattern.
    #[must_use]
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Address-space tag.
    #[must_use]
    #[inline]
    pub const fn space(self) -> AddressSpace {
        AddressSpace::from_tag(self.0 >> SPACE_SHIFT)
    }

    /// Buffer index.
    #[must_use]
    #[inline]
    pub const fn buffer(self) -> u32 {
        ((self.0 >> OFFSET_BITS) as u32) & MAX_BUFFER
    }

    /// Byte offset within the buffer.
    #[must_use]
    #[inline]
    pub const fn offset(self) -> u64 {
        self.0 & MAX_OFFSET
    }

    /// Returns `true` if the buffer index is 0.
    #[must_use]
    #[inline]
    pub const fn is_null(self) -> bool {
        self.buffer() == 0
    }

    /// Moves the offset by `delta` bytes, wrapping within the offset field.
    ///
    /// Space and buffer are preserved, so pointer arithmetic can never walk into another buffer.
    #[must_use]
    #[inline]
    pub const fn offset_by(self, delta: i64) -> Self {
        let offset = self.offset().wrapping_add(delta as u64) & MAX_OFFSET;
        Self((self.0 & !MAX_OFFSET) | offset)
    }

    /// Same buffer and offset, different space tag.
    #[must_use]
    #[inline]
    pub const fn with_space(self, space: AddressSpace) -> Self {
        Self::new(space, self.buffer(), self.offset())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Address({}:{}+{:#x})",
            self.space(),
            self.buffer(),
            self.offset()
        )
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
