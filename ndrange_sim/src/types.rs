// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static types of kernel values.
//!
//! Types determine how many bytes an instruction result occupies and how those bytes are split
//! into lanes. Three-element vectors are the one irregular case: they hold three lanes of data but
//! occupy the storage (and alignment) of four.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

/// A kernel-language address space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressSpace {
    /// Per-work-item memory (`__private`).
    Private = 0,
    /// Device-wide memory (`__global`).
    Global = 1,
    /// Device-wide read-only memory (`__constant`).
    Constant = 2,
    /// Per-work-group memory (`__local`).
    Local = 3,
}

impl AddressSpace {
    /// All address spaces, in tag order.
    pub const ALL: [Self; 4] = [Self::Private, Self::Global, Self::Constant, Self::Local];

    /// Returns the 2-bit tag stored in an [`Address`](crate::Address).
    #[must_use]
    #[inline]
    pub const fn tag(self) -> u64 {
        self as u64
    }

    /// Decodes a 2-bit address-space tag.
    #[must_use]
    #[inline]
    pub const fn from_tag(tag: u64) -> Self {
        match tag & 0b11 {
            0 => Self::Private,
            1 => Self::Global,
            2 => Self::Constant,
            _ => Self::Local,
        }
    }

    /// Returns a short lowercase name (`"global"`, `"local"`, ...).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Global => "global",
            Self::Constant => "constant",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lane layout of a value: `lanes` lanes of `lane_size` bytes each.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValueShape {
    /// Bytes per lane.
    pub lane_size: usize,
    /// Number of lanes.
    pub lanes: usize,
}

impl ValueShape {
    /// Total number of data bytes.
    #[must_use]
    #[inline]
    pub const fn bytes(self) -> usize {
        self.lane_size * self.lanes
    }
}

/// A static kernel type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value.
    Void,
    /// Integer of the given bit width (1, 8, 16, 32, or 64).
    Int(u32),
    /// IEEE-754 binary16.
    Half,
    /// IEEE-754 binary32.
    Float,
    /// IEEE-754 binary64.
    Double,
    /// Pointer into an address space.
    Ptr {
        /// Address space the pointer refers to.
        space: AddressSpace,
        /// Pointee type (used for GEP strides and typed loads).
        pointee: Box<Type>,
    },
    /// Fixed-length vector of scalars.
    Vector {
        /// Element type.
        elem: Box<Type>,
        /// Element count (2, 3, 4, 8, or 16).
        len: u32,
    },
    /// Fixed-length array.
    Array {
        /// Element type.
        elem: Box<Type>,
        /// Element count.
        len: u32,
    },
    /// Structure with naturally aligned fields.
    Struct {
        /// Field types, in declaration order.
        fields: Vec<Type>,
    },
}

impl Type {
    /// `i1`.
    pub const BOOL: Self = Self::Int(1);
    /// `i8`.
    pub const I8: Self = Self::Int(8);
    /// `i16`.
    pub const I16: Self = Self::Int(16);
    /// `i32`.
    pub const I32: Self = Self::Int(32);
    /// `i64`.
    pub const I64: Self = Self::Int(64);

    /// Pointer to `pointee` in `space`.
    #[must_use]
    pub fn ptr(space: AddressSpace, pointee: Self) -> Self {
        Self::Ptr {
            space,
            pointee: Box::new(pointee),
        }
    }

    /// Vector of `len` elements.
    #[must_use]
    pub fn vector(elem: Self, len: u32) -> Self {
        Self::Vector {
            elem: Box::new(elem),
            len,
        }
    }

    /// Array of `len` elements.
    #[must_use]
    pub fn array(elem: Self, len: u32) -> Self {
        Self::Array {
            elem: Box::new(elem),
            len,
        }
    }

    /// Returns `true` for `half`, `float`, `double` and vectors of them.
    #[must_use]
    pub fn is_float(&self) -> bool {
        match self {
            Self::Half | Self::Float | Self::Double => true,
            Self::Vector { elem, .. } => elem.is_float(),
            _ => false,
        }
    }

    /// Returns `true` for pointers and vectors of pointers.
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        match self {
            Self::Ptr { .. } => true,
            Self::Vector { elem, .. } => elem.is_pointer(),
            _ => false,
        }
    }

    /// Returns `true` for vector types.
    #[must_use]
    pub const fn is_vector(&self) -> bool {
        matches!(self, Self::Vector { .. })
    }

    /// Scalar bit width of an integer type or integer vector element.
    #[must_use]
    pub fn int_bits(&self) -> Option<u32> {
        match self {
            Self::Int(bits) => Some(*bits),
            Self::Vector { elem, .. } => elem.int_bits(),
            _ => None,
        }
    }

    /// Address space of a pointer (or vector of pointers).
    #[must_use]
    pub fn address_space(&self) -> Option<AddressSpace> {
        match self {
            Self::Ptr { space, .. } => Some(*space),
            Self::Vector { elem, .. } => elem.address_space(),
            _ => None,
        }
    }

    /// Pointee of a pointer, element of a vector or array.
    #[must_use]
    pub fn element(&self) -> Option<&Self> {
        match self {
            Self::Ptr { pointee, .. } => Some(pointee),
            Self::Vector { elem, .. } | Self::Array { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// Vector length, or 1 for non-vector types.
    #[must_use]
    pub const fn vector_len(&self) -> u32 {
        match self {
            Self::Vector { len, .. } => *len,
            _ => 1,
        }
    }

    /// Storage size in bytes.
    ///
    /// A three-element vector reports the size of four elements.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Void => 0,
            Self::Int(bits) => (*bits as usize).div_ceil(8).max(1),
            Self::Half => 2,
            Self::Float => 4,
            Self::Double | Self::Ptr { .. } => 8,
            Self::Vector { elem, len } => {
                let len = if *len == 3 { 4 } else { *len as usize };
                elem.size() * len
            }
            Self::Array { elem, len } => elem.size() * (*len as usize),
            Self::Struct { fields } => {
                let mut offset = 0_usize;
                for field in fields {
                    offset = offset.next_multiple_of(field.align()) + field.size();
                }
                offset.next_multiple_of(self.align())
            }
        }
    }

    /// Natural alignment in bytes.
    #[must_use]
    pub fn align(&self) -> usize {
        match self {
            Self::Void => 1,
            Self::Vector { .. } => self.size(),
            Self::Array { elem, .. } => elem.align(),
            Self::Struct { fields } => fields.iter().map(Self::align).max().unwrap_or(1),
            scalar => scalar.size(),
        }
    }

    /// Byte offset of field `index` within a struct, or of element `index` within an array or
    /// vector.
    #[must_use]
    pub fn field_offset(&self, index: usize) -> usize {
        match self {
            Self::Struct { fields } => {
                let mut offset = 0_usize;
                for (i, field) in fields.iter().enumerate() {
                    offset = offset.next_multiple_of(field.align());
                    if i == index {
                        return offset;
                    }
                    offset += field.size();
                }
                offset
            }
            Self::Array { elem, .. } | Self::Vector { elem, .. } => elem.size() * index,
            _ => 0,
        }
    }

    /// Type of field `index` of a struct, or the element type of an array or vector.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Self> {
        match self {
            Self::Struct { fields } => fields.get(index),
            Self::Array { elem, .. } | Self::Vector { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// Lane layout used for values of this type.
    ///
    /// Pointers are 8-byte lanes, `i1` is a 1-byte lane, three-element vectors have three lanes,
    /// and arrays and structs are a single lane spanning their whole storage size.
    #[must_use]
    pub fn shape(&self) -> ValueShape {
        match self {
            Self::Void => ValueShape {
                lane_size: 0,
                lanes: 0,
            },
            Self::Vector { elem, len } => ValueShape {
                lane_size: elem.size(),
                lanes: *len as usize,
            },
            other => ValueShape {
                lane_size: other.size(),
                lanes: 1,
            },
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Int(bits) => write!(f, "i{bits}"),
            Self::Half => f.write_str("half"),
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::Ptr { space, pointee } => write!(f, "{pointee} {space}*"),
            Self::Vector { elem, len } => write!(f, "<{len} x {elem}>"),
            Self::Array { elem, len } => write!(f, "[{len} x {elem}]"),
            Self::Struct { fields } => {
                f.write_str("{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str(" }")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn vec3_size_is_four_lanes_but_shape_is_three() {
        let t = Type::vector(Type::Float, 3);
        assert_eq!(t.size(), 16);
        assert_eq!(t.align(), 16);
        assert_eq!(
            t.shape(),
            ValueShape {
                lane_size: 4,
                lanes: 3
            }
        );
    }

    #[test]
    fn struct_layout_pads_fields() {
        let t = Type::Struct {
            fields: alloc::vec![Type::I8, Type::I32, Type::I16],
        };
        assert_eq!(t.field_offset(0), 0);
        assert_eq!(t.field_offset(1), 4);
        assert_eq!(t.field_offset(2), 8);
        assert_eq!(t.size(), 12);
        assert_eq!(t.align(), 4);
    }

    #[test]
    fn bool_and_pointer_shapes() {
        assert_eq!(Type::BOOL.size(), 1);
        let p = Type::ptr(AddressSpace::Global, Type::Float);
        assert_eq!(p.shape().bytes(), 8);
        assert_eq!(p.address_space(), Some(AddressSpace::Global));
    }

    #[test]
    fn address_space_tags_round_trip() {
        for space in AddressSpace::ALL {
            assert_eq!(AddressSpace::from_tag(space.tag()), space);
        }
    }
}
