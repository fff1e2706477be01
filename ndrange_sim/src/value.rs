// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime value model for `ndrange_sim`.
//!
//! Every operand, instruction result, and builtin return is a [`TypedValue`]: `lanes` lanes of
//! `lane_size` little-endian bytes. The interpretation of a lane (signed, unsigned, float) is
//! chosen by the reader, not stored in the value.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::address::Address;
use crate::half::{RoundingMode, double_to_half, half_to_float};
use crate::types::{Type, ValueShape};

/// A sized, lane-structured value.
///
/// Invariant: `data.len() == lane_size * lanes`.
///
/// Lane accessors never panic: reading a lane that does not exist yields 0, and writing one is
/// ignored.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct TypedValue {
    lane_size: usize,
    lanes: usize,
    data: Vec<u8>,
}

impl TypedValue {
    /// A zero-filled value of `lanes` lanes of `lane_size` bytes.
    #[must_use]
    pub fn new(lane_size: usize, lanes: usize) -> Self {
        Self {
            lane_size,
            lanes,
            data: vec![0; lane_size * lanes],
        }
    }

    /// A zero-filled value with the given shape.
    #[must_use]
    #[inline]
    pub fn with_shape(shape: ValueShape) -> Self {
        Self::new(shape.lane_size, shape.lanes)
    }

    /// A zero-filled value laid out for `ty`.
    #[must_use]
    #[inline]
    pub fn zero_of(ty: &Type) -> Self {
        Self::with_shape(ty.shape())
    }

    /// Copies `bytes` into a new value, zero-padding or truncating to `lane_size * lanes`.
    #[must_use]
    pub fn from_bytes(lane_size: usize, lanes: usize, bytes: &[u8]) -> Self {
        let mut v = Self::new(lane_size, lanes);
        let n = bytes.len().min(v.data.len());
        v.data[..n].copy_from_slice(&bytes[..n]);
        v
    }

    /// A one-byte boolean (`i1`) holding 0 or 1.
    #[must_use]
    pub fn from_bool(b: bool) -> Self {
        Self::from_u(1, u64::from(b))
    }

    /// A scalar unsigned integer of `lane_size` bytes.
    #[must_use]
    pub fn from_u(lane_size: usize, v: u64) -> Self {
        let mut out = Self::new(lane_size, 1);
        out.set_u(0, v);
        out
    }

    /// A scalar signed integer of `lane_size` bytes.
    #[must_use]
    pub fn from_s(lane_size: usize, v: i64) -> Self {
        Self::from_u(lane_size, v as u64)
    }

    /// A scalar float of `lane_size` bytes (2, 4, or 8).
    #[must_use]
    pub fn from_f(lane_size: usize, v: f64) -> Self {
        let mut out = Self::new(lane_size, 1);
        out.set_f(0, v);
        out
    }

    /// A scalar `u32`.
    #[must_use]
    #[inline]
    pub fn from_u32(v: u32) -> Self {
        Self::from_u(4, u64::from(v))
    }

    /// A scalar `i32`.
    #[must_use]
    #[inline]
    pub fn from_i32(v: i32) -> Self {
        Self::from_s(4, i64::from(v))
    }

    /// A scalar `u64`.
    #[must_use]
    #[inline]
    pub fn from_u64(v: u64) -> Self {
        Self::from_u(8, v)
    }

    /// A scalar `f32`.
    #[must_use]
    #[inline]
    pub fn from_f32(v: f32) -> Self {
        Self::from_f(4, f64::from(v))
    }

    /// A scalar `f64`.
    #[must_use]
    #[inline]
    pub fn from_f64(v: f64) -> Self {
        Self::from_f(8, v)
    }

    /// A pointer-sized value holding `address`.
    #[must_use]
    #[inline]
    pub fn from_address(address: Address) -> Self {
        Self::from_u(8, address.raw())
    }

    /// A vector of unsigned integer lanes.
    #[must_use]
    pub fn from_u_lanes(lane_size: usize, lanes: &[u64]) -> Self {
        let mut out = Self::new(lane_size, lanes.len());
        for (i, v) in lanes.iter().enumerate() {
            out.set_u(i, *v);
        }
        out
    }

    /// A vector of float lanes.
    #[must_use]
    pub fn from_f_lanes(lane_size: usize, lanes: &[f64]) -> Self {
        let mut out = Self::new(lane_size, lanes.len());
        for (i, v) in lanes.iter().enumerate() {
            out.set_f(i, *v);
        }
        out
    }

    /// A vector of `f32` lanes.
    #[must_use]
    pub fn from_f32_slice(lanes: &[f32]) -> Self {
        let mut out = Self::new(4, lanes.len());
        for (i, v) in lanes.iter().enumerate() {
            out.lane_bytes_mut(i).copy_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Bytes per lane.
    #[must_use]
    #[inline]
    pub fn lane_size(&self) -> usize {
        self.lane_size
    }

    /// Number of lanes.
    #[must_use]
    #[inline]
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Shape of this value.
    #[must_use]
    #[inline]
    pub fn shape(&self) -> ValueShape {
        ValueShape {
            lane_size: self.lane_size,
            lanes: self.lanes,
        }
    }

    /// Total byte length.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for a zero-byte value (`void`).
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw little-endian bytes.
    #[must_use]
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw bytes.
    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes of lane `i` (empty if out of range).
    #[must_use]
    pub fn lane_bytes(&self, i: usize) -> &[u8] {
        let start = i * self.lane_size;
        self.data
            .get(start..start + self.lane_size)
            .unwrap_or_default()
    }

    /// Mutable bytes of lane `i` (empty if out of range).
    pub fn lane_bytes_mut(&mut self, i: usize) -> &mut [u8] {
        let start = i * self.lane_size;
        let size = self.lane_size;
        self.data
            .get_mut(start..start + size)
            .unwrap_or_default()
    }

    /// Zero-extended lane `i`.
    #[must_use]
    pub fn get_u(&self, i: usize) -> u64 {
        let mut buf = [0_u8; 8];
        let lane = self.lane_bytes(i);
        let n = lane.len().min(8);
        buf[..n].copy_from_slice(&lane[..n]);
        u64::from_le_bytes(buf)
    }

    /// Sign-extended lane `i`.
    #[must_use]
    pub fn get_s(&self, i: usize) -> i64 {
        let raw = self.get_u(i);
        match self.lane_size {
            1 => i64::from(raw as u8 as i8),
            2 => i64::from(raw as u16 as i16),
            4 => i64::from(raw as u32 as i32),
            _ => raw as i64,
        }
    }

    /// Lane `i` as a float. Two-byte lanes are half precision.
    #[must_use]
    pub fn get_f(&self, i: usize) -> f64 {
        let raw = self.get_u(i);
        match self.lane_size {
            2 => f64::from(half_to_float(raw as u16)),
            4 => f64::from(f32::from_bits(raw as u32)),
            8 => f64::from_bits(raw),
            _ => 0.0,
        }
    }

    /// Lane `i` as an [`Address`].
    #[must_use]
    #[inline]
    pub fn get_address(&self, i: usize) -> Address {
        Address::from_raw(self.get_u(i))
    }

    /// Stores the low `lane_size` bytes of `v` into lane `i`.
    pub fn set_u(&mut self, i: usize, v: u64) {
        let bytes = v.to_le_bytes();
        let lane = self.lane_bytes_mut(i);
        let n = lane.len().min(8);
        lane[..n].copy_from_slice(&bytes[..n]);
    }

    /// Stores a signed integer into lane `i`, truncating to the lane width.
    #[inline]
    pub fn set_s(&mut self, i: usize, v: i64) {
        self.set_u(i, v as u64);
    }

    /// Stores a float into lane `i`, rounding to the lane's precision (nearest-even).
    pub fn set_f(&mut self, i: usize, v: f64) {
        match self.lane_size {
            2 => self.set_u(i, u64::from(double_to_half(v, RoundingMode::NearestEven))),
            4 => self.set_u(i, u64::from((v as f32).to_bits())),
            8 => self.set_u(i, v.to_bits()),
            _ => {}
        }
    }

    /// Stores an address into lane `i`.
    #[inline]
    pub fn set_address(&mut self, i: usize, address: Address) {
        self.set_u(i, address.raw());
    }

    /// Copies lane `j` of `src` into lane `i` of `self`, truncating or zero-padding to this
    /// value's lane size.
    pub fn copy_lane(&mut self, i: usize, src: &Self, j: usize) {
        let from = src.lane_bytes(j);
        let to = self.lane_bytes_mut(i);
        let n = from.len().min(to.len());
        to[..n].copy_from_slice(&from[..n]);
        to[n..].fill(0);
    }

    /// Lane `i` as a boolean (any non-zero bit).
    #[must_use]
    #[inline]
    pub fn get_bool(&self, i: usize) -> bool {
        self.get_u(i) != 0
    }
}

impl fmt::Debug for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedValue<{}x{}>[", self.lanes, self.lane_size)?;
        for (i, b) in self.data.iter().enumerate() {
            if i > 0 && self.lane_size > 0 && i % self.lane_size == 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        f.write_str("]")
    }
}
