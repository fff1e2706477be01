// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Kernel-language builtin functions.
//!
//! External calls are resolved by demangled name: first an exact match, then the longest
//! registered prefix (families like `vload4`, `convert_int_sat_rte`, or `llvm.memcpy.p0.p0.i64`
//! share one handler). Handlers see the call's arguments as [`TypedValue`]s plus the static
//! parameter types, and write their result into a zeroed value of the call's return type.
//!
//! The table is immutable once built and shared by every work-item of a launch.

use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use crate::address::Address;
use crate::error::SimError;
use crate::memory::AtomicOp;
use crate::program::CallArg;
use crate::types::Type;
use crate::value::TypedValue;
use crate::work_item::Ctx;

mod atomic;
mod common;
mod convert;
mod geometric;
mod integer;
mod intrinsics;
mod math;
mod printf;
mod relational;
mod sync;
mod vector;
mod work_item_fns;

/// Handler signature shared by every builtin.
pub(crate) type Handler =
    fn(&mut Ctx<'_, '_, '_>, &BuiltinCall<'_>, &mut TypedValue) -> Result<(), SimError>;

/// Per-entry data that lets one handler serve a family of builtins.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Aux {
    None,
    F1(fn(f64) -> f64),
    F2(fn(f64, f64) -> f64),
    Atomic(AtomicOp),
    Query(Query),
    Compare(fn(f64, f64) -> bool),
    /// Classification of a lane value; the second argument is the lane size in bytes.
    Class(fn(f64, usize) -> bool),
}

/// Work-item geometry queries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Query {
    GlobalId,
    GlobalSize,
    GlobalOffset,
    GroupId,
    LocalId,
    LocalSize,
    EnqueuedLocalSize,
    NumGroups,
}

#[derive(Copy, Clone)]
pub(crate) struct Builtin {
    pub(crate) handler: Handler,
    pub(crate) aux: Aux,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("aux", &self.aux).finish()
    }
}

/// Name-indexed table of builtin handlers.
#[derive(Clone, Default)]
pub struct BuiltinTable {
    exact: HashMap<&'static str, Builtin>,
    /// Sorted longest first so the first match is the most specific.
    prefixes: Vec<(&'static str, Builtin)>,
}

impl fmt::Debug for BuiltinTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinTable")
            .field("exact", &self.exact.len())
            .field("prefixes", &self.prefixes.len())
            .finish()
    }
}

impl BuiltinTable {
    /// The OpenCL C builtin library plus the LLVM intrinsics kernels commonly reference.
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::default();
        atomic::register(&mut table);
        common::register(&mut table);
        convert::register(&mut table);
        geometric::register(&mut table);
        integer::register(&mut table);
        intrinsics::register(&mut table);
        math::register(&mut table);
        printf::register(&mut table);
        relational::register(&mut table);
        sync::register(&mut table);
        vector::register(&mut table);
        work_item_fns::register(&mut table);
        tracing::debug!(
            exact = table.exact.len(),
            prefixes = table.prefixes.len(),
            "built standard builtin table"
        );
        table
    }

    pub(crate) fn add(&mut self, name: &'static str, handler: Handler, aux: Aux) {
        self.exact.insert(name, Builtin { handler, aux });
    }

    pub(crate) fn add_prefix(&mut self, prefix: &'static str, handler: Handler, aux: Aux) {
        let at = self
            .prefixes
            .iter()
            .position(|(p, _)| p.len() < prefix.len())
            .unwrap_or(self.prefixes.len());
        self.prefixes.insert(at, (prefix, Builtin { handler, aux }));
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<&Builtin> {
        self.exact.get(name).or_else(|| {
            self.prefixes
                .iter()
                .find(|(prefix, _)| name.starts_with(prefix))
                .map(|(_, builtin)| builtin)
        })
    }

    /// Returns `true` if a call to `name` (demangled) would resolve.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Number of registered names and prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits an Itanium-mangled function symbol into its name and parameter-type suffix.
///
/// Symbols that are not mangled (LLVM intrinsics, `printf`) come back unchanged with an empty
/// suffix.
///
/// ```
/// use ndrange_sim::builtins::demangle;
///
/// assert_eq!(demangle("_Z13get_global_idj"), ("get_global_id", "j"));
/// assert_eq!(demangle("llvm.memcpy.p0.p0.i64"), ("llvm.memcpy.p0.p0.i64", ""));
/// ```
#[must_use]
pub fn demangle(symbol: &str) -> (&str, &str) {
    let Some(rest) = symbol.strip_prefix("_Z") else {
        return (symbol, "");
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let Ok(len) = rest[..digits].parse::<usize>() else {
        return (symbol, "");
    };
    let body = &rest[digits..];
    match (body.get(..len), body.get(len..)) {
        (Some(name), Some(overload)) => (name, overload),
        _ => (symbol, ""),
    }
}

/// Scalar category of a builtin's first argument, read from the mangled overload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ArgKind {
    Unsigned,
    Signed,
    Float,
    Other,
}

/// Category of the first mangled parameter, looking through a `Dv<n>_` vector prefix.
pub(crate) fn arg_kind(overload: &str) -> ArgKind {
    let scalar = match overload.strip_prefix("Dv") {
        Some(vector) => vector.split_once('_').map_or("", |(_, elem)| elem),
        None => overload,
    };
    if scalar.starts_with("Dh") {
        return ArgKind::Float;
    }
    match scalar.as_bytes().first() {
        Some(b'h' | b't' | b'j' | b'm') => ArgKind::Unsigned,
        Some(b'c' | b'a' | b's' | b'i' | b'l' | b'x') => ArgKind::Signed,
        Some(b'f' | b'd') => ArgKind::Float,
        _ => ArgKind::Other,
    }
}

/// A resolved external call as a handler sees it.
pub(crate) struct BuiltinCall<'a> {
    pub(crate) name: &'a str,
    pub(crate) overload: &'a str,
    pub(crate) args: &'a [TypedValue],
    pub(crate) params: &'a [CallArg],
    pub(crate) ret_ty: &'a Type,
    pub(crate) aux: Aux,
}

impl BuiltinCall<'_> {
    pub(crate) fn arg(&self, index: usize) -> Result<&TypedValue, SimError> {
        self.args.get(index).ok_or_else(|| self.unsupported())
    }

    /// Argument lane, broadcasting scalars across vector lanes.
    fn lane(&self, index: usize, lane: usize) -> Option<(&TypedValue, usize)> {
        let value = self.args.get(index)?;
        let lane = if value.lanes() == 1 { 0 } else { lane };
        Some((value, lane))
    }

    pub(crate) fn u(&self, index: usize, lane: usize) -> u64 {
        self.lane(index, lane).map_or(0, |(v, i)| v.get_u(i))
    }

    pub(crate) fn s(&self, index: usize, lane: usize) -> i64 {
        self.lane(index, lane).map_or(0, |(v, i)| v.get_s(i))
    }

    pub(crate) fn f(&self, index: usize, lane: usize) -> f64 {
        self.lane(index, lane).map_or(0.0, |(v, i)| v.get_f(i))
    }

    pub(crate) fn lanes(&self, index: usize) -> usize {
        self.args.get(index).map_or(0, TypedValue::lanes)
    }

    pub(crate) fn ptr(&self, index: usize) -> Result<Address, SimError> {
        Ok(self.arg(index)?.get_address(0))
    }

    /// Type the pointer parameter `index` points at.
    pub(crate) fn pointee(&self, index: usize) -> Option<&Type> {
        self.params.get(index).and_then(|p| p.ty.element())
    }

    pub(crate) fn kind(&self) -> ArgKind {
        arg_kind(self.overload)
    }

    pub(crate) fn unsupported(&self) -> SimError {
        SimError::UnsupportedOverload {
            name: self.name.into(),
            overload: self.overload.into(),
        }
    }
}

/// Stores `value` through pointer argument `index` (the out-parameters of `fract`, `frexp`,
/// `sincos`, and friends).
pub(crate) fn store_out(
    ctx: &mut Ctx<'_, '_, '_>,
    call: &BuiltinCall<'_>,
    index: usize,
    value: &TypedValue,
) -> Result<(), SimError> {
    let address = call.ptr(index)?;
    ctx.store(address, value.bytes(), value.lane_size() as u64);
    Ok(())
}

pub(crate) fn noop(
    _: &mut Ctx<'_, '_, '_>,
    _: &BuiltinCall<'_>,
    _: &mut TypedValue,
) -> Result<(), SimError> {
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Runs a single builtin call inside a one-item launch.

    use alloc::vec::Vec;

    use crate::builder::{FunctionBuilder, ProgramBuilder};
    use crate::config::SimConfig;
    use crate::invocation::{Kernel, KernelArg, NdRange};
    use crate::program::Operand;
    use crate::simulator::Simulator;
    use crate::types::{AddressSpace, Type};
    use crate::value::TypedValue;

    /// Calls `name` with constant `args` and returns the stored result.
    pub(crate) fn call(
        name: &str,
        overload: &str,
        ret: Type,
        args: Vec<(TypedValue, Type)>,
    ) -> TypedValue {
        call_out(name, overload, ret, args, None).0
    }

    /// Like [`call`], but inserts a pointer to a private `out` slot at the given argument
    /// position and also returns what the builtin wrote there.
    pub(crate) fn call_out(
        name: &str,
        overload: &str,
        ret: Type,
        args: Vec<(TypedValue, Type)>,
        out: Option<(usize, Type)>,
    ) -> (TypedValue, TypedValue) {
        let out_ty = out.as_ref().map_or(Type::I8, |(_, ty)| ty.clone());
        let mut f = FunctionBuilder::kernel(
            "one_call",
            [
                Type::ptr(AddressSpace::Global, ret.clone()),
                Type::ptr(AddressSpace::Global, out_ty.clone()),
            ],
        );
        let mut ops = args
            .into_iter()
            .map(|(value, ty)| (Operand::Const(value), ty))
            .collect::<Vec<_>>();
        let slot = f.alloca(out_ty.clone());
        if let Some((index, ty)) = &out {
            ops.insert(
                *index,
                (slot.clone(), Type::ptr(AddressSpace::Private, ty.clone())),
            );
        }
        let result = f.call_builtin(name, overload, ret.clone(), ops);
        f.store(ret.clone(), result, f.arg(0));
        if out.is_some() {
            let written = f.load(out_ty.clone(), slot);
            f.store(out_ty.clone(), written, f.arg(1));
        }
        f.ret_void();
        let mut pb = ProgramBuilder::new();
        pb.add_function(f).unwrap();
        let program = pb.finish().unwrap();

        let mut sim = Simulator::new(SimConfig::default());
        let ret_buf = sim.create_buffer(ret.size() as u64).unwrap();
        let out_buf = sim.create_buffer(out_ty.size() as u64).unwrap();
        let mut kernel = Kernel::new(&program, "one_call").unwrap();
        kernel.set_arg(0, KernelArg::Buffer(ret_buf)).unwrap();
        kernel.set_arg(1, KernelArg::Buffer(out_buf)).unwrap();
        let summary = sim.run(&kernel, NdRange::new_1d(1, 1), None).unwrap();
        assert_eq!(summary.diagnostics, 0, "{name} reported diagnostics");
        let read = |sim: &Simulator, buf, ty: &Type| {
            let shape = ty.shape();
            let bytes = sim.read_buffer(buf, shape.bytes() as u64).unwrap();
            TypedValue::from_bytes(shape.lane_size, shape.lanes, &bytes)
        };
        (read(&sim, ret_buf, &ret), read(&sim, out_buf, &out_ty))
    }

    pub(crate) fn f32s(lanes: &[f32]) -> (TypedValue, Type) {
        let ty = if lanes.len() == 1 {
            Type::Float
        } else {
            Type::vector(Type::Float, lanes.len() as u32)
        };
        (TypedValue::from_f32_slice(lanes), ty)
    }

    pub(crate) fn i32s(lanes: &[i32]) -> (TypedValue, Type) {
        let ty = if lanes.len() == 1 {
            Type::I32
        } else {
            Type::vector(Type::I32, lanes.len() as u32)
        };
        let raw = lanes.iter().map(|&v| u64::from(v as u32)).collect::<Vec<_>>();
        (TypedValue::from_u_lanes(4, &raw), ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demangles_itanium_names() {
        assert_eq!(demangle("_Z5clampDv4_fff"), ("clamp", "Dv4_fff"));
        assert_eq!(demangle("_Z7barrierj"), ("barrier", "j"));
        assert_eq!(demangle("printf"), ("printf", ""));
        assert_eq!(demangle("_Z99short"), ("_Z99short", ""));
    }

    #[test]
    fn overload_kinds() {
        assert_eq!(arg_kind("j"), ArgKind::Unsigned);
        assert_eq!(arg_kind("Dv4_i"), ArgKind::Signed);
        assert_eq!(arg_kind("Dv3_fS_"), ArgKind::Float);
        assert_eq!(arg_kind("Dh"), ArgKind::Float);
        assert_eq!(arg_kind("PU3AS1i"), ArgKind::Other);
    }

    #[test]
    fn longest_prefix_wins() {
        let table = BuiltinTable::standard();
        assert!(table.contains("convert_float4_rtz"));
        assert!(table.contains("vload_half4"));
        assert!(table.contains("llvm.memcpy.p0.p0.i64"));
        assert!(!table.contains("frobnicate"));
        assert!(!table.is_empty());
    }
}
