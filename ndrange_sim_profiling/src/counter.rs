// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use ndrange_sim::builtins::demangle;
use ndrange_sim::program::{Callee, Instr, Op, Opcode};
use ndrange_sim::{Address, AddressSpace, EventMask, ItemIds, Observer, TypedValue};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::string::String;
use std::vec::Vec;

/// Bytes moved through one address space.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Traffic {
    /// Bytes loaded.
    pub loaded: u64,
    /// Bytes stored.
    pub stored: u64,
}

/// An [`Observer`] that histograms executed instructions by opcode.
///
/// It also totals load/store bytes per address space and counts calls per builtin name.
#[derive(Clone, Debug)]
pub struct InstructionCounter {
    counts: [u64; Opcode::COUNT],
    traffic: [Traffic; 4],
    callees: BTreeMap<String, u64>,
}

impl Default for InstructionCounter {
    fn default() -> Self {
        Self {
            counts: [0; Opcode::COUNT],
            traffic: [Traffic::default(); 4],
            callees: BTreeMap::new(),
        }
    }
}

fn slot(space: AddressSpace) -> usize {
    match space {
        AddressSpace::Private => 0,
        AddressSpace::Global => 1,
        AddressSpace::Constant => 2,
        AddressSpace::Local => 3,
    }
}

impl InstructionCounter {
    /// Create an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executions of `opcode` so far.
    #[must_use]
    pub fn count(&self, opcode: Opcode) -> u64 {
        self.counts[opcode.index()]
    }

    /// Executions of every opcode so far.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Load/store bytes seen in `space`.
    #[must_use]
    pub fn traffic(&self, space: AddressSpace) -> Traffic {
        self.traffic[slot(space)]
    }

    /// Calls to the external function `name` (demangled).
    #[must_use]
    pub fn calls(&self, name: &str) -> u64 {
        self.callees.get(name).copied().unwrap_or(0)
    }

    /// Non-zero counts, most frequent first (ties by opcode order).
    #[must_use]
    pub fn sorted(&self) -> Vec<(Opcode, u64)> {
        let mut v: Vec<_> = Opcode::ALL
            .iter()
            .map(|&op| (op, self.count(op)))
            .filter(|&(_, n)| n > 0)
            .collect();
        v.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        v
    }

    /// Two-column text table of [`sorted`](Self::sorted).
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (op, n) in self.sorted() {
            let _ = writeln!(out, "{:<16}{n:>12}", op.name());
        }
        let _ = writeln!(out, "{:<16}{:>12}", "total", self.total());
        for space in AddressSpace::ALL {
            let t = self.traffic(space);
            if t.loaded != 0 || t.stored != 0 {
                let _ = writeln!(
                    out,
                    "{:<16}{:>12} loaded {:>12} stored",
                    space.name(),
                    t.loaded,
                    t.stored
                );
            }
        }
        for (name, n) in &self.callees {
            let _ = writeln!(out, "call {name:<11}{n:>12}");
        }
        out
    }

    /// Zero every count.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Observer for InstructionCounter {
    fn mask(&self) -> EventMask {
        EventMask::INSTRUCTION | EventMask::MEMORY
    }

    fn instruction_executed(&mut self, _ids: &ItemIds, instr: &Instr, _result: Option<&TypedValue>) {
        self.counts[instr.op.opcode().index()] += 1;
        if let Op::Call {
            callee: Callee::External(symbol),
            ..
        } = &instr.op
        {
            let (name, _) = demangle(symbol);
            *self.callees.entry(String::from(name)).or_default() += 1;
        }
    }

    fn memory_load(&mut self, _ids: Option<&ItemIds>, address: Address, size: u64) {
        self.traffic[slot(address.space())].loaded += size;
    }

    fn memory_store(&mut self, _ids: Option<&ItemIds>, address: Address, data: &[u8]) {
        self.traffic[slot(address.space())].stored += data.len() as u64;
    }
}
