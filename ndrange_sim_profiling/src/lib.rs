// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Profiling observers for `ndrange_sim`.
//!
//! This crate is `std`-only and keeps `ndrange_sim` itself free of profiling dependencies.
//!
//! - [`ProfilingObserver`] emits Tracy scopes for kernel launches and work-groups (via
//!   `tracy-client`). Without a running Tracy client it does nothing.
//! - [`InstructionCounter`] histograms executed instructions by opcode and also tallies memory
//!   traffic and builtin calls.
//!
//! Both are plain [`Observer`](ndrange_sim::Observer)s; combine them with a tuple to run both at
//! once.
//!
//! ## Example
//! ```ignore
//! use ndrange_sim_profiling::{InstructionCounter, ProfilingObserver};
//!
//! let mut observers = (ProfilingObserver::new(), InstructionCounter::new());
//! sim.run(&kernel, ndrange, Some(&mut observers))?;
//! println!("{}", observers.1.report());
//! # Ok::<(), ndrange_sim::SimError>(())
//! ```

mod counter;
mod observer;
mod resolver;

pub use counter::{InstructionCounter, Traffic};
pub use observer::ProfilingObserver;
pub use resolver::{DefaultLabelResolver, GeometryLabelResolver, LabelResolver};
