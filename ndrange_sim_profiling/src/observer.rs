// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::resolver::{
    DefaultLabelResolver, LabelResolver, default_kernel_label, default_work_group_label,
};
use ndrange_sim::{EventMask, FenceFlags, NdRange, Observer, RunSummary, Size3};
use std::string::String;
use std::vec::Vec;

type BackendGuard = tracy_client::Span;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ScopeKind {
    Kernel,
    WorkGroup,
}

struct ScopeEntry {
    kind: ScopeKind,
    // Keep the label alive for backends that may borrow it.
    label: String,
    guard: Option<BackendGuard>,
}

/// An [`Observer`] that emits Tracy scopes for kernel launches and work-groups.
///
/// Barrier releases are recorded as Tracy messages inside the enclosing work-group scope.
pub struct ProfilingObserver<R = DefaultLabelResolver> {
    resolver: R,
    kernel: String,
    stack: Vec<ScopeEntry>,
}

impl ProfilingObserver<DefaultLabelResolver> {
    /// Create an observer with plain name/id labels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: LabelResolver> ProfilingObserver<R> {
    /// Create an observer with a custom label resolver.
    #[must_use]
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            resolver,
            kernel: String::new(),
            stack: Vec::new(),
        }
    }

    fn enter(&mut self, kind: ScopeKind, label: String) {
        let guard = start_scope(kind, &label);
        self.stack.push(ScopeEntry { kind, label, guard });
    }

    fn exit(&mut self, kind: ScopeKind) {
        if self.stack.last().is_some_and(|top| top.kind == kind) {
            drop(self.stack.pop());
            return;
        }
        // If the stack got out of sync, drop any active scopes to avoid leaking.
        self.drop_active_scopes();
    }

    // Drop in LIFO order so nested spans close inner-to-outer.
    fn drop_active_scopes(&mut self) {
        while let Some(entry) = self.stack.pop() {
            drop(entry.guard);
        }
    }
}

fn start_scope(kind: ScopeKind, label: &str) -> Option<BackendGuard> {
    let function_name = match kind {
        ScopeKind::Kernel => "ndrange_sim.kernel",
        ScopeKind::WorkGroup => "ndrange_sim.work_group",
    };
    let client = tracy_client::Client::running()?;
    Some(client.span_alloc(Some(label), function_name, "ndrange_sim", 0, 0))
}

impl<R: LabelResolver> Observer for ProfilingObserver<R> {
    fn mask(&self) -> EventMask {
        EventMask::KERNEL | EventMask::WORK_GROUP | EventMask::BARRIER
    }

    fn kernel_begin(&mut self, kernel: &str, ndrange: &NdRange) {
        self.kernel = String::from(kernel);
        let label = self
            .resolver
            .kernel_label(kernel, ndrange)
            .unwrap_or_else(|| default_kernel_label(kernel));
        self.enter(ScopeKind::Kernel, label);
    }

    fn kernel_end(&mut self, _kernel: &str, _summary: &RunSummary) {
        // A failed launch can end without closing its group scope.
        while self
            .stack
            .last()
            .is_some_and(|top| top.kind == ScopeKind::WorkGroup)
        {
            self.exit(ScopeKind::WorkGroup);
        }
        self.exit(ScopeKind::Kernel);
    }

    fn work_group_begin(&mut self, group_id: Size3) {
        let label = self
            .resolver
            .work_group_label(&self.kernel, group_id)
            .unwrap_or_else(|| default_work_group_label(group_id));
        self.enter(ScopeKind::WorkGroup, label);
    }

    fn work_group_end(&mut self, _group_id: Size3) {
        self.exit(ScopeKind::WorkGroup);
    }

    fn work_group_barrier(&mut self, group_id: Size3, fence: FenceFlags) {
        if let Some(client) = tracy_client::Client::running() {
            client.message(&format!("barrier {group_id} fence={fence}"), 0);
        }
    }
}

impl<R> Default for ProfilingObserver<R>
where
    R: LabelResolver + Default,
{
    fn default() -> Self {
        Self::with_resolver(R::default())
    }
}

impl<R> std::fmt::Debug for ProfilingObserver<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilingObserver")
            .field("kernel", &self.kernel)
            .field("stack_depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{ProfilingObserver, ScopeKind, start_scope};
    use ndrange_sim::{NdRange, Observer, RunSummary, Size3};

    #[test]
    fn start_scope_without_tracy_client_does_not_panic() {
        let _guard = start_scope(ScopeKind::Kernel, "test");
    }

    #[test]
    fn scopes_nest_and_unwind() {
        let mut o = ProfilingObserver::new();
        o.kernel_begin("k", &NdRange::new_1d(4, 2));
        o.work_group_begin(Size3::new(0, 0, 0));
        assert_eq!(o.stack.len(), 2);
        assert_eq!(o.stack[1].label, "group:(0,0,0)");
        // Group left open, as after a failed launch.
        o.kernel_end("k", &RunSummary::default());
        assert!(o.stack.is_empty());
    }
}
