// Copyright 2026 the NDRange Sim Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use ndrange_sim::{NdRange, Size3};
use std::collections::HashMap;
use std::string::String;

/// Optional label resolver for profiling scopes.
///
/// Return `None` to fall back to the default labels.
pub trait LabelResolver {
    /// Resolve a label for a kernel launch scope.
    fn kernel_label(&mut self, _kernel: &str, _ndrange: &NdRange) -> Option<String> {
        None
    }

    /// Resolve a label for a work-group scope.
    fn work_group_label(&mut self, _kernel: &str, _group_id: Size3) -> Option<String> {
        None
    }
}

/// Default resolver that keeps plain name/id labels.
#[derive(Default, Debug)]
pub struct DefaultLabelResolver;

impl LabelResolver for DefaultLabelResolver {}

/// Resolver that includes launch geometry in kernel labels and caches them per kernel.
#[derive(Default, Debug)]
pub struct GeometryLabelResolver {
    kernel_cache: HashMap<(String, NdRangeKey), String>,
}

/// Hashable form of the launch geometry.
type NdRangeKey = (u32, [usize; 3], [usize; 3]);

fn key(ndrange: &NdRange) -> NdRangeKey {
    let g = ndrange.global_size;
    let l = ndrange.local_size;
    (ndrange.work_dim, [g.x, g.y, g.z], [l.x, l.y, l.z])
}

impl LabelResolver for GeometryLabelResolver {
    fn kernel_label(&mut self, kernel: &str, ndrange: &NdRange) -> Option<String> {
        let cache_key = (String::from(kernel), key(ndrange));
        if let Some(label) = self.kernel_cache.get(&cache_key) {
            return Some(label.clone());
        }
        let label = format!(
            "kernel:{kernel} global={} local={}",
            ndrange.global_size, ndrange.local_size
        );
        self.kernel_cache.insert(cache_key, label.clone());
        Some(label)
    }
}

pub(crate) fn default_kernel_label(kernel: &str) -> String {
    format!("kernel:{kernel}")
}

pub(crate) fn default_work_group_label(group_id: Size3) -> String {
    format!("group:{group_id}")
}
