// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! Registry of global simulation objects, namespaced by kind.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// The three namespaces objects are registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Software,
    Cdfs,
    Pluginpaths,
}

/// Type-erased store for objects shared across the run, keyed by
/// namespace and a monotonically issued ID.
#[derive(Default)]
pub struct Registry {
    software: RwLock<HashMap<u64, Box<dyn Any + Send + Sync>>>,
    cdfs: RwLock<HashMap<u64, Box<dyn Any + Send + Sync>>>,
    pluginpaths: RwLock<HashMap<u64, Box<dyn Any + Send + Sync>>>,
    worker_id_counter: AtomicU64,
    object_id_counter: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, namespace: Namespace) -> &RwLock<HashMap<u64, Box<dyn Any + Send + Sync>>> {
        match namespace {
            Namespace::Software => &self.software,
            Namespace::Cdfs => &self.cdfs,
            Namespace::Pluginpaths => &self.pluginpaths,
        }
    }

    pub fn put<T: Any + Send + Sync>(&self, namespace: Namespace, id: u64, item: T) {
        self.table(namespace).write().insert(id, Box::new(item));
    }

    pub fn get<T: Any + Send + Sync + Clone>(&self, namespace: Namespace, id: u64) -> Option<T> {
        self.table(namespace)
            .read()
            .get(&id)
            .and_then(|item| item.downcast_ref::<T>())
            .cloned()
    }

    /// Monotonically increasing worker ID, issued via atomic increment.
    pub fn generate_worker_id(&self) -> u64 {
        self.worker_id_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Monotonically increasing object ID, issued via atomic increment.
    pub fn generate_object_id(&self) -> u64 {
        self.object_id_counter.fetch_add(1, Ordering::SeqCst)
    }
}
