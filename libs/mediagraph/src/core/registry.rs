// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Explicit registry of backend factories.
//!
//! Backends are registered at startup against the interface they implement
//! (a trait object type such as `dyn Decoder<..>`), a scheme name and a
//! priority. Lookups pick the highest-priority registration for a scheme.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Result, StreamError};

type Factory<I> = Arc<dyn Fn() -> Box<I> + Send + Sync>;

struct Registration {
    scheme: String,
    priority: i32,
    factory: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct BackendRegistry {
    entries: RwLock<HashMap<TypeId, Vec<Registration>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` as a provider of interface `I` for `scheme`.
    pub fn register<I>(
        &self,
        scheme: &str,
        priority: i32,
        factory: impl Fn() -> Box<I> + Send + Sync + 'static,
    ) -> Result<()>
    where
        I: ?Sized + 'static,
    {
        let mut entries = self.entries.write();
        let list = entries.entry(TypeId::of::<I>()).or_default();

        if list
            .iter()
            .any(|r| r.scheme == scheme && r.priority == priority)
        {
            return Err(StreamError::Registry(format!(
                "{} backend '{}' with priority {} is already registered",
                std::any::type_name::<I>(),
                scheme,
                priority
            )));
        }

        let factory: Factory<I> = Arc::new(factory);
        let pos = list.partition_point(|r| r.priority >= priority);
        list.insert(
            pos,
            Registration {
                scheme: scheme.to_string(),
                priority,
                factory: Box::new(factory),
            },
        );

        tracing::debug!(
            "Registered {} backend '{}' (priority {})",
            std::any::type_name::<I>(),
            scheme,
            priority
        );
        Ok(())
    }

    /// Instantiates the highest-priority backend of `I` registered for `scheme`.
    pub fn create<I: ?Sized + 'static>(&self, scheme: &str) -> Option<Box<I>> {
        let factory = self.find::<I>(|r| r.scheme == scheme)?;
        Some(factory())
    }

    /// Instantiates the highest-priority backend of `I`, whatever its scheme.
    pub fn create_any<I: ?Sized + 'static>(&self) -> Option<(String, Box<I>)> {
        let (scheme, factory) = {
            let entries = self.entries.read();
            let first = entries.get(&TypeId::of::<I>())?.first()?;
            let factory = first.factory.downcast_ref::<Factory<I>>()?.clone();
            (first.scheme.clone(), factory)
        };
        Some((scheme, factory()))
    }

    /// Like [`create`](Self::create), reporting a missing scheme as an error.
    pub fn require<I: ?Sized + 'static>(&self, scheme: &str) -> Result<Box<I>> {
        self.create::<I>(scheme).ok_or_else(|| {
            StreamError::NotFound(format!(
                "no {} backend registered for '{}'",
                std::any::type_name::<I>(),
                scheme
            ))
        })
    }

    /// Registered schemes of `I`, highest priority first.
    pub fn schemes<I: ?Sized + 'static>(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut schemes: Vec<String> = Vec::new();
        for r in entries.get(&TypeId::of::<I>()).into_iter().flatten() {
            if !schemes.contains(&r.scheme) {
                schemes.push(r.scheme.clone());
            }
        }
        schemes
    }

    pub fn contains<I: ?Sized + 'static>(&self, scheme: &str) -> bool {
        self.entries
            .read()
            .get(&TypeId::of::<I>())
            .is_some_and(|list| list.iter().any(|r| r.scheme == scheme))
    }

    /// Removes every registration of `I` for `scheme`. Returns how many were removed.
    pub fn unregister<I: ?Sized + 'static>(&self, scheme: &str) -> usize {
        let mut entries = self.entries.write();
        let Some(list) = entries.get_mut(&TypeId::of::<I>()) else {
            return 0;
        };
        let before = list.len();
        list.retain(|r| r.scheme != scheme);
        before - list.len()
    }

    fn find<I: ?Sized + 'static>(
        &self,
        matches: impl Fn(&Registration) -> bool,
    ) -> Option<Factory<I>> {
        let entries = self.entries.read();
        entries
            .get(&TypeId::of::<I>())?
            .iter()
            .find(|r| matches(r))
            .and_then(|r| r.factory.downcast_ref::<Factory<I>>())
            .cloned()
    }
}
