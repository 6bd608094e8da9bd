//! Observable layer visibility state.
//!
//! The store holds one ordered descriptor list per [`LayerKind`]. Every
//! mutation publishes the full updated list for that kind to the kind's
//! subscribers before the mutating call returns. Mutations are serialized by
//! a writer lock, so concurrent toggles are never merged or lost.
//!
//! Subscribers run on the mutating thread while the writer lock is held.
//! They may read the store, but a subscriber that mutates it would deadlock
//! on the non-reentrant writer lock; debug builds panic instead.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use map_common::{ForecastLocation, LayerDescriptor, LayerKind, MapError, MapResult, RadarSource};

use crate::lock;

type Callback = Arc<dyn Fn(LayerKind, &[LayerDescriptor]) + Send + Sync>;

thread_local! {
    /// Set while this thread runs subscriber callbacks.
    static PUBLISHING: Cell<bool> = const { Cell::new(false) };
}

/// Clears [`PUBLISHING`] on drop, including when a callback panics.
struct PublishGuard;

impl PublishGuard {
    fn enter() -> Self {
        PUBLISHING.with(|p| p.set(true));
        PublishGuard
    }
}

impl Drop for PublishGuard {
    fn drop(&mut self) {
        PUBLISHING.with(|p| p.set(false));
    }
}

/// Returned by [`LayerVisibilityStore::subscribe`]; pass back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    kind: LayerKind,
}

impl SubscriptionHandle {
    pub fn kind(&self) -> LayerKind {
        self.kind
    }
}

#[derive(Default)]
pub struct LayerVisibilityStore {
    descriptors: Mutex<HashMap<LayerKind, Vec<LayerDescriptor>>>,
    subscribers: Mutex<Vec<(SubscriptionHandle, Callback)>>,
    writer: Mutex<()>,
    next_id: AtomicU64,
}

impl LayerVisibilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with one forecast descriptor per location.
    pub fn with_forecast_locations(locations: &[ForecastLocation]) -> Self {
        let store = Self::new();
        lock(&store.descriptors).insert(
            LayerKind::Forecast,
            locations.iter().map(LayerDescriptor::forecast).collect(),
        );
        store
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Register a callback receiving the full descriptor list of `kind`
    /// after every change.
    pub fn subscribe<F>(&self, kind: LayerKind, callback: F) -> SubscriptionHandle
    where
        F: Fn(LayerKind, &[LayerDescriptor]) + Send + Sync + 'static,
    {
        let handle = SubscriptionHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
        };
        lock(&self.subscribers).push((handle, Arc::new(callback)));
        handle
    }

    /// Returns false if the handle was already removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut subs = lock(&self.subscribers);
        let before = subs.len();
        subs.retain(|(h, _)| *h != handle);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Snapshot of every descriptor of `kind`, in registration order.
    pub fn descriptors(&self, kind: LayerKind) -> Vec<LayerDescriptor> {
        lock(&self.descriptors).get(&kind).cloned().unwrap_or_default()
    }

    /// Snapshot filtered to visible descriptors.
    pub fn get_visible(&self, kind: LayerKind) -> Vec<LayerDescriptor> {
        lock(&self.descriptors)
            .get(&kind)
            .map(|list| list.iter().filter(|d| d.visible).cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, kind: LayerKind, name: &str) -> Option<LayerDescriptor> {
        lock(&self.descriptors)
            .get(&kind)?
            .iter()
            .find(|d| d.name == name)
            .cloned()
    }

    pub fn is_visible(&self, kind: LayerKind, name: &str) -> Option<bool> {
        self.get(kind, name).map(|d| d.visible)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Flip one descriptor and publish. Returns the new visibility.
    ///
    /// Radar descriptors behave as radio buttons: toggling a hidden source
    /// activates it exclusively, toggling the visible one leaves it visible.
    pub fn toggle(&self, kind: LayerKind, name: &str) -> MapResult<bool> {
        if kind == LayerKind::Radar {
            self.set_exclusive(kind, name)?;
            return Ok(true);
        }

        self.mutate(kind, |list| {
            let desc = find_mut(list, kind, name)?;
            desc.visible = !desc.visible;
            Ok(desc.visible)
        })
    }

    /// Make `name` the only visible radar source.
    pub fn set_exclusive(&self, kind: LayerKind, name: &str) -> MapResult<()> {
        if kind != LayerKind::Radar {
            return Err(MapError::InvalidOperation {
                kind: kind.to_string(),
                operation: "set_exclusive".to_string(),
            });
        }

        self.mutate(kind, |list| {
            find_mut(list, kind, name)?;
            for desc in list.iter_mut() {
                desc.visible = desc.name == name;
            }
            Ok(())
        })
    }

    /// Replace the event descriptor set with `names`.
    ///
    /// Names already known keep their visibility, new names start visible,
    /// names absent from `names` are pruned.
    pub fn merge_event_types(&self, names: &[String]) {
        let kind = LayerKind::Event;
        // infallible closure
        let _ = self.mutate(kind, |list| {
            let merged: Vec<LayerDescriptor> = names
                .iter()
                .map(|name| {
                    list.iter()
                        .find(|d| &d.name == name)
                        .cloned()
                        .unwrap_or_else(|| LayerDescriptor::event(name.clone()))
                })
                .collect();
            let pruned = list.iter().filter(|d| !names.contains(&d.name)).count();
            if pruned > 0 {
                debug!(pruned, remaining = merged.len(), "Pruned event descriptors");
            }
            *list = merged;
            Ok(())
        });
    }

    /// Register a radar source once. The first registered source is visible
    /// unless some radar is already visible. Returns the source's visibility.
    pub fn register_radar(&self, source: RadarSource) -> bool {
        let kind = LayerKind::Radar;
        let name = source.as_str();
        self.mutate(kind, |list| {
            if let Some(existing) = list.iter().find(|d| d.name == name) {
                return Ok(existing.visible);
            }
            let visible = !list.iter().any(|d| d.visible);
            list.push(LayerDescriptor::radar(source, visible));
            Ok(visible)
        })
        .unwrap_or(false)
    }

    /// Set a forecast descriptor list wholesale (used when locations are reseeded).
    pub fn set_forecast_locations(&self, locations: &[ForecastLocation]) {
        let _ = self.mutate(LayerKind::Forecast, |list| {
            *list = locations.iter().map(LayerDescriptor::forecast).collect();
            Ok(())
        });
    }

    /// Apply `f` to the list of `kind` under the writer lock, then publish.
    fn mutate<T>(
        &self,
        kind: LayerKind,
        f: impl FnOnce(&mut Vec<LayerDescriptor>) -> MapResult<T>,
    ) -> MapResult<T> {
        debug_assert!(
            !PUBLISHING.with(|p| p.get()),
            "visibility store mutated from a subscriber"
        );
        let _writer = lock(&self.writer);

        let (result, snapshot) = {
            let mut all = lock(&self.descriptors);
            let list = all.entry(kind).or_default();
            let result = f(list)?;
            (result, list.clone())
        };

        let callbacks: Vec<Callback> = lock(&self.subscribers)
            .iter()
            .filter(|(h, _)| h.kind == kind)
            .map(|(_, cb)| cb.clone())
            .collect();
        let _publishing = PublishGuard::enter();
        for cb in callbacks {
            cb(kind, &snapshot);
        }
        Ok(result)
    }
}

fn find_mut<'a>(
    list: &'a mut [LayerDescriptor],
    kind: LayerKind,
    name: &str,
) -> MapResult<&'a mut LayerDescriptor> {
    list.iter_mut()
        .find(|d| d.name == name)
        .ok_or_else(|| MapError::LayerNotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        })
}
