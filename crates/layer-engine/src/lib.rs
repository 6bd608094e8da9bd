//! Layer synchronization and alert impact engine for the weather map.
//!
//! The pieces, leaf first:
//! - [`LayerVisibilityStore`]: per-kind descriptor state with synchronous
//!   publish-subscribe
//! - [`StaggeredLoader`]: batched, rate-limited forecast loading
//! - [`OverlayRegistry`]: what exists on the map, keyed by layer name
//! - [`ImpactEngine`]: alert polygon x forecast location containment
//! - [`InteractionController`]: pointer events to highlight and info-panel commands
//! - [`MapSession`]: wires all of the above to a gateway, a map backend and
//!   an info panel

pub mod backend;
pub mod content;
pub mod impact;
pub mod info_panel;
pub mod interaction;
pub mod loader;
pub mod registry;
pub mod session;
pub mod visibility;

pub use backend::{FeatureTag, HeadlessMap, Hit, LayerId, MapBackend, OverlayId, VectorFeature};
pub use content::{EventInfo, ForecastInfo};
pub use impact::{ImpactEngine, ImpactPolicy, LocationRecord};
pub use info_panel::{InfoPanel, InfoPanelSnapshot, InfoPanelState, InfoPayload, InfoType};
pub use interaction::{ClickOutcome, InteractionController};
pub use loader::{LoadPhase, LoadSummary, LoadedForecast, LoaderConfig, StaggeredLoader};
pub use registry::{HitTarget, OverlayRegistry, UpsertOutcome};
pub use session::{MapSession, RefreshSummary, SessionConfig};
pub use visibility::{LayerVisibilityStore, SubscriptionHandle};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
