//! Pointer and click handling.
//!
//! Pointer moves only restyle event features. Clicks are the only thing that
//! shows or hides the info panel.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::debug;

use map_common::Coordinate;

use crate::backend::MapBackend;
use crate::content::EventInfo;
use crate::info_panel::{InfoPanel, InfoPayload, InfoType};
use crate::registry::{HitTarget, OverlayRegistry};

/// What a click did.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Panel shown with the selected feature.
    Selected(HitTarget),
    /// Nothing under the cursor; panel hidden.
    Dismissed,
}

pub struct InteractionController<P: InfoPanel + ?Sized> {
    panel: Arc<P>,
}

impl<P: InfoPanel + ?Sized> InteractionController<P> {
    pub fn new(panel: Arc<P>) -> Self {
        Self { panel }
    }

    /// Highlight the event feature under the pointer, or restore base styles
    /// on every event layer when there is none.
    pub fn pointer_move<B: MapBackend>(
        &self,
        registry: &mut OverlayRegistry<B>,
        point: Coordinate,
    ) -> Option<HitTarget> {
        let hit = registry.hit_test(point);
        match &hit {
            Some(HitTarget::Event { name, index, .. }) => {
                registry.highlight_event_feature(name, *index);
            }
            _ => registry.reset_event_styles(),
        }
        hit
    }

    pub fn click<B: MapBackend>(
        &self,
        registry: &mut OverlayRegistry<B>,
        point: Coordinate,
    ) -> ClickOutcome {
        self.click_on(registry, point, Utc::now().date_naive())
    }

    /// [`Self::click`] with an explicit "today" for the daily forecast split.
    pub fn click_on<B: MapBackend>(
        &self,
        registry: &mut OverlayRegistry<B>,
        point: Coordinate,
        today: NaiveDate,
    ) -> ClickOutcome {
        let payload = match registry.hit_test(point) {
            Some(HitTarget::Event { name, index, alert }) => {
                let info = EventInfo::from_alert(&alert);
                Some((HitTarget::Event { name, index, alert }, InfoPayload::Event(info)))
            }
            Some(HitTarget::Forecast { name }) => registry.forecast_info(&name, today).map(|info| {
                (
                    HitTarget::Forecast { name },
                    InfoPayload::Forecast(Box::new(info)),
                )
            }),
            None => None,
        };

        match payload {
            Some((target, payload)) => {
                debug!(target = ?target, "Publishing selection");
                let info_type: InfoType = payload.info_type();
                self.panel.set_type(info_type);
                self.panel.set_data(payload);
                self.panel.set_visibility(true);
                ClickOutcome::Selected(target)
            }
            None => {
                self.panel.set_visibility(false);
                registry.reset_event_styles();
                ClickOutcome::Dismissed
            }
        }
    }
}
