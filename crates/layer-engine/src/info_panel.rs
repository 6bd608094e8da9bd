//! Info-panel collaborator.
//!
//! The panel is external to the engine; [`InfoPanel`] is what the engine
//! calls. [`InfoPanelState`] is an observable implementation exposing one
//! `watch` channel per topic.

use serde::Serialize;
use tokio::sync::watch;

use crate::content::{EventInfo, ForecastInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoType {
    Forecast,
    Event,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InfoPayload {
    Forecast(Box<ForecastInfo>),
    Event(EventInfo),
}

impl InfoPayload {
    pub fn info_type(&self) -> InfoType {
        match self {
            InfoPayload::Forecast(_) => InfoType::Forecast,
            InfoPayload::Event(_) => InfoType::Event,
        }
    }
}

pub trait InfoPanel: Send + Sync {
    fn set_visibility(&self, visible: bool);
    fn set_type(&self, info_type: InfoType);
    fn set_data(&self, payload: InfoPayload);
}

/// Current panel contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoPanelSnapshot {
    pub visible: bool,
    #[serde(rename = "type")]
    pub info_type: Option<InfoType>,
    pub data: Option<InfoPayload>,
}

pub struct InfoPanelState {
    visible: watch::Sender<bool>,
    info_type: watch::Sender<Option<InfoType>>,
    data: watch::Sender<Option<InfoPayload>>,
}

impl Default for InfoPanelState {
    fn default() -> Self {
        Self::new()
    }
}

impl InfoPanelState {
    pub fn new() -> Self {
        Self {
            visible: watch::channel(false).0,
            info_type: watch::channel(None).0,
            data: watch::channel(None).0,
        }
    }

    pub fn watch_visibility(&self) -> watch::Receiver<bool> {
        self.visible.subscribe()
    }

    pub fn watch_type(&self) -> watch::Receiver<Option<InfoType>> {
        self.info_type.subscribe()
    }

    pub fn watch_data(&self) -> watch::Receiver<Option<InfoPayload>> {
        self.data.subscribe()
    }

    pub fn toggle(&self) {
        self.visible.send_modify(|v| *v = !*v);
    }

    /// Hide the panel and clear its contents.
    pub fn reset(&self) {
        self.visible.send_replace(false);
        self.info_type.send_replace(None);
        self.data.send_replace(None);
    }

    pub fn snapshot(&self) -> InfoPanelSnapshot {
        InfoPanelSnapshot {
            visible: *self.visible.borrow(),
            info_type: *self.info_type.borrow(),
            data: self.data.borrow().clone(),
        }
    }
}

impl InfoPanel for InfoPanelState {
    fn set_visibility(&self, visible: bool) {
        self.visible.send_replace(visible);
    }

    fn set_type(&self, info_type: InfoType) {
        self.info_type.send_replace(Some(info_type));
    }

    fn set_data(&self, payload: InfoPayload) {
        self.data.send_replace(Some(payload));
    }
}
