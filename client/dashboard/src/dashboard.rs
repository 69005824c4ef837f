use crate::ingest::IngestEvent;
use crate::registry::Registry;
use crate::view::{build_cards, CardView, LinkState};

/// Presentation root: sole owner of the registry. Ingest events are applied
/// one at a time in arrival order; renderers read card snapshots.
#[derive(Default)]
pub struct Dashboard {
    registry: Registry,
    link: LinkState,
    dirty: bool,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            dirty: true,
            ..Self::default()
        }
    }

    pub fn handle(&mut self, event: IngestEvent) {
        match event {
            IngestEvent::Connected => self.link = LinkState::Live,
            IngestEvent::Telemetry {
                update,
                observed_at,
            } => {
                let device_id = update.device_id.clone();
                if self.registry.apply(update, observed_at) {
                    let metrics = self
                        .registry
                        .get(&device_id)
                        .map_or(0, |state| state.metrics().len());
                    tracing::debug!(%device_id, metrics, devices = self.registry.len(), "new device on feed");
                }
            }
            IngestEvent::Closed => self.link = LinkState::Closed,
        }
        self.dirty = true;
    }

    /// Cards for one render cycle, built from a detached registry snapshot.
    pub fn cards(&self) -> Vec<CardView> {
        build_cards(&self.registry.snapshot())
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    #[cfg_attr(not(feature = "gui"), allow(dead_code))]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// True once per batch of changes since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
