//! Layer composition: the frame's pass schedule
//!
//! A composition owns a set of layers and an ordered list of sub-layer
//! entries, one per (layer, partition) pair. The entry order is the order
//! sub-passes execute; pushing a whole layer appends its opaque entry
//! followed by its transparent entry, but the two halves can also be
//! scheduled independently to interleave passes (draw all opaques first,
//! then all transparents, for example).

use log::warn;

use crate::events::EventDispatcher;
use crate::render::{InstanceKey, Layer, LayerId, PartitionKind, RenderScene};
use crate::scene::{CameraKey, LightKey};

/// One schedulable sub-pass: a partition of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubLayerEntry {
    /// Layer the entry draws from
    pub layer: LayerId,
    /// Which partition of that layer
    pub kind: PartitionKind,
}

/// Composition change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionEvent {
    /// A layer gained its first sub-layer entry
    LayerAdded(LayerId),
    /// A layer lost its last sub-layer entry and was dropped
    LayerRemoved(LayerId),
}

/// Ordered collection of layers defining how a frame is drawn
pub struct LayerComposition {
    /// Display name for logs
    pub name: String,
    /// Change notifications, fired on layer add and remove
    pub events: EventDispatcher<CompositionEvent>,
    layers: Vec<Layer>,
    entries: Vec<SubLayerEntry>,
}

impl LayerComposition {
    /// Create an empty composition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: EventDispatcher::new(),
            layers: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Append a layer: its opaque entry, then its transparent entry
    ///
    /// A layer id already present is ignored with a warning.
    pub fn push(&mut self, layer: Layer) {
        let index = self.entries.len();
        self.insert(layer, index);
    }

    /// Insert a layer's two entries starting at `index`
    ///
    /// `index` is clamped to the entry list; a layer id already present is
    /// ignored with a warning.
    pub fn insert(&mut self, layer: Layer, index: usize) {
        if self.layer_by_id(layer.id).is_some() {
            warn!(
                "Composition '{}': layer id {} already present, ignoring",
                self.name, layer.id
            );
            return;
        }
        let index = index.min(self.entries.len());
        self.entries.insert(
            index,
            SubLayerEntry {
                layer: layer.id,
                kind: PartitionKind::Transparent,
            },
        );
        self.entries.insert(
            index,
            SubLayerEntry {
                layer: layer.id,
                kind: PartitionKind::Opaque,
            },
        );
        let id = layer.id;
        self.layers.push(layer);
        self.events.dispatch(&CompositionEvent::LayerAdded(id));
    }

    /// Append only one partition of a layer
    ///
    /// When the layer is already owned (its other partition was scheduled
    /// earlier), only the entry is added; scheduling the same partition
    /// twice is a no-op.
    pub fn push_partition(&mut self, layer: Layer, kind: PartitionKind) {
        let index = self.entries.len();
        self.insert_partition(layer, kind, index);
    }

    /// Insert only one partition of a layer at `index`
    pub fn insert_partition(&mut self, layer: Layer, kind: PartitionKind, index: usize) {
        let id = layer.id;
        let entry = SubLayerEntry { layer: id, kind };
        if self.entries.contains(&entry) {
            return;
        }
        let index = index.min(self.entries.len());
        self.entries.insert(index, entry);
        if self.layer_by_id(id).is_none() {
            self.layers.push(layer);
            self.events.dispatch(&CompositionEvent::LayerAdded(id));
        }
    }

    /// Remove a layer and every entry referencing it
    ///
    /// Returns the removed layer; an absent id is a silent no-op.
    pub fn remove(&mut self, id: LayerId) -> Option<Layer> {
        let position = self.layers.iter().position(|l| l.id == id)?;
        self.entries.retain(|e| e.layer != id);
        let layer = self.layers.swap_remove(position);
        self.events.dispatch(&CompositionEvent::LayerRemoved(id));
        Some(layer)
    }

    /// Remove one partition entry of a layer
    ///
    /// When it was the layer's last entry the layer itself is dropped and
    /// returned; otherwise (and for absent entries) `None`.
    pub fn remove_partition(&mut self, id: LayerId, kind: PartitionKind) -> Option<Layer> {
        let entry = SubLayerEntry { layer: id, kind };
        let before = self.entries.len();
        self.entries.retain(|e| *e != entry);
        if self.entries.len() == before {
            return None;
        }
        if self.entries.iter().any(|e| e.layer == id) {
            return None;
        }
        let position = self.layers.iter().position(|l| l.id == id)?;
        let layer = self.layers.swap_remove(position);
        self.events.dispatch(&CompositionEvent::LayerRemoved(id));
        Some(layer)
    }

    /// Sub-layer entries in execution order
    pub fn entries(&self) -> &[SubLayerEntry] {
        &self.entries
    }

    /// Layer lookup by id
    pub fn layer_by_id(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Mutable layer lookup by id
    pub fn layer_by_id_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// Layer lookup by name; first match wins
    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Mutable layer lookup by name; first match wins
    pub fn layer_by_name_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.name == name)
    }

    /// Register a mesh instance with a layer by id
    ///
    /// The instance is routed to the layer's opaque or transparent
    /// partition by its material. An absent layer id warns and does
    /// nothing.
    pub fn add_instance(&mut self, scene: &RenderScene, id: LayerId, key: InstanceKey) {
        match self.layer_by_id_mut(id) {
            Some(layer) => layer.add_instance(scene, key),
            None => warn!(
                "Composition '{}': no layer with id {} to add instance to",
                self.name, id
            ),
        }
    }

    /// Unregister a mesh instance from a layer by id
    ///
    /// Absent layers and absent instances are silent no-ops.
    pub fn remove_instance(&mut self, id: LayerId, key: InstanceKey) {
        if let Some(layer) = self.layer_by_id_mut(id) {
            layer.remove_instance(key);
        }
    }

    /// Register a light with a layer by id
    ///
    /// An absent layer id warns and does nothing.
    pub fn add_light(&mut self, id: LayerId, key: LightKey) {
        match self.layer_by_id_mut(id) {
            Some(layer) => layer.add_light(key),
            None => warn!(
                "Composition '{}': no layer with id {} to add light to",
                self.name, id
            ),
        }
    }

    /// Unregister a light from a layer by id
    ///
    /// Absent layers and absent lights are silent no-ops.
    pub fn remove_light(&mut self, id: LayerId, key: LightKey) {
        if let Some(layer) = self.layer_by_id_mut(id) {
            layer.remove_light(key);
        }
    }

    /// Cameras of all enabled layers in entry order, first occurrence wins
    ///
    /// This is the camera list a frame renders: each camera runs the full
    /// entry sequence once, regardless of how many layers reference it.
    pub fn cameras(&self) -> Vec<CameraKey> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            let Some(layer) = self.layer_by_id(entry.layer) else {
                continue;
            };
            if !layer.enabled {
                continue;
            }
            for &camera in layer.cameras() {
                if !seen.contains(&camera) {
                    seen.push(camera);
                }
            }
        }
        seen
    }
}

impl std::fmt::Debug for LayerComposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerComposition")
            .field("name", &self.name)
            .field("layers", &self.layers.len())
            .field("entries", &self.entries)
            .finish()
    }
}
