//! Per-frame GPU modifier hooks registered alongside a splat renderer.
//!
//! Modifiers mutate splat data on the GPU before the frame's shadow and main renders.
//! The shadow core never calls into them; hosts drive the stack from their frame loop.

use anyhow::Result;

use crate::shadow::backend::ShadowBackend;
use crate::splat::{MaterialParameters, SplatRenderState};

pub trait SplatModifier<B: ShadowBackend> {
    fn name(&self) -> &'static str;

    fn initialize(&mut self) {}

    fn shutdown(&mut self) {}

    /// Returns `false` when the modifier cannot run on this backend; the stack then
    /// deactivates it.
    fn setup_resources(&mut self, _backend: &mut B, _state: &SplatRenderState) -> bool {
        true
    }

    fn release_resources(&mut self, _backend: &mut B) {}

    fn execute_gpu_modifications(
        &mut self,
        _backend: &mut B,
        _stream: &mut B::Stream,
        _state: &SplatRenderState,
    ) -> Result<()> {
        Ok(())
    }

    fn set_material_properties(&self, _state: &SplatRenderState, _material: &mut dyn MaterialParameters) {}
}

pub struct ModifierSummary<'a> {
    pub name: &'a str,
    pub active: bool,
    pub resources_ready: bool,
}

struct ModifierSlot<B: ShadowBackend> {
    modifier: Box<dyn SplatModifier<B>>,
    active: bool,
    resources_ready: bool,
}

/// Ordered modifiers, each with its own activation flag.
pub struct ModifierStack<B: ShadowBackend> {
    slots: Vec<ModifierSlot<B>>,
}

impl<B: ShadowBackend> Default for ModifierStack<B> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<B: ShadowBackend> ModifierStack<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mut modifier: Box<dyn SplatModifier<B>>) {
        modifier.initialize();
        log::debug!(target: "splat_shadows::modifier", "registered modifier '{}'", modifier.name());
        self.slots.push(ModifierSlot { modifier, active: true, resources_ready: false });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_active(&self, name: &str) -> Option<bool> {
        self.slots.iter().find(|slot| slot.modifier.name() == name).map(|slot| slot.active)
    }

    /// Returns `false` when no modifier has that name.
    pub fn set_active(&mut self, name: &str, active: bool) -> bool {
        match self.slots.iter_mut().find(|slot| slot.modifier.name() == name) {
            Some(slot) => {
                slot.active = active;
                true
            }
            None => false,
        }
    }

    /// Sets up every active modifier that has no resources yet.
    pub fn setup_resources(&mut self, backend: &mut B, state: &SplatRenderState) {
        for slot in self.slots.iter_mut().filter(|slot| slot.active && !slot.resources_ready) {
            if slot.modifier.setup_resources(backend, state) {
                slot.resources_ready = true;
            } else {
                log::warn!(
                    target: "splat_shadows::modifier",
                    "modifier '{}' failed to set up resources, deactivating",
                    slot.modifier.name()
                );
                slot.active = false;
            }
        }
    }

    /// Runs active modifiers in registration order. Returns how many ran.
    pub fn execute(&mut self, backend: &mut B, stream: &mut B::Stream, state: &SplatRenderState) -> usize {
        let mut executed = 0;
        for slot in self.slots.iter_mut().filter(|slot| slot.active && slot.resources_ready) {
            match slot.modifier.execute_gpu_modifications(backend, stream, state) {
                Ok(()) => executed += 1,
                Err(err) => {
                    log::warn!(
                        target: "splat_shadows::modifier",
                        "modifier '{}' failed: {err:?}. Deactivating.",
                        slot.modifier.name()
                    );
                    slot.active = false;
                }
            }
        }
        executed
    }

    pub fn set_material_properties(&self, state: &SplatRenderState, material: &mut dyn MaterialParameters) {
        for slot in self.slots.iter().filter(|slot| slot.active) {
            slot.modifier.set_material_properties(state, material);
        }
    }

    pub fn release_resources(&mut self, backend: &mut B) {
        for slot in self.slots.iter_mut().filter(|slot| slot.resources_ready) {
            slot.modifier.release_resources(backend);
            slot.resources_ready = false;
        }
    }

    pub fn shutdown(&mut self, backend: &mut B) {
        self.release_resources(backend);
        for slot in &mut self.slots {
            slot.modifier.shutdown();
        }
        self.slots.clear();
    }

    pub fn summaries(&self) -> Vec<ModifierSummary<'_>> {
        self.slots
            .iter()
            .map(|slot| ModifierSummary {
                name: slot.modifier.name(),
                active: slot.active,
                resources_ready: slot.resources_ready,
            })
            .collect()
    }
}
