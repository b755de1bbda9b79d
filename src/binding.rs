//! Texture-unit assignment for every screen-space pass.
//!
//! Each pass declares its inputs as an ordered list of names. The
//! [`BindingTable`] turns those lists into `(pass, input) -> (unit, variable)`
//! entries once, when the pipeline is built, and never changes afterwards.
//! Shaders declare each input as `{name}_tex` at `@group(1) @binding(unit)`.

use std::collections::HashMap;

use crate::scene_info::MAX_SCENE_TEXTURES;

/// Screen-space passes that read textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassId {
    Lighting,
    Shadow,
    Reflection,
    Present,
}

impl PassId {
    pub const ALL: [PassId; 4] = [
        PassId::Lighting,
        PassId::Shadow,
        PassId::Reflection,
        PassId::Present,
    ];

    /// Declared inputs, in unit order.
    pub fn inputs(self) -> &'static [&'static str] {
        match self {
            PassId::Lighting => LIGHTING_INPUTS,
            PassId::Shadow => SHADOW_INPUTS,
            PassId::Reflection => REFLECTION_INPUTS,
            PassId::Present => PRESENT_INPUTS,
        }
    }
}

/// G-buffer attachments in attachment order.
pub const LIGHTING_INPUTS: &[&str] = &["position", "normal", "albedo", "material"];

pub const SHADOW_INPUTS: &[&str] = &[
    "normal", "position", "lit", "scene_0", "scene_1", "scene_2", "scene_3",
];

/// Shadow inputs with `material` inserted before the scene textures.
pub const REFLECTION_INPUTS: &[&str] = &[
    "normal", "position", "lit", "material", "scene_0", "scene_1", "scene_2", "scene_3",
];

pub const PRESENT_INPUTS: &[&str] = &["source"];

/// Where one input is bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub unit: u32,
    /// Name of the texture variable in the pass's shader.
    pub variable: String,
}

/// Immutable mapping from `(pass, input)` to its binding.
#[derive(Clone, Debug)]
pub struct BindingTable {
    entries: HashMap<(PassId, &'static str), Binding>,
}

impl BindingTable {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        for pass in PassId::ALL {
            for (unit, &name) in pass.inputs().iter().enumerate() {
                entries.insert(
                    (pass, name),
                    Binding {
                        unit: unit as u32,
                        variable: format!("{name}_tex"),
                    },
                );
            }
        }
        Self { entries }
    }

    pub fn get(&self, pass: PassId, input: &'static str) -> Option<&Binding> {
        self.entries.get(&(pass, input))
    }

    pub fn unit(&self, pass: PassId, input: &'static str) -> Option<u32> {
        self.get(pass, input).map(|b| b.unit)
    }

    /// Shader variable names of `pass`'s inputs, in unit order.
    pub fn variables(&self, pass: PassId) -> Vec<&str> {
        pass.inputs()
            .iter()
            .filter_map(|&name| self.get(pass, name))
            .map(|b| b.variable.as_str())
            .collect()
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = assert!(SHADOW_INPUTS.len() == 3 + MAX_SCENE_TEXTURES);
