//! Reflection of WGSL programs with naga.
//!
//! Every program is parsed once when it is built. The result lists each
//! uniform block with its members' offsets and kinds, and each texture
//! binding with its variable name. Nothing is looked up at draw time.

use std::collections::HashMap;

use naga::{AddressSpace, ScalarKind, TypeInner, VectorSize};

use crate::error::RenderError;

/// Shape of a uniform member, as far as uploads care.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    F32,
    U32,
    I32,
    Vec2,
    UVec2,
    Vec3,
    Vec4,
    Mat4,
    /// Anything the setters cannot write (arrays, nested structs, ...).
    Other,
}

impl UniformKind {
    fn of(inner: &TypeInner) -> Self {
        match *inner {
            TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
                ScalarKind::Float => UniformKind::F32,
                ScalarKind::Uint => UniformKind::U32,
                ScalarKind::Sint => UniformKind::I32,
                _ => UniformKind::Other,
            },
            TypeInner::Vector { size, scalar } if scalar.width == 4 => {
                match (size, scalar.kind) {
                    (VectorSize::Bi, ScalarKind::Float) => UniformKind::Vec2,
                    (VectorSize::Bi, ScalarKind::Uint) => UniformKind::UVec2,
                    (VectorSize::Tri, ScalarKind::Float) => UniformKind::Vec3,
                    (VectorSize::Quad, ScalarKind::Float) => UniformKind::Vec4,
                    _ => UniformKind::Other,
                }
            }
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar,
            } if scalar.width == 4 => UniformKind::Mat4,
            _ => UniformKind::Other,
        }
    }
}

/// A member of a uniform block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformMember {
    pub offset: u32,
    pub kind: UniformKind,
}

/// A `var<uniform>` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    /// Size of the block in bytes, including trailing padding.
    pub size: u32,
    members: HashMap<String, UniformMember>,
}

impl BlockLayout {
    pub fn member(&self, name: &str) -> Option<UniformMember> {
        self.members.get(name).copied()
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &UniformMember)> {
        self.members.iter().map(|(name, member)| (name.as_str(), member))
    }
}

/// A texture or sampler declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceLayout {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub is_sampler: bool,
}

/// Everything a program declares, reflected from its source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramLayout {
    blocks: Vec<BlockLayout>,
    resources: Vec<ResourceLayout>,
}

impl ProgramLayout {
    /// Parses `source` and collects its uniform blocks and resources.
    pub fn reflect(label: &str, source: &str) -> Result<Self, RenderError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| RenderError::Shader {
            label: label.to_string(),
            message: e.emit_to_string(source),
        })?;

        let mut layout = ProgramLayout::default();

        for (_, var) in module.global_variables.iter() {
            let (Some(name), Some(binding)) = (&var.name, &var.binding) else {
                continue;
            };
            let inner = &module.types[var.ty].inner;

            match (var.space, inner) {
                (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                    let members = members
                        .iter()
                        .filter_map(|m| {
                            let name = m.name.clone()?;
                            let kind = UniformKind::of(&module.types[m.ty].inner);
                            Some((name, UniformMember { offset: m.offset, kind }))
                        })
                        .collect();
                    layout.blocks.push(BlockLayout {
                        name: name.clone(),
                        group: binding.group,
                        binding: binding.binding,
                        size: *span,
                        members,
                    });
                }
                (AddressSpace::Handle, TypeInner::Image { .. }) => {
                    layout.resources.push(ResourceLayout {
                        name: name.clone(),
                        group: binding.group,
                        binding: binding.binding,
                        is_sampler: false,
                    });
                }
                (AddressSpace::Handle, TypeInner::Sampler { .. }) => {
                    layout.resources.push(ResourceLayout {
                        name: name.clone(),
                        group: binding.group,
                        binding: binding.binding,
                        is_sampler: true,
                    });
                }
                _ => {}
            }
        }

        Ok(layout)
    }

    /// The uniform block declared as `var<uniform> name`.
    pub fn block(&self, name: &str) -> Option<&BlockLayout> {
        self.blocks.iter().find(|b| b.name == name)
    }

    /// The uniform block at `(group, binding)`.
    pub fn block_at(&self, group: u32, binding: u32) -> Option<&BlockLayout> {
        self.blocks
            .iter()
            .find(|b| b.group == group && b.binding == binding)
    }

    pub fn blocks(&self) -> &[BlockLayout] {
        &self.blocks
    }

    /// Binding slot of the texture variable `name`.
    pub fn texture(&self, name: &str) -> Option<&ResourceLayout> {
        self.resources
            .iter()
            .find(|r| !r.is_sampler && r.name == name)
    }

    pub fn resources(&self) -> &[ResourceLayout] {
        &self.resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
        struct Uniforms {
            view: mat4x4f,
            eye: vec3f,
            time: f32,
            resolution: vec2f,
            count: u32,
            extent: vec2u,
        }
        @group(0) @binding(0) var<uniform> u: Uniforms;
        @group(1) @binding(0) var normal_tex: texture_2d<f32>;
        @group(1) @binding(1) var position_tex: texture_2d<f32>;
        @group(1) @binding(2) var linear: sampler;

        @fragment
        fn fs(@builtin(position) p: vec4f) -> @location(0) vec4f {
            let n = textureLoad(normal_tex, vec2i(p.xy), 0);
            let q = textureLoad(position_tex, vec2i(p.xy), 0);
            return u.view * (n + q) + vec4f(u.eye, u.time);
        }
    "#;

    #[test]
    fn member_offsets_follow_wgsl_alignment() {
        let layout = ProgramLayout::reflect("test", SOURCE).unwrap();
        let block = layout.block("u").unwrap();

        assert_eq!((block.group, block.binding), (0, 0));
        assert_eq!(block.member("view"), Some(UniformMember { offset: 0, kind: UniformKind::Mat4 }));
        assert_eq!(block.member("eye"), Some(UniformMember { offset: 64, kind: UniformKind::Vec3 }));
        // f32 packs into the vec3's trailing padding.
        assert_eq!(block.member("time"), Some(UniformMember { offset: 76, kind: UniformKind::F32 }));
        assert_eq!(block.member("resolution").map(|m| m.offset), Some(80));
        assert_eq!(block.member("count").map(|m| m.kind), Some(UniformKind::U32));
        assert_eq!(block.member("extent").map(|m| m.kind), Some(UniformKind::UVec2));
        assert_eq!(block.size, 112);
    }

    #[test]
    fn textures_and_samplers_are_listed() {
        let layout = ProgramLayout::reflect("test", SOURCE).unwrap();

        assert_eq!(layout.texture("normal_tex").map(|t| t.binding), Some(0));
        assert_eq!(layout.texture("position_tex").map(|t| t.binding), Some(1));
        assert!(layout.texture("linear").is_none());
        assert_eq!(layout.resources().iter().filter(|r| r.is_sampler).count(), 1);
    }

    #[test]
    fn unknown_names_are_absent() {
        let layout = ProgramLayout::reflect("test", SOURCE).unwrap();
        assert!(layout.block("missing").is_none());
        assert!(layout.block("u").unwrap().member("missing").is_none());
    }

    #[test]
    fn parse_errors_carry_the_label() {
        let err = ProgramLayout::reflect("broken", "fn (").unwrap_err();
        match err {
            RenderError::Shader { label, .. } => assert_eq!(label, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
