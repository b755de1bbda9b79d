//! Shader programs shared by every pass.
//!
//! - [`ProgramLayout`]: uniform blocks and texture bindings, reflected from
//!   WGSL once.
//! - [`UniformBlock`]: name-addressed staging for one uniform block.
//! - [`ShaderProgram`]: a screen-space program drawing the shared
//!   [`ScreenQuad`].

mod program;
mod reflect;
mod screen_quad;
mod uniforms;

pub use program::{INPUT_GROUP, ProgramDescriptor, ShaderProgram, UNIFORM_GROUP};
pub use reflect::{BlockLayout, ProgramLayout, ResourceLayout, UniformKind, UniformMember};
pub use screen_quad::{SCREEN_QUAD_WGSL, ScreenQuad};
pub use uniforms::UniformBlock;
