use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};

use super::reflect::{BlockLayout, UniformKind};

/// CPU-side staging for one uniform block.
///
/// Setters address members by name. A name the block does not declare is
/// ignored without a message; the shader may simply not use it. A name with
/// the wrong kind is skipped with a warning.
#[derive(Clone, Debug)]
pub struct UniformBlock {
    layout: BlockLayout,
    data: Vec<u8>,
}

impl UniformBlock {
    pub fn new(layout: &BlockLayout) -> Self {
        Self {
            layout: layout.clone(),
            data: vec![0; layout.size as usize],
        }
    }

    pub fn size(&self) -> u32 {
        self.layout.size
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Zeroes every member.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    pub fn set_f32(&mut self, name: &str, value: f32) {
        self.write(name, UniformKind::F32, bytemuck::bytes_of(&value));
    }

    pub fn set_u32(&mut self, name: &str, value: u32) {
        self.write(name, UniformKind::U32, bytemuck::bytes_of(&value));
    }

    pub fn set_vec2(&mut self, name: &str, value: Vec2) {
        self.write(name, UniformKind::Vec2, bytemuck::bytes_of(&value.to_array()));
    }

    pub fn set_uvec2(&mut self, name: &str, value: UVec2) {
        self.write(name, UniformKind::UVec2, bytemuck::bytes_of(&value.to_array()));
    }

    pub fn set_vec3(&mut self, name: &str, value: Vec3) {
        self.write(name, UniformKind::Vec3, bytemuck::bytes_of(&value.to_array()));
    }

    pub fn set_vec4(&mut self, name: &str, value: Vec4) {
        self.write(name, UniformKind::Vec4, bytemuck::bytes_of(&value.to_array()));
    }

    pub fn set_mat4(&mut self, name: &str, value: Mat4) {
        self.write(name, UniformKind::Mat4, bytemuck::bytes_of(&value.to_cols_array()));
    }

    fn write(&mut self, name: &str, kind: UniformKind, bytes: &[u8]) {
        let Some(member) = self.layout.member(name) else {
            return;
        };
        if member.kind != kind {
            log::warn!(
                "uniform '{}.{}' is {:?}, not {:?}; upload skipped",
                self.layout.name,
                name,
                member.kind,
                kind
            );
            return;
        }
        let start = member.offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ProgramLayout;

    fn block() -> UniformBlock {
        let layout = ProgramLayout::reflect(
            "test",
            r#"
                struct U { light: vec4f, count: u32, scale: f32 }
                @group(0) @binding(0) var<uniform> u: U;
                @fragment fn fs() -> @location(0) vec4f {
                    return u.light * f32(u.count) * u.scale;
                }
            "#,
        )
        .unwrap();
        UniformBlock::new(layout.block("u").unwrap())
    }

    #[test]
    fn setters_write_at_reflected_offsets() {
        let mut block = block();
        block.set_vec4("light", Vec4::new(1.0, 2.0, 3.0, 4.0));
        block.set_u32("count", 7);
        block.set_f32("scale", 0.5);

        let floats: Vec<f32> = block
            .bytes()
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(&floats[..4], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(floats[4].to_bits(), 7);
        assert_eq!(floats[5], 0.5);
    }

    #[test]
    fn absent_member_is_a_no_op() {
        let mut block = block();
        let before = block.bytes().to_vec();

        block.set_mat4("inv_view", Mat4::IDENTITY);
        block.set_f32("time", 1.0);

        assert_eq!(block.bytes(), &before[..]);
        assert!(block.layout.member("time").is_none());
    }

    #[test]
    fn kind_mismatch_is_skipped() {
        let mut block = block();
        block.set_f32("count", 3.0);
        block.set_vec2("light", Vec2::ONE);

        assert!(block.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut block = block();
        block.set_vec4("light", Vec4::ONE);
        block.reset();
        assert!(block.bytes().iter().all(|&b| b == 0));
    }
}
