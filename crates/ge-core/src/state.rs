//! The command register bank and its typed accessors.
//!
//! The display-list interpreter (an external collaborator) writes raw 32-bit
//! command words into the bank between submissions; during a submission the
//! rasterizer only reads. Each word carries its command number in the top
//! byte and 24 bits of payload, so accessors mask the payload out.

use crate::math::Vec3;

/// Command register numbers. Only the registers the render core reads are
/// named here; the interpreter owns the rest of the map.
pub mod reg {
    pub const VERTEX_TYPE: usize = 0x12;
    pub const LIGHTING_ENABLE: usize = 0x17;
    pub const TEXTURE_MAP_ENABLE: usize = 0x1E;
    pub const FOG_ENABLE: usize = 0x1F;
    pub const ALPHA_BLEND_ENABLE: usize = 0x21;
    pub const Z_TEST_ENABLE: usize = 0x23;

    pub const VIEWPORT_X_SCALE: usize = 0x42;
    pub const VIEWPORT_Y_SCALE: usize = 0x43;
    pub const VIEWPORT_Z_SCALE: usize = 0x44;
    pub const VIEWPORT_X_CENTER: usize = 0x45;
    pub const VIEWPORT_Y_CENTER: usize = 0x46;
    pub const VIEWPORT_Z_CENTER: usize = 0x47;
    pub const OFFSET_X: usize = 0x4C;
    pub const OFFSET_Y: usize = 0x4D;

    pub const SHADE_MODE: usize = 0x50;
    pub const MATERIAL_DIFFUSE: usize = 0x56;
    pub const MATERIAL_ALPHA: usize = 0x58;

    pub const FRAME_BUF_WIDTH: usize = 0x9D;
    pub const Z_BUF_WIDTH: usize = 0x9F;

    pub const TEX_ADDR0: usize = 0xA0;
    pub const TEX_BUF_WIDTH0: usize = 0xA8;
    pub const TEX_SIZE0: usize = 0xB8;
    pub const TEX_MODE: usize = 0xC2;
    pub const TEX_FORMAT: usize = 0xC3;
    pub const CLUT_FORMAT: usize = 0xC5;
    pub const TEX_FUNC: usize = 0xC9;
    pub const TEX_ENV_COLOR: usize = 0xCA;

    pub const FOG_END: usize = 0xCD;
    pub const FOG_SLOPE: usize = 0xCE;
    pub const FOG_COLOR: usize = 0xCF;

    pub const CLEAR_MODE: usize = 0xD3;
    pub const SCISSOR1: usize = 0xD4;
    pub const SCISSOR2: usize = 0xD5;
    pub const Z_TEST: usize = 0xDE;
    pub const BLEND_MODE: usize = 0xDF;
    pub const BLEND_FIX_A: usize = 0xE0;
    pub const BLEND_FIX_B: usize = 0xE1;
    pub const Z_WRITE_DISABLE: usize = 0xE7;
}

/// Depth comparison, in hardware encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthFunc {
    Never,
    Always,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl DepthFunc {
    pub fn from_bits(bits: u32) -> DepthFunc {
        match bits & 7 {
            0 => DepthFunc::Never,
            1 => DepthFunc::Always,
            2 => DepthFunc::Equal,
            3 => DepthFunc::NotEqual,
            4 => DepthFunc::Less,
            5 => DepthFunc::LessOrEqual,
            6 => DepthFunc::Greater,
            _ => DepthFunc::GreaterOrEqual,
        }
    }
}

/// Texture environment function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFunc {
    Modulate,
    Decal,
    Blend,
    Replace,
    Add,
}

impl TextureFunc {
    pub fn from_bits(bits: u32) -> Option<TextureFunc> {
        match bits & 7 {
            0 => Some(TextureFunc::Modulate),
            1 => Some(TextureFunc::Decal),
            2 => Some(TextureFunc::Blend),
            3 => Some(TextureFunc::Replace),
            4 => Some(TextureFunc::Add),
            _ => None,
        }
    }
}

/// Blend source factor selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendSrc {
    DstColor,
    InvDstColor,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
    DoubleSrcAlpha,
    DoubleInvSrcAlpha,
    DoubleDstAlpha,
    DoubleInvDstAlpha,
    FixA,
}

impl BlendSrc {
    pub fn from_bits(bits: u32) -> Option<BlendSrc> {
        match bits & 0xF {
            0 => Some(BlendSrc::DstColor),
            1 => Some(BlendSrc::InvDstColor),
            2 => Some(BlendSrc::SrcAlpha),
            3 => Some(BlendSrc::InvSrcAlpha),
            4 => Some(BlendSrc::DstAlpha),
            5 => Some(BlendSrc::InvDstAlpha),
            6 => Some(BlendSrc::DoubleSrcAlpha),
            7 => Some(BlendSrc::DoubleInvSrcAlpha),
            8 => Some(BlendSrc::DoubleDstAlpha),
            9 => Some(BlendSrc::DoubleInvDstAlpha),
            10 => Some(BlendSrc::FixA),
            _ => None,
        }
    }
}

/// Blend destination factor selector; the symmetric set with source color
/// in place of destination color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendDst {
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
    DoubleSrcAlpha,
    DoubleInvSrcAlpha,
    DoubleDstAlpha,
    DoubleInvDstAlpha,
    FixB,
}

impl BlendDst {
    pub fn from_bits(bits: u32) -> Option<BlendDst> {
        match bits & 0xF {
            0 => Some(BlendDst::SrcColor),
            1 => Some(BlendDst::InvSrcColor),
            2 => Some(BlendDst::SrcAlpha),
            3 => Some(BlendDst::InvSrcAlpha),
            4 => Some(BlendDst::DstAlpha),
            5 => Some(BlendDst::InvDstAlpha),
            6 => Some(BlendDst::DoubleSrcAlpha),
            7 => Some(BlendDst::DoubleInvSrcAlpha),
            8 => Some(BlendDst::DoubleDstAlpha),
            9 => Some(BlendDst::DoubleInvDstAlpha),
            10 => Some(BlendDst::FixB),
            _ => None,
        }
    }
}

/// Blend equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendEq {
    MulAndAdd,
    MulAndSubtract,
    MulAndSubtractReverse,
    Min,
    Max,
    AbsDiff,
}

impl BlendEq {
    pub fn from_bits(bits: u32) -> Option<BlendEq> {
        match bits & 7 {
            0 => Some(BlendEq::MulAndAdd),
            1 => Some(BlendEq::MulAndSubtract),
            2 => Some(BlendEq::MulAndSubtractReverse),
            3 => Some(BlendEq::Min),
            4 => Some(BlendEq::Max),
            5 => Some(BlendEq::AbsDiff),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadeModel {
    Flat,
    Gouraud,
}

/// Texel storage format, low nibble of the format register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgb565,
    Rgba5551,
    Rgba4444,
    Rgba8888,
    Clut4,
    Clut8,
    Clut16,
    Clut32,
    Dxt1,
    Dxt3,
    Dxt5,
}

impl TextureFormat {
    pub fn from_bits(bits: u32) -> Option<TextureFormat> {
        match bits & 0xF {
            0 => Some(TextureFormat::Rgb565),
            1 => Some(TextureFormat::Rgba5551),
            2 => Some(TextureFormat::Rgba4444),
            3 => Some(TextureFormat::Rgba8888),
            4 => Some(TextureFormat::Clut4),
            5 => Some(TextureFormat::Clut8),
            6 => Some(TextureFormat::Clut16),
            7 => Some(TextureFormat::Clut32),
            8 => Some(TextureFormat::Dxt1),
            9 => Some(TextureFormat::Dxt3),
            10 => Some(TextureFormat::Dxt5),
            _ => None,
        }
    }

    pub fn bits_per_texel(self) -> usize {
        match self {
            TextureFormat::Clut4 => 4,
            TextureFormat::Clut8 => 8,
            TextureFormat::Rgb565
            | TextureFormat::Rgba5551
            | TextureFormat::Rgba4444
            | TextureFormat::Clut16 => 16,
            TextureFormat::Rgba8888 | TextureFormat::Clut32 => 32,
            // Compressed formats have no per-texel width; unsupported anyway.
            TextureFormat::Dxt1 | TextureFormat::Dxt3 | TextureFormat::Dxt5 => 0,
        }
    }
}

/// Primitive topology of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GePrimitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Rectangles,
}

impl GePrimitive {
    pub fn from_bits(bits: u32) -> Option<GePrimitive> {
        match bits & 7 {
            0 => Some(GePrimitive::Points),
            1 => Some(GePrimitive::Lines),
            2 => Some(GePrimitive::LineStrip),
            3 => Some(GePrimitive::Triangles),
            4 => Some(GePrimitive::TriangleStrip),
            5 => Some(GePrimitive::TriangleFan),
            6 => Some(GePrimitive::Rectangles),
            _ => None,
        }
    }
}

/// The register bank plus the float matrix slots the matrix-upload commands
/// fill. Process-wide: built once at startup, mutated only between
/// submissions.
#[derive(Clone)]
pub struct GpuState {
    pub cmd: [u32; 256],
    /// Model->world, 3x4 column-major (translation in 9..12).
    pub world_matrix: [f32; 12],
    /// World->view, 3x4 column-major.
    pub view_matrix: [f32; 12],
    /// View->clip projection, 4x4 column-major.
    pub proj_matrix: [f32; 16],
}

impl Default for GpuState {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuState {
    pub fn new() -> Self {
        let identity3x4 = [
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0, //
            0.0, 0.0, 0.0,
        ];
        let mut identity4x4 = [0.0; 16];
        for i in 0..4 {
            identity4x4[i * 4 + i] = 1.0;
        }
        Self {
            cmd: [0; 256],
            world_matrix: identity3x4,
            view_matrix: identity3x4,
            proj_matrix: identity4x4,
        }
    }

    /// Stores a raw command word. Interpreter-side API; reads during a
    /// submission observe a frozen bank.
    pub fn set_cmd(&mut self, reg: usize, word: u32) {
        self.cmd[reg] = word;
    }

    fn data(&self, reg: usize) -> u32 {
        self.cmd[reg] & 0x00FF_FFFF
    }

    /// Viewport words hold a float's top 24 bits; restore by shifting the
    /// payload back into exponent position.
    fn float24(&self, reg: usize) -> f32 {
        f32::from_bits(self.data(reg) << 8)
    }

    // ─── Modes ───

    pub fn is_mode_clear(&self) -> bool {
        self.data(reg::CLEAR_MODE) & 1 != 0
    }

    /// Clear-mode per-buffer flags: color bit 8, alpha bit 9, depth bit 10.
    pub fn is_clear_color_enabled(&self) -> bool {
        self.data(reg::CLEAR_MODE) & 0x100 != 0
    }

    pub fn is_clear_alpha_enabled(&self) -> bool {
        self.data(reg::CLEAR_MODE) & 0x200 != 0
    }

    pub fn is_clear_depth_enabled(&self) -> bool {
        self.data(reg::CLEAR_MODE) & 0x400 != 0
    }

    /// Through mode: vertex positions are pre-transformed drawing
    /// coordinates. Bit 23 of the vertex-type word.
    pub fn is_mode_through(&self) -> bool {
        self.cmd[reg::VERTEX_TYPE] & (1 << 23) != 0
    }

    pub fn is_lighting_enabled(&self) -> bool {
        self.data(reg::LIGHTING_ENABLE) & 1 != 0
    }

    pub fn is_texture_map_enabled(&self) -> bool {
        self.data(reg::TEXTURE_MAP_ENABLE) & 1 != 0
    }

    pub fn is_fog_enabled(&self) -> bool {
        self.data(reg::FOG_ENABLE) & 1 != 0
    }

    pub fn is_alpha_blend_enabled(&self) -> bool {
        self.data(reg::ALPHA_BLEND_ENABLE) & 1 != 0
    }

    pub fn is_depth_test_enabled(&self) -> bool {
        self.data(reg::Z_TEST_ENABLE) & 1 != 0
    }

    /// The register disables writes; the accessor answers the positive
    /// question.
    pub fn is_depth_write_enabled(&self) -> bool {
        self.data(reg::Z_WRITE_DISABLE) & 1 == 0
    }

    /// Color doubling, bit 16 of the texture-function word.
    pub fn is_color_doubling_enabled(&self) -> bool {
        self.data(reg::TEX_FUNC) & 0x10000 != 0
    }

    pub fn shade_model(&self) -> ShadeModel {
        if self.data(reg::SHADE_MODE) & 1 != 0 {
            ShadeModel::Gouraud
        } else {
            ShadeModel::Flat
        }
    }

    // ─── Depth ───

    pub fn depth_test_func(&self) -> DepthFunc {
        DepthFunc::from_bits(self.data(reg::Z_TEST))
    }

    // ─── Texture environment ───

    pub fn texture_function(&self) -> Option<TextureFunc> {
        TextureFunc::from_bits(self.data(reg::TEX_FUNC))
    }

    /// When set, the texture's alpha participates in the texture function;
    /// otherwise the fragment keeps its own alpha.
    pub fn texture_function_rgba(&self) -> bool {
        self.data(reg::TEX_FUNC) & 0x10 != 0
    }

    pub fn texture_env_color(&self) -> Vec3<i32> {
        Vec3::from_rgb(self.data(reg::TEX_ENV_COLOR))
    }

    // ─── Blending ───

    pub fn blend_src(&self) -> Option<BlendSrc> {
        BlendSrc::from_bits(self.data(reg::BLEND_MODE))
    }

    pub fn blend_dst(&self) -> Option<BlendDst> {
        BlendDst::from_bits(self.data(reg::BLEND_MODE) >> 4)
    }

    pub fn blend_eq(&self) -> Option<BlendEq> {
        BlendEq::from_bits(self.data(reg::BLEND_MODE) >> 8)
    }

    pub fn blend_fix_a(&self) -> Vec3<i32> {
        Vec3::from_rgb(self.data(reg::BLEND_FIX_A))
    }

    pub fn blend_fix_b(&self) -> Vec3<i32> {
        Vec3::from_rgb(self.data(reg::BLEND_FIX_B))
    }

    // ─── Viewport / offset / scissor ───

    pub fn viewport_x_scale(&self) -> f32 {
        self.float24(reg::VIEWPORT_X_SCALE)
    }

    pub fn viewport_y_scale(&self) -> f32 {
        self.float24(reg::VIEWPORT_Y_SCALE)
    }

    pub fn viewport_z_scale(&self) -> f32 {
        self.float24(reg::VIEWPORT_Z_SCALE)
    }

    pub fn viewport_x_center(&self) -> f32 {
        self.float24(reg::VIEWPORT_X_CENTER)
    }

    pub fn viewport_y_center(&self) -> f32 {
        self.float24(reg::VIEWPORT_Y_CENTER)
    }

    pub fn viewport_z_center(&self) -> f32 {
        self.float24(reg::VIEWPORT_Z_CENTER)
    }

    /// Screen-to-drawing offset, sub-pixel (1/16) units.
    pub fn offset_x(&self) -> u32 {
        self.data(reg::OFFSET_X) & 0xFFFF
    }

    pub fn offset_y(&self) -> u32 {
        self.data(reg::OFFSET_Y) & 0xFFFF
    }

    /// Scissor bounds, inclusive, drawing coordinates.
    pub fn scissor_x1(&self) -> i32 {
        (self.data(reg::SCISSOR1) & 0x3FF) as i32
    }

    pub fn scissor_y1(&self) -> i32 {
        ((self.data(reg::SCISSOR1) >> 10) & 0x3FF) as i32
    }

    pub fn scissor_x2(&self) -> i32 {
        (self.data(reg::SCISSOR2) & 0x3FF) as i32
    }

    pub fn scissor_y2(&self) -> i32 {
        ((self.data(reg::SCISSOR2) >> 10) & 0x3FF) as i32
    }

    // ─── Textures ───

    /// Guest address of a mip level: low 24 bits from the address register,
    /// the top nibble carried in the buffer-width register's upper bits.
    pub fn tex_addr(&self, level: usize) -> u32 {
        (self.data(reg::TEX_ADDR0 + level) & 0xFF_FFF0)
            | ((self.data(reg::TEX_BUF_WIDTH0 + level) << 8) & 0x0F00_0000)
    }

    pub fn tex_buf_width(&self, level: usize) -> u32 {
        self.data(reg::TEX_BUF_WIDTH0 + level) & 0xFFFF
    }

    pub fn tex_width(&self, level: usize) -> usize {
        1 << (self.data(reg::TEX_SIZE0 + level) & 0xF)
    }

    pub fn tex_height(&self, level: usize) -> usize {
        1 << ((self.data(reg::TEX_SIZE0 + level) >> 8) & 0xF)
    }

    pub fn texture_format(&self) -> Option<TextureFormat> {
        TextureFormat::from_bits(self.data(reg::TEX_FORMAT))
    }

    /// Bit 0 of the texture-mode word selects the swizzled tile layout.
    pub fn is_texture_swizzled(&self) -> bool {
        self.data(reg::TEX_MODE) & 1 != 0
    }

    // ─── CLUT ───

    pub fn clut_index_shift(&self) -> u32 {
        (self.data(reg::CLUT_FORMAT) >> 2) & 0x1F
    }

    pub fn clut_index_mask(&self) -> u32 {
        (self.data(reg::CLUT_FORMAT) >> 8) & 0xFF
    }

    pub fn clut_index_start_pos(&self) -> u32 {
        ((self.data(reg::CLUT_FORMAT) >> 16) & 0x1F) << 4
    }

    // ─── Material fallback colors ───

    pub fn material_diffuse(&self) -> Vec3<i32> {
        Vec3::from_rgb(self.data(reg::MATERIAL_DIFFUSE))
    }

    pub fn material_alpha(&self) -> i32 {
        (self.data(reg::MATERIAL_ALPHA) & 0xFF) as i32
    }

    // ─── Fog ───

    pub fn fog_end(&self) -> f32 {
        self.float24(reg::FOG_END)
    }

    pub fn fog_slope(&self) -> f32 {
        self.float24(reg::FOG_SLOPE)
    }

    pub fn fog_color(&self) -> Vec3<i32> {
        Vec3::from_rgb(self.data(reg::FOG_COLOR))
    }

    // ─── Render target configuration ───

    pub fn frame_buf_stride(&self) -> u32 {
        self.data(reg::FRAME_BUF_WIDTH) & 0xFFFF
    }

    pub fn depth_buf_stride(&self) -> u32 {
        self.data(reg::Z_BUF_WIDTH) & 0xFFFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode a float into the 24-bit viewport register payload.
    fn float24_word(v: f32) -> u32 {
        v.to_bits() >> 8
    }

    #[test]
    fn viewport_floats_survive_the_24_bit_encoding() {
        let mut state = GpuState::new();
        state.set_cmd(reg::VIEWPORT_X_SCALE, float24_word(2048.0));
        state.set_cmd(reg::VIEWPORT_X_CENTER, float24_word(-136.0));
        assert_eq!(state.viewport_x_scale(), 2048.0);
        assert_eq!(state.viewport_x_center(), -136.0);
    }

    #[test]
    fn scissor_fields_unpack_from_both_words() {
        let mut state = GpuState::new();
        state.set_cmd(reg::SCISSOR1, 5 | (7 << 10));
        state.set_cmd(reg::SCISSOR2, 479 | (271 << 10));
        assert_eq!(state.scissor_x1(), 5);
        assert_eq!(state.scissor_y1(), 7);
        assert_eq!(state.scissor_x2(), 479);
        assert_eq!(state.scissor_y2(), 271);
    }

    #[test]
    fn blend_selectors_decode_from_one_word() {
        let mut state = GpuState::new();
        // src = SrcAlpha (2), dst = InvSrcAlpha (3), eq = MulAndAdd (0)
        state.set_cmd(reg::BLEND_MODE, 2 | (3 << 4));
        assert_eq!(state.blend_src(), Some(BlendSrc::SrcAlpha));
        assert_eq!(state.blend_dst(), Some(BlendDst::InvSrcAlpha));
        assert_eq!(state.blend_eq(), Some(BlendEq::MulAndAdd));

        // Out-of-range selectors surface as None for the caller to log.
        state.set_cmd(reg::BLEND_MODE, 0xF | (0xF << 4) | (7 << 8));
        assert_eq!(state.blend_src(), None);
        assert_eq!(state.blend_dst(), None);
        assert_eq!(state.blend_eq(), None);
    }

    #[test]
    fn clut_index_parameters_unpack() {
        let mut state = GpuState::new();
        // shift 2, mask 0x0F, start block 3 (-> entry 48)
        state.set_cmd(reg::CLUT_FORMAT, (2 << 2) | (0x0F << 8) | (3 << 16));
        assert_eq!(state.clut_index_shift(), 2);
        assert_eq!(state.clut_index_mask(), 0x0F);
        assert_eq!(state.clut_index_start_pos(), 48);
    }

    #[test]
    fn depth_write_accessor_inverts_the_disable_register() {
        let mut state = GpuState::new();
        assert!(state.is_depth_write_enabled());
        state.set_cmd(reg::Z_WRITE_DISABLE, 1);
        assert!(!state.is_depth_write_enabled());
    }

    #[test]
    fn through_mode_reads_the_vertex_type_register() {
        let mut state = GpuState::new();
        assert!(!state.is_mode_through());
        state.set_cmd(reg::VERTEX_TYPE, 1 << 23);
        assert!(state.is_mode_through());
    }

    #[test]
    fn tex_addr_merges_the_high_nibble_from_the_width_register() {
        let mut state = GpuState::new();
        state.set_cmd(reg::TEX_ADDR0, 0x04_1000);
        state.set_cmd(reg::TEX_BUF_WIDTH0, 0x01_0100);
        assert_eq!(state.tex_addr(0), 0x0104_1000);
        assert_eq!(state.tex_buf_width(0), 0x100);
    }

    #[test]
    fn tex_size_decodes_log2_nibbles() {
        let mut state = GpuState::new();
        state.set_cmd(reg::TEX_SIZE0, 6 | (5 << 8));
        assert_eq!(state.tex_width(0), 64);
        assert_eq!(state.tex_height(0), 32);
    }
}
