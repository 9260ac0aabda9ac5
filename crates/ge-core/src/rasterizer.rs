//! Triangle scan conversion and the per-pixel shading pipeline.
//!
//! Triangles arrive with counter-clockwise winding in drawing coordinates.
//! Coverage uses integer edge functions biased by the top-left fill rule so
//! a pixel on an edge shared by two triangles is written by exactly one of
//! them. Depth interpolates linearly in screen space (what the hardware
//! does, not perspective correct); texture coordinates interpolate with
//! perspective correction; vertex colors interpolate without it.

use crate::gpu::Gpu;
use crate::math::{Vec3, Vec4};
use crate::state::{BlendDst, BlendEq, BlendSrc, DepthFunc, ShadeModel, TextureFunc};
use crate::texture;
use crate::vertex::VertexData;

/// Twice the signed area of triangle (a, b, c); positive when c lies to the
/// left of a->b.
fn orient2d(a: (i32, i32), b: (i32, i32), c: (i32, i32)) -> i32 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// Fill-rule bias test for the edge (line1, line2) seen from the opposite
/// vertex: true when the edge is the triangle's right side or a flat
/// bottom, in which case its pixels belong to the neighboring triangle.
fn is_right_side_or_flat_bottom(vertex: (i32, i32), line1: (i32, i32), line2: (i32, i32)) -> bool {
    if line1.1 == line2.1 {
        // Horizontal edge: flat bottom iff the opposite vertex is above it.
        vertex.1 < line1.1
    } else {
        // Right side iff the opposite vertex is left of the edge line.
        vertex.0 < line1.0 + (line2.0 - line1.0) * (vertex.1 - line1.1) / (line2.1 - line1.1)
    }
}

fn clamp_color(v: Vec3<i32>) -> Vec3<i32> {
    Vec3::new(v.x.clamp(0, 255), v.y.clamp(0, 255), v.z.clamp(0, 255))
}

impl Gpu {
    /// Scan-converts one counter-clockwise triangle with valid drawing and
    /// clip coordinates.
    pub(crate) fn draw_triangle(&mut self, v0: &VertexData, v1: &VertexData, v2: &VertexData) {
        let d0 = (v0.drawpos.x as i32, v0.drawpos.y as i32);
        let d1 = (v1.drawpos.x as i32, v1.drawpos.y as i32);
        let d2 = (v2.drawpos.x as i32, v2.drawpos.y as i32);

        // Bounding box, clipped against the scissor rectangle and the
        // render target itself (drawing coordinates wrap in a 1024-space
        // that can exceed the actual buffer).
        let min_x = d0.0.min(d1.0).min(d2.0).max(self.state.scissor_x1()).max(0);
        let min_y = d0.1.min(d1.1).min(d2.1).max(self.state.scissor_y1()).max(0);
        let max_x = d0
            .0
            .max(d1.0)
            .max(d2.0)
            .min(self.state.scissor_x2())
            .min(self.framebuffer.width() as i32 - 1);
        let max_y = d0
            .1
            .max(d1.1)
            .max(d2.1)
            .min(self.state.scissor_y2())
            .min(self.framebuffer.height() as i32 - 1);
        if min_x > max_x || min_y > max_y {
            return;
        }

        let bias0 = if is_right_side_or_flat_bottom(d0, d1, d2) { -1 } else { 0 };
        let bias1 = if is_right_side_or_flat_bottom(d1, d2, d0) { -1 } else { 0 };
        let bias2 = if is_right_side_or_flat_bottom(d2, d0, d1) { -1 } else { 0 };

        let textured = self.state.is_texture_map_enabled() && !self.state.is_mode_clear();
        let gouraud = self.state.shade_model() == ShadeModel::Gouraud;

        let inv_w0 = 1.0 / v0.clippos.w;
        let inv_w1 = 1.0 / v1.clippos.w;
        let inv_w2 = 1.0 / v2.clippos.w;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = (x, y);
                let w0 = orient2d(d1, d2, p) + bias0;
                let w1 = orient2d(d2, d0, p) + bias1;
                let w2 = orient2d(d0, d1, p) + bias2;

                // Inside means on or left of all three edges.
                if w0 < 0 || w1 < 0 || w2 < 0 {
                    continue;
                }
                // Degenerate: all three biased weights collapse to zero.
                if w0 == 0 && w1 == 0 && w2 == 0 {
                    continue;
                }
                let wsum = w0 + w1 + w2;

                // Linear screen-space depth, like the hardware's integer z.
                let z = ((v0.drawpos.z as i64 * w0 as i64
                    + v1.drawpos.z as i64 * w1 as i64
                    + v2.drawpos.z as i64 * w2 as i64)
                    / wsum as i64) as u16;

                // Colors interpolate in i32 lanes (8-bit channels times
                // edge weights overflow anything narrower). Flat shading
                // takes the provoking vertex.
                let (prim_color, sec_color) = if gouraud {
                    (
                        (v0.color0 * w0 + v1.color0 * w1 + v2.color0 * w2) / wsum,
                        (v0.color1 * w0 + v1.color1 * w1 + v2.color1 * w2) / wsum,
                    )
                } else {
                    (v2.color0, v2.color1)
                };

                // Texture coordinates are perspective correct: interpolate
                // s/w and t/w, then divide by the interpolated 1/w.
                let (s, t) = if textured {
                    let den = inv_w0 * w0 as f32 + inv_w1 * w1 as f32 + inv_w2 * w2 as f32;
                    if den.abs() > 1e-12 {
                        (
                            (v0.texturecoords.x * inv_w0 * w0 as f32
                                + v1.texturecoords.x * inv_w1 * w1 as f32
                                + v2.texturecoords.x * inv_w2 * w2 as f32)
                                / den,
                            (v0.texturecoords.y * inv_w0 * w0 as f32
                                + v1.texturecoords.y * inv_w1 * w1 as f32
                                + v2.texturecoords.y * inv_w2 * w2 as f32)
                                / den,
                        )
                    } else {
                        (
                            (v0.texturecoords.x * w0 as f32
                                + v1.texturecoords.x * w1 as f32
                                + v2.texturecoords.x * w2 as f32)
                                / wsum as f32,
                            (v0.texturecoords.y * w0 as f32
                                + v1.texturecoords.y * w1 as f32
                                + v2.texturecoords.y * w2 as f32)
                                / wsum as f32,
                        )
                    }
                } else {
                    (0.0, 0.0)
                };

                self.shade_and_store_pixel(x as usize, y as usize, z, prim_color, sec_color, s, t);
            }
        }
    }

    /// The per-pixel back half of the pipeline, shared by the triangle and
    /// rectangle paths: depth stage, texture function, color doubling,
    /// secondary-color add, blending, store.
    pub(crate) fn shade_and_store_pixel(
        &mut self,
        x: usize,
        y: usize,
        z: u16,
        prim_color: Vec4<i32>,
        sec_color: Vec3<i32>,
        s: f32,
        t: f32,
    ) {
        // Depth stage. Clear mode bypasses the comparison but can still
        // write the interpolated z when its depth flag is set.
        if (self.state.is_depth_test_enabled() && !self.state.is_mode_through())
            || self.state.is_mode_clear()
        {
            if !self.depth_test_passed(x, y, z) {
                return;
            }
            if self.state.is_depth_write_enabled()
                || (self.state.is_mode_clear() && self.state.is_clear_depth_enabled())
            {
                self.depthbuffer.set_depth(x, y, z);
            }
        }

        let mut rgb = prim_color.rgb();
        let mut alpha = prim_color.a();
        let mut sec = sec_color;

        if self.state.is_texture_map_enabled() && !self.state.is_mode_clear() {
            let texcolor = Vec4::from_rgba(texture::sample_nearest(
                &self.state,
                0,
                s,
                t,
                &self.texture_memory,
                &self.clut,
            ));
            // With the rgba flag clear, the texture's alpha channel is
            // ignored and the fragment keeps its own.
            let rgba = self.state.texture_function_rgba();
            match self.state.texture_function() {
                Some(TextureFunc::Modulate) => {
                    rgb = rgb * texcolor.rgb() / 255;
                    if rgba {
                        alpha = alpha * texcolor.a() / 255;
                    }
                }
                Some(TextureFunc::Decal) => {
                    let t = if rgba { texcolor.a() } else { 255 };
                    rgb = (rgb * (255 - t) + texcolor.rgb() * t) / 255;
                }
                Some(TextureFunc::Blend) => {
                    let env = self.state.texture_env_color();
                    rgb = ((Vec3::splat(255) - texcolor.rgb()) * rgb + texcolor.rgb() * env) / 255;
                    alpha = alpha * if rgba { texcolor.a() } else { 255 } / 255;
                }
                Some(TextureFunc::Replace) => {
                    rgb = texcolor.rgb();
                    if rgba {
                        alpha = texcolor.a();
                    }
                }
                Some(TextureFunc::Add) => {
                    rgb = clamp_color(rgb + texcolor.rgb());
                    alpha = alpha * if rgba { texcolor.a() } else { 255 } / 255;
                }
                None => {
                    log::error!(
                        "unknown texture function {:#x}",
                        self.state.cmd[crate::state::reg::TEX_FUNC] & 7
                    );
                }
            }
        }

        if self.state.is_color_doubling_enabled() {
            rgb = rgb * 2;
            sec = sec * 2;
        }

        rgb = clamp_color(rgb + sec);

        if self.state.is_alpha_blend_enabled() {
            let dst = Vec4::from_rgba(self.framebuffer.pixel(x, y));
            rgb = self.blend_pixel(Vec4::from_rgb_a(rgb, alpha), dst);
        }

        self.framebuffer
            .set_pixel(x, y, Vec4::from_rgb_a(rgb, alpha).to_rgba());
    }

    fn depth_test_passed(&self, x: usize, y: usize, z: u16) -> bool {
        if self.state.is_mode_clear() {
            return true;
        }
        let reference = self.depthbuffer.depth(x, y);
        match self.state.depth_test_func() {
            DepthFunc::Never => false,
            DepthFunc::Always => true,
            DepthFunc::Equal => z == reference,
            DepthFunc::NotEqual => z != reference,
            DepthFunc::Less => z < reference,
            DepthFunc::LessOrEqual => z <= reference,
            DepthFunc::Greater => z > reference,
            DepthFunc::GreaterOrEqual => z >= reference,
        }
    }

    /// Programmable blend: factor selection for both operands, then one of
    /// six equations. Alpha never blends; the caller writes the source
    /// alpha verbatim.
    fn blend_pixel(&self, src: Vec4<i32>, dst: Vec4<i32>) -> Vec3<i32> {
        let src_factor = match self.state.blend_src() {
            Some(BlendSrc::DstColor) => dst.rgb(),
            Some(BlendSrc::InvDstColor) => Vec3::splat(255) - dst.rgb(),
            Some(BlendSrc::SrcAlpha) => Vec3::splat(src.a()),
            Some(BlendSrc::InvSrcAlpha) => Vec3::splat(255 - src.a()),
            Some(BlendSrc::DstAlpha) => Vec3::splat(dst.a()),
            Some(BlendSrc::InvDstAlpha) => Vec3::splat(255 - dst.a()),
            Some(BlendSrc::DoubleSrcAlpha) => Vec3::splat(2 * src.a()),
            Some(BlendSrc::DoubleInvSrcAlpha) => Vec3::splat(2 * (255 - src.a())),
            Some(BlendSrc::DoubleDstAlpha) => Vec3::splat(2 * dst.a()),
            Some(BlendSrc::DoubleInvDstAlpha) => Vec3::splat(2 * (255 - dst.a())),
            Some(BlendSrc::FixA) => self.state.blend_fix_a(),
            None => {
                log::error!("unknown blend source factor");
                Vec3::splat(0)
            }
        };

        let dst_factor = match self.state.blend_dst() {
            Some(BlendDst::SrcColor) => src.rgb(),
            Some(BlendDst::InvSrcColor) => Vec3::splat(255) - src.rgb(),
            Some(BlendDst::SrcAlpha) => Vec3::splat(src.a()),
            Some(BlendDst::InvSrcAlpha) => Vec3::splat(255 - src.a()),
            Some(BlendDst::DstAlpha) => Vec3::splat(dst.a()),
            Some(BlendDst::InvDstAlpha) => Vec3::splat(255 - dst.a()),
            Some(BlendDst::DoubleSrcAlpha) => Vec3::splat(2 * src.a()),
            Some(BlendDst::DoubleInvSrcAlpha) => Vec3::splat(2 * (255 - src.a())),
            Some(BlendDst::DoubleDstAlpha) => Vec3::splat(2 * dst.a()),
            Some(BlendDst::DoubleInvDstAlpha) => Vec3::splat(2 * (255 - dst.a())),
            Some(BlendDst::FixB) => self.state.blend_fix_b(),
            None => {
                log::error!("unknown blend destination factor");
                Vec3::splat(0)
            }
        };

        match self.state.blend_eq() {
            Some(BlendEq::MulAndAdd) => (src.rgb() * src_factor + dst.rgb() * dst_factor) / 255,
            Some(BlendEq::MulAndSubtract) => (src.rgb() * src_factor - dst.rgb() * dst_factor) / 255,
            Some(BlendEq::MulAndSubtractReverse) => {
                (dst.rgb() * dst_factor - src.rgb() * src_factor) / 255
            }
            Some(BlendEq::Min) => Vec3::new(
                src.x.min(dst.x),
                src.y.min(dst.y),
                src.z.min(dst.z),
            ),
            Some(BlendEq::Max) => Vec3::new(
                src.x.max(dst.x),
                src.y.max(dst.y),
                src.z.max(dst.z),
            ),
            Some(BlendEq::AbsDiff) => Vec3::new(
                (src.x - dst.x).abs(),
                (src.y - dst.y).abs(),
                (src.z - dst.z).abs(),
            ),
            None => {
                log::error!("unknown blend equation");
                src.rgb()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::NullLighting;
    use crate::state::{reg, GePrimitive};
    use crate::vertex::VertexType;

    // through | float positions
    const THROUGH_POS: u32 = (1 << 23) | (3 << 7);
    // ... plus an RGBA8888 vertex color
    const THROUGH_POS_COLOR: u32 = THROUGH_POS | (7 << 2);
    // ... plus float texture coordinates
    const THROUGH_POS_COLOR_UV: u32 = THROUGH_POS_COLOR | 3;

    fn float24_word(v: f32) -> u32 {
        v.to_bits() >> 8
    }

    fn test_gpu(width: usize, height: usize) -> Gpu {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut gpu = Gpu::new(width, height, 0x1000);
        gpu.state.set_cmd(reg::SCISSOR1, 0);
        gpu.state.set_cmd(
            reg::SCISSOR2,
            (width as u32 - 1) | ((height as u32 - 1) << 10),
        );
        gpu
    }

    fn push_f32(buf: &mut Vec<u8>, v: f32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    /// One through-mode record: RGBA color then position.
    fn colored_vertex(buf: &mut Vec<u8>, color: [u8; 4], x: f32, y: f32, z: f32) {
        buf.extend_from_slice(&color);
        push_f32(buf, x);
        push_f32(buf, y);
        push_f32(buf, z);
    }

    /// One through-mode record: UV, RGBA color, position.
    fn textured_vertex(buf: &mut Vec<u8>, u: f32, v: f32, color: [u8; 4], x: f32, y: f32, z: f32) {
        push_f32(buf, u);
        push_f32(buf, v);
        buf.extend_from_slice(&color);
        push_f32(buf, x);
        push_f32(buf, y);
        push_f32(buf, z);
    }

    fn count_pixels(gpu: &Gpu, value: u32) -> usize {
        let mut n = 0;
        for y in 0..gpu.framebuffer.height() {
            for x in 0..gpu.framebuffer.width() {
                if gpu.framebuffer.pixel(x, y) == value {
                    n += 1;
                }
            }
        }
        n
    }

    fn count_nonzero(gpu: &Gpu) -> usize {
        let mut n = 0;
        for y in 0..gpu.framebuffer.height() {
            for x in 0..gpu.framebuffer.width() {
                if gpu.framebuffer.pixel(x, y) != 0 {
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn clear_mode_quad_fills_color_and_depth() {
        let mut gpu = test_gpu(16, 16);
        // Clear mode on, color + depth flags set.
        gpu.state.set_cmd(reg::CLEAR_MODE, 1 | 0x100 | 0x400);

        let mut buf = Vec::new();
        colored_vertex(&mut buf, [0, 0, 0, 0], 0.0, 0.0, 0x1234 as f32);
        colored_vertex(&mut buf, [0x11, 0x22, 0x33, 0x44], 16.0, 16.0, 0x1234 as f32);
        gpu.submit_primitive(
            &buf,
            None,
            GePrimitive::Rectangles,
            2,
            VertexType(THROUGH_POS_COLOR),
            &mut NullLighting,
        )
        .unwrap();

        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(gpu.framebuffer.pixel(x, y), 0x11223344);
                assert_eq!(gpu.depthbuffer.depth(x, y), 0x1234);
            }
        }
    }

    #[test]
    fn clear_without_the_depth_flag_leaves_depth_alone() {
        let mut gpu = test_gpu(8, 8);
        gpu.state.set_cmd(reg::CLEAR_MODE, 1 | 0x100);
        gpu.state.set_cmd(reg::Z_WRITE_DISABLE, 1);
        gpu.depthbuffer.fill(0x7777);

        let mut buf = Vec::new();
        colored_vertex(&mut buf, [0, 0, 0, 0], 0.0, 0.0, 0.0);
        colored_vertex(&mut buf, [0xAA, 0xBB, 0xCC, 0xFF], 8.0, 8.0, 0.0);
        gpu.submit_primitive(
            &buf,
            None,
            GePrimitive::Rectangles,
            2,
            VertexType(THROUGH_POS_COLOR),
            &mut NullLighting,
        )
        .unwrap();

        assert_eq!(gpu.framebuffer.pixel(3, 3), 0xAABBCCFF);
        assert_eq!(gpu.depthbuffer.depth(3, 3), 0x7777);
    }

    #[test]
    fn depth_test_less_keeps_the_nearer_triangle() {
        let mut gpu = test_gpu(16, 16);
        gpu.depthbuffer.fill(0xFFFF);

        // Viewport maps clip -1..1 onto the 16-pixel target.
        gpu.state.set_cmd(reg::VIEWPORT_X_SCALE, float24_word(8.0));
        gpu.state.set_cmd(reg::VIEWPORT_X_CENTER, float24_word(8.0));
        gpu.state.set_cmd(reg::VIEWPORT_Y_SCALE, float24_word(8.0));
        gpu.state.set_cmd(reg::VIEWPORT_Y_CENTER, float24_word(8.0));
        gpu.state.set_cmd(reg::Z_TEST_ENABLE, 1);
        gpu.state.set_cmd(reg::Z_TEST, 4); // Less

        let vtype = VertexType(3 << 7); // transform mode, float positions
        let mut buf = Vec::new();
        for (x, y) in [(-1.0f32, -1.0f32), (1.0, -1.0), (-1.0, 1.0)] {
            push_f32(&mut buf, x);
            push_f32(&mut buf, y);
            push_f32(&mut buf, 0.0);
        }

        // Red at z = 0x4000 (z viewport: scale 0, center 1024 * 16).
        gpu.state.set_cmd(reg::VIEWPORT_Z_CENTER, float24_word(1024.0));
        gpu.state.set_cmd(reg::MATERIAL_DIFFUSE, 0x0000FF);
        gpu.state.set_cmd(reg::MATERIAL_ALPHA, 0xFF);
        gpu.submit_primitive(
            &buf,
            None,
            GePrimitive::Triangles,
            3,
            vtype,
            &mut NullLighting,
        )
        .unwrap();
        assert_eq!(gpu.framebuffer.pixel(2, 2), 0xFF0000FF);
        assert_eq!(gpu.depthbuffer.depth(2, 2), 0x4000);

        // Blue at z = 0x8000 fails LESS everywhere the red one wrote.
        gpu.state.set_cmd(reg::VIEWPORT_Z_CENTER, float24_word(2048.0));
        gpu.state.set_cmd(reg::MATERIAL_DIFFUSE, 0xFF0000);
        gpu.submit_primitive(
            &buf,
            None,
            GePrimitive::Triangles,
            3,
            vtype,
            &mut NullLighting,
        )
        .unwrap();
        assert_eq!(gpu.framebuffer.pixel(2, 2), 0xFF0000FF);
        assert_eq!(gpu.depthbuffer.depth(2, 2), 0x4000);
    }

    #[test]
    fn adjacent_triangles_cover_each_pixel_exactly_once() {
        let mut gpu = test_gpu(16, 16);
        let vtype = VertexType(THROUGH_POS_COLOR);
        const RED: [u8; 4] = [0xFF, 0, 0, 0xFF];
        const BLUE: [u8; 4] = [0, 0, 0xFF, 0xFF];

        // Upper-right half of a 10x10 quad.
        let mut buf = Vec::new();
        colored_vertex(&mut buf, RED, 0.0, 0.0, 0.0);
        colored_vertex(&mut buf, RED, 10.0, 0.0, 0.0);
        colored_vertex(&mut buf, RED, 10.0, 10.0, 0.0);
        gpu.submit_primitive(&buf, None, GePrimitive::Triangles, 3, vtype, &mut NullLighting)
            .unwrap();
        let red_alone = count_pixels(&gpu, 0xFF0000FF);
        assert!(red_alone > 0);

        // Lower-left half sharing the diagonal.
        let mut buf = Vec::new();
        colored_vertex(&mut buf, BLUE, 0.0, 0.0, 0.0);
        colored_vertex(&mut buf, BLUE, 10.0, 10.0, 0.0);
        colored_vertex(&mut buf, BLUE, 0.0, 10.0, 0.0);
        gpu.submit_primitive(&buf, None, GePrimitive::Triangles, 3, vtype, &mut NullLighting)
            .unwrap();

        // No gap: the union is the full 100-pixel square.
        assert_eq!(count_nonzero(&gpu), 100);
        // No double write: the second triangle never touched the first's
        // pixels, including everything on the shared diagonal.
        assert_eq!(count_pixels(&gpu, 0xFF0000FF), red_alone);
    }

    #[test]
    fn triangle_strip_rolls_the_window_without_seams() {
        let mut gpu = test_gpu(16, 16);
        let vtype = VertexType(THROUGH_POS_COLOR);
        const GREEN: [u8; 4] = [0, 0xFF, 0, 0xFF];

        let mut buf = Vec::new();
        colored_vertex(&mut buf, GREEN, 0.0, 0.0, 0.0);
        colored_vertex(&mut buf, GREEN, 10.0, 0.0, 0.0);
        colored_vertex(&mut buf, GREEN, 0.0, 10.0, 0.0);
        colored_vertex(&mut buf, GREEN, 10.0, 10.0, 0.0);
        gpu.submit_primitive(
            &buf,
            None,
            GePrimitive::TriangleStrip,
            4,
            vtype,
            &mut NullLighting,
        )
        .unwrap();

        assert_eq!(count_pixels(&gpu, 0x00FF00FF), 100);
    }

    #[test]
    fn modulate_texture_function_scales_the_fragment_color() {
        let mut gpu = test_gpu(4, 4);
        gpu.state.set_cmd(reg::TEXTURE_MAP_ENABLE, 1);
        gpu.state.set_cmd(reg::TEX_FUNC, 0x10); // modulate, rgba flag
        gpu.state.set_cmd(reg::TEX_FORMAT, 3); // RGBA8888
        gpu.state.set_cmd(reg::TEX_SIZE0, 1 | (1 << 8)); // 2x2
        gpu.state.set_cmd(reg::TEX_ADDR0, 0x100);
        // Texel (0,0) mid gray, the rest white.
        gpu.texture_memory[0x100..0x104].copy_from_slice(&[128, 128, 128, 255]);
        for texel in 1..4 {
            let at = 0x100 + texel * 4;
            gpu.texture_memory[at..at + 4].copy_from_slice(&[255, 255, 255, 255]);
        }

        let gray = [128, 128, 128, 255];
        let mut buf = Vec::new();
        textured_vertex(&mut buf, 0.0, 0.0, gray, 0.0, 0.0, 0.0);
        textured_vertex(&mut buf, 2.0, 2.0, gray, 2.0, 2.0, 0.0);
        gpu.submit_primitive(
            &buf,
            None,
            GePrimitive::Rectangles,
            2,
            VertexType(THROUGH_POS_COLOR_UV),
            &mut NullLighting,
        )
        .unwrap();

        // 128 * 128 / 255 = 64 against the gray texel...
        assert_eq!(gpu.framebuffer.pixel(0, 0), 0x404040FF);
        // ...and 128 * 255 / 255 = 128 against the white one.
        assert_eq!(gpu.framebuffer.pixel(1, 1), 0x808080FF);
    }

    #[test]
    fn src_alpha_blend_mixes_with_the_destination() {
        let mut gpu = test_gpu(4, 4);
        gpu.framebuffer.set_pixel(0, 0, 0x006400FF); // D = (0, 100, 0, 255)
        gpu.state.set_cmd(reg::ALPHA_BLEND_ENABLE, 1);
        // SrcAlpha / InvSrcAlpha, MulAndAdd
        gpu.state.set_cmd(reg::BLEND_MODE, 2 | (3 << 4));

        let mut buf = Vec::new();
        colored_vertex(&mut buf, [0, 0, 0, 0], 0.0, 0.0, 0.0);
        colored_vertex(&mut buf, [200, 0, 0, 128], 1.0, 1.0, 0.0);
        gpu.submit_primitive(
            &buf,
            None,
            GePrimitive::Rectangles,
            2,
            VertexType(THROUGH_POS_COLOR),
            &mut NullLighting,
        )
        .unwrap();

        // r = (200*128 + 0*127) / 255 = 100
        // g = (0*128 + 100*127) / 255 = 49 (truncating integer divide)
        // alpha is written verbatim from the source.
        assert_eq!(gpu.framebuffer.pixel(0, 0), 0x64310080);
        // Neighboring pixels untouched by a 1x1 rectangle.
        assert_eq!(gpu.framebuffer.pixel(1, 1), 0);
    }

    #[test]
    fn clear_mode_does_not_suppress_an_enabled_blend() {
        let mut gpu = test_gpu(4, 4);
        gpu.framebuffer.set_pixel(0, 0, 0x006400FF); // D = (0, 100, 0, 255)
        gpu.state.set_cmd(reg::CLEAR_MODE, 1 | 0x100);
        gpu.state.set_cmd(reg::ALPHA_BLEND_ENABLE, 1);
        // SrcAlpha / InvSrcAlpha, MulAndAdd
        gpu.state.set_cmd(reg::BLEND_MODE, 2 | (3 << 4));

        let mut buf = Vec::new();
        colored_vertex(&mut buf, [0, 0, 0, 0], 0.0, 0.0, 0.0);
        colored_vertex(&mut buf, [200, 0, 0, 128], 1.0, 1.0, 0.0);
        gpu.submit_primitive(
            &buf,
            None,
            GePrimitive::Rectangles,
            2,
            VertexType(THROUGH_POS_COLOR),
            &mut NullLighting,
        )
        .unwrap();

        // Clear mode bypasses the depth comparison and the texture stage,
        // but an enabled blend still applies, exactly as outside clear mode.
        assert_eq!(gpu.framebuffer.pixel(0, 0), 0x64310080);
    }

    #[test]
    fn color_doubling_and_secondary_add_clamp_to_byte_range() {
        let mut gpu = test_gpu(4, 4);
        gpu.state.set_cmd(reg::TEX_FUNC, 0x10000); // doubling, texture off

        let mut buf = Vec::new();
        colored_vertex(&mut buf, [0, 0, 0, 0], 0.0, 0.0, 0.0);
        colored_vertex(&mut buf, [200, 200, 200, 255], 2.0, 2.0, 0.0);
        gpu.submit_primitive(
            &buf,
            None,
            GePrimitive::Rectangles,
            2,
            VertexType(THROUGH_POS_COLOR),
            &mut NullLighting,
        )
        .unwrap();

        // 200 * 2 = 400 clamps to 255 before the store.
        assert_eq!(gpu.framebuffer.pixel(1, 1), 0xFFFFFFFF);
    }

    #[test]
    fn fully_outside_triangle_is_dropped_by_the_clipper() {
        let mut gpu = test_gpu(16, 16);
        gpu.state.set_cmd(reg::VIEWPORT_X_SCALE, float24_word(8.0));
        gpu.state.set_cmd(reg::VIEWPORT_X_CENTER, float24_word(8.0));
        gpu.state.set_cmd(reg::VIEWPORT_Y_SCALE, float24_word(8.0));
        gpu.state.set_cmd(reg::VIEWPORT_Y_CENTER, float24_word(8.0));
        gpu.state.set_cmd(reg::MATERIAL_DIFFUSE, 0xFFFFFF);
        gpu.state.set_cmd(reg::MATERIAL_ALPHA, 0xFF);

        let vtype = VertexType(3 << 7);
        let mut buf = Vec::new();
        for (x, y) in [(2.0f32, 0.0f32), (3.0, 0.0), (2.5, 1.0)] {
            push_f32(&mut buf, x);
            push_f32(&mut buf, y);
            push_f32(&mut buf, 0.0);
        }
        gpu.submit_primitive(
            &buf,
            None,
            GePrimitive::Triangles,
            3,
            vtype,
            &mut NullLighting,
        )
        .unwrap();

        assert_eq!(count_nonzero(&gpu), 0);
    }

    #[test]
    fn straddling_triangle_is_clipped_instead_of_wrapping() {
        let mut gpu = test_gpu(16, 16);
        gpu.state.set_cmd(reg::VIEWPORT_X_SCALE, float24_word(8.0));
        gpu.state.set_cmd(reg::VIEWPORT_X_CENTER, float24_word(8.0));
        gpu.state.set_cmd(reg::VIEWPORT_Y_SCALE, float24_word(8.0));
        gpu.state.set_cmd(reg::VIEWPORT_Y_CENTER, float24_word(8.0));
        gpu.state.set_cmd(reg::MATERIAL_DIFFUSE, 0xFFFFFF);
        gpu.state.set_cmd(reg::MATERIAL_ALPHA, 0xFF);

        // One vertex far beyond the left plane. Unclipped, its wrapped
        // drawing coordinate would land the bounding box off the target and
        // nothing (or garbage) would draw.
        let vtype = VertexType(3 << 7);
        let mut buf = Vec::new();
        for (x, y) in [(-3.0f32, 0.0f32), (0.9, -0.9), (0.9, 0.9)] {
            push_f32(&mut buf, x);
            push_f32(&mut buf, y);
            push_f32(&mut buf, 0.0);
        }
        gpu.submit_primitive(
            &buf,
            None,
            GePrimitive::Triangles,
            3,
            vtype,
            &mut NullLighting,
        )
        .unwrap();

        // The on-screen part near the two inside vertices did draw.
        assert_ne!(gpu.framebuffer.pixel(14, 8), 0);
        assert!(count_nonzero(&gpu) > 0);
    }

    #[test]
    fn flat_shading_takes_the_provoking_vertex_color() {
        let mut gpu = test_gpu(16, 16);
        let vtype = VertexType(THROUGH_POS_COLOR);
        let mut buf = Vec::new();
        colored_vertex(&mut buf, [0xFF, 0, 0, 0xFF], 0.0, 0.0, 0.0);
        colored_vertex(&mut buf, [0, 0xFF, 0, 0xFF], 10.0, 0.0, 0.0);
        colored_vertex(&mut buf, [0, 0, 0xFF, 0xFF], 10.0, 10.0, 0.0);
        gpu.submit_primitive(&buf, None, GePrimitive::Triangles, 3, vtype, &mut NullLighting)
            .unwrap();

        // Every covered pixel carries v2's blue.
        assert_eq!(gpu.framebuffer.pixel(8, 4), 0x0000FFFF);
        assert_eq!(count_nonzero(&gpu), count_pixels(&gpu, 0x0000FFFF));
    }

    #[test]
    fn gouraud_shading_interpolates_between_vertices() {
        let mut gpu = test_gpu(16, 16);
        gpu.state.set_cmd(reg::SHADE_MODE, 1);
        let vtype = VertexType(THROUGH_POS_COLOR);
        let mut buf = Vec::new();
        colored_vertex(&mut buf, [0, 0, 0, 0xFF], 0.0, 0.0, 0.0);
        colored_vertex(&mut buf, [200, 0, 0, 0xFF], 16.0, 0.0, 0.0);
        colored_vertex(&mut buf, [200, 0, 0, 0xFF], 0.0, 16.0, 0.0);
        gpu.submit_primitive(&buf, None, GePrimitive::Triangles, 3, vtype, &mut NullLighting)
            .unwrap();

        let near_origin = Vec4::from_rgba(gpu.framebuffer.pixel(1, 1));
        let far_edge = Vec4::from_rgba(gpu.framebuffer.pixel(13, 1));
        assert!(near_origin.r() < 50, "origin should stay dark: {near_origin:?}");
        assert!(far_edge.r() > 130, "far edge should approach red: {far_edge:?}");
    }
}
