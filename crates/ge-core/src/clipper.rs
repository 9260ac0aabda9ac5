//! Clipping and primitive hand-off.
//!
//! Transformed triangles are tested against the view volume with outcodes:
//! fully outside drops the primitive, fully inside goes straight to the
//! rasterizer, and straddling triangles are clipped plane by plane with
//! vertex interpolation before re-emission as a fan. Through-mode input is
//! already on screen and skips all of it.

use crate::gpu::Gpu;
use crate::math::lerp;
use crate::transform::TransformUnit;
use crate::vertex::VertexData;

/// One bit per frustum plane, set when the vertex is outside it.
fn outcode(v: &VertexData) -> u8 {
    let c = v.clippos;
    let mut code = 0;
    if c.x < -c.w {
        code |= 0x01;
    }
    if c.x > c.w {
        code |= 0x02;
    }
    if c.y < -c.w {
        code |= 0x04;
    }
    if c.y > c.w {
        code |= 0x08;
    }
    if c.z < -c.w {
        code |= 0x10;
    }
    if c.z > c.w {
        code |= 0x20;
    }
    code
}

/// Signed distance to a frustum plane; non-negative means inside.
fn plane_distance(v: &VertexData, plane: usize) -> f32 {
    let c = v.clippos;
    match plane {
        0 => c.x + c.w,
        1 => c.w - c.x,
        2 => c.y + c.w,
        3 => c.w - c.y,
        4 => c.z + c.w,
        _ => c.w - c.z,
    }
}

/// Clips a convex polygon against one plane, Sutherland-Hodgman style.
fn clip_against_plane(polygon: &[VertexData], plane: usize) -> Vec<VertexData> {
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for i in 0..polygon.len() {
        let current = &polygon[i];
        let next = &polygon[(i + 1) % polygon.len()];
        let d0 = plane_distance(current, plane);
        let d1 = plane_distance(next, plane);

        if d0 >= 0.0 {
            out.push(*current);
        }
        if (d0 >= 0.0) != (d1 >= 0.0) {
            let t = d0 / (d0 - d1);
            out.push(VertexData::lerp(t, current, next));
        }
    }
    out
}

impl Gpu {
    /// Accepts one assembled triangle, clipping as needed, and feeds the
    /// rasterizer.
    pub(crate) fn process_triangle(&mut self, verts: [VertexData; 3]) {
        if self.state.is_mode_through() {
            self.draw_triangle(&verts[0], &verts[1], &verts[2]);
            return;
        }

        let codes = [outcode(&verts[0]), outcode(&verts[1]), outcode(&verts[2])];
        if codes[0] & codes[1] & codes[2] != 0 {
            // All three vertices beyond the same plane.
            log::trace!("triangle outside the view volume, dropped");
            return;
        }
        if codes[0] | codes[1] | codes[2] == 0 {
            self.draw_triangle(&verts[0], &verts[1], &verts[2]);
            return;
        }

        let mut polygon = verts.to_vec();
        for plane in 0..6 {
            polygon = clip_against_plane(&polygon, plane);
            if polygon.len() < 3 {
                return;
            }
        }

        // Interpolated vertices carry fresh clip coordinates; their screen
        // positions have to be recomputed before scanning.
        for v in &mut polygon {
            v.drawpos = TransformUnit::screen_to_drawing(
                &self.state,
                TransformUnit::clip_to_screen(&self.state, v.clippos),
            );
        }

        for i in 1..polygon.len() - 1 {
            self.draw_triangle(&polygon[0], &polygon[i], &polygon[i + 1]);
        }
    }

    /// Axis-aligned rectangle from two corner vertices. The fill is
    /// exclusive of the lower-right edge so adjacent rectangles tile
    /// without double-writing; attributes come from the provoking second
    /// vertex, texture coordinates interpolate across the span.
    pub(crate) fn process_quad(&mut self, v0: VertexData, v1: VertexData) {
        let x0 = v0.drawpos.x.min(v1.drawpos.x) as i32;
        let x1 = v0.drawpos.x.max(v1.drawpos.x) as i32;
        let y0 = v0.drawpos.y.min(v1.drawpos.y) as i32;
        let y1 = v0.drawpos.y.max(v1.drawpos.y) as i32;
        if x0 == x1 || y0 == y1 {
            return;
        }

        let start_x = x0
            .max(self.state.scissor_x1())
            .max(0);
        let end_x = x1
            .min(self.state.scissor_x2() + 1)
            .min(self.framebuffer.width() as i32);
        let start_y = y0
            .max(self.state.scissor_y1())
            .max(0);
        let end_y = y1
            .min(self.state.scissor_y2() + 1)
            .min(self.framebuffer.height() as i32);

        let z = v1.drawpos.z;
        let prim_color = v1.color0;
        let sec_color = v1.color1;

        for y in start_y..end_y {
            let ty = (y - y0) as f32 / (y1 - y0) as f32;
            let t = lerp(v0.texturecoords.y, v1.texturecoords.y, ty);
            for x in start_x..end_x {
                let tx = (x - x0) as f32 / (x1 - x0) as f32;
                let s = lerp(v0.texturecoords.x, v1.texturecoords.x, tx);
                self.shade_and_store_pixel(x as usize, y as usize, z, prim_color, sec_color, s, t);
            }
        }
    }
}
