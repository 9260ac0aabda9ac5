//! The coordinate transform chain and the primitive submission entry point.
//!
//! Model space runs through world, view, and clip space, then a perspective
//! divide and viewport mapping produce sub-pixel screen coordinates, which
//! quantize down to the 10-bit drawing coordinates the rasterizer scans in.
//! Through mode bypasses the whole chain: positions arrive already in
//! drawing space.

use crate::gpu::Gpu;
use crate::lighting::Lighting;
use crate::math::{Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::state::{reg, GePrimitive, GpuState};
use crate::vertex::{IndexFormat, VertexData, VertexFormatError, VertexReader, VertexType};

/// Sub-pixel screen position: 16 units per pixel on x/y, 16-bit depth on z.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenCoords {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

impl ScreenCoords {
    pub const SUBPIXELS_PER_PIXEL: u32 = 16;

    pub fn new(x: u16, y: u16, z: u16) -> Self {
        Self { x, y, z }
    }
}

/// Pixel index into the render target. x/y live in the wrapping 10-bit
/// drawing coordinate space; z is the 16-bit depth value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawingCoords {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

impl DrawingCoords {
    pub const COORD_MASK: u16 = 0x3FF;

    pub fn new(x: u16, y: u16, z: u16) -> Self {
        Self { x, y, z }
    }
}

/// The fixed-function vertex transform stages.
pub struct TransformUnit;

impl TransformUnit {
    /// Linear part in elements 0..9 of the column-major 3x4 matrix,
    /// translation in elements 9..12.
    pub fn model_to_world(state: &GpuState, coords: Vec3<f32>) -> Vec3<f32> {
        let m = &state.world_matrix;
        Mat3::from_col_slice(m) * coords + Vec3::new(m[9], m[10], m[11])
    }

    /// Normals take the linear part only.
    pub fn model_to_world_normal(state: &GpuState, normal: Vec3<f32>) -> Vec3<f32> {
        Mat3::from_col_slice(&state.world_matrix) * normal
    }

    pub fn world_to_view(state: &GpuState, coords: Vec3<f32>) -> Vec3<f32> {
        let m = &state.view_matrix;
        Mat3::from_col_slice(m) * coords + Vec3::new(m[9], m[10], m[11])
    }

    pub fn view_to_clip(state: &GpuState, coords: Vec3<f32>) -> Vec4<f32> {
        let coords4 = Vec4::new(coords.x, coords.y, coords.z, 1.0);
        Mat4::from_col_slice(&state.proj_matrix) * coords4
    }

    /// Perspective divide plus viewport mapping, in sub-pixel units.
    pub fn clip_to_screen(state: &GpuState, coords: Vec4<f32>) -> ScreenCoords {
        let x = coords.x * state.viewport_x_scale() / coords.w + state.viewport_x_center();
        let y = coords.y * state.viewport_y_scale() / coords.w + state.viewport_y_center();
        let z = coords.z * state.viewport_z_scale() / coords.w + state.viewport_z_center();
        ScreenCoords::new(
            (x * 16.0) as u16,
            (y * 16.0) as u16,
            (z * 16.0) as u16,
        )
    }

    /// Drops the sub-pixel bits and wraps x/y into the 10-bit drawing space.
    /// Depth is already a 16-bit value and passes through.
    pub fn screen_to_drawing(state: &GpuState, coords: ScreenCoords) -> DrawingCoords {
        let x = (coords.x as u32).wrapping_sub(state.offset_x()) / 16;
        let y = (coords.y as u32).wrapping_sub(state.offset_y()) / 16;
        DrawingCoords::new(
            (x as u16) & DrawingCoords::COORD_MASK,
            (y as u16) & DrawingCoords::COORD_MASK,
            coords.z,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    VertexFormat(#[from] VertexFormatError),
    #[error("vertex buffer too small: need {needed} bytes for {records} records, got {got}")]
    VertexBufferTooSmall {
        needed: usize,
        records: usize,
        got: usize,
    },
    #[error("index buffer too small: need {needed} bytes, got {got}")]
    IndexBufferTooSmall { needed: usize, got: usize },
    #[error("vertex type {vtype:#010X} and index argument disagree ({format:?})")]
    IndexFormatMismatch { vtype: u32, format: IndexFormat },
}

impl Gpu {
    /// Submits one batch of primitives. Synchronous: every generated pixel
    /// has been written to the color/depth buffers when this returns.
    ///
    /// `vertices` holds `vertex_count` interleaved records described by
    /// `vertex_type` (or, when an index buffer is present, enough records to
    /// cover the highest index). Faults past this validation boundary are
    /// logged and recovered per pixel, never raised.
    pub fn submit_primitive(
        &mut self,
        vertices: &[u8],
        indices: Option<&[u8]>,
        prim: GePrimitive,
        vertex_count: usize,
        vertex_type: VertexType,
        lighting: &mut dyn Lighting,
    ) -> Result<(), SubmitError> {
        if vertex_count == 0 {
            return Ok(());
        }

        // Keep the bank's vertex-type word coherent with the submission so
        // the pixel stages see the same through/format flags.
        self.state.set_cmd(reg::VERTEX_TYPE, vertex_type.bits());

        let reader = VertexReader::new(vertices, vertex_type)?;

        // Resolve the index list and its bounds first; the bounds tell us
        // how many records the vertex buffer must hold.
        let index_list = resolve_indices(indices, vertex_type, vertex_count)?;
        let (first_record, record_count) = match &index_list {
            Some(list) => {
                let lo = *list.iter().min().unwrap();
                let hi = *list.iter().max().unwrap();
                (lo, hi - lo + 1)
            }
            None => (0, vertex_count),
        };

        let needed = (first_record + record_count) * reader.vertex_size();
        if vertices.len() < needed {
            return Err(SubmitError::VertexBufferTooSmall {
                needed,
                records: first_record + record_count,
                got: vertices.len(),
            });
        }

        // Scratch decode of every record the submission can address; the
        // buffer dies with this call.
        let mut scratch = Vec::with_capacity(record_count);
        for i in 0..record_count {
            scratch.push(self.read_vertex(&reader, first_record + i, lighting));
        }
        let v = |i: usize| -> VertexData {
            match &index_list {
                Some(list) => scratch[list[i] - first_record],
                None => scratch[i],
            }
        };

        match prim {
            GePrimitive::Points | GePrimitive::Lines | GePrimitive::LineStrip => {
                log::warn!(
                    "{prim:?} primitives are not rasterized, dropping {vertex_count} vertices"
                );
            }
            GePrimitive::Triangles => {
                let mut i = 0;
                while i + 3 <= vertex_count {
                    self.process_triangle([v(i), v(i + 1), v(i + 2)]);
                    i += 3;
                }
            }
            GePrimitive::TriangleStrip => {
                for i in 0..vertex_count.saturating_sub(2) {
                    // Rotate the window; swap on odd steps so the winding
                    // stays counter-clockwise.
                    if i % 2 == 0 {
                        self.process_triangle([v(i), v(i + 1), v(i + 2)]);
                    } else {
                        self.process_triangle([v(i + 1), v(i), v(i + 2)]);
                    }
                }
            }
            GePrimitive::TriangleFan => {
                for i in 1..vertex_count.saturating_sub(1) {
                    self.process_triangle([v(0), v(i), v(i + 1)]);
                }
            }
            GePrimitive::Rectangles => {
                let mut i = 0;
                while i + 2 <= vertex_count {
                    self.process_quad(v(i), v(i + 1));
                    i += 2;
                }
            }
        }

        Ok(())
    }

    /// Reads one record and runs it through the transform chain (or the
    /// through-mode bypass), applying material fallback colors and the
    /// lighting collaborator.
    fn read_vertex(
        &self,
        reader: &VertexReader,
        index: usize,
        lighting: &mut dyn Lighting,
    ) -> VertexData {
        let state = &self.state;
        let mut vertex = VertexData::default();
        let pos = reader.read_pos(index);

        if !state.is_mode_clear() && state.is_texture_map_enabled() && reader.has_uv() {
            let uv = reader.read_uv(index);
            vertex.texturecoords = Vec2::new(uv[0], uv[1]);
        }

        if reader.has_normal() {
            let n = reader.read_normal(index);
            vertex.normal = Vec3::new(n[0], n[1], n[2]);
        }

        vertex.color0 = if reader.has_color0() {
            let c = reader.read_color0(index);
            Vec4::new(c[0] as i32, c[1] as i32, c[2] as i32, c[3] as i32)
        } else {
            Vec4::from_rgb_a(state.material_diffuse(), state.material_alpha())
        };
        // Vertex streams carry no secondary color (`has_color1` is always
        // false for guest formats); lighting may fill it in below.
        vertex.color1 = Vec3::splat(0);

        if reader.vertex_type().is_through() {
            vertex.drawpos = DrawingCoords::new(
                (pos[0] as i32 as u16) & DrawingCoords::COORD_MASK,
                (pos[1] as i32 as u16) & DrawingCoords::COORD_MASK,
                pos[2].clamp(0.0, 65535.0) as u16,
            );
            // No perspective in through mode.
            vertex.clippos = Vec4::new(pos[0], pos[1], pos[2], 1.0);
        } else {
            let model = Vec3::new(pos[0], pos[1], pos[2]);
            vertex.modelpos = model;
            vertex.worldpos = TransformUnit::model_to_world(state, model);
            if reader.has_normal() {
                vertex.worldnormal = TransformUnit::model_to_world_normal(state, vertex.normal);
            }
            let view = TransformUnit::world_to_view(state, vertex.worldpos);
            vertex.clippos = TransformUnit::view_to_clip(state, view);
            vertex.drawpos = TransformUnit::screen_to_drawing(
                state,
                TransformUnit::clip_to_screen(state, vertex.clippos),
            );
            if state.is_lighting_enabled() {
                lighting.process(state, &mut vertex);
            }
        }

        vertex
    }
}

/// Decodes the optional index buffer into record numbers.
fn resolve_indices(
    indices: Option<&[u8]>,
    vtype: VertexType,
    vertex_count: usize,
) -> Result<Option<Vec<usize>>, SubmitError> {
    let format = vtype.index_format();
    match (indices, format) {
        (None, IndexFormat::None) => Ok(None),
        (Some(buf), IndexFormat::U8) => {
            if buf.len() < vertex_count {
                return Err(SubmitError::IndexBufferTooSmall {
                    needed: vertex_count,
                    got: buf.len(),
                });
            }
            Ok(Some(buf[..vertex_count].iter().map(|&i| i as usize).collect()))
        }
        (Some(buf), IndexFormat::U16) => {
            let needed = vertex_count * 2;
            if buf.len() < needed {
                return Err(SubmitError::IndexBufferTooSmall {
                    needed,
                    got: buf.len(),
                });
            }
            Ok(Some(
                (0..vertex_count)
                    .map(|i| u16::from_le_bytes([buf[i * 2], buf[i * 2 + 1]]) as usize)
                    .collect(),
            ))
        }
        _ => Err(SubmitError::IndexFormatMismatch {
            vtype: vtype.bits(),
            format,
        }),
    }
}
