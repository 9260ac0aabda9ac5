//! Vertex-type descriptor decoding and the interleaved vertex reader.
//!
//! A submission's vertex records are packed back to back in guest memory,
//! each field stored at its natural alignment in the hardware's field order:
//! texture coordinates, color, normal, position. The reader presents them as
//! floats (transform mode scales the fixed-point encodings into unit ranges,
//! through mode passes raw values) and expands the shorthand color formats
//! to RGBA8.

use crate::math::{lerp, lerp_int, Vec2, Vec3, Vec4};
use crate::transform::DrawingCoords;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexCoordFormat {
    None,
    U8,
    U16,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    None,
    Rgb565,
    Rgba5551,
    Rgba4444,
    Rgba8888,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalFormat {
    None,
    S8,
    S16,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionFormat {
    S8,
    S16,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    None,
    U8,
    U16,
}

/// The packed vertex-type word a submission carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexType(pub u32);

impl VertexType {
    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn texcoord_format(self) -> TexCoordFormat {
        match self.0 & 3 {
            1 => TexCoordFormat::U8,
            2 => TexCoordFormat::U16,
            3 => TexCoordFormat::Float,
            _ => TexCoordFormat::None,
        }
    }

    pub fn color_format(self) -> ColorFormat {
        match (self.0 >> 2) & 7 {
            4 => ColorFormat::Rgb565,
            5 => ColorFormat::Rgba5551,
            6 => ColorFormat::Rgba4444,
            7 => ColorFormat::Rgba8888,
            _ => ColorFormat::None,
        }
    }

    pub fn normal_format(self) -> NormalFormat {
        match (self.0 >> 5) & 3 {
            1 => NormalFormat::S8,
            2 => NormalFormat::S16,
            3 => NormalFormat::Float,
            _ => NormalFormat::None,
        }
    }

    pub fn position_format(self) -> Option<PositionFormat> {
        match (self.0 >> 7) & 3 {
            1 => Some(PositionFormat::S8),
            2 => Some(PositionFormat::S16),
            3 => Some(PositionFormat::Float),
            _ => None,
        }
    }

    pub fn index_format(self) -> IndexFormat {
        match (self.0 >> 11) & 3 {
            1 => IndexFormat::U8,
            2 => IndexFormat::U16,
            _ => IndexFormat::None,
        }
    }

    /// Through mode: positions are already drawing-space coordinates.
    pub fn is_through(self) -> bool {
        self.0 & (1 << 23) != 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VertexFormatError {
    #[error("vertex type {0:#010X} declares no position field")]
    MissingPosition(u32),
}

fn align_to(offset: usize, alignment: usize) -> usize {
    (offset + alignment - 1) & !(alignment - 1)
}

/// Field offsets within one record, derived once per submission.
#[derive(Debug, Clone, Copy)]
struct VertexLayout {
    uv_offset: usize,
    color_offset: usize,
    normal_offset: usize,
    pos_offset: usize,
    size: usize,
}

impl VertexLayout {
    fn derive(vtype: VertexType) -> Result<Self, VertexFormatError> {
        let pos_format = vtype
            .position_format()
            .ok_or(VertexFormatError::MissingPosition(vtype.bits()))?;

        let mut offset = 0;
        let mut max_align = 1;
        let mut field = |elem_size: usize, count: usize| {
            offset = align_to(offset, elem_size);
            let at = offset;
            offset += elem_size * count;
            max_align = max_align.max(elem_size);
            at
        };

        let uv_offset = match vtype.texcoord_format() {
            TexCoordFormat::None => 0,
            TexCoordFormat::U8 => field(1, 2),
            TexCoordFormat::U16 => field(2, 2),
            TexCoordFormat::Float => field(4, 2),
        };
        let color_offset = match vtype.color_format() {
            ColorFormat::None => 0,
            ColorFormat::Rgb565 | ColorFormat::Rgba5551 | ColorFormat::Rgba4444 => field(2, 1),
            ColorFormat::Rgba8888 => field(4, 1),
        };
        let normal_offset = match vtype.normal_format() {
            NormalFormat::None => 0,
            NormalFormat::S8 => field(1, 3),
            NormalFormat::S16 => field(2, 3),
            NormalFormat::Float => field(4, 3),
        };
        let pos_offset = match pos_format {
            PositionFormat::S8 => field(1, 3),
            PositionFormat::S16 => field(2, 3),
            PositionFormat::Float => field(4, 3),
        };

        Ok(Self {
            uv_offset,
            color_offset,
            normal_offset,
            pos_offset,
            size: align_to(offset, max_align),
        })
    }
}

/// Reads structured vertices out of a raw guest buffer.
pub struct VertexReader<'a> {
    data: &'a [u8],
    vtype: VertexType,
    layout: VertexLayout,
}

impl<'a> VertexReader<'a> {
    pub fn new(data: &'a [u8], vtype: VertexType) -> Result<Self, VertexFormatError> {
        Ok(Self {
            data,
            vtype,
            layout: VertexLayout::derive(vtype)?,
        })
    }

    pub fn vertex_size(&self) -> usize {
        self.layout.size
    }

    pub fn vertex_type(&self) -> VertexType {
        self.vtype
    }

    pub fn has_uv(&self) -> bool {
        self.vtype.texcoord_format() != TexCoordFormat::None
    }

    pub fn has_color0(&self) -> bool {
        self.vtype.color_format() != ColorFormat::None
    }

    /// Always false: the vertex-type word has no secondary-color field, so
    /// no guest record can carry one. The method completes the reader
    /// contract (a peer of `has_uv`/`has_normal`/`has_color0`); the
    /// secondary color itself is produced by the lighting collaborator.
    pub fn has_color1(&self) -> bool {
        false
    }

    pub fn has_normal(&self) -> bool {
        self.vtype.normal_format() != NormalFormat::None
    }

    fn u8_at(&self, off: usize) -> u8 {
        self.data[off]
    }

    fn u16_at(&self, off: usize) -> u16 {
        u16::from_le_bytes([self.data[off], self.data[off + 1]])
    }

    fn f32_at(&self, off: usize) -> f32 {
        f32::from_le_bytes([
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ])
    }

    pub fn read_pos(&self, index: usize) -> [f32; 3] {
        let base = index * self.layout.size + self.layout.pos_offset;
        let through = self.vtype.is_through();
        let mut pos = [0.0; 3];
        match self.vtype.position_format().unwrap_or(PositionFormat::Float) {
            PositionFormat::S8 => {
                for (i, p) in pos.iter_mut().enumerate() {
                    let v = self.u8_at(base + i) as i8 as f32;
                    *p = if through { v } else { v * (1.0 / 128.0) };
                }
            }
            PositionFormat::S16 => {
                for (i, p) in pos.iter_mut().enumerate() {
                    let v = self.u16_at(base + i * 2) as i16 as f32;
                    *p = if through { v } else { v * (1.0 / 32768.0) };
                }
            }
            PositionFormat::Float => {
                for (i, p) in pos.iter_mut().enumerate() {
                    *p = self.f32_at(base + i * 4);
                }
            }
        }
        pos
    }

    pub fn read_uv(&self, index: usize) -> [f32; 2] {
        let base = index * self.layout.size + self.layout.uv_offset;
        let through = self.vtype.is_through();
        match self.vtype.texcoord_format() {
            TexCoordFormat::None => [0.0, 0.0],
            TexCoordFormat::U8 => {
                let scale = if through { 1.0 } else { 1.0 / 128.0 };
                [
                    self.u8_at(base) as f32 * scale,
                    self.u8_at(base + 1) as f32 * scale,
                ]
            }
            TexCoordFormat::U16 => {
                let scale = if through { 1.0 } else { 1.0 / 32768.0 };
                [
                    self.u16_at(base) as f32 * scale,
                    self.u16_at(base + 2) as f32 * scale,
                ]
            }
            TexCoordFormat::Float => [self.f32_at(base), self.f32_at(base + 4)],
        }
    }

    pub fn read_normal(&self, index: usize) -> [f32; 3] {
        let base = index * self.layout.size + self.layout.normal_offset;
        let mut n = [0.0; 3];
        match self.vtype.normal_format() {
            NormalFormat::None => {}
            NormalFormat::S8 => {
                for (i, v) in n.iter_mut().enumerate() {
                    *v = self.u8_at(base + i) as i8 as f32 * (1.0 / 127.0);
                }
            }
            NormalFormat::S16 => {
                for (i, v) in n.iter_mut().enumerate() {
                    *v = self.u16_at(base + i * 2) as i16 as f32 * (1.0 / 32767.0);
                }
            }
            NormalFormat::Float => {
                for (i, v) in n.iter_mut().enumerate() {
                    *v = self.f32_at(base + i * 4);
                }
            }
        }
        n
    }

    /// Primary color, expanded to RGBA8 channel bytes.
    pub fn read_color0(&self, index: usize) -> [u8; 4] {
        let base = index * self.layout.size + self.layout.color_offset;
        match self.vtype.color_format() {
            ColorFormat::None => [0, 0, 0, 0],
            ColorFormat::Rgb565 => {
                let v = self.u16_at(base);
                let r = (v & 0x1F) as u8;
                let g = ((v >> 5) & 0x3F) as u8;
                let b = ((v >> 11) & 0x1F) as u8;
                [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 0xFF]
            }
            ColorFormat::Rgba5551 => {
                let v = self.u16_at(base);
                let r = (v & 0x1F) as u8;
                let g = ((v >> 5) & 0x1F) as u8;
                let b = ((v >> 10) & 0x1F) as u8;
                let a = if v & 0x8000 != 0 { 0xFF } else { 0 };
                [(r << 3) | (r >> 2), (g << 3) | (g >> 2), (b << 3) | (b >> 2), a]
            }
            ColorFormat::Rgba4444 => {
                let v = self.u16_at(base);
                let r = (v & 0xF) as u8;
                let g = ((v >> 4) & 0xF) as u8;
                let b = ((v >> 8) & 0xF) as u8;
                let a = ((v >> 12) & 0xF) as u8;
                [(r << 4) | r, (g << 4) | g, (b << 4) | b, (a << 4) | a]
            }
            ColorFormat::Rgba8888 => [
                self.u8_at(base),
                self.u8_at(base + 1),
                self.u8_at(base + 2),
                self.u8_at(base + 3),
            ],
        }
    }
}

/// One fully assembled and transformed vertex, alive for a single
/// submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexData {
    pub modelpos: Vec3<f32>,
    /// Only the lighting collaborator reads these two.
    pub worldpos: Vec3<f32>,
    pub worldnormal: Vec3<f32>,
    pub clippos: Vec4<f32>,
    pub drawpos: DrawingCoords,
    pub texturecoords: Vec2<f32>,
    pub normal: Vec3<f32>,
    /// Primary color, 0..255 per channel in i32 lanes so interpolation
    /// cannot overflow.
    pub color0: Vec4<i32>,
    /// Secondary (specular) color.
    pub color1: Vec3<i32>,
}

impl VertexData {
    /// Interpolates along an edge for clipping: positions in float, colors
    /// in fixed-point over base 256.
    pub fn lerp(t: f32, a: &VertexData, b: &VertexData) -> VertexData {
        let t_int = (t * 256.0) as i32;
        VertexData {
            modelpos: lerp(a.modelpos, b.modelpos, t),
            // World position is only consumed by lighting, which has already
            // run by the time clipping happens.
            worldpos: a.worldpos,
            worldnormal: a.worldnormal,
            clippos: lerp(a.clippos, b.clippos, t),
            drawpos: DrawingCoords::new(
                lerp_int::<i32, 256>(a.drawpos.x as i32, b.drawpos.x as i32, t_int) as u16 & 0x3FF,
                lerp_int::<i32, 256>(a.drawpos.y as i32, b.drawpos.y as i32, t_int) as u16 & 0x3FF,
                lerp_int::<i32, 256>(a.drawpos.z as i32, b.drawpos.z as i32, t_int) as u16,
            ),
            texturecoords: lerp(a.texturecoords, b.texturecoords, t),
            normal: lerp(a.normal, b.normal, t),
            color0: lerp_int::<_, 256>(a.color0, b.color0, t_int),
            color1: lerp_int::<_, 256>(a.color1, b.color1, t_int),
        }
    }
}
