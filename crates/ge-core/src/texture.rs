//! Nearest-neighbor texel fetch from guest memory.
//!
//! Textures are addressed by the per-level address registers and stored
//! either linearly or in the swizzled tile layout: 4x8-tile blocks, each
//! tile 32 bits wide, laid out to keep a block's texels in one cache line.
//! Decoded texels come back as the canonical `(R<<24)|(G<<16)|(B<<8)|A`
//! word.

use crate::framebuffer::Clut;
use crate::state::{GpuState, TextureFormat};

/// Byte offset of texel (u, v) inside the texture data.
pub fn pixel_data_offset(
    texel_size_bits: usize,
    u: usize,
    v: usize,
    width: usize,
    swizzled: bool,
) -> usize {
    if !swizzled {
        return v * width * texel_size_bits / 8 + u * texel_size_bits / 8;
    }

    let tile_size_bits = 32;
    let texels_per_tile = tile_size_bits / texel_size_bits;
    let block_width_in_tiles = 4;
    let block_height_in_tiles = 8; // 8 tiles = 8 texel rows
    let tiles_per_block = block_width_in_tiles * block_height_in_tiles;
    let block_stride_bits = tiles_per_block * tile_size_bits;

    u / (texels_per_tile * block_width_in_tiles) * (block_stride_bits / 8)
        + (u % (texels_per_tile * block_width_in_tiles)) * (texel_size_bits / 8)
        + (v % block_height_in_tiles) * (block_width_in_tiles * tile_size_bits / 8)
        + (v / block_height_in_tiles) * (width * texel_size_bits * block_height_in_tiles / 8)
}

fn pack(r: u32, g: u32, b: u32, a: u32) -> u32 {
    (r << 24) | (g << 16) | (b << 8) | a
}

/// Samples one texel. Pure: identical state and coordinates always return
/// the same word. In through mode `s`/`t` are absolute texel units,
/// otherwise they are normalized over the level's width/height.
/// Coordinates are clamped to the texture rectangle; out-of-range fetches
/// never touch memory past the texture.
pub fn sample_nearest(
    state: &GpuState,
    level: usize,
    s: f32,
    t: f32,
    texture_memory: &[u8],
    clut: &Clut,
) -> u32 {
    let Some(format) = state.texture_format() else {
        log::error!(
            "unsupported texture format {:#x}",
            state.cmd[crate::state::reg::TEX_FORMAT] & 0xF
        );
        return 0;
    };

    let addr = state.tex_addr(level) as usize;
    let width = state.tex_width(level);
    let height = state.tex_height(level);
    let swizzled = state.is_texture_swizzled();

    let (u, v) = if state.is_mode_through() {
        (s as i32, t as i32)
    } else {
        (
            (s * width as f32) as i32,
            (t * height as f32) as i32,
        )
    };
    let u = u.clamp(0, width as i32 - 1) as usize;
    let v = v.clamp(0, height as i32 - 1) as usize;

    let byte_at = |off: usize| texture_memory.get(addr + off).copied().unwrap_or(0);
    let u16_at = |off: usize| u16::from_le_bytes([byte_at(off), byte_at(off + 1)]);

    match format {
        TextureFormat::Rgba4444 => {
            let texel = u16_at(pixel_data_offset(16, u, v, width, swizzled));
            let r = ((texel >> 4) & 0xF) as u32;
            let g = (texel & 0xF) as u32;
            let b = ((texel >> 12) & 0xF) as u32;
            let a = ((texel >> 8) & 0xF) as u32;
            pack((r << 4) | r, (g << 4) | g, (b << 4) | b, (a << 4) | a)
        }
        TextureFormat::Rgba5551 => {
            let texel = u16_at(pixel_data_offset(16, u, v, width, swizzled));
            let r = (texel & 0x1F) as u32;
            let g = ((texel >> 5) & 0x1F) as u32;
            let b = ((texel >> 10) & 0x1F) as u32;
            let a = if texel & 0x8000 != 0 { 0xFF } else { 0 };
            pack((r << 3) | (r >> 2), (g << 3) | (g >> 2), (b << 3) | (b >> 2), a)
        }
        TextureFormat::Rgb565 => {
            let texel = u16_at(pixel_data_offset(16, u, v, width, swizzled));
            let r = (texel & 0x1F) as u32;
            let g = ((texel >> 5) & 0x3F) as u32;
            let b = ((texel >> 11) & 0x1F) as u32;
            pack((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 0xFF)
        }
        TextureFormat::Rgba8888 => {
            let off = pixel_data_offset(32, u, v, width, swizzled);
            pack(
                byte_at(off) as u32,
                byte_at(off + 1) as u32,
                byte_at(off + 2) as u32,
                byte_at(off + 3) as u32,
            )
        }
        TextureFormat::Clut8 => {
            let texel = byte_at(pixel_data_offset(8, u, v, width, swizzled));
            clut.lookup(clut_index(state, texel as u32))
        }
        TextureFormat::Clut4 => {
            let byte = byte_at(pixel_data_offset(4, u, v, width, swizzled));
            let nibble = if u % 2 == 1 { byte & 0xF } else { byte >> 4 };
            clut.lookup(clut_index(state, nibble as u32))
        }
        TextureFormat::Clut16
        | TextureFormat::Clut32
        | TextureFormat::Dxt1
        | TextureFormat::Dxt3
        | TextureFormat::Dxt5 => {
            log::error!("unsupported texture format {format:?}");
            0
        }
    }
}

/// Palette index derivation: shift and mask the raw texel, then splice in
/// the start-position block (its topmost bit overlays the index).
fn clut_index(state: &GpuState, texel: u32) -> u32 {
    let index = (texel >> state.clut_index_shift()) & 0xFF & state.clut_index_mask();
    (index & 0xFF) | state.clut_index_start_pos()
}
