//! The top-level render core: register bank plus the buffers a submission
//! touches. Everything here is process-wide — created once at startup,
//! dropped at shutdown. Vertices themselves never outlive a single
//! `submit_primitive` call.

use crate::framebuffer::{Clut, DepthBuffer, FrameBuffer};
use crate::state::GpuState;

pub struct Gpu {
    pub state: GpuState,
    pub framebuffer: FrameBuffer,
    pub depthbuffer: DepthBuffer,
    pub clut: Clut,
    /// Guest memory the sampler fetches texels from, indexed by the texture
    /// address registers. Owned by the embedding emulator in practice; the
    /// core only ever reads it.
    pub texture_memory: Vec<u8>,
}

impl Gpu {
    pub fn new(width: usize, height: usize, texture_memory_size: usize) -> Self {
        Self {
            state: GpuState::new(),
            framebuffer: FrameBuffer::new(width, height),
            depthbuffer: DepthBuffer::new(width, height),
            clut: Clut::new(),
            texture_memory: vec![0; texture_memory_size],
        }
    }
}
