//! Seam to the lighting collaborator.
//!
//! The transform unit hands every vertex of a lit submission to the
//! implementation, which may rewrite the primary and secondary colors from
//! the vertex's world-space position and normal. The render core itself
//! never looks inside.

use crate::state::GpuState;
use crate::vertex::VertexData;

pub trait Lighting {
    fn process(&mut self, state: &GpuState, vertex: &mut VertexData);
}

/// Leaves vertex colors untouched; useful for unlit content and tests.
pub struct NullLighting;

impl Lighting for NullLighting {
    fn process(&mut self, _state: &GpuState, _vertex: &mut VertexData) {}
}
