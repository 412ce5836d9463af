//! Little-endian byte layouts of precomputed meshes and skeletons
//!
//! ```text
//! mesh:      u32 vertex_count | f32[3] * vertices | u32[3] * faces
//! skeleton:  u32 vertex_count | u32 edge_count | f32[3] * vertices | u32[2] * edges
//! ```

use crate::errors::SceneError;

fn count(len: usize, what: &str) -> Result<[u8; 4], SceneError> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| SceneError::Encode(format!("{} {} exceed the u32 range", len, what)))
}

fn extend_f32<'a>(out: &mut Vec<u8>, values: impl Iterator<Item = &'a f32>) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

fn extend_u32<'a>(out: &mut Vec<u8>, values: impl Iterator<Item = &'a u32>) {
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Encode a triangle mesh
pub fn encode_mesh(vertices: &[[f32; 3]], faces: &[[u32; 3]]) -> Result<Vec<u8>, SceneError> {
    let mut out = Vec::with_capacity(4 + vertices.len() * 12 + faces.len() * 12);
    out.extend_from_slice(&count(vertices.len(), "vertices")?);
    extend_f32(&mut out, vertices.iter().flatten());
    extend_u32(&mut out, faces.iter().flatten());
    Ok(out)
}

/// Encode a skeleton
pub fn encode_skeleton(vertices: &[[f32; 3]], edges: &[[u32; 2]]) -> Result<Vec<u8>, SceneError> {
    let mut out = Vec::with_capacity(8 + vertices.len() * 12 + edges.len() * 8);
    out.extend_from_slice(&count(vertices.len(), "vertices")?);
    out.extend_from_slice(&count(edges.len(), "edges")?);
    extend_f32(&mut out, vertices.iter().flatten());
    extend_u32(&mut out, edges.iter().flatten());
    Ok(out)
}
