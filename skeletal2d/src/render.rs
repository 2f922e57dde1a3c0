use crate::{Attachment, RegionAttachment, Skeleton, SkeletonClipping};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// A run of indices sharing one texture.
#[derive(Clone, Debug, PartialEq)]
pub struct Draw {
    pub texture_path: String,
    pub first_index: usize,
    pub index_count: usize,
}

/// World-space triangles ready for an external rasterizer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawList {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub draws: Vec<Draw>,
}

impl DrawList {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.draws.clear();
    }
}

/// Turns a posed skeleton into a [`DrawList`], masking slots behind clipping
/// attachments. Keeps its clipper and scratch buffers between frames.
#[derive(Clone, Debug, Default)]
pub struct SkeletonRenderer {
    clipper: SkeletonClipping,
    world_vertices: Vec<f32>,
}

impl SkeletonRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&mut self, skeleton: &Skeleton) -> DrawList {
        let mut out = DrawList::default();
        self.append(&mut out, skeleton);
        out
    }

    /// Appends the skeleton's region and mesh attachments in draw order.
    ///
    /// A clipping attachment masks the slots after it until its end slot has
    /// been drawn. Slots that are transparent, hidden by an inactive bone or
    /// show nothing still end an active clip when they are its end slot.
    pub fn append(&mut self, out: &mut DrawList, skeleton: &Skeleton) {
        let arena = &skeleton.data.attachments;
        let clipper = &mut self.clipper;
        let world = &mut self.world_vertices;

        for &slot_index in &skeleton.draw_order {
            let Some(slot) = skeleton.slots.get(slot_index) else {
                continue;
            };
            let mut end_clip = true;

            'slot: {
                let Some(id) = slot.attachment else {
                    break 'slot;
                };
                let Some(attachment) = arena.get(id) else {
                    log::debug!("slot {slot_index} shows a released attachment");
                    break 'slot;
                };
                let Some(bone) = skeleton.bones.get(slot.bone) else {
                    break 'slot;
                };

                match attachment {
                    Attachment::Region(region) => {
                        if slot.color[3] <= 0.0 || region.color[3] <= 0.0 || !bone.active {
                            break 'slot;
                        }
                        world.clear();
                        world.resize(8, 0.0);
                        region.compute_world_vertices(bone, world, 0, 2);
                        let color = tint(skeleton.color, slot.color, region.color);
                        emit(
                            out,
                            clipper,
                            &region.path,
                            world,
                            region.uvs(),
                            &RegionAttachment::TRIANGLES,
                            color,
                        );
                    }
                    Attachment::Mesh(mesh) => {
                        if slot.color[3] <= 0.0 || mesh.color[3] <= 0.0 || !bone.active {
                            break 'slot;
                        }
                        let Some(geometry) = arena.mesh_geometry(id) else {
                            log::debug!("mesh '{}' has no reachable geometry", mesh.name);
                            break 'slot;
                        };
                        let n = geometry.vertices.world_vertices_length();
                        let vertex_count = n / 2;
                        if mesh.uvs().len() < n {
                            log::warn!(
                                "mesh '{}' has {} UV values for {} vertices; skipped",
                                mesh.name,
                                mesh.uvs().len(),
                                vertex_count
                            );
                            break 'slot;
                        }
                        if geometry
                            .triangles
                            .iter()
                            .any(|&i| i as usize >= vertex_count)
                        {
                            log::warn!(
                                "mesh '{}' has triangle indices beyond its {} vertices; skipped",
                                mesh.name,
                                vertex_count
                            );
                            break 'slot;
                        }
                        world.clear();
                        world.resize(n, 0.0);
                        geometry
                            .vertices
                            .compute_world_vertices(bone, 0, n, world, 0, 2);
                        let color = tint(skeleton.color, slot.color, mesh.color);
                        emit(
                            out,
                            clipper,
                            &mesh.path,
                            world,
                            mesh.uvs(),
                            &geometry.triangles,
                            color,
                        );
                    }
                    Attachment::Clipping(clip) => {
                        end_clip = false;
                        if !bone.active {
                            break 'slot;
                        }
                        clipper.clip_start(bone, clip);
                    }
                    Attachment::BoundingBox(_) => {}
                }
            }

            if end_clip {
                clipper.clip_end(slot_index);
            }
        }

        clipper.clip_end_now();
    }
}

/// Builds a draw list with a fresh [`SkeletonRenderer`].
pub fn build_draw_list(skeleton: &Skeleton) -> DrawList {
    SkeletonRenderer::new().build(skeleton)
}

fn tint(skeleton: [f32; 4], slot: [f32; 4], attachment: [f32; 4]) -> [f32; 4] {
    [
        skeleton[0] * slot[0] * attachment[0],
        skeleton[1] * slot[1] * attachment[1],
        skeleton[2] * slot[2] * attachment[2],
        skeleton[3] * slot[3] * attachment[3],
    ]
}

fn emit(
    out: &mut DrawList,
    clipper: &mut SkeletonClipping,
    texture_path: &str,
    positions: &[f32],
    uvs: &[f32],
    triangles: &[u16],
    color: [f32; 4],
) {
    if clipper.is_clipping() {
        clipper.clip_triangles(positions, triangles, uvs, 2);
        push_geometry(
            out,
            texture_path,
            clipper.clipped_vertices(),
            clipper.clipped_uvs(),
            clipper.clipped_triangles(),
            color,
        );
    } else {
        push_geometry(out, texture_path, positions, uvs, triangles, color);
    }
}

fn push_geometry(
    out: &mut DrawList,
    texture_path: &str,
    positions: &[f32],
    uvs: &[f32],
    triangles: &[u16],
    color: [f32; 4],
) {
    if positions.is_empty() || triangles.is_empty() {
        return;
    }

    let base = out.vertices.len() as u32;
    out.vertices.extend(
        positions
            .chunks_exact(2)
            .zip(uvs.chunks_exact(2))
            .map(|(p, uv)| Vertex {
                position: [p[0], p[1]],
                uv: [uv[0], uv[1]],
                color,
            }),
    );

    let first_index = out.indices.len();
    out.indices
        .extend(triangles.iter().map(|&i| base + i as u32));

    if let Some(last) = out.draws.last_mut() {
        if last.texture_path == texture_path && last.first_index + last.index_count == first_index {
            last.index_count += triangles.len();
            return;
        }
    }
    out.draws.push(Draw {
        texture_path: texture_path.to_string(),
        first_index,
        index_count: triangles.len(),
    });
}
