use crate::{Bone, ClippingAttachment};

/// Ear-clipping triangulator with convex decomposition. Working buffers are
/// kept between calls so repeated use does not allocate.
#[derive(Clone, Debug, Default)]
pub struct Triangulator {
    indices: Vec<usize>,
    is_concave: Vec<bool>,
    triangles: Vec<u16>,
    convex_polygons: Vec<Vec<f32>>,
    convex_polygons_indices: Vec<Vec<usize>>,
    polygon_pool: Vec<Vec<f32>>,
    polygon_indices_pool: Vec<Vec<usize>>,
}

impl Triangulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triangulates a simple polygon given as `[x0, y0, x1, y1, ...]` and
    /// returns vertex indices, three per triangle.
    ///
    /// When no ear is found scanning forward, the last non-concave vertex
    /// before the scan end is clipped anyway. Self-intersecting input is not
    /// rejected and yields whatever that rule produces.
    pub fn triangulate(&mut self, vertices: &[f32]) -> &[u16] {
        let mut vertex_count = vertices.len() / 2;
        self.triangles.clear();
        if vertex_count < 3 {
            return &self.triangles;
        }

        let indices = &mut self.indices;
        indices.clear();
        indices.extend(0..vertex_count);
        let is_concave = &mut self.is_concave;
        is_concave.clear();
        for i in 0..vertex_count {
            is_concave.push(is_concave_at(i, vertex_count, vertices, indices));
        }

        let triangles = &mut self.triangles;
        triangles.reserve((vertex_count - 2) * 3);

        while vertex_count > 3 {
            let mut previous = vertex_count - 1;
            let mut i = 0usize;
            let mut next = 1usize;

            loop {
                if !is_concave[i] && is_ear(vertices, indices, is_concave, previous, i, next) {
                    break;
                }

                if next == 0 {
                    while i > 0 && is_concave[i] {
                        i -= 1;
                    }
                    break;
                }

                previous = i;
                i = next;
                next = (next + 1) % vertex_count;
            }

            triangles.push(indices[(vertex_count + i - 1) % vertex_count] as u16);
            triangles.push(indices[i] as u16);
            triangles.push(indices[(i + 1) % vertex_count] as u16);

            indices.remove(i);
            is_concave.remove(i);
            vertex_count -= 1;

            let previous_index = (vertex_count + i - 1) % vertex_count;
            let next_index = if i == vertex_count { 0 } else { i };
            is_concave[previous_index] = is_concave_at(previous_index, vertex_count, vertices, indices);
            is_concave[next_index] = is_concave_at(next_index, vertex_count, vertices, indices);
        }

        if vertex_count == 3 {
            triangles.push(indices[2] as u16);
            triangles.push(indices[0] as u16);
            triangles.push(indices[1] as u16);
        }

        &self.triangles
    }

    /// Merges the triangles of a triangulated polygon into convex polygons.
    ///
    /// Consecutive triangles sharing the fan base are merged while the
    /// winding stays consistent; a second pass then absorbs lone triangles
    /// that continue another polygon's first/last edge.
    pub fn decompose(&mut self, vertices: &[f32], triangles: &[u16]) -> &[Vec<f32>] {
        for mut polygon in self.convex_polygons.drain(..) {
            polygon.clear();
            self.polygon_pool.push(polygon);
        }
        for mut polygon_indices in self.convex_polygons_indices.drain(..) {
            polygon_indices.clear();
            self.polygon_indices_pool.push(polygon_indices);
        }

        let mut polygon = self.polygon_pool.pop().unwrap_or_default();
        let mut polygon_indices = self.polygon_indices_pool.pop().unwrap_or_default();
        let mut fan_base_index = None;
        let mut last_winding = 0;

        for tri in triangles.chunks_exact(3) {
            let t1 = tri[0] as usize * 2;
            let t2 = tri[1] as usize * 2;
            let t3 = tri[2] as usize * 2;
            if t1.max(t2).max(t3) + 1 >= vertices.len() {
                log::warn!("triangle index out of range during decomposition");
                continue;
            }
            let (x1, y1) = (vertices[t1], vertices[t1 + 1]);
            let (x2, y2) = (vertices[t2], vertices[t2 + 1]);
            let (x3, y3) = (vertices[t3], vertices[t3 + 1]);

            let mut merged = false;
            if fan_base_index == Some(t1) && polygon.len() >= 6 {
                let o = polygon.len() - 4;
                let winding1 = winding(polygon[o], polygon[o + 1], polygon[o + 2], polygon[o + 3], x3, y3);
                let winding2 = winding(x3, y3, polygon[0], polygon[1], polygon[2], polygon[3]);
                if winding1 == last_winding && winding2 == last_winding {
                    polygon.extend_from_slice(&[x3, y3]);
                    polygon_indices.push(t3);
                    merged = true;
                }
            }

            if !merged {
                if !polygon.is_empty() {
                    self.convex_polygons.push(polygon);
                    self.convex_polygons_indices.push(polygon_indices);
                    polygon = self.polygon_pool.pop().unwrap_or_default();
                    polygon_indices = self.polygon_indices_pool.pop().unwrap_or_default();
                }
                polygon.extend_from_slice(&[x1, y1, x2, y2, x3, y3]);
                polygon_indices.extend_from_slice(&[t1, t2, t3]);
                last_winding = winding(x1, y1, x2, y2, x3, y3);
                fan_base_index = Some(t1);
            }
        }

        if polygon.is_empty() {
            self.polygon_pool.push(polygon);
            self.polygon_indices_pool.push(polygon_indices);
        } else {
            self.convex_polygons.push(polygon);
            self.convex_polygons_indices.push(polygon_indices);
        }

        self.merge_adjacent_polygons();

        for i in (0..self.convex_polygons.len()).rev() {
            if self.convex_polygons[i].is_empty() {
                self.polygon_pool.push(self.convex_polygons.remove(i));
                self.polygon_indices_pool
                    .push(self.convex_polygons_indices.remove(i));
            }
        }

        &self.convex_polygons
    }

    /// Triangulates and decomposes in one step, reusing the internal triangle
    /// buffer.
    pub fn convex_partition(&mut self, vertices: &[f32]) -> &[Vec<f32>] {
        self.triangulate(vertices);
        let triangles = std::mem::take(&mut self.triangles);
        self.decompose(vertices, &triangles);
        self.triangles = triangles;
        &self.convex_polygons
    }

    fn merge_adjacent_polygons(&mut self) {
        let polygons = &mut self.convex_polygons;
        let polygons_indices = &mut self.convex_polygons_indices;
        let n = polygons.len();
        for i in 0..n {
            if polygons_indices[i].is_empty() {
                continue;
            }
            let first_index = polygons_indices[i][0];
            let last_index = polygons_indices[i][polygons_indices[i].len() - 1];

            let p = &polygons[i];
            let o = p.len() - 4;
            let (mut prev_prev_x, mut prev_prev_y) = (p[o], p[o + 1]);
            let (mut prev_x, mut prev_y) = (p[o + 2], p[o + 3]);
            let (first_x, first_y) = (p[0], p[1]);
            let (second_x, second_y) = (p[2], p[3]);
            let winding0 = winding(prev_prev_x, prev_prev_y, prev_x, prev_y, first_x, first_y);

            let mut ii = 0usize;
            while ii < n {
                let other_indices = &polygons_indices[ii];
                if ii == i
                    || other_indices.len() != 3
                    || other_indices[0] != first_index
                    || other_indices[1] != last_index
                {
                    ii += 1;
                    continue;
                }
                let other_last_index = other_indices[2];
                let other = &polygons[ii];
                let (x3, y3) = (other[other.len() - 2], other[other.len() - 1]);

                let winding1 = winding(prev_prev_x, prev_prev_y, prev_x, prev_y, x3, y3);
                let winding2 = winding(x3, y3, first_x, first_y, second_x, second_y);
                if winding1 != winding0 || winding2 != winding0 {
                    ii += 1;
                    continue;
                }

                polygons[ii].clear();
                polygons_indices[ii].clear();
                polygons[i].extend_from_slice(&[x3, y3]);
                polygons_indices[i].push(other_last_index);
                prev_prev_x = prev_x;
                prev_prev_y = prev_y;
                prev_x = x3;
                prev_y = y3;
                ii = 0;
            }
        }
    }
}

fn is_ear(
    vertices: &[f32],
    indices: &[usize],
    is_concave: &[bool],
    previous: usize,
    current: usize,
    next: usize,
) -> bool {
    let vertex_count = indices.len();
    let p1 = indices[previous] * 2;
    let p2 = indices[current] * 2;
    let p3 = indices[next] * 2;
    let (p1x, p1y) = (vertices[p1], vertices[p1 + 1]);
    let (p2x, p2y) = (vertices[p2], vertices[p2 + 1]);
    let (p3x, p3y) = (vertices[p3], vertices[p3 + 1]);

    let mut ii = (next + 1) % vertex_count;
    while ii != previous {
        if is_concave[ii] {
            let v = indices[ii] * 2;
            let (vx, vy) = (vertices[v], vertices[v + 1]);
            if positive_area(p3x, p3y, p1x, p1y, vx, vy)
                && positive_area(p1x, p1y, p2x, p2y, vx, vy)
                && positive_area(p2x, p2y, p3x, p3y, vx, vy)
            {
                return false;
            }
        }
        ii = (ii + 1) % vertex_count;
    }
    true
}

fn positive_area(p1x: f32, p1y: f32, p2x: f32, p2y: f32, p3x: f32, p3y: f32) -> bool {
    p1x * (p3y - p2y) + p2x * (p1y - p3y) + p3x * (p2y - p1y) >= 0.0
}

fn is_concave_at(index: usize, vertex_count: usize, vertices: &[f32], indices: &[usize]) -> bool {
    let previous = indices[(vertex_count + index - 1) % vertex_count] * 2;
    let current = indices[index] * 2;
    let next = indices[(index + 1) % vertex_count] * 2;
    !positive_area(
        vertices[previous],
        vertices[previous + 1],
        vertices[current],
        vertices[current + 1],
        vertices[next],
        vertices[next + 1],
    )
}

fn winding(p1x: f32, p1y: f32, p2x: f32, p2y: f32, p3x: f32, p3y: f32) -> i32 {
    let px = p2x - p1x;
    let py = p2y - p1y;
    if p3x * py - p3y * px + px * p1y - p1x * py >= 0.0 {
        1
    } else {
        -1
    }
}

/// Reverses a polygon in place unless it is already clockwise.
pub fn make_clockwise(polygon: &mut [f32]) {
    let len = polygon.len();
    if len < 6 {
        return;
    }
    let mut area = polygon[len - 2] * polygon[1] - polygon[0] * polygon[len - 1];
    for pair in polygon.windows(4).step_by(2) {
        area += pair[0] * pair[3] - pair[2] * pair[1];
    }
    if area < 0.0 {
        return;
    }

    let last_x = len - 2;
    let mut i = 0usize;
    while i < len / 2 {
        let other = last_x - i;
        polygon.swap(i, other);
        polygon.swap(i + 1, other + 1);
        i += 2;
    }
}

/// Masks triangle geometry against the polygon of a clipping attachment.
///
/// One clip region is active at a time, from [`SkeletonClipping::clip_start`]
/// until the draw order reaches its end slot. All buffers are reused across
/// activations and frames.
#[derive(Clone, Debug, Default)]
pub struct SkeletonClipping {
    triangulator: Triangulator,
    active: bool,
    end_slot: Option<usize>,
    clipping_polygon: Vec<f32>,
    clipping_polygons: Vec<Vec<f32>>,
    polygon_count: usize,
    clip_output: Vec<f32>,
    scratch: Vec<f32>,
    clipped_vertices: Vec<f32>,
    clipped_uvs: Vec<f32>,
    clipped_triangles: Vec<u16>,
}

impl SkeletonClipping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates `clip`, positioned by the world transform of its slot's
    /// bone, and returns the number of convex polygons it was split into.
    /// Returns 0 and changes nothing if a clip is already active.
    pub fn clip_start(&mut self, bone: &Bone, clip: &ClippingAttachment) -> usize {
        if self.active {
            log::debug!("clip_start for '{}' ignored: a clip is already active", clip.name);
            return 0;
        }
        let n = clip.vertices.world_vertices_length();
        self.clipping_polygon.clear();
        self.clipping_polygon.resize(n, 0.0);
        clip.vertices
            .compute_world_vertices(bone, 0, n, &mut self.clipping_polygon, 0, 2);
        self.activate(clip.end_slot)
    }

    /// Like [`SkeletonClipping::clip_start`] for a polygon already in world
    /// space.
    pub fn clip_start_polygon(&mut self, world_vertices: &[f32], end_slot: Option<usize>) -> usize {
        if self.active {
            log::debug!("clip_start_polygon ignored: a clip is already active");
            return 0;
        }
        self.clipping_polygon.clear();
        self.clipping_polygon.extend_from_slice(world_vertices);
        self.activate(end_slot)
    }

    fn activate(&mut self, end_slot: Option<usize>) -> usize {
        if self.clipping_polygon.len() < 6 {
            log::debug!("clipping polygon with fewer than 3 vertices ignored");
            self.clipping_polygon.clear();
            return 0;
        }
        self.active = true;
        self.end_slot = end_slot;

        make_clockwise(&mut self.clipping_polygon);
        let polygons = self.triangulator.convex_partition(&self.clipping_polygon);
        if self.clipping_polygons.len() < polygons.len() {
            self.clipping_polygons.resize_with(polygons.len(), Vec::new);
        }
        for (dst, src) in self.clipping_polygons.iter_mut().zip(polygons) {
            dst.clear();
            dst.extend_from_slice(src);
            make_clockwise(dst);
            let (x, y) = (dst[0], dst[1]);
            dst.extend_from_slice(&[x, y]);
        }
        self.polygon_count = polygons.len();
        self.polygon_count
    }

    /// Ends clipping if `slot_index` is the active clip's end slot.
    pub fn clip_end(&mut self, slot_index: usize) {
        if self.active && self.end_slot == Some(slot_index) {
            self.clip_end_now();
        }
    }

    /// Ends clipping unconditionally and clears all clip state.
    pub fn clip_end_now(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.end_slot = None;
        self.polygon_count = 0;
        self.clipped_vertices.clear();
        self.clipped_uvs.clear();
        self.clipped_triangles.clear();
        self.clipping_polygon.clear();
    }

    pub fn is_clipping(&self) -> bool {
        self.active
    }

    /// Slot index at which the active clip ends, if any.
    pub fn end_slot(&self) -> Option<usize> {
        self.end_slot
    }

    /// The active clip region's convex polygons, each closed by repeating its
    /// first vertex.
    pub fn clipping_polygons(&self) -> &[Vec<f32>] {
        &self.clipping_polygons[..self.polygon_count]
    }

    /// Clips `triangles` against every convex clip polygon. `vertices` and
    /// `uvs` share the same layout: vertex `i` starts at `i * stride`.
    ///
    /// Results replace the previous contents of [`Self::clipped_vertices`],
    /// [`Self::clipped_uvs`] and [`Self::clipped_triangles`].
    pub fn clip_triangles(&mut self, vertices: &[f32], triangles: &[u16], uvs: &[f32], stride: usize) {
        self.clipped_vertices.clear();
        self.clipped_uvs.clear();
        self.clipped_triangles.clear();
        if !self.active {
            return;
        }

        let polygons = &self.clipping_polygons[..self.polygon_count];
        let clipped_vertices = &mut self.clipped_vertices;
        let clipped_uvs = &mut self.clipped_uvs;
        let clipped_triangles = &mut self.clipped_triangles;
        let mut index: u16 = 0;

        'outer: for tri in triangles.chunks_exact(3) {
            let (Some([x1, y1, u1, v1]), Some([x2, y2, u2, v2]), Some([x3, y3, u3, v3])) = (
                read_vertex(vertices, uvs, tri[0], stride),
                read_vertex(vertices, uvs, tri[1], stride),
                read_vertex(vertices, uvs, tri[2], stride),
            ) else {
                log::warn!("triangle references a vertex outside the vertex buffer");
                continue;
            };

            for polygon in polygons {
                let clipped = clip(
                    [x1, y1, x2, y2, x3, y3],
                    polygon,
                    &mut self.clip_output,
                    &mut self.scratch,
                );

                if !clipped {
                    clipped_vertices.extend_from_slice(&[x1, y1, x2, y2, x3, y3]);
                    clipped_uvs.extend_from_slice(&[u1, v1, u2, v2, u3, v3]);
                    clipped_triangles.extend_from_slice(&[
                        index,
                        index.wrapping_add(1),
                        index.wrapping_add(2),
                    ]);
                    index = index.wrapping_add(3);
                    continue 'outer;
                }

                let output = &self.clip_output;
                if output.is_empty() {
                    continue;
                }

                let d0 = y2 - y3;
                let d1 = x3 - x2;
                let d2 = x1 - x3;
                let d4 = y3 - y1;
                let d = 1.0 / (d0 * d2 + d1 * (y1 - y3));

                for xy in output.chunks_exact(2) {
                    let (x, y) = (xy[0], xy[1]);
                    let c0 = x - x3;
                    let c1 = y - y3;
                    let a = (d0 * c0 + d1 * c1) * d;
                    let b = (d4 * c0 + d2 * c1) * d;
                    let c = 1.0 - a - b;
                    clipped_vertices.extend_from_slice(&[x, y]);
                    clipped_uvs.extend_from_slice(&[u1 * a + u2 * b + u3 * c, v1 * a + v2 * b + v3 * c]);
                }

                let last = (output.len() / 2).saturating_sub(1);
                for ii in 1..last {
                    let ii = ii as u16;
                    clipped_triangles.extend_from_slice(&[
                        index,
                        index.wrapping_add(ii),
                        index.wrapping_add(ii + 1),
                    ]);
                }
                index = index.wrapping_add(last as u16 + 1);
            }
        }
    }

    pub fn clipped_vertices(&self) -> &[f32] {
        &self.clipped_vertices
    }

    pub fn clipped_uvs(&self) -> &[f32] {
        &self.clipped_uvs
    }

    pub fn clipped_triangles(&self) -> &[u16] {
        &self.clipped_triangles
    }
}

fn read_vertex(vertices: &[f32], uvs: &[f32], vertex: u16, stride: usize) -> Option<[f32; 4]> {
    let offset = vertex as usize * stride;
    Some([
        *vertices.get(offset)?,
        *vertices.get(offset + 1)?,
        *uvs.get(offset)?,
        *uvs.get(offset + 1)?,
    ])
}

/// Clips one triangle against a closed convex polygon, edge by edge.
///
/// Returns `false` when the triangle lies entirely inside (nothing was
/// clipped). Otherwise `output` holds the clipped polygon, which is empty when
/// the triangle lies entirely outside.
fn clip(triangle: [f32; 6], clipping_area: &[f32], output: &mut Vec<f32>, scratch: &mut Vec<f32>) -> bool {
    let [x1, y1, x2, y2, x3, y3] = triangle;
    let mut clipped = false;

    let mut input = scratch;
    let mut out = output;
    let mut out_is_original = true;
    input.clear();
    input.extend_from_slice(&[x1, y1, x2, y2, x3, y3, x1, y1]);
    out.clear();

    if clipping_area.len() < 8 {
        return false;
    }
    let clipping_vertices_last = clipping_area.len() - 4;
    let mut i = 0usize;
    loop {
        let edge = [
            clipping_area[i],
            clipping_area[i + 1],
            clipping_area[i + 2],
            clipping_area[i + 3],
        ];
        let [edge_x, edge_y, edge_x2, edge_y2] = edge;
        let delta_x = edge_x - edge_x2;
        let delta_y = edge_y - edge_y2;
        let inside = |x: f32, y: f32| delta_x * (y - edge_y2) - delta_y * (x - edge_x2) > 0.0;

        for segment in input.windows(4).step_by(2) {
            let (input_x, input_y, input_x2, input_y2) = (segment[0], segment[1], segment[2], segment[3]);
            let side2 = inside(input_x2, input_y2);
            if inside(input_x, input_y) {
                if side2 {
                    out.extend_from_slice(&[input_x2, input_y2]);
                    continue;
                }
                push_intersection(out, edge, [input_x, input_y, input_x2, input_y2]);
            } else if side2 {
                push_intersection(out, edge, [input_x, input_y, input_x2, input_y2]);
                out.extend_from_slice(&[input_x2, input_y2]);
            }
            clipped = true;
        }

        if out.is_empty() {
            if out_is_original {
                out.clear();
            } else {
                input.clear();
            }
            return true;
        }

        let (first_x, first_y) = (out[0], out[1]);
        out.extend_from_slice(&[first_x, first_y]);

        if i == clipping_vertices_last {
            break;
        }
        std::mem::swap(&mut input, &mut out);
        out.clear();
        out_is_original = !out_is_original;
        i += 2;
    }

    let closed_len = out.len() - 2;
    if out_is_original {
        out.truncate(closed_len);
    } else {
        input.clear();
        input.extend_from_slice(&out[..closed_len]);
    }
    clipped
}

fn push_intersection(out: &mut Vec<f32>, edge: [f32; 4], segment: [f32; 4]) {
    let [edge_x, edge_y, edge_x2, edge_y2] = edge;
    let [input_x, input_y, input_x2, input_y2] = segment;
    let c0 = input_y2 - input_y;
    let c2 = input_x2 - input_x;
    let s = c0 * (edge_x2 - edge_x) - c2 * (edge_y2 - edge_y);
    if s.abs() > 1.0e-6 {
        let ua = (c2 * (edge_y - input_y) - c0 * (edge_x - input_x)) / s;
        out.extend_from_slice(&[edge_x + (edge_x2 - edge_x) * ua, edge_y + (edge_y2 - edge_y) * ua]);
    } else {
        out.extend_from_slice(&[edge_x, edge_y]);
    }
}
