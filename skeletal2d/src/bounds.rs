use crate::{Attachment, AttachmentId, Skeleton};

/// A closed world-space polygon `[x0, y0, x1, y1, ...]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<f32>,
}

impl Polygon {
    /// Even-odd rule: points on a crossing edge toggle the result once.
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        let v = &self.vertices;
        let count = v.len() & !1;
        if count < 6 {
            return false;
        }
        let mut prev = count - 2;
        let mut inside = false;
        for i in (0..count).step_by(2) {
            let vertex_y = v[i + 1];
            let prev_y = v[prev + 1];
            if (vertex_y < y && prev_y >= y) || (prev_y < y && vertex_y >= y) {
                let vertex_x = v[i];
                if vertex_x + (y - vertex_y) / (prev_y - vertex_y) * (v[prev] - vertex_x) < x {
                    inside = !inside;
                }
            }
            prev = i;
        }
        inside
    }

    /// Whether the segment crosses any edge of the polygon.
    pub fn intersects_segment(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
        let v = &self.vertices;
        let count = v.len() & !1;
        if count < 4 {
            return false;
        }
        let width12 = x1 - x2;
        let height12 = y1 - y2;
        let det1 = x1 * y2 - y1 * x2;
        let mut x3 = v[count - 2];
        let mut y3 = v[count - 1];
        for i in (0..count).step_by(2) {
            let x4 = v[i];
            let y4 = v[i + 1];
            let det2 = x3 * y4 - y3 * x4;
            let width34 = x3 - x4;
            let height34 = y3 - y4;
            let det3 = width12 * height34 - height12 * width34;
            let x = (det1 * width34 - width12 * det2) / det3;
            if within(x, x3, x4) && within(x, x1, x2) {
                let y = (det1 * height34 - height12 * det2) / det3;
                if within(y, y3, y4) && within(y, y1, y2) {
                    return true;
                }
            }
            x3 = x4;
            y3 = y4;
        }
        false
    }
}

fn within(value: f32, a: f32, b: f32) -> bool {
    (value >= a && value <= b) || (value >= b && value <= a)
}

/// World-space polygons of the bounding boxes a skeleton currently shows,
/// with their combined axis-aligned bounds.
///
/// Polygon buffers are kept between updates.
#[derive(Clone, Debug)]
pub struct SkeletonBounds {
    bounding_boxes: Vec<AttachmentId>,
    polygons: Vec<Polygon>,
    count: usize,
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Default for SkeletonBounds {
    fn default() -> Self {
        Self {
            bounding_boxes: Vec::new(),
            polygons: Vec::new(),
            count: 0,
            min_x: f32::MAX,
            min_y: f32::MAX,
            max_x: f32::MIN,
            max_y: f32::MIN,
        }
    }
}

impl SkeletonBounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the bounding box attachment of every slot whose bone is
    /// active. With `update_aabb` the combined bounds are recomputed;
    /// otherwise they are reset to an empty (inverted) box.
    pub fn update(&mut self, skeleton: &Skeleton, update_aabb: bool) {
        self.min_x = f32::MAX;
        self.min_y = f32::MAX;
        self.max_x = f32::MIN;
        self.max_y = f32::MIN;
        self.count = 0;
        self.bounding_boxes.clear();

        for slot in &skeleton.slots {
            let Some(bone) = skeleton.bones.get(slot.bone) else {
                continue;
            };
            if !bone.active {
                continue;
            }
            let Some(id) = slot.attachment else {
                continue;
            };
            let Some(Attachment::BoundingBox(bounding_box)) = skeleton.data.attachments.get(id)
            else {
                continue;
            };

            if self.polygons.len() <= self.count {
                self.polygons.push(Polygon::default());
            }
            let polygon = &mut self.polygons[self.count];
            let n = bounding_box.vertices.world_vertices_length();
            polygon.vertices.clear();
            polygon.vertices.resize(n, 0.0);
            bounding_box
                .vertices
                .compute_world_vertices(bone, 0, n, &mut polygon.vertices, 0, 2);

            if update_aabb {
                for xy in polygon.vertices.chunks_exact(2) {
                    self.min_x = self.min_x.min(xy[0]);
                    self.min_y = self.min_y.min(xy[1]);
                    self.max_x = self.max_x.max(xy[0]);
                    self.max_y = self.max_y.max(xy[1]);
                }
            }
            self.bounding_boxes.push(id);
            self.count += 1;
        }
    }

    pub fn aabb_contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn aabb_intersects_segment(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
        let (min_x, min_y, max_x, max_y) = (self.min_x, self.min_y, self.max_x, self.max_y);
        if (x1 <= min_x && x2 <= min_x)
            || (y1 <= min_y && y2 <= min_y)
            || (x1 >= max_x && x2 >= max_x)
            || (y1 >= max_y && y2 >= max_y)
        {
            return false;
        }
        let m = (y2 - y1) / (x2 - x1);
        let y = m * (min_x - x1) + y1;
        if y > min_y && y < max_y {
            return true;
        }
        let y = m * (max_x - x1) + y1;
        if y > min_y && y < max_y {
            return true;
        }
        let x = (min_y - y1) / m + x1;
        if x > min_x && x < max_x {
            return true;
        }
        let x = (max_y - y1) / m + x1;
        x > min_x && x < max_x
    }

    pub fn aabb_intersects_skeleton(&self, other: &SkeletonBounds) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// The first bounding box containing the point.
    pub fn contains_point(&self, x: f32, y: f32) -> Option<AttachmentId> {
        self.entries()
            .find(|(_, polygon)| polygon.contains_point(x, y))
            .map(|(id, _)| id)
    }

    /// The first bounding box crossed by the segment.
    pub fn intersects_segment(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> Option<AttachmentId> {
        self.entries()
            .find(|(_, polygon)| polygon.intersects_segment(x1, y1, x2, y2))
            .map(|(id, _)| id)
    }

    pub fn polygon(&self, bounding_box: AttachmentId) -> Option<&Polygon> {
        self.entries()
            .find(|(id, _)| *id == bounding_box)
            .map(|(_, polygon)| polygon)
    }

    pub fn bounding_boxes(&self) -> &[AttachmentId] {
        &self.bounding_boxes
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons[..self.count]
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    fn entries(&self) -> impl Iterator<Item = (AttachmentId, &Polygon)> + '_ {
        self.bounding_boxes
            .iter()
            .copied()
            .zip(self.polygons[..self.count].iter())
    }
}
