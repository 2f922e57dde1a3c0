use crate::Bone;
use crate::math::{cos_deg, sin_deg};

/// Handle of an attachment stored in an [`AttachmentArena`].
///
/// The generation makes handles of released attachments stale instead of
/// silently aliasing a later insertion into the same index.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct AttachmentId {
    index: u32,
    generation: u32,
}

impl AttachmentId {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Local vertices `[x0, y0, x1, y1, ...]` placed by a single bone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexAttachment {
    pub vertices: Vec<f32>,
}

impl VertexAttachment {
    pub fn new(vertices: Vec<f32>) -> Self {
        Self { vertices }
    }

    /// Number of floats produced by transforming every vertex.
    pub fn world_vertices_length(&self) -> usize {
        self.vertices.len()
    }

    /// Transforms `count` floats of local vertices, beginning at float
    /// `start`, by `bone`'s world transform. Output vertex `n` is written at
    /// `offset + n * stride`. Writing stops early at the end of either buffer.
    pub fn compute_world_vertices(
        &self,
        bone: &Bone,
        start: usize,
        count: usize,
        out: &mut [f32],
        offset: usize,
        stride: usize,
    ) {
        let end = offset + (count / 2) * stride;
        let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
        let (x, y) = (bone.world_x, bone.world_y);
        let mut v = start;
        let mut w = offset;
        while w < end {
            if v + 1 >= self.vertices.len() || w + 1 >= out.len() {
                break;
            }
            let vx = self.vertices[v];
            let vy = self.vertices[v + 1];
            out[w] = vx * a + vy * b + x;
            out[w + 1] = vx * c + vy * d + y;
            v += 2;
            w += stride;
        }
    }
}

/// Where an attachment's image sits on its atlas page.
///
/// `u, v, u2, v2` bound the packed footprint in texture space; `degrees` is
/// the packer's rotation (0, 90, 180 or 270). Sizes and offsets are in atlas
/// pixels, with `original_*` the size before whitespace was stripped.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RegionPlacement {
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
    pub degrees: u16,
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
    pub original_width: f32,
    pub original_height: f32,
}

impl Default for RegionPlacement {
    /// The whole texture, unrotated, with no stripped whitespace.
    fn default() -> Self {
        Self {
            u: 0.0,
            v: 0.0,
            u2: 1.0,
            v2: 1.0,
            degrees: 0,
            offset_x: 0.0,
            offset_y: 0.0,
            width: 1.0,
            height: 1.0,
            original_width: 1.0,
            original_height: 1.0,
        }
    }
}

/// Maps attachment-local UVs onto the atlas page, undoing the packer's
/// rotation and whitespace stripping. `out` is resized to match
/// `region_uvs`.
pub fn remap_region_uvs(placement: &RegionPlacement, region_uvs: &[f32], out: &mut Vec<f32>) {
    out.clear();
    out.resize(region_uvs.len(), 0.0);

    let p = placement;
    let mut u = p.u;
    let mut v = p.v;
    let span_u = p.u2 - p.u;
    let span_v = p.v2 - p.v;
    if span_u == 0.0 || span_v == 0.0 {
        log::debug!("degenerate region placement; mesh UVs collapse to ({u}, {v})");
        for uv in out.chunks_exact_mut(2) {
            uv[0] = u;
            uv[1] = v;
        }
        return;
    }

    match p.degrees {
        90 => {
            let texture_width = p.height / span_u;
            let texture_height = p.width / span_v;
            u -= (p.original_height - p.offset_y - p.height) / texture_width;
            v -= (p.original_width - p.offset_x - p.width) / texture_height;
            let width = p.original_height / texture_width;
            let height = p.original_width / texture_height;
            for (uv, r) in out.chunks_exact_mut(2).zip(region_uvs.chunks_exact(2)) {
                uv[0] = u + r[1] * width;
                uv[1] = v + (1.0 - r[0]) * height;
            }
        }
        180 => {
            let texture_width = p.width / span_u;
            let texture_height = p.height / span_v;
            u -= (p.original_width - p.offset_x - p.width) / texture_width;
            v -= p.offset_y / texture_height;
            let width = p.original_width / texture_width;
            let height = p.original_height / texture_height;
            for (uv, r) in out.chunks_exact_mut(2).zip(region_uvs.chunks_exact(2)) {
                uv[0] = u + (1.0 - r[0]) * width;
                uv[1] = v + (1.0 - r[1]) * height;
            }
        }
        270 => {
            let texture_height = p.height / span_v;
            let texture_width = p.width / span_u;
            u -= p.offset_y / texture_width;
            v -= p.offset_x / texture_height;
            let width = p.original_height / texture_width;
            let height = p.original_width / texture_height;
            for (uv, r) in out.chunks_exact_mut(2).zip(region_uvs.chunks_exact(2)) {
                uv[0] = u + (1.0 - r[1]) * width;
                uv[1] = v + r[0] * height;
            }
        }
        other => {
            if other != 0 {
                log::warn!("unsupported region rotation {other}; treating as unrotated");
            }
            let texture_width = p.width / span_u;
            let texture_height = p.height / span_v;
            u -= p.offset_x / texture_width;
            v -= (p.original_height - p.offset_y - p.height) / texture_height;
            let width = p.original_width / texture_width;
            let height = p.original_height / texture_height;
            for (uv, r) in out.chunks_exact_mut(2).zip(region_uvs.chunks_exact(2)) {
                uv[0] = u + r[0] * width;
                uv[1] = v + r[1] * height;
            }
        }
    }
}

/// A textured quad. Corners are stored and emitted in the order
/// bottom-right, bottom-left, upper-left, upper-right.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionAttachment {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
    pub placement: RegionPlacement,
    offset: [f32; 8],
    uvs: [f32; 8],
}

impl RegionAttachment {
    pub const TRIANGLES: [u16; 6] = [0, 1, 2, 2, 3, 0];

    pub fn new(name: impl Into<String>, width: f32, height: f32) -> Self {
        let name = name.into();
        let mut region = Self {
            path: name.clone(),
            name,
            color: [1.0, 1.0, 1.0, 1.0],
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width,
            height,
            placement: RegionPlacement::default(),
            offset: [0.0; 8],
            uvs: [0.0; 8],
        };
        region.update_region();
        region
    }

    /// Recomputes UVs and corner offsets after the placement or the local
    /// transform changed.
    pub fn update_region(&mut self) {
        let p = self.placement;
        self.set_uvs(p.u, p.v, p.u2, p.v2, p.degrees == 90);
        self.update_offset();
    }

    pub fn set_uvs(&mut self, u: f32, v: f32, u2: f32, v2: f32, rotate: bool) {
        self.uvs = if rotate {
            [u2, v, u2, v2, u, v2, u, v]
        } else {
            [u2, v2, u, v2, u, v, u2, v]
        };
    }

    /// Computes the four local corners, trimmed by the region's stripped
    /// whitespace and then rotated and translated by the local transform.
    pub fn update_offset(&mut self) {
        let p = &self.placement;
        let region_scale_x = if p.original_width != 0.0 {
            self.width / p.original_width * self.scale_x
        } else {
            0.0
        };
        let region_scale_y = if p.original_height != 0.0 {
            self.height / p.original_height * self.scale_y
        } else {
            0.0
        };
        let local_x = -self.width / 2.0 * self.scale_x + p.offset_x * region_scale_x;
        let local_y = -self.height / 2.0 * self.scale_y + p.offset_y * region_scale_y;
        let local_x2 = local_x + p.width * region_scale_x;
        let local_y2 = local_y + p.height * region_scale_y;

        let cos = cos_deg(self.rotation);
        let sin = sin_deg(self.rotation);
        let local_x_cos = local_x * cos + self.x;
        let local_x_sin = local_x * sin;
        let local_y_cos = local_y * cos + self.y;
        let local_y_sin = local_y * sin;
        let local_x2_cos = local_x2 * cos + self.x;
        let local_x2_sin = local_x2 * sin;
        let local_y2_cos = local_y2 * cos + self.y;
        let local_y2_sin = local_y2 * sin;

        self.offset = [
            local_x2_cos - local_y_sin,
            local_y_cos + local_x2_sin,
            local_x_cos - local_y_sin,
            local_y_cos + local_x_sin,
            local_x_cos - local_y2_sin,
            local_y2_cos + local_x_sin,
            local_x2_cos - local_y2_sin,
            local_y2_cos + local_x2_sin,
        ];
    }

    /// Local corner positions, BR, BL, UL, UR.
    pub fn offset(&self) -> &[f32; 8] {
        &self.offset
    }

    /// Texture coordinates matching [`RegionAttachment::offset`].
    pub fn uvs(&self) -> &[f32; 8] {
        &self.uvs
    }

    pub fn compute_world_vertices(&self, bone: &Bone, out: &mut [f32], offset: usize, stride: usize) {
        let mut w = offset;
        for corner in self.offset.chunks_exact(2) {
            if w + 1 >= out.len() {
                break;
            }
            let [x, y] = bone.local_to_world(corner[0], corner[1]);
            out[w] = x;
            out[w + 1] = y;
            w += stride;
        }
    }
}

/// Geometry owned by a mesh and shared with the meshes linked to it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGeometry {
    pub vertices: VertexAttachment,
    pub region_uvs: Vec<f32>,
    pub triangles: Vec<u16>,
    pub hull_length: usize,
    pub width: f32,
    pub height: f32,
}

impl MeshGeometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.vertices.len() / 2
    }
}

#[derive(Clone, Debug, PartialEq)]
enum MeshSource {
    Owned(MeshGeometry),
    Linked(AttachmentId),
}

/// A textured triangle mesh. A linked mesh borrows the geometry of its
/// parent through the arena and only overrides the texture placement.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshAttachment {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub placement: RegionPlacement,
    source: MeshSource,
    uvs: Vec<f32>,
}

impl MeshAttachment {
    pub fn new(name: impl Into<String>, geometry: MeshGeometry) -> Self {
        let name = name.into();
        let mut mesh = Self {
            path: name.clone(),
            name,
            color: [1.0, 1.0, 1.0, 1.0],
            placement: RegionPlacement::default(),
            source: MeshSource::Owned(geometry),
            uvs: Vec::new(),
        };
        mesh.update_own_uvs();
        mesh
    }

    /// The mesh's own geometry; `None` for a linked mesh.
    pub fn geometry(&self) -> Option<&MeshGeometry> {
        match &self.source {
            MeshSource::Owned(geometry) => Some(geometry),
            MeshSource::Linked(_) => None,
        }
    }

    pub fn geometry_mut(&mut self) -> Option<&mut MeshGeometry> {
        match &mut self.source {
            MeshSource::Owned(geometry) => Some(geometry),
            MeshSource::Linked(_) => None,
        }
    }

    pub fn parent_mesh(&self) -> Option<AttachmentId> {
        match self.source {
            MeshSource::Owned(_) => None,
            MeshSource::Linked(parent) => Some(parent),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.parent_mesh().is_some()
    }

    /// Atlas texture coordinates, one pair per vertex.
    pub fn uvs(&self) -> &[f32] {
        &self.uvs
    }

    /// Recomputes UVs from the mesh's own geometry. Linked meshes need
    /// [`AttachmentArena::update_uvs`] instead and are left unchanged here.
    pub fn update_own_uvs(&mut self) -> bool {
        match &self.source {
            MeshSource::Owned(geometry) => {
                remap_region_uvs(&self.placement, &geometry.region_uvs, &mut self.uvs);
                true
            }
            MeshSource::Linked(_) => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBoxAttachment {
    pub name: String,
    pub vertices: VertexAttachment,
    pub color: [f32; 4],
}

impl BoundingBoxAttachment {
    pub fn new(name: impl Into<String>, vertices: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            vertices: VertexAttachment::new(vertices),
            color: [0.0, 1.0, 0.0, 1.0],
        }
    }
}

/// A polygon masking the slots drawn after it, up to and including
/// `end_slot` (or to the end of the draw order).
#[derive(Clone, Debug, PartialEq)]
pub struct ClippingAttachment {
    pub name: String,
    pub vertices: VertexAttachment,
    pub end_slot: Option<usize>,
    pub color: [f32; 4],
}

impl ClippingAttachment {
    pub fn new(name: impl Into<String>, vertices: Vec<f32>, end_slot: Option<usize>) -> Self {
        Self {
            name: name.into(),
            vertices: VertexAttachment::new(vertices),
            end_slot,
            color: [0.8, 0.8, 0.8, 1.0],
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AttachmentKind {
    Region,
    Mesh,
    BoundingBox,
    Clipping,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    BoundingBox(BoundingBoxAttachment),
    Clipping(ClippingAttachment),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Attachment::Region(a) => a.name.as_str(),
            Attachment::Mesh(a) => a.name.as_str(),
            Attachment::BoundingBox(a) => a.name.as_str(),
            Attachment::Clipping(a) => a.name.as_str(),
        }
    }

    pub fn kind(&self) -> AttachmentKind {
        match self {
            Attachment::Region(_) => AttachmentKind::Region,
            Attachment::Mesh(_) => AttachmentKind::Mesh,
            Attachment::BoundingBox(_) => AttachmentKind::BoundingBox,
            Attachment::Clipping(_) => AttachmentKind::Clipping,
        }
    }
}

impl From<RegionAttachment> for Attachment {
    fn from(a: RegionAttachment) -> Self {
        Attachment::Region(a)
    }
}

impl From<MeshAttachment> for Attachment {
    fn from(a: MeshAttachment) -> Self {
        Attachment::Mesh(a)
    }
}

impl From<BoundingBoxAttachment> for Attachment {
    fn from(a: BoundingBoxAttachment) -> Self {
        Attachment::BoundingBox(a)
    }
}

impl From<ClippingAttachment> for Attachment {
    fn from(a: ClippingAttachment) -> Self {
        Attachment::Clipping(a)
    }
}

#[derive(Clone, Debug)]
struct Entry {
    generation: u32,
    slot: Option<Stored>,
}

#[derive(Clone, Debug)]
struct Stored {
    attachment: Attachment,
    ref_count: u32,
}

/// Reference-counted attachment storage addressed by [`AttachmentId`].
///
/// Newly inserted attachments have no owners. Skins [`retain`] what they
/// hold and [`release`] what they drop; an attachment is freed when its count
/// falls to zero. A linked mesh holds a reference on its parent mesh, so the
/// parent's geometry outlives every mesh linked to it.
///
/// [`retain`]: AttachmentArena::retain
/// [`release`]: AttachmentArena::release
#[derive(Clone, Debug, Default)]
pub struct AttachmentArena {
    entries: Vec<Entry>,
    free: Vec<u32>,
    live: usize,
}

impl AttachmentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attachment: impl Into<Attachment>) -> AttachmentId {
        let stored = Stored {
            attachment: attachment.into(),
            ref_count: 0,
        };
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.slot = Some(stored);
            return AttachmentId {
                index,
                generation: entry.generation,
            };
        }
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: 0,
            slot: Some(stored),
        });
        AttachmentId {
            index,
            generation: 0,
        }
    }

    fn stored(&self, id: AttachmentId) -> Option<&Stored> {
        self.entries
            .get(id.index())
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.slot.as_ref())
    }

    fn stored_mut(&mut self, id: AttachmentId) -> Option<&mut Stored> {
        self.entries
            .get_mut(id.index())
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.slot.as_mut())
    }

    pub fn get(&self, id: AttachmentId) -> Option<&Attachment> {
        self.stored(id).map(|s| &s.attachment)
    }

    pub fn get_mut(&mut self, id: AttachmentId) -> Option<&mut Attachment> {
        self.stored_mut(id).map(|s| &mut s.attachment)
    }

    pub fn contains(&self, id: AttachmentId) -> bool {
        self.stored(id).is_some()
    }

    pub fn ref_count(&self, id: AttachmentId) -> Option<u32> {
        self.stored(id).map(|s| s.ref_count)
    }

    /// Number of live attachments.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttachmentId, &Attachment)> + '_ {
        self.entries.iter().enumerate().filter_map(|(index, entry)| {
            entry.slot.as_ref().map(|s| {
                (
                    AttachmentId {
                        index: index as u32,
                        generation: entry.generation,
                    },
                    &s.attachment,
                )
            })
        })
    }

    pub fn ids(&self) -> Vec<AttachmentId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Adds an owner. Returns `false` for a stale handle.
    pub fn retain(&mut self, id: AttachmentId) -> bool {
        match self.stored_mut(id) {
            Some(stored) => {
                stored.ref_count += 1;
                true
            }
            None => false,
        }
    }

    /// Drops an owner and frees the attachment when none remain. Freeing a
    /// linked mesh releases its parent in turn. Returns whether `id` itself
    /// was freed.
    pub fn release(&mut self, id: AttachmentId) -> bool {
        let mut next = Some(id);
        let mut freed = false;
        while let Some(current) = next.take() {
            let Some(stored) = self.stored_mut(current) else {
                if current == id {
                    log::debug!("release of stale attachment handle {id:?}");
                } else {
                    log::debug!("linked mesh parent {current:?} was already released");
                }
                break;
            };
            stored.ref_count = stored.ref_count.saturating_sub(1);
            if stored.ref_count > 0 {
                break;
            }
            let attachment = self.remove(current);
            if current == id {
                freed = true;
            }
            next = match attachment {
                Some(Attachment::Mesh(mesh)) => mesh.parent_mesh(),
                _ => None,
            };
        }
        freed
    }

    fn remove(&mut self, id: AttachmentId) -> Option<Attachment> {
        let entry = self.entries.get_mut(id.index())?;
        let stored = entry.slot.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(stored.attachment)
    }

    /// Geometry of a mesh, following a linked mesh to its parent.
    pub fn mesh_geometry(&self, id: AttachmentId) -> Option<&MeshGeometry> {
        let Some(Attachment::Mesh(mesh)) = self.get(id) else {
            return None;
        };
        match &mesh.source {
            MeshSource::Owned(geometry) => Some(geometry),
            MeshSource::Linked(parent) => match self.get(*parent) {
                Some(Attachment::Mesh(parent)) => parent.geometry(),
                _ => None,
            },
        }
    }

    /// Creates a mesh sharing the geometry of `mesh` (or of the mesh it is
    /// itself linked to) with a copy of its name, path, color and placement.
    pub fn new_linked_mesh(&mut self, mesh: AttachmentId) -> Option<AttachmentId> {
        let Some(Attachment::Mesh(source)) = self.get(mesh) else {
            return None;
        };
        let parent = source.parent_mesh().unwrap_or(mesh);
        if !self.contains(parent) {
            log::debug!("cannot link to released mesh {parent:?}");
            return None;
        }
        let linked = MeshAttachment {
            name: source.name.clone(),
            path: source.path.clone(),
            color: source.color,
            placement: source.placement,
            source: MeshSource::Linked(parent),
            uvs: Vec::new(),
        };
        self.retain(parent);
        let id = self.insert(linked);
        self.update_uvs(id);
        Some(id)
    }

    /// Copies an attachment into a new, unowned entry. Copying a linked mesh
    /// yields another mesh linked to the same parent.
    pub fn copy(&mut self, id: AttachmentId) -> Option<AttachmentId> {
        let attachment = self.get(id)?;
        if let Attachment::Mesh(mesh) = attachment {
            if mesh.is_linked() {
                return self.new_linked_mesh(id);
            }
        }
        let copy = attachment.clone();
        Some(self.insert(copy))
    }

    /// Recomputes a mesh's UVs from its placement and the region UVs of its
    /// geometry. Returns `false` if `id` is not a mesh with reachable
    /// geometry.
    pub fn update_uvs(&mut self, id: AttachmentId) -> bool {
        let (placement, mut uvs) = match self.get_mut(id) {
            Some(Attachment::Mesh(mesh)) => (mesh.placement, std::mem::take(&mut mesh.uvs)),
            _ => return false,
        };
        let updated = match self.mesh_geometry(id) {
            Some(geometry) => {
                remap_region_uvs(&placement, &geometry.region_uvs, &mut uvs);
                true
            }
            None => {
                log::debug!("mesh {id:?} has no reachable geometry; UVs left unchanged");
                false
            }
        };
        if let Some(Attachment::Mesh(mesh)) = self.get_mut(id) {
            mesh.uvs = uvs;
        }
        updated
    }
}
