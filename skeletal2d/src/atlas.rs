use crate::{Attachment, AttachmentArena, RegionPlacement};
use std::collections::HashMap;

/// Atlas metadata as produced by an external atlas loader. Only the
/// placement data needed for texture coordinates is kept.
#[derive(Clone, Debug, Default)]
pub struct Atlas {
    pub pages: Vec<AtlasPage>,
    pub regions: HashMap<String, AtlasRegion>,
}

impl Atlas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&mut self, page: AtlasPage) -> usize {
        self.pages.push(page);
        self.pages.len() - 1
    }

    pub fn add_region(&mut self, region: AtlasRegion) {
        self.regions.insert(region.name.clone(), region);
    }

    pub fn region(&self, name: &str) -> Option<&AtlasRegion> {
        self.regions.get(name)
    }

    pub fn page(&self, index: usize) -> Option<&AtlasPage> {
        self.pages.get(index)
    }

    /// Texture placement of the named region, if both it and its page exist.
    pub fn placement(&self, name: &str) -> Option<RegionPlacement> {
        let region = self.region(name)?;
        let page = self.page(region.page)?;
        Some(region.placement(page))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AtlasPage {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl AtlasPage {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }
}

/// A packed image. `width`/`height` are the unrotated size of the packed
/// pixels; a region rotated by 90 degrees occupies `height x width` on the
/// page.
#[derive(Clone, Debug, PartialEq)]
pub struct AtlasRegion {
    pub name: String,
    pub page: usize,
    pub degrees: u16,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub original_width: u32,
    pub original_height: u32,
}

impl AtlasRegion {
    pub fn new(name: impl Into<String>, page: usize, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            page,
            degrees: 0,
            x,
            y,
            width,
            height,
            offset_x: 0,
            offset_y: 0,
            original_width: width,
            original_height: height,
        }
    }

    pub fn placement(&self, page: &AtlasPage) -> RegionPlacement {
        let page_width = page.width.max(1) as f32;
        let page_height = page.height.max(1) as f32;
        let (footprint_w, footprint_h) = if self.degrees == 90 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        };
        RegionPlacement {
            u: self.x as f32 / page_width,
            v: self.y as f32 / page_height,
            u2: (self.x + footprint_w) as f32 / page_width,
            v2: (self.y + footprint_h) as f32 / page_height,
            degrees: self.degrees,
            offset_x: self.offset_x as f32,
            offset_y: self.offset_y as f32,
            width: self.width as f32,
            height: self.height as f32,
            original_width: self.original_width as f32,
            original_height: self.original_height as f32,
        }
    }
}

impl AttachmentArena {
    /// Places every region and mesh attachment whose path names an atlas
    /// region, then recomputes their texture coordinates. Returns the number
    /// of attachments placed; the rest keep their placement.
    pub fn apply_atlas(&mut self, atlas: &Atlas) -> usize {
        let mut placed = 0;
        let mut meshes = Vec::new();
        for id in self.ids() {
            let Some(attachment) = self.get_mut(id) else {
                continue;
            };
            match attachment {
                Attachment::Region(region) => {
                    let Some(placement) = atlas.placement(&region.path) else {
                        log::debug!("no atlas region '{}' for region attachment", region.path);
                        continue;
                    };
                    region.placement = placement;
                    region.update_region();
                    placed += 1;
                }
                Attachment::Mesh(mesh) => {
                    match atlas.placement(&mesh.path) {
                        Some(placement) => {
                            mesh.placement = placement;
                            placed += 1;
                        }
                        None => log::debug!("no atlas region '{}' for mesh attachment", mesh.path),
                    }
                    meshes.push(id);
                }
                Attachment::BoundingBox(_) | Attachment::Clipping(_) => {}
            }
        }
        for id in meshes {
            self.update_uvs(id);
        }
        placed
    }
}
