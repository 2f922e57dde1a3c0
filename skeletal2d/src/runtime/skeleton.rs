use super::bone::{Bone, RootFrame};
use super::ik::IkConstraint;
use super::transform::TransformConstraint;
use crate::{AttachmentId, Error, SkeletonData, Skin, SlotData};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    pub bone: usize,
    pub attachment: Option<AttachmentId>,
    pub color: [f32; 4],
}

impl Slot {
    pub fn new(data_index: usize, data: &SlotData) -> Self {
        Self {
            data_index,
            bone: data.bone,
            attachment: None,
            color: data.color,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }
}

/// A posable instance of a [`SkeletonData`].
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    bone_children: Vec<Vec<usize>>,
    pub slots: Vec<Slot>,
    /// Slot indices in the order they are drawn.
    pub draw_order: Vec<usize>,
    pub ik_constraints: Vec<IkConstraint>,
    pub transform_constraints: Vec<TransformConstraint>,
    skin: Option<usize>,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Flips the Y axis of the root frame for hosts whose Y axis points
    /// down.
    pub y_down: bool,
    update_cache: Vec<UpdateCacheItem>,
    update_cache_reset: Vec<usize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum UpdateCacheItem {
    Bone(usize),
    Ik(usize),
    Transform(usize),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
enum ConstraintKind {
    Ik,
    Transform,
}

impl Skeleton {
    /// Builds bones, slots and constraints in their setup pose, shows the
    /// default skin's setup attachments and computes the update order.
    /// World transforms are not computed until
    /// [`Skeleton::update_world_transform`].
    pub fn new(data: Arc<SkeletonData>) -> Result<Self, Error> {
        data.validate()?;

        let bones: Vec<Bone> = data
            .bones
            .iter()
            .enumerate()
            .map(|(i, bone)| Bone::new(i, bone))
            .collect();
        let mut bone_children = vec![Vec::new(); bones.len()];
        for (i, bone) in data.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                bone_children[parent].push(i);
            }
        }
        let slots = data
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| Slot::new(i, slot))
            .collect();
        let ik_constraints = data
            .ik_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| IkConstraint::new(i, c))
            .collect();
        let transform_constraints = data
            .transform_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| TransformConstraint::new(i, c))
            .collect();

        let mut skeleton = Self {
            draw_order: (0..data.slots.len()).collect(),
            data,
            bones,
            bone_children,
            slots,
            ik_constraints,
            transform_constraints,
            skin: None,
            color: [1.0, 1.0, 1.0, 1.0],
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            y_down: false,
            update_cache: Vec::new(),
            update_cache_reset: Vec::new(),
        };
        skeleton.set_slots_to_setup_pose();
        skeleton.update_cache();
        Ok(skeleton)
    }

    pub fn root_frame(&self) -> RootFrame {
        RootFrame::new(self.x, self.y, self.scale_x, self.scale_y, self.y_down)
    }

    pub fn skin(&self) -> Option<&Skin> {
        self.skin.and_then(|i| self.data.skins.get(i))
    }

    pub fn skin_index(&self) -> Option<usize> {
        self.skin
    }

    /// Recomputes bone/constraint activity for the current skin and the
    /// order in which bones and constraints are updated. Call after changing
    /// the skin or constraint order.
    pub fn update_cache(&mut self) {
        let data = Arc::clone(&self.data);
        let skin = self.skin.and_then(|i| data.skins.get(i));

        for (bone, bone_data) in self.bones.iter_mut().zip(&data.bones) {
            bone.active = !bone_data.skin_required;
        }
        if let Some(skin) = skin {
            for &bone_index in &skin.bones {
                let mut current = Some(bone_index);
                while let Some(i) = current {
                    let Some(bone) = self.bones.get_mut(i) else {
                        break;
                    };
                    bone.active = true;
                    current = bone.parent_index();
                }
            }
        }

        for c in &mut self.ik_constraints {
            let skin_required = data
                .ik_constraints
                .get(c.data_index())
                .is_some_and(|d| d.skin_required);
            let in_skin = skin.is_some_and(|s| s.ik_constraints.contains(&c.data_index()));
            let target_active = self.bones.get(c.target).is_some_and(|b| b.active);
            c.active = target_active && (!skin_required || in_skin);
        }
        for c in &mut self.transform_constraints {
            let skin_required = data
                .transform_constraints
                .get(c.data_index())
                .is_some_and(|d| d.skin_required);
            let in_skin =
                skin.is_some_and(|s| s.transform_constraints.contains(&c.data_index()));
            let target_active = self.bones.get(c.target).is_some_and(|b| b.active);
            c.active = target_active && (!skin_required || in_skin);
        }

        self.rebuild_update_cache();
    }

    fn rebuild_update_cache(&mut self) {
        fn sort_bone(
            skeleton: &Skeleton,
            bone_index: usize,
            sorted: &mut [bool],
            out: &mut Vec<UpdateCacheItem>,
        ) {
            if bone_index >= sorted.len() || sorted[bone_index] {
                return;
            }
            if let Some(parent) = skeleton.bones[bone_index].parent_index() {
                sort_bone(skeleton, parent, sorted, out);
            }
            sorted[bone_index] = true;
            out.push(UpdateCacheItem::Bone(bone_index));
        }

        fn sort_reset(skeleton: &Skeleton, bone_index: usize, sorted: &mut [bool]) {
            let Some(children) = skeleton.bone_children.get(bone_index) else {
                return;
            };
            for &child in children {
                if !skeleton.bones[child].active {
                    continue;
                }
                if sorted[child] {
                    sort_reset(skeleton, child, sorted);
                }
                sorted[child] = false;
            }
        }

        let mut sorted: Vec<bool> = self.bones.iter().map(|b| !b.active).collect();
        let mut out = Vec::with_capacity(self.bones.len());
        let mut reset = Vec::new();

        let mut constraints: Vec<(i32, ConstraintKind, usize)> = Vec::new();
        for (i, c) in self.ik_constraints.iter().enumerate() {
            let order = self.data.ik_constraints[c.data_index()].order;
            constraints.push((order, ConstraintKind::Ik, i));
        }
        for (i, c) in self.transform_constraints.iter().enumerate() {
            let order = self.data.transform_constraints[c.data_index()].order;
            constraints.push((order, ConstraintKind::Transform, i));
        }
        constraints.sort();

        for (_, kind, index) in constraints {
            match kind {
                ConstraintKind::Ik => {
                    let c = &self.ik_constraints[index];
                    if !c.active {
                        continue;
                    }
                    let Some(&parent) = c.bones.first() else {
                        continue;
                    };
                    sort_bone(self, c.target, &mut sorted, &mut out);
                    sort_bone(self, parent, &mut sorted, &mut out);
                    let last = c.bones[c.bones.len() - 1];
                    if c.bones.len() > 1 && !out.contains(&UpdateCacheItem::Bone(last)) {
                        reset.push(last);
                    }
                    out.push(UpdateCacheItem::Ik(index));
                    sort_reset(self, parent, &mut sorted);
                    sorted[last] = true;
                }
                ConstraintKind::Transform => {
                    let c = &self.transform_constraints[index];
                    if !c.active {
                        continue;
                    }
                    sort_bone(self, c.target, &mut sorted, &mut out);
                    if self.data.transform_constraints[c.data_index()].local {
                        for &bone_index in &c.bones {
                            if let Some(parent) = self.bones[bone_index].parent_index() {
                                sort_bone(self, parent, &mut sorted, &mut out);
                            }
                            if !out.contains(&UpdateCacheItem::Bone(bone_index)) {
                                reset.push(bone_index);
                            }
                        }
                    } else {
                        for &bone_index in &c.bones {
                            sort_bone(self, bone_index, &mut sorted, &mut out);
                        }
                    }
                    out.push(UpdateCacheItem::Transform(index));
                    for &bone_index in &c.bones {
                        sort_reset(self, bone_index, &mut sorted);
                    }
                    for &bone_index in &c.bones {
                        sorted[bone_index] = true;
                    }
                }
            }
        }

        for bone_index in 0..self.bones.len() {
            sort_bone(self, bone_index, &mut sorted, &mut out);
        }

        self.update_cache = out;
        self.update_cache_reset = reset;
    }

    #[doc(hidden)]
    pub fn debug_update_cache(&self) -> Vec<String> {
        self.update_cache
            .iter()
            .map(|item| match *item {
                UpdateCacheItem::Bone(i) => format!("bone:{}", self.data.bones[i].name),
                UpdateCacheItem::Ik(i) => format!(
                    "ik:{}",
                    self.data.ik_constraints[self.ik_constraints[i].data_index()].name
                ),
                UpdateCacheItem::Transform(i) => format!(
                    "transform:{}",
                    self.data.transform_constraints[self.transform_constraints[i].data_index()]
                        .name
                ),
            })
            .collect()
    }

    /// Computes every active bone's world transform, then applies the
    /// constraints in their update order.
    pub fn update_world_transform(&mut self) {
        let root = self.root_frame();
        for &bone_index in &self.update_cache_reset {
            self.bones[bone_index].reset_applied();
        }

        for item in &self.update_cache {
            match *item {
                UpdateCacheItem::Bone(i) => {
                    let parent = self.bones[i].parent_index().map(|p| self.bones[p].world());
                    self.bones[i].update_world_transform(parent.as_ref(), &root);
                }
                UpdateCacheItem::Ik(i) => {
                    self.ik_constraints[i].apply(&mut self.bones, &root);
                }
                UpdateCacheItem::Transform(i) => {
                    let c = &self.transform_constraints[i];
                    let data = &self.data.transform_constraints[c.data_index()];
                    c.apply(data, &mut self.bones, &root);
                }
            }
        }
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    /// Restores every bone's local pose and every constraint's mixes.
    pub fn set_bones_to_setup_pose(&mut self) {
        for bone in &mut self.bones {
            bone.set_to_setup_pose(&self.data.bones[bone.data_index()]);
        }
        for c in &mut self.ik_constraints {
            c.set_to_setup_pose(&self.data.ik_constraints[c.data_index()]);
        }
        for c in &mut self.transform_constraints {
            c.set_to_setup_pose(&self.data.transform_constraints[c.data_index()]);
        }
    }

    /// Restores the draw order, slot colors and setup attachments.
    pub fn set_slots_to_setup_pose(&mut self) {
        self.draw_order.clear();
        self.draw_order.extend(0..self.slots.len());
        for i in 0..self.slots.len() {
            let data = &self.data.slots[self.slots[i].data_index()];
            let attachment = data
                .attachment
                .as_deref()
                .and_then(|name| self.attachment(i, name));
            let slot = &mut self.slots[i];
            slot.bone = data.bone;
            slot.color = data.color;
            slot.attachment = attachment;
        }
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.data.find_bone(name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.data.find_slot(name)
    }

    pub fn find_ik_constraint(&self, name: &str) -> Option<usize> {
        self.data.find_ik_constraint(name)
    }

    pub fn find_transform_constraint(&self, name: &str) -> Option<usize> {
        self.data.find_transform_constraint(name)
    }

    /// Switches skins. Slots showing an attachment of the old skin switch to
    /// the new skin's attachment of the same name; when no skin was set, the
    /// slots' setup attachments are taken from the new skin where it has
    /// them. `None` removes the skin without touching the slots.
    pub fn set_skin(&mut self, skin_name: Option<&str>) -> Result<(), Error> {
        let new_skin = match skin_name {
            None => None,
            Some(name) => Some(self.data.find_skin(name).ok_or_else(|| Error::UnknownSkin {
                name: name.to_string(),
            })?),
        };
        if new_skin == self.skin {
            return Ok(());
        }

        if let Some(new_index) = new_skin {
            let data = Arc::clone(&self.data);
            let skin = &data.skins[new_index];
            match self.skin.and_then(|i| data.skins.get(i)) {
                Some(old_skin) => skin.attach_all(self, old_skin),
                None => {
                    for (i, slot) in self.slots.iter_mut().enumerate() {
                        let setup_name = data.slots[slot.data_index()].attachment.as_deref();
                        if let Some(attachment) = setup_name.and_then(|name| skin.attachment(i, name)) {
                            slot.attachment = Some(attachment);
                        }
                    }
                }
            }
        }

        self.skin = new_skin;
        self.update_cache();
        Ok(())
    }

    /// Looks `name` up in the current skin, then in the default skin.
    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<AttachmentId> {
        if let Some(attachment) = self.skin().and_then(|s| s.attachment(slot_index, name)) {
            return Some(attachment);
        }
        self.data
            .default_skin()
            .and_then(|s| s.attachment(slot_index, name))
    }

    /// Shows the named attachment on the named slot, or clears the slot for
    /// `None`.
    pub fn set_attachment(&mut self, slot_name: &str, attachment_name: Option<&str>) -> Result<(), Error> {
        let slot_index = self.find_slot(slot_name).ok_or_else(|| Error::UnknownSlot {
            name: slot_name.to_string(),
        })?;
        let attachment = match attachment_name {
            None => None,
            Some(name) => Some(self.attachment(slot_index, name).ok_or_else(|| {
                Error::UnknownAttachment {
                    slot: slot_name.to_string(),
                    attachment: name.to_string(),
                }
            })?),
        };
        self.slots[slot_index].attachment = attachment;
        Ok(())
    }

    /// The attachment shown by a slot, resolved in the data's arena.
    pub fn slot_attachment(&self, slot_index: usize) -> Option<&crate::Attachment> {
        let id = self.slots.get(slot_index)?.attachment?;
        self.data.attachments.get(id)
    }
}
