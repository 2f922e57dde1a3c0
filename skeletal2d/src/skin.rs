use crate::{Attachment, AttachmentArena, AttachmentId, Skeleton};
use std::collections::HashMap;

/// One `(slot, name) -> attachment` binding of a skin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SkinEntry<'a> {
    pub slot_index: usize,
    pub name: &'a str,
    pub attachment: AttachmentId,
}

/// A named set of attachments keyed by slot index and attachment name.
///
/// A skin owns one reference to every attachment it holds. Methods that add
/// or drop entries take the [`AttachmentArena`] the handles belong to so that
/// the reference counts stay in step. Cloning a skin copies its handles
/// without retaining them; clone a skin only together with its arena.
#[derive(Clone, Debug, Default)]
pub struct Skin {
    pub name: String,
    attachments: Vec<HashMap<String, AttachmentId>>,
    /// Bones that are only active while this skin is set.
    pub bones: Vec<usize>,
    pub ik_constraints: Vec<usize>,
    pub transform_constraints: Vec<usize>,
}

impl Skin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Binds `attachment` to `(slot_index, name)`. The new attachment is
    /// retained before a replaced one is released, so rebinding the same
    /// handle keeps it alive.
    pub fn set_attachment(
        &mut self,
        arena: &mut AttachmentArena,
        slot_index: usize,
        name: &str,
        attachment: AttachmentId,
    ) {
        if !arena.retain(attachment) {
            log::debug!(
                "skin '{}': ignoring stale attachment handle for '{name}' on slot {slot_index}",
                self.name
            );
            return;
        }
        if self.attachments.len() <= slot_index {
            self.attachments.resize_with(slot_index + 1, HashMap::new);
        }
        if let Some(previous) = self.attachments[slot_index].insert(name.to_string(), attachment) {
            arena.release(previous);
        }
    }

    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<AttachmentId> {
        self.attachments
            .get(slot_index)
            .and_then(|slot| slot.get(name))
            .copied()
    }

    /// Unbinds and releases an attachment. Returns whether it was bound.
    pub fn remove_attachment(
        &mut self,
        arena: &mut AttachmentArena,
        slot_index: usize,
        name: &str,
    ) -> bool {
        let removed = self
            .attachments
            .get_mut(slot_index)
            .and_then(|slot| slot.remove(name));
        match removed {
            Some(id) => {
                arena.release(id);
                true
            }
            None => false,
        }
    }

    /// Names bound for one slot, in no particular order.
    pub fn attachment_names(&self, slot_index: usize) -> impl Iterator<Item = &str> + '_ {
        self.attachments
            .get(slot_index)
            .into_iter()
            .flat_map(|slot| slot.keys().map(String::as_str))
    }

    /// Every binding, grouped by ascending slot index.
    pub fn entries(&self) -> impl Iterator<Item = SkinEntry<'_>> + '_ {
        self.attachments
            .iter()
            .enumerate()
            .flat_map(|(slot_index, slot)| {
                slot.iter().map(move |(name, &attachment)| SkinEntry {
                    slot_index,
                    name: name.as_str(),
                    attachment,
                })
            })
    }

    pub fn len(&self) -> usize {
        self.attachments.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.iter().all(HashMap::is_empty)
    }

    /// For every slot of `skeleton` still showing an attachment of
    /// `old_skin`, shows this skin's attachment of the same name instead.
    /// Slots with no counterpart here keep what they show.
    pub fn attach_all(&self, skeleton: &mut Skeleton, old_skin: &Skin) {
        for entry in old_skin.entries() {
            let Some(slot) = skeleton.slots.get_mut(entry.slot_index) else {
                continue;
            };
            if slot.attachment != Some(entry.attachment) {
                continue;
            }
            match self.attachment(entry.slot_index, entry.name) {
                Some(attachment) => slot.attachment = Some(attachment),
                None => log::trace!(
                    "skin '{}' has no '{}' for slot {}; keeping the current attachment",
                    self.name,
                    entry.name,
                    entry.slot_index
                ),
            }
        }
    }

    /// Adds `other`'s bones, constraints and attachments to this skin.
    /// Attachments are shared, not copied.
    pub fn add_skin(&mut self, arena: &mut AttachmentArena, other: &Skin) {
        self.merge_lists(other);
        for entry in other.entries() {
            self.set_attachment(arena, entry.slot_index, entry.name, entry.attachment);
        }
    }

    /// Adds `other`'s bones and constraints, and copies of its attachments.
    /// Meshes are copied as linked meshes sharing the original geometry.
    pub fn copy_skin(&mut self, arena: &mut AttachmentArena, other: &Skin) {
        self.merge_lists(other);
        for entry in other.entries() {
            let copy = match arena.get(entry.attachment) {
                Some(Attachment::Mesh(_)) => arena.new_linked_mesh(entry.attachment),
                Some(_) => arena.copy(entry.attachment),
                None => None,
            };
            match copy {
                Some(copy) => self.set_attachment(arena, entry.slot_index, entry.name, copy),
                None => log::debug!(
                    "skin '{}': could not copy '{}' for slot {}",
                    other.name,
                    entry.name,
                    entry.slot_index
                ),
            }
        }
    }

    fn merge_lists(&mut self, other: &Skin) {
        fn merge(into: &mut Vec<usize>, from: &[usize]) {
            for &index in from {
                if !into.contains(&index) {
                    into.push(index);
                }
            }
        }
        merge(&mut self.bones, &other.bones);
        merge(&mut self.ik_constraints, &other.ik_constraints);
        merge(&mut self.transform_constraints, &other.transform_constraints);
    }

    /// Releases every attachment and empties the side lists.
    pub fn clear(&mut self, arena: &mut AttachmentArena) {
        for slot in &mut self.attachments {
            for (_, id) in slot.drain() {
                arena.release(id);
            }
        }
        self.attachments.clear();
        self.bones.clear();
        self.ik_constraints.clear();
        self.transform_constraints.clear();
    }

    /// Releases every attachment and drops the skin.
    pub fn dispose(mut self, arena: &mut AttachmentArena) {
        self.clear(arena);
    }
}
