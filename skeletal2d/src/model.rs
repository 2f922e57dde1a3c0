use crate::{AttachmentArena, Error, Skin};

/// Setup pose and hierarchy of one bone. `parent` must index a bone that
/// precedes this one in [`SkeletonData::bones`].
#[derive(Clone, Debug)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
    pub inherit: Inherit,
    pub skin_required: bool,
}

impl BoneData {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            inherit: Inherit::Normal,
            skin_required: false,
        }
    }
}

/// How a bone combines its parent's world transform with its own local pose.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Inherit {
    #[default]
    Normal,
    OnlyTranslation,
    NoRotationOrReflection,
    NoScale,
    NoScaleOrReflection,
}

#[derive(Clone, Debug)]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    /// Setup attachment name, resolved through the active skin.
    pub attachment: Option<String>,
    pub color: [f32; 4],
}

impl SlotData {
    pub fn new(name: impl Into<String>, bone: usize) -> Self {
        Self {
            name: name.into(),
            bone,
            attachment: None,
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

#[derive(Clone, Debug)]
pub struct IkConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    /// One or two bones; for two, the second must be a child of the first.
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
    pub bend_direction: i32,
}

impl IkConstraintData {
    pub fn new(name: impl Into<String>, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones,
            target,
            mix: 1.0,
            softness: 0.0,
            compress: false,
            stretch: false,
            uniform: false,
            bend_direction: 1,
        }
    }
}

/// Blends the target bone's transform into `bones`. `local` and `relative`
/// select one of the four solving variants.
#[derive(Clone, Debug)]
pub struct TransformConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix_rotate: f32,
    pub mix_translate: f32,
    pub mix_scale: f32,
    pub mix_shear: f32,
    pub offset_rotation: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_scale_x: f32,
    pub offset_scale_y: f32,
    pub offset_shear_y: f32,
    pub local: bool,
    pub relative: bool,
}

impl TransformConstraintData {
    pub fn new(name: impl Into<String>, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones,
            target,
            mix_rotate: 1.0,
            mix_translate: 1.0,
            mix_scale: 1.0,
            mix_shear: 1.0,
            offset_rotation: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            offset_scale_x: 0.0,
            offset_scale_y: 0.0,
            offset_shear_y: 0.0,
            local: false,
            relative: false,
        }
    }
}

/// Immutable template shared by every [`crate::Skeleton`] instance built from it.
///
/// Skins store attachment handles; the attachments themselves live in
/// `attachments` so that skins can share (and reference count) them.
#[derive(Clone, Debug, Default)]
pub struct SkeletonData {
    pub name: Option<String>,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub ik_constraints: Vec<IkConstraintData>,
    pub transform_constraints: Vec<TransformConstraintData>,
    pub skins: Vec<Skin>,
    pub default_skin: Option<usize>,
    pub attachments: AttachmentArena,
}

impl SkeletonData {
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    pub fn find_skin(&self, name: &str) -> Option<usize> {
        self.skins.iter().position(|s| s.name == name)
    }

    pub fn skin(&self, name: &str) -> Option<&Skin> {
        self.skins.iter().find(|s| s.name == name)
    }

    pub fn default_skin(&self) -> Option<&Skin> {
        self.default_skin.and_then(|i| self.skins.get(i))
    }

    pub fn find_ik_constraint(&self, name: &str) -> Option<usize> {
        self.ik_constraints.iter().position(|c| c.name == name)
    }

    pub fn find_transform_constraint(&self, name: &str) -> Option<usize> {
        self.transform_constraints
            .iter()
            .position(|c| c.name == name)
    }

    /// Checks the index invariants the runtime relies on: parents precede
    /// children, every referenced bone/slot exists and IK constraints hold
    /// one or two bones.
    pub fn validate(&self) -> Result<(), Error> {
        let bone_count = self.bones.len();
        for (i, bone) in self.bones.iter().enumerate() {
            if bone.parent.is_some_and(|parent| parent >= i) {
                return Err(Error::InvalidValue {
                    message: format!(
                        "bone '{}' has a parent index that does not precede it",
                        bone.name
                    ),
                });
            }
        }
        for slot in &self.slots {
            if slot.bone >= bone_count {
                return Err(Error::InvalidValue {
                    message: format!("slot '{}' references missing bone {}", slot.name, slot.bone),
                });
            }
        }
        for ik in &self.ik_constraints {
            if !(1..=2).contains(&ik.bones.len()) {
                return Err(Error::InvalidValue {
                    message: format!(
                        "IK constraint '{}' must have 1 or 2 bones, has {}",
                        ik.name,
                        ik.bones.len()
                    ),
                });
            }
            if ik.target >= bone_count || ik.bones.iter().any(|&b| b >= bone_count) {
                return Err(Error::InvalidValue {
                    message: format!("IK constraint '{}' references a missing bone", ik.name),
                });
            }
            if let [parent, child] = ik.bones[..] {
                if self.bones[child].parent != Some(parent) {
                    return Err(Error::InvalidValue {
                        message: format!(
                            "IK constraint '{}': second bone must be a child of the first",
                            ik.name
                        ),
                    });
                }
            }
        }
        for tc in &self.transform_constraints {
            if tc.target >= bone_count || tc.bones.iter().any(|&b| b >= bone_count) {
                return Err(Error::InvalidValue {
                    message: format!(
                        "transform constraint '{}' references a missing bone",
                        tc.name
                    ),
                });
            }
        }
        if self.default_skin.is_some_and(|i| i >= self.skins.len()) {
            return Err(Error::InvalidValue {
                message: "default skin index is out of range".to_string(),
            });
        }
        Ok(())
    }
}
