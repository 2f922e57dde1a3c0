//! Loader for the setup-pose subset of the Spine JSON skeleton format.

use crate::{
    Attachment, AttachmentArena, BoneData, BoundingBoxAttachment, ClippingAttachment, Error,
    IkConstraintData, Inherit, MeshAttachment, MeshGeometry, RegionAttachment, SkeletonData,
    Skin, SlotData, TransformConstraintData, VertexAttachment,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Root {
    #[serde(default)]
    skeleton: Option<SkeletonHeader>,
    #[serde(default)]
    bones: Vec<BoneDef>,
    #[serde(default)]
    slots: Vec<SlotDef>,
    #[serde(default)]
    ik: Vec<IkConstraintDef>,
    #[serde(default)]
    transform: Vec<TransformConstraintDef>,
    #[serde(default)]
    skins: Option<SkinsDef>,
}

#[derive(Debug, Deserialize)]
struct SkeletonHeader {
    #[serde(default)]
    spine: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkinsDef {
    Map(BTreeMap<String, BTreeMap<String, BTreeMap<String, AttachmentDef>>>),
    Array(Vec<SkinDef>),
}

#[derive(Debug, Deserialize)]
struct SkinDef {
    name: String,
    #[serde(default)]
    attachments: BTreeMap<String, BTreeMap<String, AttachmentDef>>,
    #[serde(default)]
    bones: Vec<String>,
    #[serde(default)]
    ik: Vec<String>,
    #[serde(default)]
    transform: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BoneDef {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    length: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_one", rename = "scaleX")]
    scale_x: f32,
    #[serde(default = "default_one", rename = "scaleY")]
    scale_y: f32,
    #[serde(default, rename = "shearX")]
    shear_x: f32,
    #[serde(default, rename = "shearY")]
    shear_y: f32,
    #[serde(default, alias = "transform")]
    inherit: Option<String>,
    #[serde(default, rename = "skin")]
    skin_required: bool,
}

#[derive(Debug, Deserialize)]
struct SlotDef {
    name: String,
    bone: String,
    #[serde(default)]
    attachment: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IkConstraintDef {
    name: String,
    #[serde(default)]
    order: i32,
    #[serde(default, rename = "skin")]
    skin_required: bool,
    bones: Vec<String>,
    target: String,
    #[serde(default = "default_one")]
    mix: f32,
    #[serde(default)]
    softness: f32,
    #[serde(default)]
    compress: bool,
    #[serde(default)]
    stretch: bool,
    #[serde(default)]
    uniform: bool,
    #[serde(default = "default_true", rename = "bendPositive")]
    bend_positive: bool,
}

#[derive(Debug, Deserialize)]
struct TransformConstraintDef {
    name: String,
    #[serde(default)]
    order: i32,
    #[serde(default, rename = "skin")]
    skin_required: bool,
    bones: Vec<String>,
    target: String,
    #[serde(default)]
    local: bool,
    #[serde(default)]
    relative: bool,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default, rename = "scaleX")]
    scale_x: f32,
    #[serde(default, rename = "scaleY")]
    scale_y: f32,
    #[serde(default, rename = "shearY")]
    shear_y: f32,
    #[serde(default = "default_one", rename = "rotateMix", alias = "mixRotate")]
    rotate_mix: f32,
    #[serde(default = "default_one", rename = "translateMix", alias = "mixX")]
    translate_mix: f32,
    #[serde(default = "default_one", rename = "scaleMix", alias = "mixScaleX")]
    scale_mix: f32,
    #[serde(default = "default_one", rename = "shearMix", alias = "mixShearY")]
    shear_mix: f32,
}

#[derive(Debug, Deserialize)]
struct AttachmentDef {
    #[serde(default, rename = "type")]
    attachment_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    skin: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_one", rename = "scaleX")]
    scale_x: f32,
    #[serde(default = "default_one", rename = "scaleY")]
    scale_y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    uvs: Option<Vec<f32>>,
    #[serde(default)]
    vertices: Option<Vec<f32>>,
    #[serde(default)]
    triangles: Option<Vec<u32>>,
    #[serde(default)]
    hull: usize,
    #[serde(default, rename = "vertexCount")]
    vertex_count: Option<usize>,
    #[serde(default)]
    color: Option<String>,
}

/// A linked mesh waiting for every skin to be read, since its parent may
/// live in a later skin.
struct PendingLinkedMesh {
    skin: usize,
    skin_name: String,
    slot: usize,
    slot_name: String,
    key: String,
    name: String,
    path: String,
    color: [f32; 4],
    parent: String,
    parent_skin: String,
}

/// Everything needed to report which attachment failed to load.
struct AttachmentContext<'a> {
    skin: &'a str,
    slot: &'a str,
    attachment: &'a str,
}

impl AttachmentContext<'_> {
    fn invalid_mesh(&self, message: impl Into<String>) -> Error {
        Error::JsonInvalidMeshData {
            skin: self.skin.to_string(),
            slot: self.slot.to_string(),
            attachment: self.attachment.to_string(),
            message: message.into(),
        }
    }

    fn weighted(&self) -> Error {
        Error::JsonUnsupportedWeightedVertices {
            skin: self.skin.to_string(),
            slot: self.slot.to_string(),
            attachment: self.attachment.to_string(),
        }
    }
}

impl SkeletonData {
    pub fn from_json_str(input: &str) -> Result<Arc<Self>, Error> {
        Self::from_json_str_with_scale(input, 1.0)
    }

    /// Like [`SkeletonData::from_json_str`], multiplying every length and
    /// position by `scale`.
    pub fn from_json_str_with_scale(input: &str, scale: f32) -> Result<Arc<Self>, Error> {
        let root: Root = serde_json::from_str(input).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;
        if let Some(version) = root.skeleton.as_ref().and_then(|s| s.spine.as_deref()) {
            log::debug!("loading skeleton exported by Spine {version}");
        }
        let scale = if scale.is_finite() { scale } else { 1.0 };

        let mut bones = Vec::with_capacity(root.bones.len());
        let mut bone_index = HashMap::<String, usize>::new();
        for bone in root.bones {
            let parent = match bone.parent.as_deref() {
                None => None,
                Some(parent_name) => Some(bone_index.get(parent_name).copied().ok_or_else(
                    || Error::JsonUnknownBoneParent {
                        bone: bone.name.clone(),
                        parent: parent_name.to_string(),
                    },
                )?),
            };
            bone_index.insert(bone.name.clone(), bones.len());
            bones.push(BoneData {
                name: bone.name,
                parent,
                length: bone.length * scale,
                x: bone.x * scale,
                y: bone.y * scale,
                rotation: bone.rotation,
                scale_x: bone.scale_x,
                scale_y: bone.scale_y,
                shear_x: bone.shear_x,
                shear_y: bone.shear_y,
                inherit: parse_inherit(bone.inherit.as_deref()),
                skin_required: bone.skin_required,
            });
        }

        let mut slots = Vec::with_capacity(root.slots.len());
        let mut slot_index = HashMap::<String, usize>::new();
        for slot in root.slots {
            let bone = bone_index.get(&slot.bone).copied().ok_or_else(|| {
                Error::JsonUnknownSlotBone {
                    slot: slot.name.clone(),
                    bone: slot.bone.clone(),
                }
            })?;
            let color = match slot.color.as_deref() {
                Some(hex) => parse_hex_color(hex, &format!("slot '{}'", slot.name))?,
                None => [1.0, 1.0, 1.0, 1.0],
            };
            slot_index.insert(slot.name.clone(), slots.len());
            slots.push(SlotData {
                name: slot.name,
                bone,
                attachment: slot.attachment,
                color,
            });
        }

        let find_constraint_bone = |constraint: &str, name: &str| {
            bone_index
                .get(name)
                .copied()
                .ok_or_else(|| Error::JsonUnknownConstraintBone {
                    constraint: constraint.to_string(),
                    bone: name.to_string(),
                })
        };

        let mut ik_constraints = Vec::with_capacity(root.ik.len());
        for ik in root.ik {
            let constrained = ik
                .bones
                .iter()
                .map(|b| find_constraint_bone(&ik.name, b))
                .collect::<Result<Vec<_>, _>>()?;
            let target = find_constraint_bone(&ik.name, &ik.target)?;
            ik_constraints.push(IkConstraintData {
                order: ik.order,
                skin_required: ik.skin_required,
                mix: ik.mix,
                softness: ik.softness * scale,
                compress: ik.compress,
                stretch: ik.stretch,
                uniform: ik.uniform,
                bend_direction: if ik.bend_positive { 1 } else { -1 },
                ..IkConstraintData::new(ik.name, constrained, target)
            });
        }

        let mut transform_constraints = Vec::with_capacity(root.transform.len());
        for tc in root.transform {
            let constrained = tc
                .bones
                .iter()
                .map(|b| find_constraint_bone(&tc.name, b))
                .collect::<Result<Vec<_>, _>>()?;
            let target = find_constraint_bone(&tc.name, &tc.target)?;
            transform_constraints.push(TransformConstraintData {
                order: tc.order,
                skin_required: tc.skin_required,
                mix_rotate: tc.rotate_mix,
                mix_translate: tc.translate_mix,
                mix_scale: tc.scale_mix,
                mix_shear: tc.shear_mix,
                offset_rotation: tc.rotation,
                offset_x: tc.x * scale,
                offset_y: tc.y * scale,
                offset_scale_x: tc.scale_x,
                offset_scale_y: tc.scale_y,
                offset_shear_y: tc.shear_y,
                local: tc.local,
                relative: tc.relative,
                ..TransformConstraintData::new(tc.name, constrained, target)
            });
        }

        let skin_defs: Vec<SkinDef> = match root.skins {
            None => Vec::new(),
            Some(SkinsDef::Array(skins)) => skins,
            Some(SkinsDef::Map(map)) => map
                .into_iter()
                .map(|(name, attachments)| SkinDef {
                    name,
                    attachments,
                    bones: Vec::new(),
                    ik: Vec::new(),
                    transform: Vec::new(),
                })
                .collect(),
        };

        let mut arena = AttachmentArena::new();
        let mut skins = Vec::with_capacity(skin_defs.len());
        let mut pending = Vec::new();
        for skin_def in skin_defs {
            let skin_index = skins.len();
            let mut skin = Skin::new(skin_def.name);

            for name in &skin_def.bones {
                let bone = bone_index.get(name).copied().ok_or_else(|| {
                    Error::JsonUnknownSkinBone {
                        skin: skin.name.clone(),
                        bone: name.clone(),
                    }
                })?;
                skin.bones.push(bone);
            }
            for name in &skin_def.ik {
                let index = ik_constraints
                    .iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| unknown_skin_constraint(&skin.name, "ik", name))?;
                skin.ik_constraints.push(index);
            }
            for name in &skin_def.transform {
                let index = transform_constraints
                    .iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| unknown_skin_constraint(&skin.name, "transform", name))?;
                skin.transform_constraints.push(index);
            }

            for (slot_name, entries) in skin_def.attachments {
                let slot = slot_index.get(&slot_name).copied().ok_or_else(|| {
                    Error::JsonUnknownSkinSlot {
                        skin: skin.name.clone(),
                        slot: slot_name.clone(),
                    }
                })?;
                for (key, def) in entries {
                    let ctx = AttachmentContext {
                        skin: &skin.name,
                        slot: &slot_name,
                        attachment: &key,
                    };
                    let name = def.name.clone().unwrap_or_else(|| key.clone());
                    let path = def.path.clone().unwrap_or_else(|| name.clone());
                    let color = match def.color.as_deref() {
                        Some(hex) => parse_hex_color(hex, &format!("attachment '{key}'"))?,
                        None => [1.0, 1.0, 1.0, 1.0],
                    };
                    let attachment: Attachment =
                        match def.attachment_type.as_deref().unwrap_or("region") {
                            "region" => {
                                let mut region = RegionAttachment::new(
                                    name,
                                    def.width * scale,
                                    def.height * scale,
                                );
                                region.path = path;
                                region.color = color;
                                region.x = def.x * scale;
                                region.y = def.y * scale;
                                region.rotation = def.rotation;
                                region.scale_x = def.scale_x;
                                region.scale_y = def.scale_y;
                                region.update_region();
                                region.into()
                            }
                            "mesh" => {
                                let geometry = read_mesh_geometry(&def, scale, &ctx)?;
                                let mut mesh = MeshAttachment::new(name, geometry);
                                mesh.path = path;
                                mesh.color = color;
                                mesh.into()
                            }
                            "linkedmesh" | "linkedMesh" => {
                                let parent = def
                                    .parent
                                    .clone()
                                    .ok_or_else(|| ctx.invalid_mesh("linked mesh has no 'parent'"))?;
                                pending.push(PendingLinkedMesh {
                                    skin: skin_index,
                                    skin_name: skin.name.clone(),
                                    slot,
                                    slot_name: slot_name.clone(),
                                    key: key.clone(),
                                    name,
                                    path,
                                    color,
                                    parent,
                                    parent_skin: def.skin.clone().unwrap_or_else(|| "default".to_string()),
                                });
                                continue;
                            }
                            "boundingbox" => {
                                let vertices = read_polygon(&def, scale, &ctx)?;
                                let mut bounding_box = BoundingBoxAttachment::new(name, vertices);
                                if def.color.is_some() {
                                    bounding_box.color = color;
                                }
                                bounding_box.into()
                            }
                            "clipping" => {
                                let vertices = read_polygon(&def, scale, &ctx)?;
                                let end_slot = match def.end.as_deref() {
                                    None => None,
                                    Some(end) => Some(slot_index.get(end).copied().ok_or_else(
                                        || Error::JsonUnknownClippingEndSlot {
                                            attachment: key.clone(),
                                            slot: end.to_string(),
                                        },
                                    )?),
                                };
                                let mut clip = ClippingAttachment::new(name, vertices, end_slot);
                                if def.color.is_some() {
                                    clip.color = color;
                                }
                                clip.into()
                            }
                            other => {
                                return Err(Error::JsonUnsupportedAttachmentType {
                                    skin: skin.name.clone(),
                                    slot: slot_name.clone(),
                                    attachment: key.clone(),
                                    attachment_type: other.to_string(),
                                });
                            }
                        };
                    let id = arena.insert(attachment);
                    skin.set_attachment(&mut arena, slot, &key, id);
                }
            }
            skins.push(skin);
        }

        for linked in pending {
            let parent = skins
                .iter()
                .find(|s| s.name == linked.parent_skin)
                .and_then(|s| s.attachment(linked.slot, &linked.parent))
                .filter(|&id| matches!(arena.get(id), Some(Attachment::Mesh(_))))
                .ok_or_else(|| Error::JsonUnknownLinkedMeshParent {
                    skin: linked.skin_name.clone(),
                    slot: linked.slot_name.clone(),
                    attachment: linked.key.clone(),
                    parent: linked.parent.clone(),
                })?;
            let id = arena.new_linked_mesh(parent).ok_or_else(|| {
                Error::JsonUnknownLinkedMeshParent {
                    skin: linked.skin_name.clone(),
                    slot: linked.slot_name.clone(),
                    attachment: linked.key.clone(),
                    parent: linked.parent.clone(),
                }
            })?;
            if let Some(Attachment::Mesh(mesh)) = arena.get_mut(id) {
                mesh.name = linked.name;
                mesh.path = linked.path;
                mesh.color = linked.color;
            }
            arena.update_uvs(id);
            skins[linked.skin].set_attachment(&mut arena, linked.slot, &linked.key, id);
        }

        let default_skin = skins.iter().position(|s| s.name == "default");
        let data = SkeletonData {
            name: None,
            bones,
            slots,
            ik_constraints,
            transform_constraints,
            skins,
            default_skin,
            attachments: arena,
        };
        data.validate()?;
        Ok(Arc::new(data))
    }
}

fn read_mesh_geometry(
    def: &AttachmentDef,
    scale: f32,
    ctx: &AttachmentContext<'_>,
) -> Result<MeshGeometry, Error> {
    let uvs = def
        .uvs
        .as_ref()
        .ok_or_else(|| ctx.invalid_mesh("missing 'uvs'"))?;
    let vertices = def
        .vertices
        .as_ref()
        .ok_or_else(|| ctx.invalid_mesh("missing 'vertices'"))?;
    let triangles = def
        .triangles
        .as_ref()
        .ok_or_else(|| ctx.invalid_mesh("missing 'triangles'"))?;
    if uvs.len() % 2 != 0 {
        return Err(ctx.invalid_mesh("odd number of UV values"));
    }
    if vertices.len() != uvs.len() {
        return Err(ctx.weighted());
    }
    let vertex_count = uvs.len() / 2;
    if triangles.len() % 3 != 0 {
        return Err(ctx.invalid_mesh("triangle index count is not a multiple of 3"));
    }
    let triangles = triangles
        .iter()
        .map(|&i| {
            if (i as usize) < vertex_count {
                u16::try_from(i).map_err(|_| ctx.invalid_mesh("triangle index exceeds u16"))
            } else {
                Err(ctx.invalid_mesh(format!(
                    "triangle index {i} out of range for {vertex_count} vertices"
                )))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MeshGeometry {
        vertices: VertexAttachment::new(vertices.iter().map(|v| v * scale).collect()),
        region_uvs: uvs.clone(),
        triangles,
        hull_length: def.hull * 2,
        width: def.width * scale,
        height: def.height * scale,
    })
}

fn read_polygon(def: &AttachmentDef, scale: f32, ctx: &AttachmentContext<'_>) -> Result<Vec<f32>, Error> {
    let vertices = def.vertices.as_deref().unwrap_or_default();
    let vertex_count = def.vertex_count.unwrap_or(vertices.len() / 2);
    if vertices.len() != vertex_count * 2 {
        return Err(ctx.weighted());
    }
    Ok(vertices.iter().map(|v| v * scale).collect())
}

fn unknown_skin_constraint(skin: &str, kind: &str, name: &str) -> Error {
    Error::JsonUnknownSkinConstraint {
        skin: skin.to_string(),
        kind: kind.to_string(),
        constraint: name.to_string(),
    }
}

fn parse_inherit(raw: Option<&str>) -> Inherit {
    match raw.unwrap_or("normal") {
        "onlyTranslation" => Inherit::OnlyTranslation,
        "noRotationOrReflection" => Inherit::NoRotationOrReflection,
        "noScale" => Inherit::NoScale,
        "noScaleOrReflection" => Inherit::NoScaleOrReflection,
        "normal" => Inherit::Normal,
        other => {
            log::warn!("unknown inherit mode '{other}'; using normal");
            Inherit::Normal
        }
    }
}

fn default_one() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Parses `RRGGBB` or `RRGGBBAA`.
fn parse_hex_color(input: &str, context: &str) -> Result<[f32; 4], Error> {
    let invalid = || Error::JsonInvalidColor {
        context: context.to_string(),
        value: input.to_string(),
    };
    if !matches!(input.len(), 6 | 8) || !input.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| -> Result<f32, Error> {
        u8::from_str_radix(&input[i * 2..i * 2 + 2], 16)
            .map(|v| v as f32 / 255.0)
            .map_err(|_| invalid())
    };
    let alpha = if input.len() == 8 { channel(3)? } else { 1.0 };
    Ok([channel(0)?, channel(1)?, channel(2)?, alpha])
}
