use crate::{
    AttachmentId, BoneData, Error, IkConstraintData, RegionAttachment, Skeleton, SkeletonData,
    Skin, SlotData, TransformConstraintData,
};
use std::sync::Arc;

fn bones(names: &[(&str, Option<usize>)]) -> Vec<BoneData> {
    names
        .iter()
        .map(|&(name, parent)| BoneData::new(name, parent))
        .collect()
}

#[test]
fn ik_child_is_updated_by_the_constraint_not_the_bone_pass() {
    let data = SkeletonData {
        bones: bones(&[("root", None), ("p", Some(0)), ("c", Some(1)), ("t", Some(0))]),
        ik_constraints: vec![IkConstraintData::new("ik", vec![1, 2], 3)],
        ..SkeletonData::default()
    };
    let skeleton = Skeleton::new(Arc::new(data)).unwrap();
    assert_eq!(
        skeleton.debug_update_cache(),
        vec!["bone:root", "bone:t", "bone:p", "ik:ik"]
    );
}

#[test]
fn constraints_are_sorted_by_order() {
    let build = |ik_order: i32, transform_order: i32| {
        let mut ik = IkConstraintData::new("aim", vec![1], 3);
        ik.order = ik_order;
        let mut transform = TransformConstraintData::new("follow", vec![2], 3);
        transform.order = transform_order;
        let data = SkeletonData {
            bones: bones(&[("root", None), ("a", Some(0)), ("b", Some(0)), ("t", Some(0))]),
            ik_constraints: vec![ik],
            transform_constraints: vec![transform],
            ..SkeletonData::default()
        };
        Skeleton::new(Arc::new(data)).unwrap().debug_update_cache()
    };

    assert_eq!(
        build(2, 1),
        vec!["bone:root", "bone:t", "bone:b", "transform:follow", "bone:a", "ik:aim"]
    );
    assert_eq!(
        build(1, 2),
        vec!["bone:root", "bone:t", "bone:a", "ik:aim", "bone:b", "transform:follow"]
    );
}

#[test]
fn local_transform_constraint_bones_are_left_to_the_constraint() {
    let mut transform = TransformConstraintData::new("tc", vec![1], 2);
    transform.local = true;
    let data = SkeletonData {
        bones: bones(&[("root", None), ("b", Some(0)), ("t", Some(0))]),
        transform_constraints: vec![transform],
        ..SkeletonData::default()
    };
    let skeleton = Skeleton::new(Arc::new(data)).unwrap();
    assert_eq!(
        skeleton.debug_update_cache(),
        vec!["bone:root", "bone:t", "transform:tc"]
    );
}

#[test]
fn new_rejects_invalid_data() {
    let data = SkeletonData {
        bones: bones(&[("child", Some(1)), ("root", None)]),
        ..SkeletonData::default()
    };
    assert!(matches!(
        Skeleton::new(Arc::new(data)),
        Err(Error::InvalidValue { .. })
    ));

    let data = SkeletonData {
        bones: bones(&[("root", None), ("a", Some(0)), ("b", Some(1)), ("c", Some(2))]),
        ik_constraints: vec![IkConstraintData::new("ik", vec![1, 2, 3], 0)],
        ..SkeletonData::default()
    };
    assert!(matches!(
        Skeleton::new(Arc::new(data)),
        Err(Error::InvalidValue { .. })
    ));

    let mut slot_data = SkeletonData {
        bones: bones(&[("root", None)]),
        ..SkeletonData::default()
    };
    slot_data.slots.push(SlotData::new("slot", 4));
    assert!(Skeleton::new(Arc::new(slot_data)).is_err());
}

struct Dressed {
    skeleton: Skeleton,
    torso: AttachmentId,
    alt: AttachmentId,
    red_torso: AttachmentId,
    red_hat: AttachmentId,
    blue_torso: AttachmentId,
}

/// Slots `body` (setup `torso`) and `hat` (setup `hat`, on a bone only the
/// red skin activates); skins `default`, `red` and `blue`.
fn dressed() -> Dressed {
    let mut data = SkeletonData {
        bones: bones(&[("root", None), ("hat-bone", Some(0))]),
        ..SkeletonData::default()
    };
    data.bones[1].skin_required = true;
    for (slot, bone, setup) in [("body", 0, "torso"), ("hat", 1, "hat")] {
        let mut slot = SlotData::new(slot, bone);
        slot.attachment = Some(setup.to_string());
        data.slots.push(slot);
    }

    let arena = &mut data.attachments;
    let mut region = |name: &str| arena.insert(RegionAttachment::new(name, 1.0, 1.0));
    let torso = region("torso");
    let alt = region("alt");
    let red_torso = region("red-torso");
    let red_hat = region("red-hat");
    let blue_torso = region("blue-torso");

    let mut default = Skin::new("default");
    default.set_attachment(arena, 0, "torso", torso);
    default.set_attachment(arena, 0, "alt", alt);
    let mut red = Skin::new("red");
    red.set_attachment(arena, 0, "torso", red_torso);
    red.set_attachment(arena, 1, "hat", red_hat);
    red.bones.push(1);
    let mut blue = Skin::new("blue");
    blue.set_attachment(arena, 0, "torso", blue_torso);

    data.skins = vec![default, red, blue];
    data.default_skin = Some(0);

    Dressed {
        skeleton: Skeleton::new(Arc::new(data)).unwrap(),
        torso,
        alt,
        red_torso,
        red_hat,
        blue_torso,
    }
}

#[test]
fn setup_attachments_fall_back_to_the_default_skin() {
    let Dressed {
        skeleton, torso, ..
    } = dressed();
    assert_eq!(skeleton.skin_index(), None);
    assert_eq!(skeleton.slots[0].attachment, Some(torso));
    assert_eq!(skeleton.slots[1].attachment, None);
    assert_eq!(skeleton.slot_attachment(0).map(|a| a.name()), Some("torso"));
    assert!(!skeleton.bones[1].active);
    assert_eq!(skeleton.debug_update_cache(), vec!["bone:root"]);
}

#[test]
fn first_skin_applies_its_setup_attachments_and_activates_bones() {
    let Dressed {
        mut skeleton,
        red_torso,
        red_hat,
        ..
    } = dressed();
    skeleton.set_skin(Some("red")).unwrap();

    assert_eq!(skeleton.skin().map(|s| s.name.as_str()), Some("red"));
    assert_eq!(skeleton.slots[0].attachment, Some(red_torso));
    assert_eq!(skeleton.slots[1].attachment, Some(red_hat));
    assert!(skeleton.bones[1].active);
    assert_eq!(skeleton.debug_update_cache(), vec!["bone:root", "bone:hat-bone"]);
}

#[test]
fn switching_skins_swaps_attachments_shown_from_the_old_skin() {
    let Dressed {
        mut skeleton,
        red_hat,
        blue_torso,
        ..
    } = dressed();
    skeleton.set_skin(Some("red")).unwrap();
    skeleton.set_skin(Some("blue")).unwrap();

    assert_eq!(skeleton.slots[0].attachment, Some(blue_torso));
    // Blue has no hat, so the red one stays.
    assert_eq!(skeleton.slots[1].attachment, Some(red_hat));
    assert!(!skeleton.bones[1].active);

    skeleton.set_slots_to_setup_pose();
    assert_eq!(skeleton.slots[0].attachment, Some(blue_torso));
    assert_eq!(skeleton.slots[1].attachment, None);
}

#[test]
fn attachments_not_from_the_old_skin_are_kept_on_switch() {
    let Dressed {
        mut skeleton, alt, ..
    } = dressed();
    skeleton.set_skin(Some("red")).unwrap();
    skeleton.set_attachment("body", Some("alt")).unwrap();
    skeleton.set_skin(Some("blue")).unwrap();
    assert_eq!(skeleton.slots[0].attachment, Some(alt));
}

#[test]
fn unknown_skin_is_an_error_and_keeps_the_current_skin() {
    let Dressed { mut skeleton, .. } = dressed();
    skeleton.set_skin(Some("red")).unwrap();
    let err = skeleton.set_skin(Some("green")).unwrap_err();
    assert!(matches!(err, Error::UnknownSkin { ref name } if name == "green"));
    assert_eq!(skeleton.skin().map(|s| s.name.as_str()), Some("red"));

    skeleton.set_skin(None).unwrap();
    assert!(skeleton.skin().is_none());
    assert!(!skeleton.bones[1].active);
}

#[test]
fn set_attachment_resolves_names_through_the_skins() {
    let Dressed {
        mut skeleton,
        torso,
        alt,
        red_torso,
        ..
    } = dressed();

    skeleton.set_attachment("body", Some("alt")).unwrap();
    assert_eq!(skeleton.slots[0].attachment, Some(alt));

    skeleton.set_skin(Some("red")).unwrap();
    assert_eq!(skeleton.attachment(0, "torso"), Some(red_torso));
    // Not in red, found in the default skin.
    assert_eq!(skeleton.attachment(0, "alt"), Some(alt));
    skeleton.set_attachment("body", Some("torso")).unwrap();
    assert_eq!(skeleton.slots[0].attachment, Some(red_torso));
    assert_ne!(skeleton.slots[0].attachment, Some(torso));

    skeleton.set_attachment("body", None).unwrap();
    assert_eq!(skeleton.slots[0].attachment, None);

    assert!(matches!(
        skeleton.set_attachment("body", Some("cape")),
        Err(Error::UnknownAttachment { .. })
    ));
    assert!(matches!(
        skeleton.set_attachment("tail", None),
        Err(Error::UnknownSlot { .. })
    ));
}

#[test]
fn set_slots_to_setup_pose_restores_draw_order_and_color() {
    let Dressed {
        mut skeleton, torso, ..
    } = dressed();
    skeleton.draw_order.reverse();
    skeleton.slots[0].color = [0.0, 0.0, 0.0, 0.0];
    skeleton.slots[0].attachment = None;

    skeleton.set_slots_to_setup_pose();
    assert_eq!(skeleton.draw_order, vec![0, 1]);
    assert_eq!(skeleton.slots[0].color, [1.0, 1.0, 1.0, 1.0]);
    assert_eq!(skeleton.slots[0].attachment, Some(torso));
}

#[test]
fn find_by_name() {
    let Dressed { skeleton, .. } = dressed();
    assert_eq!(skeleton.find_bone("hat-bone"), Some(1));
    assert_eq!(skeleton.find_slot("hat"), Some(1));
    assert_eq!(skeleton.find_bone("missing"), None);
    assert_eq!(skeleton.data.find_skin("blue"), Some(2));
    assert_eq!(skeleton.find_ik_constraint("ik"), None);
}
