use crate::{BoneData, Skeleton, SkeletonData, TransformConstraintData};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

/// `root`, a constrained bone `b` and a target `t`, both children of root.
fn skeleton(
    b: impl FnOnce(&mut BoneData),
    t: impl FnOnce(&mut BoneData),
    constraint: Option<TransformConstraintData>,
) -> Skeleton {
    let mut b_data = BoneData::new("b", Some(0));
    b(&mut b_data);
    let mut t_data = BoneData::new("t", Some(0));
    t(&mut t_data);

    let data = SkeletonData {
        bones: vec![BoneData::new("root", None), b_data, t_data],
        transform_constraints: constraint.into_iter().collect(),
        ..SkeletonData::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data)).unwrap();
    skeleton.update_world_transform();
    skeleton
}

/// Constrains `b` to `t` with every mix at zero unless `configure` sets it.
fn constraint(configure: impl FnOnce(&mut TransformConstraintData)) -> TransformConstraintData {
    let mut data = TransformConstraintData::new("tc", vec![1], 2);
    data.mix_rotate = 0.0;
    data.mix_translate = 0.0;
    data.mix_scale = 0.0;
    data.mix_shear = 0.0;
    configure(&mut data);
    data
}

fn rotated_target(t: &mut BoneData) {
    t.x = 1.0;
    t.y = 2.0;
    t.rotation = 90.0;
}

#[test]
fn zero_mixes_leave_bones_bit_identical() {
    let setup = |b: &mut BoneData| {
        b.x = 0.25;
        b.rotation = 33.0;
        b.scale_x = 1.5;
        b.shear_y = 7.0;
    };
    let plain = skeleton(setup, rotated_target, None);
    for (local, relative) in [(false, false), (false, true), (true, false), (true, true)] {
        let constrained = skeleton(
            setup,
            rotated_target,
            Some(constraint(move |c| {
                c.local = local;
                c.relative = relative;
                c.offset_rotation = 12.0;
                c.offset_x = 3.0;
            })),
        );
        assert_eq!(constrained.bones[1].world(), plain.bones[1].world());
    }
}

#[test]
fn absolute_world_copies_target_rotation_and_position() {
    let skeleton = skeleton(
        |_| {},
        rotated_target,
        Some(constraint(|c| {
            c.mix_rotate = 1.0;
            c.mix_translate = 1.0;
        })),
    );
    let b = &skeleton.bones[1];
    assert_approx(b.world_x, 1.0);
    assert_approx(b.world_y, 2.0);
    assert_approx(b.world_rotation_x(), 90.0);
    assert!(!b.is_applied_valid());
}

#[test]
fn absolute_world_offsets_are_in_target_space() {
    let skeleton = skeleton(
        |_| {},
        rotated_target,
        Some(constraint(|c| {
            c.mix_translate = 1.0;
            c.offset_x = 1.0;
        })),
    );
    assert_approx(skeleton.bones[1].world_x, 1.0);
    assert_approx(skeleton.bones[1].world_y, 3.0);
}

#[test]
fn partial_translate_mix_moves_part_of_the_way() {
    let skeleton = skeleton(
        |_| {},
        rotated_target,
        Some(constraint(|c| c.mix_translate = 0.5)),
    );
    assert_approx(skeleton.bones[1].world_x, 0.5);
    assert_approx(skeleton.bones[1].world_y, 1.0);
    assert_approx(skeleton.bones[1].world_rotation_x(), 0.0);
}

#[test]
fn absolute_world_scale_matches_the_target() {
    let skeleton = skeleton(
        |_| {},
        |t| t.scale_x = 2.0,
        Some(constraint(|c| c.mix_scale = 1.0)),
    );
    assert_approx(skeleton.bones[1].world_scale_x(), 2.0);
    assert_approx(skeleton.bones[1].world_scale_y(), 1.0);
}

#[test]
fn relative_world_adds_target_rotation_and_position() {
    let skeleton = skeleton(
        |b| {
            b.x = 1.0;
            b.rotation = 45.0;
        },
        rotated_target,
        Some(constraint(|c| {
            c.relative = true;
            c.mix_rotate = 1.0;
            c.mix_translate = 1.0;
        })),
    );
    let b = &skeleton.bones[1];
    assert_approx(b.world_rotation_x(), 135.0);
    assert_approx(b.world_x, 2.0);
    assert_approx(b.world_y, 2.0);
}

#[test]
fn absolute_local_copies_the_target_local_pose() {
    let skeleton = skeleton(
        |b| b.rotation = 45.0,
        |t| {
            rotated_target(t);
            t.scale_x = 2.0;
        },
        Some(constraint(|c| {
            c.local = true;
            c.mix_rotate = 1.0;
            c.mix_translate = 1.0;
            c.mix_scale = 1.0;
        })),
    );
    let b = &skeleton.bones[1];
    assert!(b.is_applied_valid());
    assert_approx(b.arotation, 90.0);
    assert_approx(b.ascale_x, 2.0);
    assert_approx(b.world_x, 1.0);
    assert_approx(b.world_y, 2.0);
    assert_approx(b.world_rotation_x(), 90.0);
    // The local pose itself is not modified.
    assert_eq!(b.rotation, 45.0);
}

#[test]
fn relative_local_adds_the_target_local_pose() {
    let skeleton = skeleton(
        |b| b.rotation = 45.0,
        |t| {
            t.rotation = 90.0;
            t.scale_x = 2.0;
            t.shear_y = 10.0;
        },
        Some(constraint(|c| {
            c.local = true;
            c.relative = true;
            c.mix_rotate = 1.0;
            c.mix_scale = 1.0;
            c.mix_shear = 0.5;
        })),
    );
    let b = &skeleton.bones[1];
    assert_approx(b.arotation, 135.0);
    assert_approx(b.ascale_x, 2.0);
    assert_approx(b.ascale_y, 1.0);
    assert_approx(b.ashear_y, 5.0);
}

#[test]
fn set_to_setup_pose_restores_mixes() {
    let mut skeleton = skeleton(
        |_| {},
        rotated_target,
        Some(constraint(|c| c.mix_translate = 1.0)),
    );
    skeleton.transform_constraints[0].mix_translate = 0.0;
    skeleton.update_world_transform();
    assert_approx(skeleton.bones[1].world_x, 0.0);

    skeleton.set_to_setup_pose();
    assert_eq!(skeleton.transform_constraints[0].mix_translate, 1.0);
    skeleton.update_world_transform();
    assert_approx(skeleton.bones[1].world_x, 1.0);
}
