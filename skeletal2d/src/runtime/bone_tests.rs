use super::{Bone, LocalPose, RootFrame, WorldTransform};
use crate::{BoneData, Inherit};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn assert_world(actual: WorldTransform, expected: WorldTransform) {
    assert_approx(actual.a, expected.a);
    assert_approx(actual.b, expected.b);
    assert_approx(actual.c, expected.c);
    assert_approx(actual.d, expected.d);
    assert_approx(actual.world_x, expected.world_x);
    assert_approx(actual.world_y, expected.world_y);
}

fn bone(parent: Option<usize>, pose: LocalPose) -> Bone {
    let mut bone = Bone::new(0, &BoneData::new("b", parent));
    bone.set_local_pose(pose);
    bone
}

/// World transform of a bone posed by `pose`, built by hand from rotation,
/// shear and scale.
fn local_matrix(pose: &LocalPose) -> WorldTransform {
    let rx = (pose.rotation + pose.shear_x).to_radians();
    let ry = (pose.rotation + 90.0 + pose.shear_y).to_radians();
    WorldTransform {
        a: rx.cos() * pose.scale_x,
        b: ry.cos() * pose.scale_y,
        c: rx.sin() * pose.scale_x,
        d: ry.sin() * pose.scale_y,
        world_x: pose.x,
        world_y: pose.y,
    }
}

fn concat(parent: &WorldTransform, local: &WorldTransform) -> WorldTransform {
    WorldTransform {
        a: parent.a * local.a + parent.b * local.c,
        b: parent.a * local.b + parent.b * local.d,
        c: parent.c * local.a + parent.d * local.c,
        d: parent.c * local.b + parent.d * local.d,
        world_x: parent.a * local.world_x + parent.b * local.world_y + parent.world_x,
        world_y: parent.c * local.world_x + parent.d * local.world_y + parent.world_y,
    }
}

#[test]
fn root_bone_is_placed_by_the_root_frame() {
    let root = RootFrame::new(10.0, 20.0, 2.0, 3.0, true);
    assert_eq!(root.scale_y, -3.0);

    let mut b = bone(
        None,
        LocalPose {
            x: 3.0,
            y: 4.0,
            ..LocalPose::IDENTITY
        },
    );
    b.update_world_transform(None, &root);
    assert_world(
        b.world(),
        WorldTransform {
            a: 2.0,
            b: 0.0,
            c: 0.0,
            d: -3.0,
            world_x: 16.0,
            world_y: 8.0,
        },
    );
}

#[test]
fn normal_inheritance_concatenates_parent_and_local() {
    let root = RootFrame::default();
    let parent_pose = LocalPose {
        x: 5.0,
        rotation: 30.0,
        scale_x: 2.0,
        ..LocalPose::IDENTITY
    };
    let child_pose = LocalPose {
        x: 3.0,
        y: 1.0,
        rotation: 45.0,
        scale_x: 1.5,
        shear_x: 10.0,
        shear_y: -5.0,
        ..LocalPose::IDENTITY
    };

    let mut parent = bone(None, parent_pose);
    parent.update_world_transform(None, &root);
    let mut child = bone(Some(0), child_pose);
    child.update_world_transform(Some(&parent.world()), &root);

    assert_world(parent.world(), local_matrix(&parent_pose));
    let expected = concat(&local_matrix(&parent_pose), &local_matrix(&child_pose));
    assert_world(child.world(), expected);
}

#[test]
fn applied_transform_reproduces_the_world_transform() {
    let root = RootFrame::new(1.0, -2.0, 1.0, 1.0, true);
    let mut parent = bone(
        None,
        LocalPose {
            x: 5.0,
            rotation: 30.0,
            scale_x: 2.0,
            scale_y: 2.0,
            ..LocalPose::IDENTITY
        },
    );
    parent.update_world_transform(None, &root);
    let parent_world = parent.world();

    let mut child = bone(
        Some(0),
        LocalPose {
            x: 4.0,
            y: -1.0,
            rotation: 60.0,
            scale_x: 1.5,
            scale_y: 0.5,
            ..LocalPose::IDENTITY
        },
    );
    child.update_world_transform(Some(&parent_world), &root);
    let world = child.world();

    child.rotate_world(25.0);
    assert!(!child.is_applied_valid());
    let rotated = child.world();
    child.update_applied_transform(Some(&parent_world), &root);
    assert!(child.is_applied_valid());

    let applied = child.applied_pose();
    child.update_world_transform_with(applied, Some(&parent_world), &root);
    assert_world(child.world(), rotated);
    assert_approx(applied.x, 4.0);
    assert_approx(applied.y, -1.0);
    assert!((rotated.a - world.a).abs() > 1.0e-3);
}

#[test]
fn applied_transform_of_a_root_bone_inverts_the_root_frame() {
    let root = RootFrame::new(7.0, 3.0, 2.0, 0.5, false);
    let pose = LocalPose {
        x: 2.0,
        y: 6.0,
        rotation: -35.0,
        scale_x: 1.25,
        ..LocalPose::IDENTITY
    };
    let mut b = bone(None, pose);
    b.update_world_transform(None, &root);
    b.invalidate_applied();
    b.update_applied_transform(None, &root);

    let applied = b.applied_pose();
    assert_approx(applied.x, 2.0);
    assert_approx(applied.y, 6.0);
    assert_approx(applied.rotation, -35.0);
    assert_approx(applied.scale_x, 1.25);
    assert_approx(applied.scale_y, 1.0);
}

#[test]
fn only_translation_ignores_parent_rotation_and_scale() {
    let root = RootFrame::default();
    let mut parent = bone(
        None,
        LocalPose {
            rotation: 90.0,
            scale_x: 3.0,
            scale_y: 3.0,
            ..LocalPose::IDENTITY
        },
    );
    parent.update_world_transform(None, &root);

    let mut child = bone(
        Some(0),
        LocalPose {
            x: 1.0,
            ..LocalPose::IDENTITY
        },
    );
    child.inherit = Inherit::OnlyTranslation;
    child.update_world_transform(Some(&parent.world()), &root);

    assert_approx(child.world_x, 0.0);
    assert_approx(child.world_y, 3.0);
    assert_approx(child.a, 1.0);
    assert_approx(child.c, 0.0);
    assert_approx(child.d, 1.0);
}

#[test]
fn no_rotation_keeps_the_child_axis_aligned() {
    let root = RootFrame::default();
    let mut parent = bone(
        None,
        LocalPose {
            rotation: 90.0,
            ..LocalPose::IDENTITY
        },
    );
    parent.update_world_transform(None, &root);

    let mut child = bone(Some(0), LocalPose::IDENTITY);
    child.inherit = Inherit::NoRotationOrReflection;
    child.update_world_transform(Some(&parent.world()), &root);
    assert_approx(child.world_rotation_x(), 0.0);
    assert_approx(child.world_scale_x(), 1.0);
}

#[test]
fn no_scale_keeps_rotation_but_drops_parent_scale() {
    let root = RootFrame::default();
    let mut parent = bone(
        None,
        LocalPose {
            rotation: 90.0,
            scale_x: 2.0,
            scale_y: 2.0,
            ..LocalPose::IDENTITY
        },
    );
    parent.update_world_transform(None, &root);

    for inherit in [Inherit::NoScale, Inherit::NoScaleOrReflection] {
        let mut child = bone(
            Some(0),
            LocalPose {
                rotation: 10.0,
                ..LocalPose::IDENTITY
            },
        );
        child.inherit = inherit;
        child.update_world_transform(Some(&parent.world()), &root);
        assert_approx(child.world_scale_x(), 1.0);
        assert_approx(child.world_scale_y(), 1.0);
        assert_approx(child.world_rotation_x(), 100.0);
    }
}

#[test]
fn local_and_world_coordinates_convert_both_ways() {
    let root = RootFrame::default();
    let mut b = bone(
        None,
        LocalPose {
            x: 4.0,
            y: -3.0,
            rotation: 40.0,
            scale_x: 2.0,
            scale_y: 0.5,
            ..LocalPose::IDENTITY
        },
    );
    b.update_world_transform(None, &root);

    let [wx, wy] = b.local_to_world(3.0, 7.0);
    let [lx, ly] = b.world_to_local(wx, wy);
    assert_approx(lx, 3.0);
    assert_approx(ly, 7.0);

    let world_rotation = b.local_to_world_rotation(15.0);
    assert_approx(b.world_to_local_rotation(world_rotation), 15.0);
}

#[test]
fn set_to_setup_pose_restores_bone_data() {
    let mut data = BoneData::new("arm", None);
    data.rotation = 12.0;
    data.length = 5.0;
    let mut b = Bone::new(3, &data);
    assert_eq!(b.data_index(), 3);

    b.rotation = 80.0;
    b.length = 1.0;
    b.inherit = Inherit::NoScale;
    b.set_to_setup_pose(&data);
    assert_eq!(b.local_pose(), LocalPose::from(&data));
    assert_eq!(b.length, 5.0);
    assert_eq!(b.inherit, Inherit::Normal);
}

#[cfg(feature = "glam")]
#[test]
fn world_transform_converts_to_glam_affine() {
    let t = WorldTransform {
        a: 1.0,
        b: 2.0,
        c: 3.0,
        d: 4.0,
        world_x: 5.0,
        world_y: 6.0,
    };
    let affine: glam::Affine2 = t.into();
    let p = affine.transform_point2(glam::Vec2::new(1.0, 1.0));
    assert_eq!(p, glam::Vec2::new(8.0, 13.0));
    assert_eq!(t.transform_point(1.0, 1.0), [8.0, 13.0]);
}
