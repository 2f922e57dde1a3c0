use crate::{
    BoneData, BoundingBoxAttachment, Polygon, RegionAttachment, Skeleton, SkeletonBounds,
    SkeletonData, Skin, SlotData,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-5,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

const SQUARE: [f32; 8] = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0];

/// Root bone at `(5, 0)` with a square bounding box, a region slot and a box
/// on a bone that is only active with a skin.
fn skeleton() -> Skeleton {
    let mut data = SkeletonData::default();
    let mut root = BoneData::new("root", None);
    root.x = 5.0;
    data.bones.push(root);
    let mut hidden = BoneData::new("hidden", Some(0));
    hidden.skin_required = true;
    data.bones.push(hidden);

    let mut skin = Skin::new("default");
    for (slot_name, bone, attachment) in [("hit", 0, "box"), ("art", 0, "image"), ("ghost", 1, "ghost-box")] {
        let mut slot = SlotData::new(slot_name, bone);
        slot.attachment = Some(attachment.to_string());
        let slot_index = data.slots.len();
        data.slots.push(slot);
        let id = if attachment == "image" {
            data.attachments.insert(RegionAttachment::new(attachment, 4.0, 4.0))
        } else {
            data.attachments
                .insert(BoundingBoxAttachment::new(attachment, SQUARE.to_vec()))
        };
        skin.set_attachment(&mut data.attachments, slot_index, attachment, id);
    }
    data.skins.push(skin);
    data.default_skin = Some(0);

    let mut skeleton = Skeleton::new(Arc::new(data)).unwrap();
    skeleton.update_world_transform();
    skeleton
}

#[test]
fn update_collects_boxes_of_active_bones_only() {
    let skeleton = skeleton();
    let mut bounds = SkeletonBounds::new();
    bounds.update(&skeleton, true);

    assert_eq!(bounds.bounding_boxes().len(), 1);
    assert_eq!(bounds.polygons().len(), 1);
    let expected = [5.0, 0.0, 15.0, 0.0, 15.0, 10.0, 5.0, 10.0];
    assert_eq!(bounds.polygons()[0].vertices.len(), expected.len());
    for (actual, expected) in bounds.polygons()[0].vertices.iter().copied().zip(expected) {
        assert_approx(actual, expected);
    }
    assert_approx(bounds.min_x, 5.0);
    assert_approx(bounds.min_y, 0.0);
    assert_approx(bounds.max_x, 15.0);
    assert_approx(bounds.max_y, 10.0);
    assert_approx(bounds.width(), 10.0);
    assert_approx(bounds.height(), 10.0);
}

#[test]
fn point_and_segment_queries_return_the_hit_box() {
    let skeleton = skeleton();
    let mut bounds = SkeletonBounds::new();
    bounds.update(&skeleton, true);
    let hit = skeleton.slots[0].attachment;

    assert!(bounds.aabb_contains_point(10.0, 5.0));
    assert_eq!(bounds.contains_point(10.0, 5.0), hit);
    assert_eq!(bounds.contains_point(2.0, 5.0), None);

    assert!(bounds.aabb_intersects_segment(0.0, 4.0, 20.0, 6.0));
    assert_eq!(bounds.intersects_segment(0.0, 4.0, 20.0, 6.0), hit);
    assert!(!bounds.aabb_intersects_segment(0.0, 20.0, 20.0, 30.0));
    assert_eq!(bounds.intersects_segment(0.0, 20.0, 20.0, 30.0), None);

    let polygon = hit.and_then(|id| bounds.polygon(id)).expect("polygon for hit box");
    assert_eq!(polygon.vertices.len(), 8);
}

#[test]
fn update_without_aabb_leaves_an_empty_box() {
    let skeleton = skeleton();
    let mut bounds = SkeletonBounds::new();
    bounds.update(&skeleton, false);

    assert_eq!(bounds.polygons().len(), 1);
    assert_eq!(bounds.min_x, f32::MAX);
    assert_eq!(bounds.max_y, f32::MIN);
    assert!(!bounds.aabb_contains_point(10.0, 5.0));
}

#[test]
fn aabbs_of_two_skeletons_overlap() {
    let mut a = SkeletonBounds::new();
    a.update(&skeleton(), true);

    let mut moved = skeleton();
    moved.x = 8.0;
    moved.update_world_transform();
    let mut b = SkeletonBounds::new();
    b.update(&moved, true);
    assert!(a.aabb_intersects_skeleton(&b));

    moved.x = 50.0;
    moved.update_world_transform();
    b.update(&moved, true);
    assert!(!a.aabb_intersects_skeleton(&b));
}

#[test]
fn polygon_containment_uses_even_odd_rule() {
    // A "U" opening upward.
    let u = Polygon {
        vertices: vec![0.0, 0.0, 30.0, 0.0, 30.0, 30.0, 20.0, 30.0, 20.0, 10.0, 10.0, 10.0, 10.0, 30.0, 0.0, 30.0],
    };
    assert!(u.contains_point(5.0, 20.0));
    assert!(u.contains_point(15.0, 5.0));
    assert!(!u.contains_point(15.0, 20.0));
    assert!(!u.contains_point(40.0, 5.0));

    assert!(u.intersects_segment(15.0, 20.0, 15.0, 5.0));
    assert!(!u.intersects_segment(12.0, 20.0, 18.0, 25.0));

    assert!(!Polygon { vertices: vec![0.0, 0.0, 1.0, 1.0] }.contains_point(0.5, 0.5));
}
