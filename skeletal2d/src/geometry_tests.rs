use crate::geometry::{SkeletonClipping, Triangulator, make_clockwise};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 0.001,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn triangle_area(vertices: &[f32], tri: &[u16]) -> f32 {
    let (a, b, c) = (tri[0] as usize * 2, tri[1] as usize * 2, tri[2] as usize * 2);
    ((vertices[b] - vertices[a]) * (vertices[c + 1] - vertices[a + 1])
        - (vertices[c] - vertices[a]) * (vertices[b + 1] - vertices[a + 1]))
        .abs()
        * 0.5
}

fn polygon_area(vertices: &[f32]) -> f32 {
    let n = vertices.len() / 2;
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += vertices[i * 2] * vertices[j * 2 + 1] - vertices[j * 2] * vertices[i * 2 + 1];
    }
    sum.abs() * 0.5
}

#[test]
fn triangulator_matches_spine_c_unit_test_rectangle() {
    let mut triangulator = Triangulator::new();

    let polygon = vec![0.0, 0.0, 100.0, 0.0, 100.0, 100.0, 0.0, 100.0];
    let triangles = triangulator.triangulate(&polygon).to_vec();
    assert_eq!(triangles, vec![3, 0, 1, 3, 1, 2]);

    let polys = triangulator.decompose(&polygon, &triangles);
    assert_eq!(polys.len(), 1);
    let expected = [0.0, 100.0, 0.0, 0.0, 100.0, 0.0, 100.0, 100.0];
    assert_eq!(polys[0].len(), expected.len());
    for (actual, expected) in polys[0].iter().copied().zip(expected) {
        assert_approx(actual, expected);
    }
}

#[test]
fn triangulator_splits_convex_polygon_into_n_minus_two_triangles() {
    let mut hexagon = Vec::new();
    for i in 0..6 {
        let angle = i as f32 * std::f32::consts::PI / 3.0;
        hexagon.push(50.0 * angle.cos());
        hexagon.push(50.0 * angle.sin());
    }
    make_clockwise(&mut hexagon);

    let mut triangulator = Triangulator::new();
    let triangles = triangulator.triangulate(&hexagon).to_vec();
    assert_eq!(triangles.len(), (6 - 2) * 3);
    assert!(triangles.iter().all(|&i| i < 6));

    let covered: f32 = triangles
        .chunks_exact(3)
        .map(|tri| triangle_area(&hexagon, tri))
        .sum();
    assert_approx(covered, polygon_area(&hexagon));
}

#[test]
fn decompose_absorbs_lone_triangles_continuing_an_earlier_polygon() {
    let mut pentagon = Vec::new();
    for i in 0..5 {
        let angle = i as f32 * 2.0 * std::f32::consts::PI / 5.0;
        pentagon.push(10.0 * angle.cos());
        pentagon.push(10.0 * angle.sin());
    }
    make_clockwise(&mut pentagon);
    let vertex = |i: usize| [pentagon[i * 2], pentagon[i * 2 + 1]];

    // No two consecutive triangles share a fan base, so only the merge pass
    // can join (0, 1, 2) with (0, 2, 4).
    let mut triangulator = Triangulator::new();
    let polygons = triangulator
        .decompose(&pentagon, &[0, 1, 2, 2, 3, 4, 0, 2, 4])
        .to_vec();
    assert_eq!(polygons.len(), 2);
    assert_eq!(polygons[0], [vertex(0), vertex(1), vertex(2), vertex(4)].concat());
    assert_eq!(polygons[1], [vertex(2), vertex(3), vertex(4)].concat());
}

#[test]
fn triangulator_tolerates_self_intersecting_input() {
    let bowtie = [0.0, 0.0, 10.0, 10.0, 10.0, 0.0, 0.0, 10.0];
    let mut triangulator = Triangulator::new();
    let triangles = triangulator.triangulate(&bowtie);
    assert_eq!(triangles.len(), 6);
    assert!(triangles.iter().all(|&i| i < 4));
}

#[test]
fn triangulator_ignores_degenerate_polygons() {
    let mut triangulator = Triangulator::new();
    assert!(triangulator.triangulate(&[0.0, 0.0, 1.0, 1.0]).is_empty());
    assert!(triangulator.convex_partition(&[]).is_empty());
}

#[test]
fn make_clockwise_reverses_counter_clockwise_polygons_only() {
    let mut polygon = [0.0, 50.0, 100.0, 50.0, 100.0, 70.0, 0.0, 70.0];
    make_clockwise(&mut polygon);
    assert_eq!(polygon, [0.0, 70.0, 100.0, 70.0, 100.0, 50.0, 0.0, 50.0]);

    let before = polygon;
    make_clockwise(&mut polygon);
    assert_eq!(polygon, before);
}

#[test]
fn skeleton_clipping_clip_triangles_matches_spine_c_unit_test() {
    let mut clipper = SkeletonClipping::new();

    let clip_polygon = [0.0, 50.0, 100.0, 50.0, 100.0, 70.0, 0.0, 70.0];
    assert!(clipper.clip_start_polygon(&clip_polygon, None) > 0);
    assert!(clipper.is_clipping());

    let vertices = [0.0, 0.0, 100.0, 0.0, 50.0, 150.0];
    let uvs = [0.0, 0.0, 1.0, 0.0, 0.5, 1.0];
    let indices: [u16; 3] = [0, 1, 2];
    clipper.clip_triangles(&vertices, &indices, &uvs, 2);

    let expected_vertices = [
        83.333328, 50.0, 76.666664, 70.0, 23.333334, 70.0, 16.666672, 50.0,
    ];
    assert_eq!(clipper.clipped_vertices().len(), expected_vertices.len());
    for (actual, expected) in clipper
        .clipped_vertices()
        .iter()
        .copied()
        .zip(expected_vertices)
    {
        assert_approx(actual, expected);
    }

    let expected_uvs = [
        0.833333, 0.333333, 0.766667, 0.466667, 0.233333, 0.466667, 0.166667, 0.333333,
    ];
    assert_eq!(clipper.clipped_uvs().len(), expected_uvs.len());
    for (actual, expected) in clipper.clipped_uvs().iter().copied().zip(expected_uvs) {
        assert_approx(actual, expected);
    }

    assert_eq!(clipper.clipped_triangles(), &[0, 1, 2, 0, 2, 3]);
}

#[test]
fn triangles_fully_outside_are_dropped_and_fully_inside_are_kept() {
    let mut clipper = SkeletonClipping::new();
    clipper.clip_start_polygon(&[0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0], None);

    let uvs = [0.0, 0.0, 1.0, 0.0, 0.5, 1.0];
    clipper.clip_triangles(&[20.0, 20.0, 30.0, 20.0, 25.0, 30.0], &[0, 1, 2], &uvs, 2);
    assert!(clipper.clipped_vertices().is_empty());
    assert!(clipper.clipped_triangles().is_empty());

    let inside = [2.0, 2.0, 8.0, 2.0, 5.0, 8.0];
    clipper.clip_triangles(&inside, &[0, 1, 2], &uvs, 2);
    assert_eq!(clipper.clipped_vertices(), &inside);
    assert_eq!(clipper.clipped_uvs(), &uvs);
    assert_eq!(clipper.clipped_triangles(), &[0, 1, 2]);
}

#[test]
fn clip_start_is_ignored_while_a_clip_is_active() {
    let mut clipper = SkeletonClipping::new();
    let square = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0];
    assert!(clipper.clip_start_polygon(&square, Some(3)) > 0);
    assert_eq!(clipper.clip_start_polygon(&square, Some(5)), 0);
    assert_eq!(clipper.end_slot(), Some(3));

    clipper.clip_end(4);
    assert!(clipper.is_clipping());
    clipper.clip_end(3);
    assert!(!clipper.is_clipping());
    assert!(clipper.clipping_polygons().is_empty());
}

#[test]
fn clip_start_needs_at_least_three_vertices() {
    let mut clipper = SkeletonClipping::new();
    assert_eq!(clipper.clip_start_polygon(&[0.0, 0.0, 10.0, 0.0], None), 0);
    assert!(!clipper.is_clipping());
}

#[test]
fn concave_clip_polygon_is_split_into_closed_convex_parts() {
    let l_shape = [0.0, 0.0, 0.0, 20.0, 10.0, 20.0, 10.0, 10.0, 20.0, 10.0, 20.0, 0.0];
    let mut clipper = SkeletonClipping::new();
    let count = clipper.clip_start_polygon(&l_shape, None);
    assert!(count >= 2, "expected a split, got {count} polygon(s)");
    assert_eq!(clipper.clipping_polygons().len(), count);
    for polygon in clipper.clipping_polygons() {
        let n = polygon.len();
        assert!(n >= 8);
        assert_eq!(polygon[0], polygon[n - 2]);
        assert_eq!(polygon[1], polygon[n - 1]);
    }

    clipper.clip_end_now();
    assert!(!clipper.is_clipping());
    clipper.clip_triangles(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0], &[0, 1, 2], &[0.0; 6], 2);
    assert!(clipper.clipped_vertices().is_empty());
}
