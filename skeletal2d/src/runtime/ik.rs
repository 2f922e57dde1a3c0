use super::bone::{Bone, LocalPose, RootFrame, WorldTransform, recip};
use crate::IkConstraintData;
use crate::math::{RAD_DEG, shortest_rotation};

const EPSILON: f32 = 1.0e-4;

#[derive(Clone, Debug)]
pub struct IkConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
    pub bend_direction: i32,
    pub active: bool,
}

impl IkConstraint {
    pub fn new(data_index: usize, data: &IkConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            mix: data.mix,
            softness: data.softness,
            compress: data.compress,
            stretch: data.stretch,
            uniform: data.uniform,
            bend_direction: data.bend_direction,
            active: false,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn set_to_setup_pose(&mut self, data: &IkConstraintData) {
        self.mix = data.mix;
        self.softness = data.softness;
        self.compress = data.compress;
        self.stretch = data.stretch;
        self.uniform = data.uniform;
        self.bend_direction = data.bend_direction;
    }

    /// Solves toward the target bone's world position and writes the result
    /// into the constrained bones' world transforms.
    pub fn apply(&self, bones: &mut [Bone], root: &RootFrame) {
        let Some(target) = bones.get(self.target) else {
            return;
        };
        let (target_x, target_y) = (target.world_x, target.world_y);
        match self.bones.as_slice() {
            [bone] => apply_ik_one(
                bones,
                *bone,
                target_x,
                target_y,
                self.compress,
                self.stretch,
                self.uniform,
                self.mix,
                root,
            ),
            [parent, child] => apply_ik_two(
                bones,
                *parent,
                *child,
                target_x,
                target_y,
                self.bend_direction,
                self.stretch,
                self.uniform,
                self.softness,
                self.mix,
                root,
            ),
            other => log::debug!("IK constraint with {} bones ignored", other.len()),
        }
    }
}

pub(crate) fn parent_world(bones: &[Bone], index: usize) -> Option<WorldTransform> {
    bones[index].parent_index().map(|p| bones[p].world())
}

pub(crate) fn refresh_applied(bones: &mut [Bone], index: usize, root: &RootFrame) {
    if !bones[index].is_applied_valid() {
        let parent = parent_world(bones, index);
        bones[index].update_applied_transform(parent.as_ref(), root);
    }
}

pub(crate) fn update_world_with(bones: &mut [Bone], index: usize, pose: LocalPose, root: &RootFrame) {
    let parent = parent_world(bones, index);
    bones[index].update_world_transform_with(pose, parent.as_ref(), root);
}

/// Rotates one bone so it points at the target. With `compress`/`stretch`
/// the bone's X scale is also adjusted so its tip reaches the target.
#[allow(clippy::too_many_arguments)]
pub fn apply_ik_one(
    bones: &mut [Bone],
    bone_index: usize,
    target_x: f32,
    target_y: f32,
    compress: bool,
    stretch: bool,
    uniform: bool,
    alpha: f32,
    root: &RootFrame,
) {
    refresh_applied(bones, bone_index, root);
    let parent = parent_world(bones, bone_index).unwrap_or_else(|| root.transform());
    let (pa, mut pb, pc, mut pd) = (parent.a, parent.b, parent.c, parent.d);

    let bone = &bones[bone_index];
    let pose = bone.applied_pose();
    let (world_x, world_y) = (bone.world_x, bone.world_y);
    let inherit = bone.inherit;
    let length = bone.length;

    let mut rotation_ik = -pose.shear_x - pose.rotation;
    let (mut tx, mut ty) = match inherit {
        crate::Inherit::OnlyTranslation => (
            (target_x - world_x) * root.scale_x.signum(),
            (target_y - world_y) * root.scale_y.signum(),
        ),
        _ => {
            if inherit == crate::Inherit::NoRotationOrReflection {
                let s = (pa * pd - pb * pc).abs() / (pa * pa + pc * pc).max(EPSILON);
                let sa = pa * recip(root.scale_x);
                let sc = pc * recip(root.scale_y);
                pb = -sc * s * root.scale_x;
                pd = sa * s * root.scale_y;
                rotation_ik += sc.atan2(sa) * RAD_DEG;
            }
            let x = target_x - parent.world_x;
            let y = target_y - parent.world_y;
            let det = pa * pd - pb * pc;
            if det.abs() <= EPSILON {
                (target_x - world_x, target_y - world_y)
            } else {
                ((x * pd - y * pb) / det - pose.x, (y * pa - x * pc) / det - pose.y)
            }
        }
    };

    rotation_ik += ty.atan2(tx) * RAD_DEG;
    if pose.scale_x < 0.0 {
        rotation_ik += 180.0;
    }
    rotation_ik = shortest_rotation(rotation_ik);

    let mut sx = pose.scale_x;
    let mut sy = pose.scale_y;
    if compress || stretch {
        if matches!(
            inherit,
            crate::Inherit::NoScale | crate::Inherit::NoScaleOrReflection
        ) {
            tx = target_x - world_x;
            ty = target_y - world_y;
        }
        let b = length * sx;
        let dd = (tx * tx + ty * ty).sqrt();
        if b > EPSILON && ((compress && dd < b) || (stretch && dd > b)) {
            let s = (dd / b - 1.0) * alpha + 1.0;
            sx *= s;
            if uniform {
                sy *= s;
            }
        }
    }

    let solved = LocalPose {
        rotation: pose.rotation + rotation_ik * alpha,
        scale_x: sx,
        scale_y: sy,
        ..pose
    };
    update_world_with(bones, bone_index, solved, root);
}

/// Bends a parent/child chain so the child's tip reaches the target.
/// `bend_direction` picks the elbow side; `softness` eases the limb toward
/// full extension instead of snapping straight.
#[allow(clippy::too_many_arguments)]
pub fn apply_ik_two(
    bones: &mut [Bone],
    parent_index: usize,
    child_index: usize,
    target_x: f32,
    target_y: f32,
    bend_direction: i32,
    stretch: bool,
    uniform: bool,
    softness: f32,
    alpha: f32,
    root: &RootFrame,
) {
    const PI: f32 = std::f32::consts::PI;

    if alpha == 0.0 {
        let pose = bones[child_index].local_pose();
        update_world_with(bones, child_index, pose, root);
        return;
    }
    refresh_applied(bones, parent_index, root);
    refresh_applied(bones, child_index, root);

    let parent_pose = bones[parent_index].applied_pose();
    let child_pose = bones[child_index].applied_pose();
    let child_length = bones[child_index].length;
    let (px, py) = (parent_pose.x, parent_pose.y);
    let mut sx = parent_pose.scale_x;
    let mut sy = parent_pose.scale_y;

    let mut psx = parent_pose.scale_x;
    let mut psy = parent_pose.scale_y;
    let mut os1 = 0.0f32;
    let mut s2 = 1.0f32;
    if psx < 0.0 {
        psx = -psx;
        os1 = 180.0;
        s2 = -1.0;
    }
    if psy < 0.0 {
        psy = -psy;
        s2 = -s2;
    }
    let mut csx = child_pose.scale_x;
    let mut os2 = 0.0f32;
    if csx < 0.0 {
        csx = -csx;
        os2 = 180.0;
    }

    let parent = bones[parent_index].world();
    let cx = child_pose.x;
    let u = (psx - psy).abs() <= EPSILON;
    let (cy, cwx, cwy) = if u {
        let cy = child_pose.y;
        (
            cy,
            parent.a * cx + parent.b * cy + parent.world_x,
            parent.c * cx + parent.d * cy + parent.world_y,
        )
    } else {
        (
            0.0,
            parent.a * cx + parent.world_x,
            parent.c * cx + parent.world_y,
        )
    };

    let pp = parent_world(bones, parent_index).unwrap_or_else(|| root.transform());
    let det = pp.a * pp.d - pp.b * pp.c;
    let id = if det.abs() <= EPSILON { 0.0 } else { 1.0 / det };
    let x = cwx - pp.world_x;
    let y = cwy - pp.world_y;
    let dx = (x * pp.d - y * pp.b) * id - px;
    let dy = (y * pp.a - x * pp.c) * id - py;
    let l1 = (dx * dx + dy * dy).sqrt();
    let mut l2 = child_length * csx;

    if l1 < EPSILON {
        apply_ik_one(
            bones,
            parent_index,
            target_x,
            target_y,
            false,
            stretch,
            false,
            alpha,
            root,
        );
        let pose = LocalPose {
            x: cx,
            y: cy,
            rotation: 0.0,
            ..child_pose
        };
        update_world_with(bones, child_index, pose, root);
        return;
    }

    let x = target_x - pp.world_x;
    let y = target_y - pp.world_y;
    let mut tx = (x * pp.d - y * pp.b) * id - px;
    let mut ty = (y * pp.a - x * pp.c) * id - py;
    let mut dd = tx * tx + ty * ty;

    if softness != 0.0 {
        let softness = softness * psx * (csx + 1.0) * 0.5;
        let td = dd.sqrt();
        let sd = td - l1 - l2 * psx + softness;
        if sd > 0.0 {
            let mut p = (sd / (softness * 2.0)).min(1.0) - 1.0;
            p = (sd - softness * (1.0 - p * p)) / td;
            tx -= p * tx;
            ty -= p * ty;
            dd = tx * tx + ty * ty;
        }
    }

    let bend_dir = if bend_direction >= 0 { 1.0 } else { -1.0 };
    let mut a1;
    let mut a2;
    if u {
        l2 *= psx;
        let mut cos = (dd - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);
        if cos < -1.0 {
            cos = -1.0;
        } else if cos > 1.0 {
            cos = 1.0;
            if stretch {
                let s = (dd.sqrt() / (l1 + l2) - 1.0) * alpha + 1.0;
                sx *= s;
                if uniform {
                    sy *= s;
                }
            }
        }
        a2 = cos.acos() * bend_dir;
        let a = l1 + l2 * cos;
        let b = l2 * a2.sin();
        a1 = (ty * a - tx * b).atan2(tx * a + ty * b);
    } else {
        let a = psx * l2;
        let b = psy * l2;
        let aa = a * a;
        let bb = b * b;
        let ta = ty.atan2(tx);
        let c0 = bb * l1 * l1 + aa * dd - aa * bb;
        let c1 = -2.0 * bb * l1;
        let c2 = bb - aa;
        let disc = c1 * c1 - 4.0 * c2 * c0;

        let mut root_angles = None;
        if disc >= 0.0 {
            let mut q = disc.sqrt();
            if c1 < 0.0 {
                q = -q;
            }
            q = -(c1 + q) * 0.5;
            let r0 = q / c2;
            let r1 = c0 / q;
            let r = if r0.abs() < r1.abs() { r0 } else { r1 };
            if r * r <= dd {
                let y = (dd - r * r).sqrt() * bend_dir;
                root_angles = Some((ta - y.atan2(r), (y / psy).atan2((r - l1) / psx)));
            }
        }

        // No exact root: take the closest or farthest reachable point of the
        // child's elliptical orbit.
        (a1, a2) = root_angles.unwrap_or_else(|| {
            let mut min_angle = PI;
            let mut min_x = l1 - a;
            let mut min_dist = min_x * min_x;
            let mut min_y = 0.0f32;
            let mut max_angle = 0.0f32;
            let mut max_x = l1 + a;
            let mut max_dist = max_x * max_x;
            let mut max_y = 0.0f32;
            let c = -a * l1 / (aa - bb);
            if (-1.0..=1.0).contains(&c) {
                let c = c.acos();
                let x = a * c.cos() + l1;
                let y = b * c.sin();
                let d = x * x + y * y;
                if d < min_dist {
                    min_angle = c;
                    min_dist = d;
                    min_x = x;
                    min_y = y;
                }
                if d > max_dist {
                    max_angle = c;
                    max_dist = d;
                    max_x = x;
                    max_y = y;
                }
            }
            if dd <= (min_dist + max_dist) * 0.5 {
                (ta - (min_y * bend_dir).atan2(min_x), min_angle * bend_dir)
            } else {
                (ta - (max_y * bend_dir).atan2(max_x), max_angle * bend_dir)
            }
        });
    }

    let os = cy.atan2(cx) * s2;

    a1 = (a1 - os) * RAD_DEG + os1 - parent_pose.rotation;
    if a1 > 180.0 {
        a1 -= 360.0;
    } else if a1 < -180.0 {
        a1 += 360.0;
    }
    let solved_parent = LocalPose {
        x: px,
        y: py,
        rotation: parent_pose.rotation + a1 * alpha,
        scale_x: sx,
        scale_y: sy,
        shear_x: 0.0,
        shear_y: 0.0,
    };
    update_world_with(bones, parent_index, solved_parent, root);

    a2 = ((a2 + os) * RAD_DEG - child_pose.shear_x) * s2 + os2 - child_pose.rotation;
    if a2 > 180.0 {
        a2 -= 360.0;
    } else if a2 < -180.0 {
        a2 += 360.0;
    }
    let solved_child = LocalPose {
        x: cx,
        y: cy,
        rotation: child_pose.rotation + a2 * alpha,
        ..child_pose
    };
    update_world_with(bones, child_index, solved_child, root);
}
