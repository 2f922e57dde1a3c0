use super::bone::{Bone, LocalPose, RootFrame};
use super::ik::{refresh_applied, update_world_with};
use crate::TransformConstraintData;
use crate::math::{DEG_RAD, shortest_rotation, wrap_pi};

#[derive(Clone, Debug)]
pub struct TransformConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix_rotate: f32,
    pub mix_translate: f32,
    pub mix_scale: f32,
    pub mix_shear: f32,
    pub active: bool,
}

impl TransformConstraint {
    pub fn new(data_index: usize, data: &TransformConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            mix_rotate: data.mix_rotate,
            mix_translate: data.mix_translate,
            mix_scale: data.mix_scale,
            mix_shear: data.mix_shear,
            active: false,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn set_to_setup_pose(&mut self, data: &TransformConstraintData) {
        self.mix_rotate = data.mix_rotate;
        self.mix_translate = data.mix_translate;
        self.mix_scale = data.mix_scale;
        self.mix_shear = data.mix_shear;
    }

    /// Blends the target's transform into every constrained bone. With all
    /// mixes at zero the world variants leave the bones untouched and the
    /// local variants recompute them from their unchanged pose.
    pub fn apply(&self, data: &TransformConstraintData, bones: &mut [Bone], root: &RootFrame) {
        if self.target >= bones.len() {
            return;
        }
        match (data.local, data.relative) {
            (true, false) => self.apply_absolute_local(data, bones, root),
            (true, true) => self.apply_relative_local(data, bones, root),
            _ if self.mixes_are_zero() => {}
            (false, false) => self.apply_absolute_world(data, bones),
            (false, true) => self.apply_relative_world(data, bones),
        }
    }

    fn mixes_are_zero(&self) -> bool {
        self.mix_rotate == 0.0
            && self.mix_translate == 0.0
            && self.mix_scale == 0.0
            && self.mix_shear == 0.0
    }

    fn apply_absolute_world(&self, data: &TransformConstraintData, bones: &mut [Bone]) {
        let target = bones[self.target].clone();
        let (ta, tb, tc, td) = (target.a, target.b, target.c, target.d);
        let deg_rad_reflect = if ta * td - tb * tc > 0.0 {
            DEG_RAD
        } else {
            -DEG_RAD
        };
        let offset_rotation = data.offset_rotation * deg_rad_reflect;
        let offset_shear_y = data.offset_shear_y * deg_rad_reflect;
        let [offset_x, offset_y] = target.local_to_world(data.offset_x, data.offset_y);

        for &index in &self.bones {
            let Some(bone) = bones.get_mut(index) else {
                continue;
            };
            let mut modified = false;

            if self.mix_rotate != 0.0 {
                let r = tc.atan2(ta) - bone.c.atan2(bone.a) + offset_rotation;
                rotate_world_radians(bone, wrap_pi(r) * self.mix_rotate);
                modified = true;
            }

            if self.mix_translate != 0.0 {
                bone.world_x += (offset_x - bone.world_x) * self.mix_translate;
                bone.world_y += (offset_y - bone.world_y) * self.mix_translate;
                modified = true;
            }

            if self.mix_scale > 0.0 {
                let mut s = (bone.a * bone.a + bone.c * bone.c).sqrt();
                let ts = (ta * ta + tc * tc).sqrt();
                if s > 1.0e-5 {
                    s = (s + (ts - s + data.offset_scale_x) * self.mix_scale) / s;
                }
                bone.a *= s;
                bone.c *= s;
                let mut s = (bone.b * bone.b + bone.d * bone.d).sqrt();
                let ts = (tb * tb + td * td).sqrt();
                if s > 1.0e-5 {
                    s = (s + (ts - s + data.offset_scale_y) * self.mix_scale) / s;
                }
                bone.b *= s;
                bone.d *= s;
                modified = true;
            }

            if self.mix_shear > 0.0 {
                let (b, d) = (bone.b, bone.d);
                let by = d.atan2(b);
                let r = td.atan2(tb) - tc.atan2(ta) - (by - bone.c.atan2(bone.a));
                let s = (b * b + d * d).sqrt();
                let r = by + (wrap_pi(r) + offset_shear_y) * self.mix_shear;
                bone.b = r.cos() * s;
                bone.d = r.sin() * s;
                modified = true;
            }

            if modified {
                bone.invalidate_applied();
            }
        }
    }

    fn apply_relative_world(&self, data: &TransformConstraintData, bones: &mut [Bone]) {
        let target = bones[self.target].clone();
        let (ta, tb, tc, td) = (target.a, target.b, target.c, target.d);
        let deg_rad_reflect = if ta * td - tb * tc > 0.0 {
            DEG_RAD
        } else {
            -DEG_RAD
        };
        let offset_rotation = data.offset_rotation * deg_rad_reflect;
        let offset_shear_y = data.offset_shear_y * deg_rad_reflect;
        let [offset_x, offset_y] = target.local_to_world(data.offset_x, data.offset_y);

        for &index in &self.bones {
            let Some(bone) = bones.get_mut(index) else {
                continue;
            };

            if self.mix_rotate != 0.0 {
                let r = tc.atan2(ta) + offset_rotation;
                rotate_world_radians(bone, wrap_pi(r) * self.mix_rotate);
            }

            if self.mix_translate != 0.0 {
                bone.world_x += offset_x * self.mix_translate;
                bone.world_y += offset_y * self.mix_translate;
            }

            if self.mix_scale > 0.0 {
                let s = ((ta * ta + tc * tc).sqrt() - 1.0 + data.offset_scale_x) * self.mix_scale
                    + 1.0;
                bone.a *= s;
                bone.c *= s;
                let s = ((tb * tb + td * td).sqrt() - 1.0 + data.offset_scale_y) * self.mix_scale
                    + 1.0;
                bone.b *= s;
                bone.d *= s;
            }

            if self.mix_shear > 0.0 {
                let r = wrap_pi(td.atan2(tb) - tc.atan2(ta));
                let (b, d) = (bone.b, bone.d);
                let by = d.atan2(b)
                    + (r - std::f32::consts::FRAC_PI_2 + offset_shear_y) * self.mix_shear;
                let s = (b * b + d * d).sqrt();
                bone.b = by.cos() * s;
                bone.d = by.sin() * s;
            }

            bone.invalidate_applied();
        }
    }

    fn apply_absolute_local(
        &self,
        data: &TransformConstraintData,
        bones: &mut [Bone],
        root: &RootFrame,
    ) {
        refresh_applied(bones, self.target, root);
        let target = bones[self.target].applied_pose();

        for &index in &self.bones {
            if index >= bones.len() {
                continue;
            }
            refresh_applied(bones, index, root);
            let pose = bones[index].applied_pose();

            let mut rotation = pose.rotation;
            if self.mix_rotate != 0.0 {
                let r = shortest_rotation(target.rotation - rotation + data.offset_rotation);
                rotation += r * self.mix_rotate;
            }

            let mut x = pose.x;
            let mut y = pose.y;
            if self.mix_translate != 0.0 {
                x += (target.x - x + data.offset_x) * self.mix_translate;
                y += (target.y - y + data.offset_y) * self.mix_translate;
            }

            let mut scale_x = pose.scale_x;
            let mut scale_y = pose.scale_y;
            if self.mix_scale != 0.0 {
                if scale_x > 1.0e-5 {
                    scale_x = (scale_x
                        + (target.scale_x - scale_x + data.offset_scale_x) * self.mix_scale)
                        / scale_x;
                }
                if scale_y > 1.0e-5 {
                    scale_y = (scale_y
                        + (target.scale_y - scale_y + data.offset_scale_y) * self.mix_scale)
                        / scale_y;
                }
            }

            let mut shear_y = pose.shear_y;
            if self.mix_shear != 0.0 {
                let r = shortest_rotation(target.shear_y - shear_y + data.offset_shear_y);
                shear_y += r * self.mix_shear;
            }

            let solved = LocalPose {
                x,
                y,
                rotation,
                scale_x,
                scale_y,
                shear_x: pose.shear_x,
                shear_y,
            };
            update_world_with(bones, index, solved, root);
        }
    }

    fn apply_relative_local(
        &self,
        data: &TransformConstraintData,
        bones: &mut [Bone],
        root: &RootFrame,
    ) {
        refresh_applied(bones, self.target, root);
        let target = bones[self.target].applied_pose();

        for &index in &self.bones {
            if index >= bones.len() {
                continue;
            }
            refresh_applied(bones, index, root);
            let pose = bones[index].applied_pose();

            let mut rotation = pose.rotation;
            if self.mix_rotate != 0.0 {
                rotation += (target.rotation + data.offset_rotation) * self.mix_rotate;
            }

            let mut x = pose.x;
            let mut y = pose.y;
            if self.mix_translate != 0.0 {
                x += (target.x + data.offset_x) * self.mix_translate;
                y += (target.y + data.offset_y) * self.mix_translate;
            }

            let mut scale_x = pose.scale_x;
            let mut scale_y = pose.scale_y;
            if self.mix_scale != 0.0 {
                if scale_x > 1.0e-5 {
                    scale_x *= (target.scale_x - 1.0 + data.offset_scale_x) * self.mix_scale + 1.0;
                }
                if scale_y > 1.0e-5 {
                    scale_y *= (target.scale_y - 1.0 + data.offset_scale_y) * self.mix_scale + 1.0;
                }
            }

            let mut shear_y = pose.shear_y;
            if self.mix_shear != 0.0 {
                shear_y += (target.shear_y + data.offset_shear_y) * self.mix_shear;
            }

            let solved = LocalPose {
                x,
                y,
                rotation,
                scale_x,
                scale_y,
                shear_x: pose.shear_x,
                shear_y,
            };
            update_world_with(bones, index, solved, root);
        }
    }
}

fn rotate_world_radians(bone: &mut Bone, r: f32) {
    let cos = r.cos();
    let sin = r.sin();
    let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
    bone.a = cos * a - sin * c;
    bone.b = cos * b - sin * d;
    bone.c = sin * a + cos * c;
    bone.d = sin * b + cos * d;
}
