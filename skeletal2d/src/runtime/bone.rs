use crate::{BoneData, Inherit};

/// The seven scalar pose parameters of a bone, in degrees where angular.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LocalPose {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
}

impl LocalPose {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        shear_x: 0.0,
        shear_y: 0.0,
    };
}

impl Default for LocalPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<&BoneData> for LocalPose {
    fn from(data: &BoneData) -> Self {
        Self {
            x: data.x,
            y: data.y,
            rotation: data.rotation,
            scale_x: data.scale_x,
            scale_y: data.scale_y,
            shear_x: data.shear_x,
            shear_y: data.shear_y,
        }
    }
}

/// A 2x3 affine transform: `[a b world_x; c d world_y]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WorldTransform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
}

impl WorldTransform {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        world_x: 0.0,
        world_y: 0.0,
    };

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    pub fn transform_point(&self, x: f32, y: f32) -> [f32; 2] {
        [
            x * self.a + y * self.b + self.world_x,
            x * self.c + y * self.d + self.world_y,
        ]
    }
}

#[cfg(feature = "glam")]
impl From<WorldTransform> for glam::Affine2 {
    fn from(t: WorldTransform) -> Self {
        glam::Affine2::from_cols_array(&[t.a, t.c, t.b, t.d, t.world_x, t.world_y])
    }
}

/// Placement of the skeleton itself. Root bones are transformed by it
/// directly; `scale_y` already carries the Y-down sign.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RootFrame {
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl RootFrame {
    pub fn new(x: f32, y: f32, scale_x: f32, scale_y: f32, y_down: bool) -> Self {
        Self {
            x,
            y,
            scale_x,
            scale_y: if y_down { -scale_y } else { scale_y },
        }
    }

    /// The frame as if it were the world transform of a parent bone.
    pub fn transform(&self) -> WorldTransform {
        WorldTransform {
            a: self.scale_x,
            b: 0.0,
            c: 0.0,
            d: self.scale_y,
            world_x: self.x,
            world_y: self.y,
        }
    }
}

impl Default for RootFrame {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0, false)
    }
}

#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,

    pub inherit: Inherit,
    pub active: bool,
    /// Copied from [`BoneData::length`]; read by IK.
    pub length: f32,

    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,

    pub ax: f32,
    pub ay: f32,
    pub arotation: f32,
    pub ascale_x: f32,
    pub ascale_y: f32,
    pub ashear_x: f32,
    pub ashear_y: f32,

    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,

    applied_valid: bool,
}

impl Bone {
    pub fn new(data_index: usize, data: &BoneData) -> Self {
        let pose = LocalPose::from(data);
        let mut bone = Self {
            data_index,
            parent: data.parent,
            inherit: data.inherit,
            active: true,
            length: data.length,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            ax: 0.0,
            ay: 0.0,
            arotation: 0.0,
            ascale_x: 1.0,
            ascale_y: 1.0,
            ashear_x: 0.0,
            ashear_y: 0.0,
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            world_x: 0.0,
            world_y: 0.0,
            applied_valid: false,
        };
        bone.set_local_pose(pose);
        bone
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn set_to_setup_pose(&mut self, data: &BoneData) {
        self.set_local_pose(LocalPose::from(data));
        self.inherit = data.inherit;
        self.length = data.length;
    }

    pub fn local_pose(&self) -> LocalPose {
        LocalPose {
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            shear_x: self.shear_x,
            shear_y: self.shear_y,
        }
    }

    pub fn set_local_pose(&mut self, pose: LocalPose) {
        self.x = pose.x;
        self.y = pose.y;
        self.rotation = pose.rotation;
        self.scale_x = pose.scale_x;
        self.scale_y = pose.scale_y;
        self.shear_x = pose.shear_x;
        self.shear_y = pose.shear_y;
    }

    /// The pose last used to compute the world transform. Only meaningful
    /// while [`Bone::is_applied_valid`] holds.
    pub fn applied_pose(&self) -> LocalPose {
        LocalPose {
            x: self.ax,
            y: self.ay,
            rotation: self.arotation,
            scale_x: self.ascale_x,
            scale_y: self.ascale_y,
            shear_x: self.ashear_x,
            shear_y: self.ashear_y,
        }
    }

    /// Resets the applied pose from the local pose.
    pub fn reset_applied(&mut self) {
        self.set_applied(self.local_pose());
    }

    pub fn is_applied_valid(&self) -> bool {
        self.applied_valid
    }

    /// Marks the applied pose stale after the world transform was edited
    /// directly.
    pub fn invalidate_applied(&mut self) {
        self.applied_valid = false;
    }

    pub fn world(&self) -> WorldTransform {
        WorldTransform {
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
            world_x: self.world_x,
            world_y: self.world_y,
        }
    }

    pub fn set_world(&mut self, world: WorldTransform) {
        self.a = world.a;
        self.b = world.b;
        self.c = world.c;
        self.d = world.d;
        self.world_x = world.world_x;
        self.world_y = world.world_y;
        self.applied_valid = false;
    }

    /// Computes the world transform from the local pose.
    pub fn update_world_transform(&mut self, parent: Option<&WorldTransform>, root: &RootFrame) {
        self.update_world_transform_with(self.local_pose(), parent, root);
    }

    /// Computes the world transform from `pose` and stores `pose` as the
    /// applied pose. `parent` is the world transform of the parent bone, or
    /// `None` for a root bone, which is placed by `root` instead.
    pub fn update_world_transform_with(
        &mut self,
        pose: LocalPose,
        parent: Option<&WorldTransform>,
        root: &RootFrame,
    ) {
        self.set_applied(pose);

        let Some(parent) = parent else {
            let (la, lb, lc, ld) =
                local_matrix(pose.rotation, pose.shear_x, pose.shear_y, pose.scale_x, pose.scale_y);
            let sx = root.scale_x;
            let sy = root.scale_y;
            self.a = la * sx;
            self.b = lb * sx;
            self.c = lc * sy;
            self.d = ld * sy;
            self.world_x = pose.x * sx + root.x;
            self.world_y = pose.y * sy + root.y;
            return;
        };

        let mut pa = parent.a;
        let mut pb = parent.b;
        let mut pc = parent.c;
        let mut pd = parent.d;
        let skeleton_scale_x = root.scale_x;
        let skeleton_scale_y = root.scale_y;

        self.world_x = pa * pose.x + pb * pose.y + parent.world_x;
        self.world_y = pc * pose.x + pd * pose.y + parent.world_y;

        match self.inherit {
            Inherit::Normal => {
                let (la, lb, lc, ld) = local_matrix(
                    pose.rotation,
                    pose.shear_x,
                    pose.shear_y,
                    pose.scale_x,
                    pose.scale_y,
                );
                self.a = pa * la + pb * lc;
                self.b = pa * lb + pb * ld;
                self.c = pc * la + pd * lc;
                self.d = pc * lb + pd * ld;
            }
            Inherit::OnlyTranslation => {
                let (la, lb, lc, ld) = local_matrix(
                    pose.rotation,
                    pose.shear_x,
                    pose.shear_y,
                    pose.scale_x,
                    pose.scale_y,
                );
                self.a = la * skeleton_scale_x;
                self.b = lb * skeleton_scale_x;
                self.c = lc * skeleton_scale_y;
                self.d = ld * skeleton_scale_y;
            }
            Inherit::NoRotationOrReflection => {
                let sx = recip(skeleton_scale_x);
                let sy = recip(skeleton_scale_y);
                pa *= sx;
                pc *= sy;

                let mut s = pa * pa + pc * pc;
                let prx;
                if s > 1.0e-4 {
                    s = (pa * pd * sy - pb * sx * pc).abs() / s;
                    pb = pc * s;
                    pd = pa * s;
                    prx = pc.atan2(pa).to_degrees();
                } else {
                    pa = 0.0;
                    pc = 0.0;
                    prx = 90.0 - pd.atan2(pb).to_degrees();
                }

                let (la, lb, lc, ld) = local_matrix(
                    pose.rotation - prx,
                    pose.shear_x,
                    pose.shear_y,
                    pose.scale_x,
                    pose.scale_y,
                );
                self.a = (pa * la - pb * lc) * skeleton_scale_x;
                self.b = (pa * lb - pb * ld) * skeleton_scale_x;
                self.c = (pc * la + pd * lc) * skeleton_scale_y;
                self.d = (pc * lb + pd * ld) * skeleton_scale_y;
            }
            Inherit::NoScale | Inherit::NoScaleOrReflection => {
                let rotation = pose.rotation.to_radians();
                let cos = rotation.cos();
                let sin = rotation.sin();

                let za = (pa * cos + pb * sin) * recip(skeleton_scale_x);
                let zc = (pc * cos + pd * sin) * recip(skeleton_scale_y);
                let mut s = (za * za + zc * zc).sqrt();
                if s > 1.0e-5 {
                    s = 1.0 / s;
                }
                let za = za * s;
                let zc = zc * s;

                let mut s = (za * za + zc * zc).sqrt();
                if self.inherit == Inherit::NoScale {
                    let flip = (parent.determinant() < 0.0)
                        != ((skeleton_scale_x < 0.0) != (skeleton_scale_y < 0.0));
                    if flip {
                        s = -s;
                    }
                }

                let r = std::f32::consts::FRAC_PI_2 + zc.atan2(za);
                let zb = r.cos() * s;
                let zd = r.sin() * s;

                let (la, lb, lc, ld) =
                    local_matrix(0.0, pose.shear_x, pose.shear_y, pose.scale_x, pose.scale_y);
                self.a = (za * la + zb * lc) * skeleton_scale_x;
                self.b = (za * lb + zb * ld) * skeleton_scale_x;
                self.c = (zc * la + zd * lc) * skeleton_scale_y;
                self.d = (zc * lb + zd * ld) * skeleton_scale_y;
            }
        }
    }

    /// Recomputes the applied pose from the current world transform, so that
    /// feeding it back through [`Bone::update_world_transform_with`]
    /// reproduces the world transform.
    ///
    /// The decomposition is not unique: a scale of `(-1, -1)` and a rotation
    /// of 180 degrees yield the same matrix, and the rotation form is chosen.
    pub fn update_applied_transform(&mut self, parent: Option<&WorldTransform>, root: &RootFrame) {
        let (p, inherit) = match parent {
            Some(p) => (*p, self.inherit),
            None => (root.transform(), Inherit::Normal),
        };
        let (pa, mut pb, pc, mut pd) = (p.a, p.b, p.c, p.d);
        let det = pa * pd - pb * pc;
        let mut pid = recip(det);
        let mut ia = pd * pid;
        let mut ib = pb * pid;
        let mut ic = pc * pid;
        let mut id = pa * pid;

        let dx = self.world_x - p.world_x;
        let dy = self.world_y - p.world_y;
        self.ax = dx * ia - dy * ib;
        self.ay = dy * id - dx * ic;

        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        let (ra, rb, rc, rd) = if inherit == Inherit::OnlyTranslation {
            let sx = recip(root.scale_x);
            let sy = recip(root.scale_y);
            (a * sx, b * sx, c * sy, d * sy)
        } else {
            match inherit {
                Inherit::NoRotationOrReflection => {
                    let s = det.abs() * recip(pa * pa + pc * pc);
                    pb = -pc * root.scale_x * s * recip(root.scale_y);
                    pd = pa * root.scale_y * s * recip(root.scale_x);
                    pid = recip(pa * pd - pb * pc);
                    ia = pd * pid;
                    ib = pb * pid;
                }
                Inherit::NoScale | Inherit::NoScaleOrReflection => {
                    let r = self.arotation.to_radians();
                    let cos = r.cos();
                    let sin = r.sin();
                    let mut pa = (pa * cos + pb * sin) * recip(root.scale_x);
                    let mut pc = (pc * cos + pd * sin) * recip(root.scale_y);
                    let mut s = (pa * pa + pc * pc).sqrt();
                    if s > 1.0e-5 {
                        s = 1.0 / s;
                    }
                    pa *= s;
                    pc *= s;
                    s = (pa * pa + pc * pc).sqrt();
                    if inherit == Inherit::NoScale {
                        let flip = (det < 0.0) != ((root.scale_x < 0.0) != (root.scale_y < 0.0));
                        if flip {
                            s = -s;
                        }
                    }
                    let r = std::f32::consts::FRAC_PI_2 + pc.atan2(pa);
                    pb = r.cos() * s;
                    pd = r.sin() * s;
                    pid = recip(pa * pd - pb * pc);
                    ia = pd * pid;
                    ib = pb * pid;
                    ic = pc * pid;
                    id = pa * pid;
                }
                _ => {}
            }
            (
                ia * a - ib * c,
                ia * b - ib * d,
                id * c - ic * a,
                id * d - ic * b,
            )
        };

        self.ashear_x = 0.0;
        self.ascale_x = (ra * ra + rc * rc).sqrt();
        if self.ascale_x > 1.0e-4 {
            let det = ra * rd - rb * rc;
            self.ascale_y = det / self.ascale_x;
            self.ashear_y = -(ra * rb + rc * rd).atan2(det).to_degrees();
            self.arotation = rc.atan2(ra).to_degrees();
        } else {
            self.ascale_x = 0.0;
            self.ascale_y = (rb * rb + rd * rd).sqrt();
            self.ashear_y = 0.0;
            self.arotation = 90.0 - rd.atan2(rb).to_degrees();
        }
        self.applied_valid = true;
    }

    pub fn world_rotation_x(&self) -> f32 {
        self.c.atan2(self.a).to_degrees()
    }

    pub fn world_rotation_y(&self) -> f32 {
        self.d.atan2(self.b).to_degrees()
    }

    pub fn world_scale_x(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    pub fn world_scale_y(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }

    pub fn world_to_local(&self, world_x: f32, world_y: f32) -> [f32; 2] {
        let inv_det = recip(self.a * self.d - self.b * self.c);
        let x = world_x - self.world_x;
        let y = world_y - self.world_y;
        [
            (x * self.d - y * self.b) * inv_det,
            (y * self.a - x * self.c) * inv_det,
        ]
    }

    pub fn local_to_world(&self, local_x: f32, local_y: f32) -> [f32; 2] {
        self.world().transform_point(local_x, local_y)
    }

    pub fn world_to_local_rotation(&self, world_rotation: f32) -> f32 {
        let r = world_rotation.to_radians();
        let sin = r.sin();
        let cos = r.cos();
        (self.a * sin - self.c * cos)
            .atan2(self.d * cos - self.b * sin)
            .to_degrees()
            + self.rotation
            - self.shear_x
    }

    pub fn local_to_world_rotation(&self, local_rotation: f32) -> f32 {
        let r = (local_rotation - self.rotation + self.shear_x).to_radians();
        let sin = r.sin();
        let cos = r.cos();
        (cos * self.c + sin * self.d)
            .atan2(cos * self.a + sin * self.b)
            .to_degrees()
    }

    /// Rotates the world transform in place. The applied pose becomes stale.
    pub fn rotate_world(&mut self, degrees: f32) {
        let r = degrees.to_radians();
        let cos = r.cos();
        let sin = r.sin();
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        self.a = cos * a - sin * c;
        self.b = cos * b - sin * d;
        self.c = sin * a + cos * c;
        self.d = sin * b + cos * d;
        self.applied_valid = false;
    }

    fn set_applied(&mut self, pose: LocalPose) {
        self.ax = pose.x;
        self.ay = pose.y;
        self.arotation = pose.rotation;
        self.ascale_x = pose.scale_x;
        self.ascale_y = pose.scale_y;
        self.ashear_x = pose.shear_x;
        self.ashear_y = pose.shear_y;
        self.applied_valid = true;
    }
}

/// Local 2x2 matrix for a rotation/shear/scale triple, in degrees.
fn local_matrix(
    rotation: f32,
    shear_x: f32,
    shear_y: f32,
    scale_x: f32,
    scale_y: f32,
) -> (f32, f32, f32, f32) {
    let rotation_x = (rotation + shear_x).to_radians();
    let rotation_y = (rotation + 90.0 + shear_y).to_radians();
    (
        rotation_x.cos() * scale_x,
        rotation_y.cos() * scale_y,
        rotation_x.sin() * scale_x,
        rotation_y.sin() * scale_y,
    )
}

/// `1 / v`, or zero when `v` is too close to zero to invert.
pub(crate) fn recip(v: f32) -> f32 {
    if v.abs() > 1.0e-12 { 1.0 / v } else { 0.0 }
}
