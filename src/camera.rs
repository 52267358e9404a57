use crate::description::CameraSpec;
use glam::{Mat4, Vec2, Vec3, Vec4};
use winit::dpi::PhysicalSize;

const DEFAULT_UP: Vec3 = Vec3::Y;

pub const FOV_Y_DEGREES: f32 = 75.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 2000.0;

/// Distance at which an orthographic frustum is sized to match the
/// perspective camera's apparent object size, so switching projection at
/// the same position preserves apparent scale.
pub const ORTHO_REFERENCE_DISTANCE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective { fov_y_radians: f32 },
    Orthographic { half_height: f32 },
}

/// Frustum half-height a perspective camera projects at `distance`.
pub fn ortho_half_height(fov_y_radians: f32, distance: f32) -> f32 {
    (fov_y_radians * 0.5).tan() * distance
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn perspective(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: DEFAULT_UP,
            projection: Projection::Perspective { fov_y_radians: FOV_Y_DEGREES.to_radians() },
            near: NEAR_PLANE,
            far: FAR_PLANE,
        }
    }

    pub fn orthographic(position: Vec3, target: Vec3) -> Self {
        let half_height = ortho_half_height(FOV_Y_DEGREES.to_radians(), ORTHO_REFERENCE_DISTANCE);
        Self {
            position,
            target,
            up: DEFAULT_UP,
            projection: Projection::Orthographic { half_height },
            near: -FAR_PLANE,
            far: FAR_PLANE,
        }
    }

    pub fn from_spec(spec: &CameraSpec) -> Self {
        let position = Vec3::from_array(spec.cam_pos);
        let target = Vec3::from_array(spec.look_at);
        if spec.orthographic {
            Self::orthographic(position, target)
        } else {
            Self::perspective(position, target)
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = aspect.max(0.0001);
        match self.projection {
            Projection::Perspective { fov_y_radians } => {
                Mat4::perspective_rh(fov_y_radians, aspect, self.near, self.far)
            }
            Projection::Orthographic { half_height } => {
                let half_width = half_height * aspect;
                Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, self.near, self.far)
            }
        }
    }

    pub fn view_projection(&self, viewport: PhysicalSize<u32>) -> Mat4 {
        let aspect = if viewport.height > 0 { viewport.width as f32 / viewport.height as f32 } else { 1.0 };
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// World-space ray through a screen position (origin top-left, pixels).
    pub fn screen_ray(&self, screen: Vec2, viewport: PhysicalSize<u32>) -> Option<(Vec3, Vec3)> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let ndc_x = (2.0 * screen.x / viewport.width as f32) - 1.0;
        let ndc_y = 1.0 - (2.0 * screen.y / viewport.height as f32);
        let aspect = viewport.width as f32 / viewport.height as f32;
        let inv_view_proj = (self.projection_matrix(aspect) * self.view_matrix()).inverse();
        match self.projection {
            Projection::Perspective { .. } => {
                let far = inv_view_proj * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
                if far.w.abs() < f32::EPSILON {
                    return None;
                }
                let dir = ((far.truncate() / far.w) - self.position).normalize();
                Some((self.position, dir))
            }
            Projection::Orthographic { .. } => {
                let near = inv_view_proj * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
                if near.w.abs() < f32::EPSILON {
                    return None;
                }
                let origin = near.truncate() / near.w;
                let dir = (self.target - self.position).normalize_or_zero();
                if dir == Vec3::ZERO {
                    return None;
                }
                Some((origin, dir))
            }
        }
    }
}

/// Orbit-style navigation bound to one camera and one render surface.
/// Damped mode keeps a decaying angular velocity after the pointer stops.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub radius: f32,
    pub yaw_radians: f32,
    pub pitch_radians: f32,
    pub damping: bool,
    pub enabled: bool,
    yaw_velocity: f32,
    pitch_velocity: f32,
}

const ORBIT_DAMPING_FACTOR: f32 = 8.0;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

impl OrbitControls {
    /// Derives orbit state from an existing camera pose.
    pub fn from_camera(camera: &Camera, damping: bool) -> Self {
        let offset = camera.position - camera.target;
        let radius = offset.length().max(0.01);
        let yaw = offset.x.atan2(offset.z);
        let pitch = (offset.y / radius).clamp(-1.0, 1.0).asin();
        Self {
            target: camera.target,
            radius,
            yaw_radians: yaw,
            pitch_radians: pitch,
            damping,
            enabled: true,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
        }
    }

    pub fn pointer_drag(&mut self, delta: Vec2) {
        if !self.enabled {
            return;
        }
        if self.damping {
            self.yaw_velocity += delta.x;
            self.pitch_velocity += delta.y;
        } else {
            self.apply_orbit(delta.x, delta.y);
        }
    }

    pub fn wheel(&mut self, factor: f32) {
        if !self.enabled {
            return;
        }
        self.radius = (self.radius * factor).clamp(0.1, 10_000.0);
    }

    fn apply_orbit(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw_radians += yaw_delta;
        self.pitch_radians = (self.pitch_radians + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Per-frame update; decays damped velocity. No-op in undamped mode.
    pub fn update(&mut self, dt: f32) {
        if !self.damping {
            return;
        }
        let step = (dt * ORBIT_DAMPING_FACTOR).min(1.0);
        let yaw_step = self.yaw_velocity * step;
        let pitch_step = self.pitch_velocity * step;
        if yaw_step != 0.0 || pitch_step != 0.0 {
            self.apply_orbit(yaw_step, pitch_step);
        }
        self.yaw_velocity -= yaw_step;
        self.pitch_velocity -= pitch_step;
        if self.yaw_velocity.abs() < 1e-5 {
            self.yaw_velocity = 0.0;
        }
        if self.pitch_velocity.abs() < 1e-5 {
            self.pitch_velocity = 0.0;
        }
    }

    pub fn camera_position(&self) -> Vec3 {
        let cos_pitch = self.pitch_radians.cos();
        let offset = Vec3::new(
            self.yaw_radians.sin() * cos_pitch,
            self.pitch_radians.sin(),
            self.yaw_radians.cos() * cos_pitch,
        ) * self.radius;
        self.target + offset
    }

    pub fn apply_to(&self, camera: &mut Camera) {
        camera.position = self.camera_position();
        camera.target = self.target;
    }
}
