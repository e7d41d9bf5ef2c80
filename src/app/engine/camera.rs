use eframe::egui::{Pos2, Rect, Vec2, pos2};

pub const SCALE_MIN: f32 = 1.0 / 128.0;
pub const SCALE_MAX: f32 = 8.0;

/// General exponential smoothing factor: each frame keeps this share of the
/// remaining distance (fades, label offsets, inertia decay).
pub const SMOOTHING: f32 = 0.9;
/// Touch-gesture velocity averaging keeps a shorter memory than the general
/// smoothing. Deliberately distinct from [`SMOOTHING`].
pub const TOUCH_VELOCITY_SMOOTHING: f32 = 0.8;

const SCALE_SMOOTHING: f32 = 0.85;
const SCALE_SNAP_RATIO: f32 = 0.001;
const INERTIA_STOP: f32 = 0.01;

pub fn smooth(current: f32, target: f32, factor: f32) -> f32 {
    target + (current - target) * factor
}

/// Pan/zoom state in device pixels, anchored at the canvas center. `scale`
/// trails `target_scale` by exponential interpolation around `zoom_center`,
/// which produces the zoom-to-cursor effect; it is never snapped directly.
pub struct Camera {
    pub scale: f32,
    target_scale: f32,
    pub pan: Vec2,
    pub pan_velocity: Vec2,
    pub zoom_center: Pos2,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            scale: 1.0,
            target_scale: 1.0,
            pan: Vec2::ZERO,
            pan_velocity: Vec2::ZERO,
            zoom_center: pos2(0.0, 0.0),
        }
    }

    pub fn target_scale(&self) -> f32 {
        self.target_scale
    }

    pub fn set_target_scale(&mut self, value: f32) {
        self.target_scale = value.clamp(SCALE_MIN, SCALE_MAX);
    }

    pub fn zoom_by(&mut self, factor: f32, center: Pos2) {
        self.set_target_scale(self.target_scale * factor);
        self.zoom_center = center;
    }

    /// Nodes shrink slower than the camera zooms out, which keeps small-zoom
    /// graphs legible.
    pub fn node_scale(&self) -> f32 {
        (1.0 / self.scale).sqrt()
    }

    pub fn world_to_screen(&self, rect: Rect, world: Vec2) -> Pos2 {
        rect.center() + self.pan + world * self.scale
    }

    pub fn screen_to_world(&self, rect: Rect, screen: Pos2) -> Vec2 {
        (screen - rect.center() - self.pan) / self.scale
    }

    /// Advances scale interpolation and inertial pan by one frame. Returns
    /// whether anything is still in motion.
    pub fn animate(&mut self, rect: Rect) -> bool {
        let mut moving = false;

        if (self.scale - self.target_scale).abs() > self.target_scale * SCALE_SNAP_RATIO {
            let fixed = self.zoom_center;
            let world = self.screen_to_world(rect, fixed);
            self.scale = smooth(self.scale, self.target_scale, SCALE_SMOOTHING);
            if (self.scale - self.target_scale).abs() <= self.target_scale * SCALE_SNAP_RATIO {
                self.scale = self.target_scale;
            }
            // Keep the world point under the fixed screen point stationary.
            self.pan = fixed - rect.center() - world * self.scale;
            moving = true;
        }

        if self.pan_velocity.length_sq() > INERTIA_STOP * INERTIA_STOP {
            self.pan += self.pan_velocity;
            self.pan_velocity *= SMOOTHING;
            moving = true;
        } else {
            self.pan_velocity = Vec2::ZERO;
        }

        moving
    }

    pub fn viewport(&self, rect: Rect) -> Viewport {
        Viewport {
            min: self.screen_to_world(rect, rect.left_top()),
            max: self.screen_to_world(rect, rect.right_bottom()),
        }
    }
}

/// World-space view rectangle, recomputed every frame; a read-only query
/// object for the LOD and culling logic.
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub min: Vec2,
    pub max: Vec2,
}

impl Viewport {
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::vec2;

    fn canvas() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0))
    }

    #[test]
    fn target_scale_stays_clamped_under_arbitrary_zoom_input() {
        let mut camera = Camera::new();
        for _ in 0..200 {
            camera.zoom_by(1.5, pos2(10.0, 10.0));
        }
        assert_eq!(camera.target_scale(), SCALE_MAX);

        for _ in 0..400 {
            camera.zoom_by(1.0 / 1.5, pos2(10.0, 10.0));
        }
        assert_eq!(camera.target_scale(), SCALE_MIN);
    }

    #[test]
    fn scale_approaches_target_without_snapping() {
        let mut camera = Camera::new();
        camera.zoom_by(2.0, canvas().center());

        camera.animate(canvas());
        assert!(camera.scale > 1.0);
        assert!(camera.scale < camera.target_scale());

        for _ in 0..200 {
            camera.animate(canvas());
        }
        assert_eq!(camera.scale, camera.target_scale());
    }

    #[test]
    fn zoom_keeps_the_fixed_point_stationary() {
        let mut camera = Camera::new();
        camera.pan = vec2(40.0, -25.0);
        let fixed = pos2(600.0, 120.0);
        let world_before = camera.screen_to_world(canvas(), fixed);

        camera.zoom_by(3.0, fixed);
        for _ in 0..50 {
            camera.animate(canvas());
        }

        let world_after = camera.screen_to_world(canvas(), fixed);
        assert!((world_before - world_after).length() < 0.01);
    }

    #[test]
    fn inertia_decays_to_rest() {
        let mut camera = Camera::new();
        camera.pan_velocity = vec2(12.0, 0.0);

        let pan_before = camera.pan;
        assert!(camera.animate(canvas()));
        assert!(camera.pan.x > pan_before.x);

        let mut frames = 0;
        while camera.animate(canvas()) && frames < 1000 {
            frames += 1;
        }
        assert_eq!(camera.pan_velocity, Vec2::ZERO);
    }

    #[test]
    fn node_scale_is_inverse_sqrt_of_scale() {
        let mut camera = Camera::new();
        camera.scale = 4.0;
        assert!((camera.node_scale() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn viewport_tracks_camera() {
        let mut camera = Camera::new();
        camera.scale = 2.0;
        camera.pan = vec2(100.0, 0.0);

        let viewport = camera.viewport(canvas());
        assert!((viewport.center() - vec2(-50.0, 0.0)).length() < 1e-4);
        assert!((viewport.max.x - viewport.min.x - 400.0).abs() < 1e-3);
    }
}
