use serde::Serialize;
use std::f32::consts::PI;

use crate::gestures::HandGesture;

pub const MIN_CAMERA_DISTANCE: f32 = 15.0;
pub const MAX_CAMERA_DISTANCE: f32 = 100.0;

const DEFAULT_DISTANCE: f32 = 45.0;
const FIST_DISTANCE: f32 = 25.0;
const PALM_FAR: f32 = 80.0;
const PALM_NEAR: f32 = 30.0;

const ORBIT_RATE: f32 = 1.5;
const CAMERA_AUTO_ROTATE: f32 = 0.1;
const PARTICLE_AUTO_ROTATE: f32 = 0.03;

const CARD_SCALE: f32 = 2.5;
const STAR_SCALE: f32 = 0.06;
const SELECTED_BOOST: f32 = 1.5;
const HOVER_BOOST: f32 = 1.15;
const SCALE_RATE: f32 = 2.0;
const OPACITY_RATE: f32 = 3.0;
const POSITION_RATE: f32 = 1.2;

/// `current += (target - current) * rate * dt`, with the step factor clamped to [0,1] so a
/// long frame gap lands on the target instead of overshooting it.
pub fn smooth(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    let k = (rate * dt).clamp(0.0, 1.0);
    current + (target - current) * k
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn on_ring(angle: f32, radius: f32, height: f32) -> Self {
        Self::new(angle.cos() * radius, height, angle.sin() * radius)
    }

    pub fn smooth_towards(self, target: Vec3, rate: f32, dt: f32) -> Self {
        Self::new(
            smooth(self.x, target.x, rate, dt),
            smooth(self.y, target.y, rate, dt),
            smooth(self.z, target.z, rate, dt),
        )
    }

    pub fn distance(self, other: Vec3) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

pub fn spiral_position(index: usize, total: usize) -> Vec3 {
    let f = if total == 0 {
        0.0
    } else {
        index as f32 / total as f32
    };
    Vec3::on_ring(f * PI * 6.0, 8.0 + f * 20.0, (index as f32 * 1.5).sin() * 4.0)
}

/// Scattered layout while navigating with an open palm. Deterministic per index.
pub fn dispersed_position(index: usize) -> Vec3 {
    let seed = index as f64 * 12345.0;
    let hash = |n: f64| {
        let x = (seed + n).sin() * 10000.0;
        (x - x.floor()) as f32
    };
    Vec3::on_ring(
        hash(1.0) * PI * 4.0,
        10.0 + hash(2.0) * 45.0,
        (hash(3.0) - 0.5) * 20.0,
    )
}

fn steers(gesture: Option<HandGesture>) -> bool {
    matches!(
        gesture,
        Some(HandGesture::OpenPalm | HandGesture::ClosedFist)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraRig {
    pub distance: f32,
    pub azimuth: f32,
    pub polar: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            distance: DEFAULT_DISTANCE,
            azimuth: 0.0,
            polar: PI / 3.0,
        }
    }
}

impl CameraRig {
    pub fn target_distance(gesture: Option<HandGesture>, hand: (f32, f32)) -> f32 {
        match gesture {
            Some(HandGesture::ClosedFist) => FIST_DISTANCE,
            // lower hand dives in
            Some(HandGesture::OpenPalm) => PALM_FAR - hand.1 * (PALM_FAR - PALM_NEAR),
            _ => DEFAULT_DISTANCE,
        }
    }

    pub fn update(&mut self, gesture: Option<HandGesture>, hand: (f32, f32), dt: f32) {
        let target = Self::target_distance(gesture, hand);
        self.distance = smooth(self.distance, target, ORBIT_RATE, dt)
            .clamp(MIN_CAMERA_DISTANCE, MAX_CAMERA_DISTANCE);

        if steers(gesture) {
            let (x, y) = hand;
            let azimuth = (x - 0.5) * PI * 1.5;
            let polar = if gesture == Some(HandGesture::OpenPalm) {
                PI / 4.0 + y * PI * 0.3
            } else {
                PI / 3.0 + (y - 0.5) * PI * 0.3
            };
            self.azimuth = smooth(self.azimuth, azimuth, ORBIT_RATE, dt);
            self.polar = smooth(self.polar, polar, ORBIT_RATE, dt);
        } else {
            self.azimuth += dt.max(0.0) * CAMERA_AUTO_ROTATE;
        }
    }

    pub fn position(&self) -> Vec3 {
        let r = self.distance;
        Vec3::new(
            r * self.polar.sin() * self.azimuth.cos(),
            r * self.polar.cos(),
            r * self.polar.sin() * self.azimuth.sin(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ParticleField {
    pub yaw: f32,
    pub pitch: f32,
}

impl ParticleField {
    pub fn update(&mut self, gesture: Option<HandGesture>, hand: (f32, f32), dt: f32) {
        if steers(gesture) {
            self.yaw = smooth(self.yaw, (hand.0 - 0.5) * PI * 1.5, ORBIT_RATE, dt);
            self.pitch = smooth(self.pitch, (hand.1 - 0.5) * PI * 0.3, ORBIT_RATE, dt);
        } else {
            self.yaw += dt.max(0.0) * PARTICLE_AUTO_ROTATE;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhotoCard {
    pub index: usize,
    pub position: Vec3,
    pub scale: f32,
    pub photo_opacity: f32,
    pub star_opacity: f32,
}

impl PhotoCard {
    fn new(index: usize, total: usize) -> Self {
        Self {
            index,
            position: spiral_position(index, total),
            scale: STAR_SCALE,
            photo_opacity: 0.0,
            star_opacity: 1.0,
        }
    }

    pub fn target_scale(gesture: Option<HandGesture>, selected: bool, hovered: bool) -> f32 {
        if gesture != Some(HandGesture::ClosedFist) {
            return STAR_SCALE;
        }
        if selected {
            CARD_SCALE * SELECTED_BOOST
        } else if hovered {
            CARD_SCALE * HOVER_BOOST
        } else {
            CARD_SCALE
        }
    }

    fn update(
        &mut self,
        gesture: Option<HandGesture>,
        total: usize,
        selected: bool,
        hovered: bool,
        dt: f32,
    ) {
        let revealed = gesture == Some(HandGesture::ClosedFist);
        let target = if gesture == Some(HandGesture::OpenPalm) {
            dispersed_position(self.index)
        } else {
            spiral_position(self.index, total)
        };
        self.position = self.position.smooth_towards(target, POSITION_RATE, dt);

        let scale = Self::target_scale(gesture, selected, hovered);
        self.scale = smooth(self.scale, scale, SCALE_RATE, dt);
        let (photo, star) = if revealed { (1.0, 0.0) } else { (0.0, 1.0) };
        self.photo_opacity = smooth(self.photo_opacity, photo, OPACITY_RATE, dt);
        self.star_opacity = smooth(self.star_opacity, star, OPACITY_RATE, dt);
    }
}

pub fn ambient_intensity(gesture: Option<HandGesture>) -> f32 {
    match gesture {
        Some(HandGesture::ClosedFist) => 1.2,
        _ => 0.8,
    }
}

pub fn bloom_strength(gesture: Option<HandGesture>) -> f32 {
    match gesture {
        Some(HandGesture::OpenPalm) => 0.6,
        Some(HandGesture::ClosedFist) => 0.3,
        _ => 0.4,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    pub camera: CameraRig,
    pub particles: ParticleField,
    pub cards: Vec<PhotoCard>,
    pub hovered: Option<usize>,
    pub ambient: f32,
    pub bloom: f32,
}

impl Scene {
    pub fn new(photo_count: usize) -> Self {
        Self {
            camera: CameraRig::default(),
            particles: ParticleField::default(),
            cards: (0..photo_count)
                .map(|i| PhotoCard::new(i, photo_count))
                .collect(),
            hovered: None,
            ambient: ambient_intensity(None),
            bloom: bloom_strength(None),
        }
    }

    pub fn set_photo_count(&mut self, photo_count: usize) {
        self.cards = (0..photo_count)
            .map(|i| PhotoCard::new(i, photo_count))
            .collect();
        if self.hovered.is_some_and(|h| h >= photo_count) {
            self.hovered = None;
        }
    }

    pub fn set_hovered(&mut self, index: Option<usize>) {
        self.hovered = index.filter(|&i| i < self.cards.len());
    }

    pub fn update(
        &mut self,
        gesture: Option<HandGesture>,
        hand: (f32, f32),
        selected: Option<usize>,
        dt: f32,
    ) {
        self.camera.update(gesture, hand, dt);
        self.particles.update(gesture, hand, dt);
        let total = self.cards.len();
        let hovered = self.hovered;
        for card in &mut self.cards {
            let i = card.index;
            card.update(gesture, total, selected == Some(i), hovered == Some(i), dt);
        }
        self.ambient = ambient_intensity(gesture);
        self.bloom = bloom_strength(gesture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FIST: Option<HandGesture> = Some(HandGesture::ClosedFist);
    const PALM: Option<HandGesture> = Some(HandGesture::OpenPalm);

    #[test]
    fn smoothing_never_overshoots() {
        assert_relative_eq!(smooth(0.0, 10.0, 1.5, 0.1), 1.5, epsilon = 1e-5);
        // a 5 s stall would overshoot without the clamp
        assert_relative_eq!(smooth(0.0, 10.0, 1.5, 5.0), 10.0);
        assert_relative_eq!(smooth(3.0, 10.0, 1.5, -1.0), 3.0);
    }

    #[test]
    fn fist_zooms_in_gradually() {
        let mut cam = CameraRig::default();
        cam.update(FIST, (0.5, 0.5), 1.0 / 60.0);
        assert!(cam.distance < DEFAULT_DISTANCE && cam.distance > FIST_DISTANCE);
        for _ in 0..600 {
            cam.update(FIST, (0.5, 0.5), 1.0 / 60.0);
        }
        assert_relative_eq!(cam.distance, FIST_DISTANCE, epsilon = 0.01);
    }

    #[test]
    fn palm_distance_follows_hand_height() {
        assert_relative_eq!(CameraRig::target_distance(PALM, (0.5, 0.0)), 80.0);
        assert_relative_eq!(CameraRig::target_distance(PALM, (0.5, 1.0)), 30.0);
        assert_relative_eq!(CameraRig::target_distance(PALM, (0.5, 0.5)), 55.0);
        assert_relative_eq!(CameraRig::target_distance(None, (0.1, 0.9)), 45.0);
        let pointing = Some(HandGesture::PointingUp);
        assert_relative_eq!(CameraRig::target_distance(pointing, (0.5, 0.5)), 45.0);
    }

    #[test]
    fn idle_camera_auto_rotates() {
        let mut cam = CameraRig::default();
        cam.update(None, (0.9, 0.9), 1.0);
        assert_relative_eq!(cam.azimuth, 0.1);
        assert_relative_eq!(cam.polar, PI / 3.0);

        let mut field = ParticleField::default();
        field.update(None, (0.9, 0.9), 2.0);
        assert_relative_eq!(field.yaw, 0.06);
        assert_relative_eq!(field.pitch, 0.0);
    }

    #[test]
    fn steering_converges_to_hand_targets() {
        let mut cam = CameraRig::default();
        for _ in 0..100 {
            cam.update(PALM, (1.0, 0.0), 0.1);
        }
        assert_relative_eq!(cam.azimuth, 0.75 * PI, epsilon = 1e-3);
        assert_relative_eq!(cam.polar, PI / 4.0, epsilon = 1e-3);
        let r = cam.position().distance(Vec3::default());
        assert_relative_eq!(r, cam.distance, epsilon = 1e-3);
    }

    #[test]
    fn distance_stays_in_orbit_limits() {
        let mut cam = CameraRig {
            distance: 300.0,
            ..CameraRig::default()
        };
        cam.update(None, (0.5, 0.5), 0.0);
        assert_relative_eq!(cam.distance, MAX_CAMERA_DISTANCE);
    }

    #[test]
    fn layouts_are_deterministic() {
        let p = spiral_position(0, 10);
        assert_relative_eq!(p.x, 8.0);
        assert_relative_eq!(p.y, 0.0);
        assert_relative_eq!(p.z, 0.0);
        for i in 0..50 {
            let d = dispersed_position(i);
            assert_eq!(d, dispersed_position(i));
            let radius = (d.x * d.x + d.z * d.z).sqrt();
            assert!((10.0 - 1e-3..=55.0 + 1e-3).contains(&radius), "{i}: {radius}");
            assert!(d.y.abs() <= 10.0);
        }
        // no panic on an empty collection
        assert_eq!(spiral_position(0, 0), Vec3::new(8.0, 0.0, 0.0));
    }

    #[test]
    fn card_scale_targets() {
        assert_relative_eq!(PhotoCard::target_scale(FIST, false, false), 2.5);
        assert_relative_eq!(PhotoCard::target_scale(FIST, true, true), 3.75);
        assert_relative_eq!(PhotoCard::target_scale(FIST, false, true), 2.875, epsilon = 1e-5);
        assert_relative_eq!(PhotoCard::target_scale(PALM, false, false), 0.06);
        assert_relative_eq!(PhotoCard::target_scale(PALM, true, false), 0.06);
        assert_relative_eq!(PhotoCard::target_scale(None, false, true), 0.06);
    }

    #[test]
    fn fist_reveals_photos() {
        let mut scene = Scene::new(3);
        for _ in 0..200 {
            scene.update(FIST, (0.5, 0.5), Some(1), 0.05);
        }
        let card = scene.cards[1];
        assert_relative_eq!(card.photo_opacity, 1.0, epsilon = 1e-3);
        assert_relative_eq!(card.star_opacity, 0.0, epsilon = 1e-3);
        assert_relative_eq!(card.scale, 3.75, epsilon = 1e-3);
        assert_relative_eq!(scene.cards[0].scale, 2.5, epsilon = 1e-3);
        assert_relative_eq!(scene.ambient, 1.2);
        assert_relative_eq!(scene.bloom, 0.3);
    }

    #[test]
    fn palm_disperses_cards() {
        let mut scene = Scene::new(4);
        for _ in 0..300 {
            scene.update(PALM, (0.5, 0.5), None, 0.05);
        }
        let target = dispersed_position(2);
        assert!(scene.cards[2].position.distance(target) < 0.01);
        assert_relative_eq!(scene.bloom, 0.6);
        assert_relative_eq!(scene.ambient, 0.8);
    }

    #[test]
    fn hover_is_bounded_by_cards() {
        let mut scene = Scene::new(2);
        scene.set_hovered(Some(1));
        assert_eq!(scene.hovered, Some(1));
        scene.set_hovered(Some(5));
        assert_eq!(scene.hovered, None);
        scene.set_hovered(Some(1));
        scene.set_photo_count(1);
        assert_eq!(scene.hovered, None);
        assert_eq!(scene.cards.len(), 1);
    }
}
