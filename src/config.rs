use serde::{Deserialize, Serialize};

use crate::clamp_finite;
use crate::math::MathMode;

pub const MIN_PAD_SPACING: f32 = 0.01;
pub const MAX_PAD_SPACING: f32 = 10_000.0;
pub const MAX_CONTROL_DISTANCE: f32 = 100_000.0;
pub const MAX_ROW_DELAY: f32 = 10.0;
pub const MAX_STAGGER_FRACTION: f32 = 0.9;
pub const MAX_REPULSION_RADIUS: f32 = 1_000.0;
pub const MAX_REPULSION_STRENGTH: f32 = 4.0;
pub const MAX_HOVER_FREQUENCY: f32 = 20.0;
pub const MIN_RASTER_RESOLUTION: u32 = 8;
pub const MAX_RASTER_RESOLUTION: u32 = 256;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MotionConfig {
    pub pad_spacing: f32,
    pub pad_height: f32,
    pub control_distance: f32,
    pub row_delay: f32,
    pub delay_jitter: f32,
    pub max_stagger_fraction: f32,
    pub repulsion_radius: f32,
    pub repulsion_strength: f32,
    pub max_repulsion: f32,
    pub hover_amplitude: f32,
    pub hover_frequency: f32,
    pub settle_time: f32,
    pub raster_resolution: u32,
    pub countdown_resolution: u32,
    pub math_mode: MathMode,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            pad_spacing: 40.0,
            pad_height: -70.0,
            control_distance: 750.0,
            row_delay: 0.03,
            delay_jitter: 0.02,
            max_stagger_fraction: 0.6,
            repulsion_radius: 10.0,
            repulsion_strength: 0.5,
            max_repulsion: 8.0,
            hover_amplitude: 1.5,
            hover_frequency: 0.8,
            settle_time: 1.5,
            raster_resolution: 64,
            countdown_resolution: 32,
            math_mode: MathMode::Accurate,
        }
    }
}

impl MotionConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        self.pad_spacing = clamp_finite(
            self.pad_spacing,
            MIN_PAD_SPACING,
            MAX_PAD_SPACING,
            defaults.pad_spacing,
        );
        self.pad_height = clamp_finite(
            self.pad_height,
            -MAX_CONTROL_DISTANCE,
            MAX_CONTROL_DISTANCE,
            defaults.pad_height,
        );
        self.control_distance = clamp_finite(
            self.control_distance,
            0.0,
            MAX_CONTROL_DISTANCE,
            defaults.control_distance,
        );
        self.row_delay = clamp_finite(self.row_delay, 0.0, MAX_ROW_DELAY, defaults.row_delay);
        self.delay_jitter =
            clamp_finite(self.delay_jitter, 0.0, MAX_ROW_DELAY, defaults.delay_jitter);
        self.max_stagger_fraction = clamp_finite(
            self.max_stagger_fraction,
            0.0,
            MAX_STAGGER_FRACTION,
            defaults.max_stagger_fraction,
        );
        self.repulsion_radius = clamp_finite(
            self.repulsion_radius,
            0.0,
            MAX_REPULSION_RADIUS,
            defaults.repulsion_radius,
        );
        self.repulsion_strength = clamp_finite(
            self.repulsion_strength,
            0.0,
            MAX_REPULSION_STRENGTH,
            defaults.repulsion_strength,
        );
        self.max_repulsion = clamp_finite(
            self.max_repulsion,
            0.0,
            MAX_REPULSION_RADIUS,
            defaults.max_repulsion,
        );
        self.hover_amplitude = clamp_finite(
            self.hover_amplitude,
            0.0,
            MAX_REPULSION_RADIUS,
            defaults.hover_amplitude,
        );
        self.hover_frequency = clamp_finite(
            self.hover_frequency,
            0.0,
            MAX_HOVER_FREQUENCY,
            defaults.hover_frequency,
        );
        self.settle_time = clamp_finite(self.settle_time, 0.0, 60.0, defaults.settle_time);
        self.raster_resolution = self
            .raster_resolution
            .clamp(MIN_RASTER_RESOLUTION, MAX_RASTER_RESOLUTION);
        self.countdown_resolution = self
            .countdown_resolution
            .clamp(MIN_RASTER_RESOLUTION, MAX_RASTER_RESOLUTION);
    }

    pub fn stagger_budget(&self, duration: f32) -> f32 {
        duration * self.max_stagger_fraction
    }
}
