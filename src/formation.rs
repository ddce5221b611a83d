use std::f32::consts::{PI, TAU};
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::address_grid::{ceil_cbrt, ceil_sqrt, AddressGrid};
use crate::config::MotionConfig;
use crate::error::{ShowError, ShowResult};
use crate::math::{blend, hash_signed, hash_unit, hsl_to_rgb, smoothstep, smoothstep01};
use crate::raster::Raster;

const SALT_SPHERE: u32 = 11;
const SALT_GALAXY: u32 = 12;
const SALT_HUE: u32 = 13;
const SALT_BURST: u32 = 14;

const HELIX_TURNS: f32 = 4.0;
const HELIX_HEIGHT_RATIO: f32 = 5.0;
const RUNG_SPACING: u32 = 20;
const RUNG_WIDTH: u32 = 4;
const GALAXY_ARMS: u32 = 3;
const GALAXY_TWIST: f32 = 3.0;
const HEART_UNITS: f32 = 16.0;

const BURSTS: u32 = 5;
// Burst offsets are laid out for a 120-unit explosion and scale with the radius.
const BURST_OFFSETS: [[f32; 3]; BURSTS as usize] = [
    [0.0, 0.0, 0.0],
    [150.0, -50.0, 100.0],
    [-150.0, -50.0, 100.0],
    [0.0, 100.0, -150.0],
    [0.0, -100.0, 150.0],
];
const BURST_REACH: f32 = 120.0;
const BURST_STAGGER: f32 = 2.0;
const BURST_DURATION: f32 = 4.0;
const BURST_SHELL: f32 = 0.1;
const BURST_GRAVITY: f32 = 50.0;
const BURST_HUES: [f32; BURSTS as usize] = [0.0, 0.15, 0.6, 0.3, 0.8];

const PYRAMID_STEP: u32 = 2;

// Fraction of a digit period spent morphing out of the previous digit.
const DIGIT_MORPH: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormationKind {
    LaunchPad,
    Grid,
    Sphere,
    Text,
    Countdown,
    Heart,
    Helix,
    Galaxy,
    Wave,
    Fireworks,
    Pyramid,
}

impl FormationKind {
    pub const ALL: [Self; 11] = [
        Self::LaunchPad,
        Self::Grid,
        Self::Sphere,
        Self::Text,
        Self::Countdown,
        Self::Heart,
        Self::Helix,
        Self::Galaxy,
        Self::Wave,
        Self::Fireworks,
        Self::Pyramid,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "launchpad" | "launch-pad" | "pad" | "land" => Self::LaunchPad,
            "grid" | "cube" => Self::Grid,
            "sphere" => Self::Sphere,
            "text" => Self::Text,
            "countdown" | "digit" => Self::Countdown,
            "heart" => Self::Heart,
            "helix" | "dna" => Self::Helix,
            "galaxy" | "spiral" => Self::Galaxy,
            "wave" => Self::Wave,
            "fireworks" | "burst" => Self::Fireworks,
            "pyramid" => Self::Pyramid,
            _ => return None,
        };
        Some(kind)
    }

    pub fn default_radius(self) -> f32 {
        match self {
            Self::Sphere => 400.0,
            Self::Heart | Self::Galaxy => 300.0,
            Self::Fireworks => BURST_REACH,
            Self::Helix | Self::Wave => 80.0,
            _ => 0.0,
        }
    }

    pub fn default_spacing(self) -> f32 {
        match self {
            Self::Grid => 50.0,
            Self::Text | Self::Countdown | Self::Pyramid => 12.0,
            Self::Wave => 20.0,
            _ => 0.0,
        }
    }

    pub fn default_spin(self) -> f32 {
        match self {
            Self::Heart | Self::Helix => 0.5,
            Self::Galaxy => 0.2,
            Self::Wave => 2.0,
            _ => 0.0,
        }
    }

    pub fn uses_raster(self) -> bool {
        matches!(self, Self::Text | Self::Countdown)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Group {
    #[default]
    Pad = 0,
    Body = 1,
    Shell = 2,
    Glyph = 3,
    Digit = 4,
    Hidden = 5,
    Heart = 6,
    StrandA = 7,
    StrandB = 8,
    Rung = 9,
    Arm = 10,
    Wave = 11,
    Burst = 12,
    Pyramid = 13,
}

impl Group {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Body,
            2 => Self::Shell,
            3 => Self::Glyph,
            4 => Self::Digit,
            5 => Self::Hidden,
            6 => Self::Heart,
            7 => Self::StrandA,
            8 => Self::StrandB,
            9 => Self::Rung,
            10 => Self::Arm,
            11 => Self::Wave,
            12 => Self::Burst,
            13 => Self::Pyramid,
            _ => Self::Pad,
        }
    }

    pub fn color(self, id: u32, seed: u32) -> [f32; 3] {
        let jitter = hash_unit(seed, id, SALT_HUE);
        match self {
            Self::Pad => hsl_to_rgb(0.6, 0.2, 0.25),
            Self::Body => hsl_to_rgb(jitter, 0.8, 0.6),
            Self::Shell => hsl_to_rgb(0.55 + jitter * 0.1, 0.8, 0.6),
            Self::Glyph => hsl_to_rgb(0.12, 0.9, 0.85),
            Self::Digit => hsl_to_rgb(0.0, 0.9, 0.55),
            Self::Hidden => [0.0; 3],
            Self::Heart => hsl_to_rgb(0.95 + jitter * 0.04, 0.85, 0.6),
            Self::StrandA => hsl_to_rgb(0.6, 0.8, 0.7),
            Self::StrandB => hsl_to_rgb(0.3, 0.8, 0.7),
            Self::Rung => hsl_to_rgb(0.15, 0.8, 0.9),
            Self::Arm => hsl_to_rgb(0.6 + (id % GALAXY_ARMS) as f32 * 0.1, 0.7, 0.6),
            Self::Wave => hsl_to_rgb(0.5 + jitter * 0.3, 0.8, 0.6),
            Self::Burst => hsl_to_rgb(BURST_HUES[(id % BURSTS) as usize], 0.9, 0.6 + jitter * 0.2),
            Self::Pyramid => hsl_to_rgb(0.6 + jitter * 0.05, 0.8, 0.7),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Target {
    pub position: Vec3,
    pub group: Group,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterMapping {
    #[default]
    Dense,
    Direct,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaunchPads {
    grid: AddressGrid,
    spacing: f32,
    height: f32,
}

impl LaunchPads {
    pub fn new(grid: AddressGrid, config: &MotionConfig) -> Self {
        Self {
            grid,
            spacing: config.pad_spacing,
            height: config.pad_height,
        }
    }

    pub fn position(&self, id: u32) -> Vec3 {
        let half = (self.grid.side() - 1) as f32 * 0.5;
        Vec3::new(
            (self.grid.col(id) as f32 - half) * self.spacing,
            self.height,
            (self.grid.row(id) as f32 - half) * self.spacing,
        )
    }

    pub fn hidden(&self, id: u32) -> Target {
        Target {
            position: self.position(id),
            group: Group::Hidden,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    pub id: u32,
    pub rank: u32,
    pub participants: u32,
}

pub struct TargetContext<'a> {
    pub pads: &'a LaunchPads,
    pub seed: u32,
}

// Largest value first.
#[derive(Clone, Debug)]
pub struct Countdown {
    digits: Vec<Arc<Raster>>,
    period: f32,
}

impl Countdown {
    pub fn new(digits: Vec<Arc<Raster>>, period: f32) -> Self {
        Self { digits, period }
    }

    pub fn index_at(&self, elapsed: f32) -> usize {
        let last = self.digits.len().saturating_sub(1);
        if self.period <= 0.0 {
            return last;
        }
        ((elapsed / self.period).floor().max(0.0) as usize).min(last)
    }

    pub fn value_at(&self, elapsed: f32) -> u32 {
        (self.digits.len() - self.index_at(elapsed)) as u32
    }

    pub fn raster_at(&self, elapsed: f32) -> Option<&Raster> {
        self.digits.get(self.index_at(elapsed)).map(Arc::as_ref)
    }

    pub fn digits(&self) -> impl Iterator<Item = &Raster> + '_ {
        self.digits.iter().map(Arc::as_ref)
    }

    // Previous digit and the eased weight of the current one, while they morph.
    fn morph_at(&self, elapsed: f32) -> Option<(&Raster, f32)> {
        let index = self.index_at(elapsed);
        if index == 0 || self.period <= 0.0 {
            return None;
        }
        let local = elapsed - index as f32 * self.period;
        let weight = smoothstep(0.0, self.period * DIGIT_MORPH, local);
        (weight < 1.0).then(|| (self.digits[index - 1].as_ref(), weight))
    }
}

#[derive(Clone, Debug)]
pub struct Formation {
    pub kind: FormationKind,
    pub center: Vec3,
    pub radius: f32,
    pub spacing: f32,
    pub spin: f32,
    pub jitter: f32,
    pub mapping: RasterMapping,
    raster: Option<Arc<Raster>>,
    countdown: Option<Countdown>,
}

impl Formation {
    pub fn new(kind: FormationKind) -> Self {
        Self {
            kind,
            center: Vec3::ZERO,
            radius: kind.default_radius(),
            spacing: kind.default_spacing(),
            spin: kind.default_spin(),
            jitter: 0.0,
            mapping: if kind == FormationKind::Countdown {
                RasterMapping::Direct
            } else {
                RasterMapping::Dense
            },
            raster: None,
            countdown: None,
        }
    }

    pub fn with_raster(mut self, raster: Arc<Raster>) -> Self {
        self.raster = Some(raster);
        self
    }

    pub fn with_countdown(mut self, countdown: Countdown) -> Self {
        self.countdown = Some(countdown);
        self
    }

    pub fn raster(&self) -> Option<&Arc<Raster>> {
        self.raster.as_ref()
    }

    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    // Pixel index equals rank only when the counts match; otherwise dense.
    fn maps_directly(&self, raster: &Raster, participants: u32) -> bool {
        self.mapping == RasterMapping::Direct && participants == raster.pixel_count()
    }

    // Fewest lit pixels over this formation's rasters, when dense mapping
    // leaves some of `participants` hidden.
    pub fn sparse_lit(&self, participants: u32) -> Option<usize> {
        let digits = self.countdown.iter().flat_map(|countdown| countdown.digits());
        self.raster
            .as_deref()
            .into_iter()
            .chain(digits)
            .filter(|raster| !self.maps_directly(raster, participants))
            .map(|raster| raster.lit_pixels().len())
            .min()
            .filter(|&lit| lit < participants as usize)
    }

    pub fn target(&self, slot: Slot, elapsed: f32, ctx: &TargetContext) -> Target {
        let Slot {
            id,
            rank,
            participants,
        } = slot;
        let participants = participants.max(1);
        let spun = |local: Vec3| self.center + rotate_y(local, self.spin * elapsed);

        match self.kind {
            FormationKind::LaunchPad => Target {
                position: ctx.pads.position(id) + self.center,
                group: Group::Pad,
            },
            FormationKind::Grid => Target {
                position: self.center + grid_offset(rank, participants, self.spacing),
                group: Group::Body,
            },
            FormationKind::Sphere => {
                let jitter = self.jitter * hash_signed(ctx.seed, id, SALT_SPHERE) * PI;
                Target {
                    position: self.center
                        + sphere_point(rank, participants, jitter) * self.radius,
                    group: Group::Shell,
                }
            }
            FormationKind::Text => match &self.raster {
                Some(raster) => self.raster_target(raster, slot, Group::Glyph, ctx),
                None => ctx.pads.hidden(id),
            },
            FormationKind::Countdown => match &self.countdown {
                Some(countdown) => self.countdown_target(countdown, slot, elapsed, ctx),
                None => ctx.pads.hidden(id),
            },
            FormationKind::Heart => Target {
                position: spun(heart_point(rank, participants) * (self.radius / HEART_UNITS)),
                group: Group::Heart,
            },
            FormationKind::Helix => {
                let (local, group) = helix_point(rank, participants, self.radius);
                Target {
                    position: spun(local),
                    group,
                }
            }
            FormationKind::Galaxy => {
                let offset = hash_unit(ctx.seed, id, SALT_GALAXY) * self.radius * 0.03;
                Target {
                    position: self.center
                        + galaxy_point(rank, participants, self.radius, offset, self.spin, elapsed),
                    group: Group::Arm,
                }
            }
            FormationKind::Wave => Target {
                position: self.center
                    + wave_point(rank, participants, self.spacing, self.radius, self.spin, elapsed),
                group: Group::Wave,
            },
            FormationKind::Fireworks => Target {
                position: self.center + burst_point(ctx.seed, id, self.radius, elapsed),
                group: Group::Burst,
            },
            FormationKind::Pyramid => Target {
                position: self.center + pyramid_point(rank, participants, self.spacing),
                group: Group::Pyramid,
            },
        }
    }

    fn countdown_target(&self, countdown: &Countdown, slot: Slot, elapsed: f32, ctx: &TargetContext) -> Target {
        let Some(raster) = countdown.raster_at(elapsed) else {
            return ctx.pads.hidden(slot.id);
        };
        let current = self.raster_target(raster, slot, Group::Digit, ctx);
        match countdown.morph_at(elapsed) {
            Some((previous, weight)) => {
                let from = self.raster_target(previous, slot, Group::Digit, ctx);
                Target {
                    position: blend(from.position, current.position, weight),
                    group: current.group,
                }
            }
            None => current,
        }
    }

    fn raster_target(&self, raster: &Raster, slot: Slot, lit_group: Group, ctx: &TargetContext) -> Target {
        let pixel = if self.maps_directly(raster, slot.participants) {
            slot.rank
        } else {
            let lit = raster.lit_pixels();
            let lit_count = lit.len() as u64;
            let participants = u64::from(slot.participants.max(1));
            let rank = u64::from(slot.rank);
            let index = if participants <= lit_count {
                Some(rank * lit_count / participants)
            } else {
                (rank < lit_count).then_some(rank)
            };
            match index {
                Some(index) => lit[index as usize],
                None => return ctx.pads.hidden(slot.id),
            }
        };

        let (col, row) = raster.pixel_coords(pixel);
        let half = (raster.resolution() - 1) as f32 * 0.5;
        Target {
            position: self.center
                + Vec3::new(
                    (col as f32 - half) * self.spacing,
                    (half - row as f32) * self.spacing,
                    0.0,
                ),
            group: if raster.is_lit(pixel) {
                lit_group
            } else {
                Group::Hidden
            },
        }
    }
}

pub fn grid_coords(rank: u32, count: u32) -> (u32, u32, u32) {
    let side = ceil_cbrt(count).max(1);
    let plane = side * side;
    (rank / plane, (rank % plane) / side, rank % side)
}

pub fn grid_index(layer: u32, row: u32, col: u32, count: u32) -> u32 {
    let side = ceil_cbrt(count).max(1);
    layer * side * side + row * side + col
}

fn grid_offset(rank: u32, count: u32, spacing: f32) -> Vec3 {
    let side = ceil_cbrt(count).max(1);
    let half = (side - 1) as f32 * 0.5;
    let (layer, row, col) = grid_coords(rank, count);
    Vec3::new(
        (col as f32 - half) * spacing,
        (row as f32 - half) * spacing,
        (layer as f32 - half) * spacing,
    )
}

// Half-step offsets in `y` keep both poles empty.
pub fn sphere_point(rank: u32, count: u32, azimuth_jitter: f32) -> Vec3 {
    use std::f64::consts::{PI as PI64, TAU as TAU64};

    let golden_angle = PI64 * (3.0 - 5.0_f64.sqrt());
    let y = 1.0 - (2.0 * rank as f32 + 1.0) / count as f32;
    let ring = (1.0 - y * y).max(0.0).sqrt();
    let theta = (rank as f64 * golden_angle).rem_euclid(TAU64) as f32 + azimuth_jitter;
    Vec3::new(theta.cos() * ring, y, theta.sin() * ring)
}

fn heart_point(rank: u32, count: u32) -> Vec3 {
    let t = rank as f32 / count as f32 * TAU;
    Vec3::new(
        16.0 * t.sin().powi(3),
        13.0 * t.cos() - 5.0 * (2.0 * t).cos() - 2.0 * (3.0 * t).cos() - (4.0 * t).cos(),
        (t * 0.5).sin() * 4.0,
    )
}

fn helix_point(rank: u32, count: u32, radius: f32) -> (Vec3, Group) {
    let strand = rank % 2;
    let step = rank / 2;
    let per_strand = count.div_ceil(2).max(1);
    let t = step as f32 / per_strand as f32;
    let y = (t - 0.5) * radius * HELIX_HEIGHT_RATIO;
    let angle = t * HELIX_TURNS * TAU;
    let on_circle = |a: f32| Vec3::new(radius * a.cos(), y, radius * a.sin());

    let rung_step = step % RUNG_SPACING;
    if rung_step < RUNG_WIDTH {
        let mut along = (rung_step + 1) as f32 / (RUNG_WIDTH + 1) as f32;
        if strand == 1 {
            along = 1.0 - along;
        }
        let point = on_circle(angle).lerp(on_circle(angle + PI), along);
        return (point, Group::Rung);
    }

    if strand == 0 {
        (on_circle(angle), Group::StrandA)
    } else {
        (on_circle(angle + PI), Group::StrandB)
    }
}

fn galaxy_point(rank: u32, count: u32, radius: f32, offset: f32, spin: f32, elapsed: f32) -> Vec3 {
    let arm = rank % GALAXY_ARMS;
    let step = rank / GALAXY_ARMS;
    let per_arm = count.div_ceil(GALAXY_ARMS).max(1);
    let along = step as f32 / per_arm as f32;
    let r = along * radius;
    let angle = arm as f32 / GALAXY_ARMS as f32 * TAU + along * GALAXY_TWIST * TAU + spin * elapsed;
    let reach = r + offset;
    Vec3::new(
        reach * angle.cos(),
        (along * 6.0 + elapsed).sin() * radius * 0.066,
        reach * angle.sin(),
    )
}

fn wave_point(rank: u32, count: u32, spacing: f32, amplitude: f32, speed: f32, elapsed: f32) -> Vec3 {
    let side = ceil_sqrt(count).max(1);
    let half = (side - 1) as f32 * 0.5;
    let x = ((rank % side) as f32 - half) * spacing;
    let z = ((rank / side) as f32 - half) * spacing;
    let freq = if spacing > 0.0 { 0.4 / spacing } else { 0.0 };
    let phase = elapsed * speed;

    let along_x = (x * freq + phase).sin() * amplitude;
    let along_z = (z * freq + phase * 1.3).sin() * amplitude * 0.7;
    let ripple = ((x * x + z * z).sqrt() * freq * 0.5 - phase * 2.0).sin() * amplitude * 0.5;
    let interference =
        (x * freq * 2.0 + phase).sin() * (z * freq * 2.0 + phase * 0.8).sin() * amplitude * 0.3;
    Vec3::new(x, along_x + along_z + ripple + interference, z)
}

fn rotate_y(v: Vec3, angle: f32) -> Vec3 {
    if angle == 0.0 {
        return v;
    }
    let (sin, cos) = angle.sin_cos();
    Vec3::new(v.x * cos - v.z * sin, v.y, v.x * sin + v.z * cos)
}

// Five shells, each packed until its turn, then thrown out radially and
// pulled down as it fades.
fn burst_point(seed: u32, id: u32, radius: f32, elapsed: f32) -> Vec3 {
    let burst = id % BURSTS;
    let scale = radius / BURST_REACH;
    let center = Vec3::from_array(BURST_OFFSETS[burst as usize]) * scale;
    let progress = ((elapsed - burst as f32 * BURST_STAGGER) / BURST_DURATION).clamp(0.0, 1.0);

    let polar = hash_unit(seed, id, SALT_BURST) * PI;
    let azimuth = hash_unit(seed, id, SALT_BURST + 1) * TAU;
    let direction = Vec3::new(
        polar.sin() * azimuth.cos(),
        polar.cos(),
        polar.sin() * azimuth.sin(),
    );
    let reach = radius * (0.5 + hash_unit(seed, id, SALT_BURST + 2) * 0.5);
    let distance = reach * (BURST_SHELL + (1.0 - BURST_SHELL) * smoothstep01(progress));
    let fall = BURST_GRAVITY * scale * progress * progress;
    center + direction * distance - Vec3::Y * fall
}

// Smallest base side whose stacked layers (side, side - 2, ...) hold `count`.
// The layers sum to the tetrahedral number side * (side + 1) * (side + 2) / 6.
fn pyramid_base(count: u32) -> u32 {
    let capacity = |side: u64| side * (side + 1) * (side + 2) / 6;
    let mut side = ceil_cbrt(count.saturating_mul(6)).saturating_sub(2).max(1);
    while capacity(u64::from(side)) < u64::from(count) {
        side += 1;
    }
    side
}

fn pyramid_point(rank: u32, count: u32, spacing: f32) -> Vec3 {
    let base = pyramid_base(count);
    let layers = base.div_ceil(PYRAMID_STEP);
    let mut side = base;
    let mut layer = 0;
    let mut remaining = rank;
    while remaining >= side * side && side > PYRAMID_STEP {
        remaining -= side * side;
        side -= PYRAMID_STEP;
        layer += 1;
    }

    let half = (side - 1) as f32 * 0.5;
    Vec3::new(
        ((remaining % side) as f32 - half) * spacing,
        (layer as f32 - (layers - 1) as f32 * 0.5) * spacing,
        ((remaining / side) as f32 - half) * spacing,
    )
}

// Builds rasters on every call; frames go through `Formation::target`.
pub fn generate(name: &str, id: u32, count: u32) -> ShowResult<Target> {
    let kind = FormationKind::from_name(name).ok_or_else(|| ShowError::UnknownFormation {
        segment: name.to_string(),
        name: name.to_string(),
    })?;
    if id >= count {
        return Err(ShowError::EntityOutOfRange {
            segment: name.to_string(),
            id,
            count,
        });
    }

    let config = MotionConfig::default();
    let pads = LaunchPads::new(AddressGrid::new(count), &config);
    let mut formation = Formation::new(kind);
    match kind {
        FormationKind::Text => {
            return Err(ShowError::MissingText {
                segment: name.to_string(),
            })
        }
        FormationKind::Countdown => {
            let digits = (1..=10)
                .rev()
                .map(|value| Raster::rasterize(&value.to_string(), config.countdown_resolution).map(Arc::new))
                .collect::<ShowResult<Vec<_>>>()?;
            formation = formation.with_countdown(Countdown::new(digits, 1.0));
        }
        _ => {}
    }

    let ctx = TargetContext {
        pads: &pads,
        seed: 0,
    };
    Ok(formation.target(
        Slot {
            id,
            rank: id,
            participants: count,
        },
        0.0,
        &ctx,
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn pads(count: u32) -> LaunchPads {
        LaunchPads::new(AddressGrid::new(count), &MotionConfig::default())
    }

    fn slot(rank: u32, participants: u32) -> Slot {
        Slot {
            id: rank,
            rank,
            participants,
        }
    }

    #[test]
    fn grid_round_trips_every_id() {
        for count in [1, 7, 27, 1000, 4096] {
            for id in 0..count {
                let (layer, row, col) = grid_coords(id, count);
                assert_eq!(grid_index(layer, row, col, count), id);
            }
        }
    }

    #[test]
    fn grid_is_centered_with_fixed_spacing() {
        let pads = pads(4096);
        let ctx = TargetContext { pads: &pads, seed: 0 };
        let grid = Formation::new(FormationKind::Grid);
        let first = grid.target(slot(0, 4096), 0.0, &ctx);
        let last = grid.target(slot(4095, 4096), 0.0, &ctx);
        assert_eq!(first.position, Vec3::splat(-375.0));
        assert_eq!(last.position, Vec3::splat(375.0));
        assert_eq!(first.group, Group::Body);
    }

    #[test]
    fn sphere_has_no_close_pairs_and_even_bands() {
        let count = 4096u32;
        let radius = 400.0;
        let points: Vec<Vec3> = (0..count)
            .map(|i| sphere_point(i, count, 0.0) * radius)
            .collect();

        let expected_spacing = (4.0 * PI * radius * radius / count as f32).sqrt();
        let mut min_dist_sq = f32::MAX;
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                min_dist_sq = min_dist_sq.min(points[i].distance_squared(points[j]));
            }
        }
        assert!(min_dist_sq.sqrt() > 0.5 * expected_spacing);

        // Equal-height bands on a sphere have equal area.
        let bands = 16;
        let mut counts = vec![0u32; bands];
        for p in &points {
            let band = (((p.y / radius + 1.0) * 0.5) * bands as f32).floor() as usize;
            counts[band.min(bands - 1)] += 1;
        }
        let mean = count as f32 / bands as f32;
        for c in counts {
            assert!((c as f32 - mean).abs() <= 2.0, "band count {c} vs mean {mean}");
        }
    }

    #[test]
    fn sphere_points_lie_on_the_sphere() {
        for i in 0..512 {
            let p = sphere_point(i, 512, 0.0);
            assert!((p.length() - 1.0).abs() < 1.0e-4);
        }
    }

    #[test]
    fn every_formation_is_deterministic() {
        let pads = pads(256);
        let ctx = TargetContext { pads: &pads, seed: 42 };
        let raster = Arc::new(Raster::rasterize("HI", 32).unwrap());
        for kind in FormationKind::ALL {
            let mut formation = Formation::new(kind);
            formation.jitter = 0.3;
            if kind.uses_raster() {
                formation = formation
                    .with_raster(Arc::clone(&raster))
                    .with_countdown(Countdown::new(vec![Arc::clone(&raster)], 1.0));
            }
            for rank in 0..256 {
                let a = formation.target(slot(rank, 256), 1.25, &ctx);
                let b = formation.target(slot(rank, 256), 1.25, &ctx);
                assert_eq!(a.position.to_array().map(f32::to_bits), b.position.to_array().map(f32::to_bits));
                assert_eq!(a.group, b.group);
                assert!(a.position.is_finite(), "{kind:?} rank {rank}");
            }
        }
    }

    #[test]
    fn dense_text_spreads_participants_and_hides_surplus() {
        let pads = pads(4096);
        let ctx = TargetContext { pads: &pads, seed: 0 };
        let raster = Arc::new(Raster::rasterize("I", 16).unwrap());
        let lit = raster.lit_pixels().len() as u32;
        let text = Formation::new(FormationKind::Text).with_raster(raster);

        let few = lit / 2;
        for rank in 0..few {
            assert_eq!(text.target(slot(rank, few), 0.0, &ctx).group, Group::Glyph);
        }

        let many = lit + 10;
        for rank in 0..many {
            let target = text.target(slot(rank, many), 0.0, &ctx);
            if rank < lit {
                assert_eq!(target.group, Group::Glyph);
            } else {
                assert_eq!(target.group, Group::Hidden);
                assert_eq!(target.position, pads.position(rank));
            }
        }
    }

    #[test]
    fn direct_countdown_keeps_dark_pixels_in_place() {
        let pads = pads(1024);
        let ctx = TargetContext { pads: &pads, seed: 0 };
        let digits = vec![
            Arc::new(Raster::rasterize("2", 32).unwrap()),
            Arc::new(Raster::rasterize("1", 32).unwrap()),
        ];
        let countdown = Countdown::new(digits.clone(), 1.0);
        assert_eq!(countdown.value_at(0.5), 2);
        assert_eq!(countdown.value_at(1.5), 1);
        assert_eq!(countdown.value_at(9.0), 1);
        assert_eq!(countdown.value_at(-3.0), 2);

        let formation = Formation::new(FormationKind::Countdown).with_countdown(countdown);
        assert_eq!(formation.sparse_lit(1024), None);
        for rank in [0u32, 100, 500, 1023] {
            let early = formation.target(slot(rank, 1024), 0.5, &ctx);
            let morphing = formation.target(slot(rank, 1024), 1.2, &ctx);
            let late = formation.target(slot(rank, 1024), 1.75, &ctx);
            assert_eq!(early.position, morphing.position);
            assert_eq!(early.position, late.position);
            assert_eq!(early.group == Group::Digit, digits[0].is_lit(rank));
            assert_eq!(late.group == Group::Digit, digits[1].is_lit(rank));
        }
    }

    #[test]
    fn direct_mapping_needs_matching_counts() {
        let raster = Arc::new(Raster::rasterize("HELLO", 64).unwrap());
        let lit = raster.lit_pixels().len();
        let mut text = Formation::new(FormationKind::Text).with_raster(Arc::clone(&raster));
        text.mapping = RasterMapping::Direct;

        for participants in [256u32, 1024, 4096] {
            let pads = pads(participants);
            let ctx = TargetContext { pads: &pads, seed: 0 };
            let covered: HashSet<[u32; 3]> = (0..participants)
                .map(|rank| text.target(slot(rank, participants), 0.0, &ctx))
                .filter(|target| target.group == Group::Glyph)
                .map(|target| target.position.to_array().map(f32::to_bits))
                .collect();
            assert_eq!(covered.len(), lit.min(participants as usize), "{participants} participants");
        }
        assert_eq!(text.sparse_lit(1024), Some(lit));
        assert_eq!(text.sparse_lit(4096), None);
    }

    #[test]
    fn dense_countdown_morphs_between_digits() {
        let pads = pads(1024);
        let ctx = TargetContext { pads: &pads, seed: 0 };
        let digits: Vec<Arc<Raster>> = ["3", "2", "1"]
            .iter()
            .map(|text| Arc::new(Raster::rasterize(text, 32).unwrap()))
            .collect();
        let mut formation =
            Formation::new(FormationKind::Countdown).with_countdown(Countdown::new(digits.clone(), 1.0));
        formation.mapping = RasterMapping::Dense;
        assert!(formation.sparse_lit(1024).is_some());

        for rank in 0..1024 {
            for edge in [1.0f32, 2.0] {
                let before = formation.target(slot(rank, 1024), edge - 1.0e-4, &ctx);
                let after = formation.target(slot(rank, 1024), edge + 1.0e-4, &ctx);
                assert!(before.position.distance(after.position) < 0.1, "rank {rank} at {edge}");
            }
            let settled = formation.target(slot(rank, 1024), 1.75, &ctx);
            let digit = formation.raster_target(&digits[1], slot(rank, 1024), Group::Digit, &ctx);
            assert_eq!(settled, digit);
        }
    }

    #[test]
    fn fireworks_burst_in_turn() {
        let pads = pads(500);
        let ctx = TargetContext { pads: &pads, seed: 3 };
        let fireworks = Formation::new(FormationKind::Fireworks);
        let radius = fireworks.radius;
        let spread = |id: u32, elapsed: f32| {
            let center = Vec3::from_array(BURST_OFFSETS[(id % BURSTS) as usize]);
            let fall = if elapsed >= BURST_STAGGER * (id % BURSTS) as f32 + BURST_DURATION {
                BURST_GRAVITY
            } else {
                0.0
            };
            let target = fireworks.target(slot(id, 500), elapsed, &ctx);
            assert_eq!(target.group, Group::Burst);
            (target.position + Vec3::Y * fall).distance(center)
        };

        for id in 0..500 {
            assert!(spread(id, 0.0) <= radius * BURST_SHELL + 1.0e-3);
        }
        // Burst 0 is done by 4 s while burst 4 waits until 8 s.
        for id in (0..500).step_by(BURSTS as usize) {
            assert!(spread(id, 4.0) >= radius * 0.5 - 1.0e-3);
            assert!(spread(id + 4, 4.0) <= radius * BURST_SHELL + 1.0e-3);
            assert!(spread(id + 4, 12.0) >= radius * 0.5 - 1.0e-3);
        }
        assert_eq!(
            fireworks.target(slot(7, 500), 5.0, &ctx),
            fireworks.target(slot(7, 500), 5.0, &ctx)
        );
    }

    #[test]
    fn pyramid_layers_shrink_toward_the_apex() {
        assert_eq!(pyramid_base(1), 1);
        assert_eq!(pyramid_base(10), 3);
        assert_eq!(pyramid_base(11), 4);
        assert_eq!(pyramid_base(1540), 20);

        let count = 1000;
        let spacing = 12.0;
        let points: Vec<Vec3> = (0..count).map(|rank| pyramid_point(rank, count, spacing)).collect();
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                assert!(points[i].distance(points[j]) >= spacing - 1.0e-3);
            }
        }

        let base = pyramid_base(count);
        let floor = points.iter().map(|p| p.y).fold(f32::MAX, f32::min);
        for p in &points {
            let layer = ((p.y - floor) / spacing).round();
            let reach = ((base - 1) as f32 * 0.5 - layer) * spacing;
            assert!(p.x.abs() <= reach + 1.0e-3 && p.z.abs() <= reach + 1.0e-3);
        }
    }

    #[test]
    fn launch_pads_follow_the_address_grid() {
        let pads = pads(4096);
        assert_eq!(pads.position(0), Vec3::new(-1260.0, -70.0, -1260.0));
        assert_eq!(pads.position(4095), Vec3::new(1260.0, -70.0, 1260.0));
    }

    #[test]
    fn generate_by_name() {
        let sphere = generate("sphere", 0, 4096).unwrap();
        assert_eq!(sphere.group, Group::Shell);
        assert_eq!(generate("CUBE", 0, 8).unwrap().position, Vec3::splat(-25.0));
        assert!(matches!(
            generate("torus", 0, 8),
            Err(ShowError::UnknownFormation { .. })
        ));
        assert!(matches!(
            generate("grid", 8, 8),
            Err(ShowError::EntityOutOfRange { .. })
        ));
        assert!(matches!(generate("text", 0, 8), Err(ShowError::MissingText { .. })));
        assert_eq!(generate("countdown", 0, 1024).unwrap().group, Group::Hidden);
        assert_eq!(generate("countdown", 0, 4096).unwrap().group, Group::Digit);
        assert_eq!(generate("burst", 0, 64).unwrap().group, Group::Burst);
        assert_eq!(generate("pyramid", 0, 64).unwrap().group, Group::Pyramid);
    }

    #[test]
    fn helix_tags_both_strands_and_rungs() {
        let groups: Vec<Group> = (0..200).map(|r| helix_point(r, 200, 80.0).1).collect();
        assert!(groups.contains(&Group::StrandA));
        assert!(groups.contains(&Group::StrandB));
        assert!(groups.contains(&Group::Rung));
    }

    #[test]
    fn group_round_trips_through_u32() {
        for value in 0..14 {
            assert_eq!(Group::from_u32(value).as_u32(), value);
        }
    }
}
