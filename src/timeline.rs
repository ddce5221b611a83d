use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::address_grid::AddressGrid;
use crate::config::MotionConfig;
use crate::error::{ShowError, ShowResult};
use crate::formation::{
    Countdown, Formation, FormationKind, LaunchPads, RasterMapping, Slot, Target, TargetContext,
};
use crate::math::{hash_unit, smoothstep01};
use crate::raster::RasterCache;
use crate::MAX_ENTITIES;

pub const DEFAULT_COUNTDOWN_FROM: u32 = 10;
pub const MAX_COUNTDOWN_FROM: u32 = 99;

const SALT_DELAY: u32 = 21;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineConfig {
    pub motion: MotionConfig,
    pub segments: Vec<SegmentConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentConfig {
    pub name: String,
    pub start_time: f32,
    pub duration: f32,
    pub formation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown_from: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<RasterMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spin: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_row_range: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id_range: Option<[u32; 2]>,
    #[serde(default)]
    pub stagger: bool,
}

impl SegmentConfig {
    pub fn new(name: &str, formation_type: &str, start_time: f32, duration: f32) -> Self {
        Self {
            name: name.to_string(),
            start_time,
            duration,
            formation_type: formation_type.to_string(),
            center: None,
            radius: None,
            spacing: None,
            text: None,
            countdown_from: None,
            mapping: None,
            spin: None,
            jitter: None,
            participant_row_range: None,
            participant_id_range: None,
            stagger: false,
        }
    }
}

impl TimelineConfig {
    pub fn from_json(json: &str) -> ShowResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn finale() -> Self {
        let lifted = Some([0.0, 400.0, 0.0]);
        let segment = |name: &str, kind: &str, start: f32, duration: f32| SegmentConfig {
            center: lifted,
            ..SegmentConfig::new(name, kind, start, duration)
        };

        Self {
            motion: MotionConfig::default(),
            segments: vec![
                segment("launch", "cube", 0.0, 8.0),
                segment("sphere", "sphere", 10.0, 4.0),
                SegmentConfig {
                    text: Some("HELLO".to_string()),
                    mapping: Some(RasterMapping::Direct),
                    ..segment("greeting", "text", 16.0, 4.0)
                },
                SegmentConfig {
                    countdown_from: Some(DEFAULT_COUNTDOWN_FROM),
                    ..segment("countdown", "countdown", 22.0, 10.0)
                },
                segment("heart", "heart", 34.0, 5.0),
                segment("pyramid", "pyramid", 41.0, 4.0),
                segment("fireworks", "fireworks", 47.0, 12.0),
                SegmentConfig {
                    center: None,
                    stagger: true,
                    ..segment("land", "launchpad", 61.0, 8.0)
                },
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParticipantRange {
    pub first: u32,
    pub last: u32,
}

impl ParticipantRange {
    pub fn contains(&self, id: u32) -> bool {
        (self.first..=self.last).contains(&id)
    }

    pub fn count(&self) -> u32 {
        self.last - self.first + 1
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

#[derive(Clone, Debug)]
pub struct Segment {
    pub name: String,
    pub start: f32,
    pub duration: f32,
    pub formation: Formation,
    pub participants: ParticipantRange,
    pub stagger: bool,
    max_row: u32,
}

impl Segment {
    pub fn end(&self) -> f32 {
        self.start + self.duration
    }

    pub fn has_started(&self, time: f32) -> bool {
        self.start <= time
    }

    pub fn is_active(&self, time: f32) -> bool {
        self.start <= time && time <= self.end()
    }

    pub fn slot(&self, id: u32) -> Slot {
        Slot {
            id,
            rank: id - self.participants.first,
            participants: self.participants.count(),
        }
    }

    pub fn target(&self, id: u32, time: f32, ctx: &TargetContext) -> Target {
        self.formation.target(self.slot(id), time - self.start, ctx)
    }

    // Reaches exactly 1 at the segment end.
    pub fn progress(&self, time: f32, delay: f32) -> f32 {
        let travel = (self.duration - delay).max(f32::MIN_POSITIVE);
        smoothstep01(((time - self.start - delay) / travel).clamp(0.0, 1.0))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TimelineWarning {
    Overlap { earlier: String, later: String },
    InterleavedStagger { row_delay: f32, delay_jitter: f32 },
    SparseRaster { segment: String, lit: usize, participants: u32 },
}

impl fmt::Display for TimelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlap { earlier, later } => write!(
                f,
                "segments `{earlier}` and `{later}` overlap for shared participants; `{later}` takes priority"
            ),
            Self::InterleavedStagger {
                row_delay,
                delay_jitter,
            } => write!(
                f,
                "delay jitter {delay_jitter} exceeds row delay {row_delay}; adjacent rows may launch out of order"
            ),
            Self::SparseRaster {
                segment,
                lit,
                participants,
            } => write!(
                f,
                "segment `{segment}` has {participants} participants but only {lit} lit pixels; the rest stay hidden"
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveSegment<'a> {
    pub index: usize,
    pub name: &'a str,
    pub kind: FormationKind,
    pub weight: f32,
    pub participants: ParticipantRange,
}

#[derive(Debug)]
pub struct Timeline {
    segments: Vec<Segment>,
    config: MotionConfig,
    grid: AddressGrid,
    pads: LaunchPads,
    seed: u32,
    warnings: Vec<TimelineWarning>,
    raster_count: usize,
}

impl Timeline {
    pub fn from_config(entity_count: u32, seed: u32, config: TimelineConfig) -> ShowResult<Self> {
        if entity_count == 0 || entity_count as usize > MAX_ENTITIES {
            return Err(ShowError::InvalidEntityCount(entity_count as usize));
        }
        let TimelineConfig {
            mut motion,
            segments: descriptors,
        } = config;
        motion.sanitize();

        let grid = AddressGrid::new(entity_count);
        let mut rasters = RasterCache::default();
        let mut segments = descriptors
            .iter()
            .map(|descriptor| build_segment(descriptor, &grid, &motion, &mut rasters))
            .collect::<ShowResult<Vec<_>>>()?;
        // Stable: equal starts keep registration order.
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut timeline = Self {
            segments,
            config: motion,
            grid,
            pads: LaunchPads::new(grid, &motion),
            seed,
            warnings: Vec::new(),
            raster_count: rasters.len(),
        };
        timeline.warnings = timeline.validate();
        for warning in &timeline.warnings {
            warn!(%warning, "timeline warning");
        }
        info!(
            entities = entity_count,
            segments = timeline.segments.len(),
            rasters = timeline.raster_count,
            end_time = timeline.end_time(),
            "timeline loaded"
        );
        Ok(timeline)
    }

    fn validate(&self) -> Vec<TimelineWarning> {
        let mut warnings = Vec::new();

        for (i, earlier) in self.segments.iter().enumerate() {
            for later in &self.segments[i + 1..] {
                if later.start < earlier.end() && earlier.participants.overlaps(&later.participants)
                {
                    warnings.push(TimelineWarning::Overlap {
                        earlier: earlier.name.clone(),
                        later: later.name.clone(),
                    });
                }
            }
        }

        if self.config.delay_jitter > self.config.row_delay {
            warnings.push(TimelineWarning::InterleavedStagger {
                row_delay: self.config.row_delay,
                delay_jitter: self.config.delay_jitter,
            });
        }

        for segment in &self.segments {
            let participants = segment.participants.count();
            if let Some(lit) = segment.formation.sparse_lit(participants) {
                warnings.push(TimelineWarning::SparseRaster {
                    segment: segment.name.clone(),
                    lit,
                    participants,
                });
            }
        }

        warnings
    }

    pub fn resolve(&self, time: f32) -> Vec<ActiveSegment<'_>> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| segment.is_active(time))
            .map(|(index, segment)| ActiveSegment {
                index,
                name: &segment.name,
                kind: segment.formation.kind,
                weight: segment.progress(time, 0.0),
                participants: segment.participants,
            })
            .collect()
    }

    pub fn entity_segments(&self, id: u32, time: f32) -> impl Iterator<Item = &Segment> + '_ {
        self.segments
            .iter()
            .filter(move |segment| segment.participants.contains(id) && segment.has_started(time))
    }

    pub fn active_for(&self, id: u32, time: f32) -> Option<&Segment> {
        self.entity_segments(id, time).last()
    }

    // Rows behind the segment's last participant row wait longer.
    pub fn launch_delay(&self, id: u32, segment: &Segment) -> f32 {
        let rows_behind = segment.max_row.saturating_sub(self.grid.row(id)) as f32;
        let delay = rows_behind * self.config.row_delay
            + hash_unit(self.seed, id, SALT_DELAY) * self.config.delay_jitter;
        delay.min(self.config.stagger_budget(segment.duration))
    }

    pub fn target_context(&self) -> TargetContext<'_> {
        TargetContext {
            pads: &self.pads,
            seed: self.seed,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn warnings(&self) -> &[TimelineWarning] {
        &self.warnings
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn grid(&self) -> &AddressGrid {
        &self.grid
    }

    pub fn pads(&self) -> &LaunchPads {
        &self.pads
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn raster_count(&self) -> usize {
        self.raster_count
    }

    pub fn end_time(&self) -> f32 {
        self.segments.iter().map(Segment::end).fold(0.0, f32::max)
    }
}

fn invalid(segment: &str, reason: impl Into<String>) -> ShowError {
    ShowError::InvalidSegment {
        segment: segment.to_string(),
        reason: reason.into(),
    }
}

fn finite_param(segment: &str, field: &str, value: Option<f32>) -> ShowResult<Option<f32>> {
    match value {
        Some(v) if !v.is_finite() => Err(invalid(segment, format!("{field} is not finite"))),
        Some(v) if v < 0.0 && (field == "radius" || field == "spacing") => {
            Err(invalid(segment, format!("{field} is negative")))
        }
        other => Ok(other),
    }
}

fn build_segment(
    descriptor: &SegmentConfig,
    grid: &AddressGrid,
    motion: &MotionConfig,
    rasters: &mut RasterCache,
) -> ShowResult<Segment> {
    let name = descriptor.name.as_str();
    if !descriptor.start_time.is_finite() {
        return Err(invalid(name, "startTime is not finite"));
    }
    if !descriptor.duration.is_finite() || descriptor.duration <= 0.0 {
        return Err(invalid(name, "duration must be finite and positive"));
    }

    let kind = FormationKind::from_name(&descriptor.formation_type).ok_or_else(|| {
        ShowError::UnknownFormation {
            segment: name.to_string(),
            name: descriptor.formation_type.clone(),
        }
    })?;
    let participants = resolve_participants(descriptor, grid)?;

    let mut formation = Formation::new(kind);
    if let Some(center) = descriptor.center {
        let center = Vec3::from_array(center);
        if !center.is_finite() {
            return Err(invalid(name, "center is not finite"));
        }
        formation.center = center;
    }
    if let Some(radius) = finite_param(name, "radius", descriptor.radius)? {
        formation.radius = radius;
    }
    if let Some(spacing) = finite_param(name, "spacing", descriptor.spacing)? {
        formation.spacing = spacing;
    }
    if let Some(spin) = finite_param(name, "spin", descriptor.spin)? {
        formation.spin = spin;
    }
    if let Some(jitter) = finite_param(name, "jitter", descriptor.jitter)? {
        formation.jitter = jitter;
    }
    if let Some(mapping) = descriptor.mapping {
        formation.mapping = mapping;
    }

    match kind {
        FormationKind::Text => {
            let text = descriptor
                .text
                .as_deref()
                .filter(|text| !text.trim().is_empty())
                .ok_or_else(|| ShowError::MissingText {
                    segment: name.to_string(),
                })?;
            let raster = rasters.get_or_rasterize(text, motion.raster_resolution)?;
            formation = formation.with_raster(raster);
        }
        FormationKind::Countdown => {
            let from = descriptor.countdown_from.unwrap_or(DEFAULT_COUNTDOWN_FROM);
            if !(1..=MAX_COUNTDOWN_FROM).contains(&from) {
                return Err(invalid(
                    name,
                    format!("countdownFrom must be within 1..={MAX_COUNTDOWN_FROM}"),
                ));
            }
            let digits = (1..=from)
                .rev()
                .map(|value| rasters.get_or_rasterize(&value.to_string(), motion.countdown_resolution))
                .collect::<ShowResult<Vec<Arc<_>>>>()?;
            formation =
                formation.with_countdown(Countdown::new(digits, descriptor.duration / from as f32));
        }
        _ => {}
    }

    Ok(Segment {
        name: name.to_string(),
        start: descriptor.start_time,
        duration: descriptor.duration,
        formation,
        participants,
        stagger: descriptor.stagger,
        max_row: grid.row(participants.last),
    })
}

fn resolve_participants(descriptor: &SegmentConfig, grid: &AddressGrid) -> ShowResult<ParticipantRange> {
    let name = descriptor.name.as_str();
    let count = grid.count();
    let mut range = ParticipantRange {
        first: 0,
        last: count - 1,
    };

    if let Some([first_row, last_row]) = descriptor.participant_row_range {
        if first_row > last_row {
            return Err(invalid(name, "participantRowRange is reversed"));
        }
        if last_row > grid.max_row() {
            return Err(ShowError::RowOutOfRange {
                segment: name.to_string(),
                row: last_row,
                max_row: grid.max_row(),
            });
        }
        let side = u64::from(grid.side());
        range.first = (u64::from(first_row) * side) as u32;
        range.last = ((u64::from(last_row) + 1) * side - 1).min(u64::from(count - 1)) as u32;
    }

    if let Some([first_id, last_id]) = descriptor.participant_id_range {
        if first_id > last_id {
            return Err(invalid(name, "participantIdRange is reversed"));
        }
        if last_id >= count {
            return Err(ShowError::EntityOutOfRange {
                segment: name.to_string(),
                id: last_id,
                count,
            });
        }
        range.first = range.first.max(first_id);
        range.last = range.last.min(last_id);
    }

    if range.first > range.last {
        return Err(invalid(name, "participant row and id ranges do not intersect"));
    }
    Ok(range)
}
