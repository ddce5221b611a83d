use glam::Vec3;
use wasm_bindgen::prelude::*;

pub mod address_grid;
pub mod config;
pub mod error;
pub mod formation;
mod frame;
pub mod math;
pub mod motion;
pub mod raster;
pub mod timeline;

pub use address_grid::AddressGrid;
pub use config::MotionConfig;
pub use error::{ShowError, ShowResult};
pub use formation::{generate, FormationKind, Group, Target};
pub use math::MathMode;
pub use motion::EntityPhase;
pub use timeline::{SegmentConfig, Timeline, TimelineConfig, TimelineWarning};

pub const MAX_ENTITIES: usize = 1 << 20;
pub const DEFAULT_SEED: u32 = 0x5eed_0f1e;

#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    pub positions: &'a [f32],
    pub colors: &'a [f32],
    pub groups: &'a [u32],
    pub headings: &'a [f32],
}

#[wasm_bindgen]
pub struct Show {
    timeline: Timeline,
    front: Vec<Vec3>,
    back: Vec<Vec3>,
    groups: Vec<Group>,
    phases: Vec<EntityPhase>,
    updates: Vec<motion::EntityUpdate>,
    positions: Vec<f32>,
    colors: Vec<f32>,
    group_ids: Vec<u32>,
    headings: Vec<f32>,
    time: f32,
    frame_index: u64,
    parallel: bool,
    degenerate_last_frame: usize,
    degenerate_logged: bool,
}

#[wasm_bindgen]
impl Show {
    #[wasm_bindgen(constructor)]
    pub fn new(entity_count: u32, seed: u32, timeline_json: &str) -> Result<Show, JsError> {
        Ok(Show::from_json(entity_count as usize, seed, timeline_json)?)
    }

    #[wasm_bindgen(js_name = finale)]
    pub fn finale_show(entity_count: u32, seed: u32) -> Result<Show, JsError> {
        Ok(Show::finale(entity_count as usize, seed)?)
    }

    pub fn advance(&mut self, time: f32) {
        self.advance_frame(time);
    }

    pub fn count(&self) -> usize {
        self.front.len()
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn positions_ptr(&self) -> *const f32 {
        self.positions.as_ptr()
    }

    pub fn colors_ptr(&self) -> *const f32 {
        self.colors.as_ptr()
    }

    pub fn groups_ptr(&self) -> *const u32 {
        self.group_ids.as_ptr()
    }

    pub fn headings_ptr(&self) -> *const f32 {
        self.headings.as_ptr()
    }

    pub fn phases_ptr(&self) -> *const u32 {
        self.phases.as_ptr() as *const u32
    }

    pub fn warning_count(&self) -> usize {
        self.timeline.warnings().len()
    }

    pub fn degenerate_last_frame(&self) -> usize {
        self.degenerate_last_frame
    }

    pub fn show_end_time(&self) -> f32 {
        self.timeline.end_time()
    }
}

impl Show {
    pub fn initialize(entity_count: usize, seed: u32, config: TimelineConfig) -> ShowResult<Self> {
        if entity_count == 0 || entity_count > MAX_ENTITIES {
            return Err(ShowError::InvalidEntityCount(entity_count));
        }

        let timeline = Timeline::from_config(entity_count as u32, seed, config)?;
        let front: Vec<Vec3> = (0..entity_count as u32)
            .map(|id| timeline.pads().position(id))
            .collect();

        let mut show = Self {
            timeline,
            back: front.clone(),
            front,
            groups: vec![Group::Pad; entity_count],
            phases: vec![EntityPhase::Launching; entity_count],
            updates: Vec::with_capacity(entity_count),
            positions: vec![0.0; entity_count * 3],
            colors: vec![0.0; entity_count * 3],
            group_ids: vec![Group::Pad.as_u32(); entity_count],
            headings: Vec3::NEG_Z.to_array().repeat(entity_count),
            time: 0.0,
            frame_index: 0,
            parallel: false,
            degenerate_last_frame: 0,
            degenerate_logged: false,
        };
        show.sync_render_buffers();
        Ok(show)
    }

    pub fn from_json(entity_count: usize, seed: u32, timeline_json: &str) -> ShowResult<Self> {
        Self::initialize(entity_count, seed, TimelineConfig::from_json(timeline_json)?)
    }

    pub fn finale(entity_count: usize, seed: u32) -> ShowResult<Self> {
        Self::initialize(entity_count, seed, TimelineConfig::finale())
    }

    pub fn output(&self) -> FrameView<'_> {
        FrameView {
            positions: &self.positions,
            colors: &self.colors,
            groups: &self.group_ids,
            headings: &self.headings,
        }
    }

    pub fn position(&self, id: u32) -> Option<Vec3> {
        self.front.get(id as usize).copied()
    }

    pub fn phases(&self) -> &[EntityPhase] {
        &self.phases
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn config(&self) -> &MotionConfig {
        self.timeline.config()
    }

    // Ignored on wasm32.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }
}

#[wasm_bindgen]
pub fn entropy_seed() -> u32 {
    getrandom::u32().unwrap_or(DEFAULT_SEED)
}

pub(crate) fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(min, max)
}
