use std::f32::consts::TAU;

use glam::Vec3;

use crate::config::MotionConfig;
use crate::formation::{Group, TargetContext};
use crate::math::{
    blend, hash_signed, hash_unit, limit_magnitude, normalize_to_magnitude, quadratic_bezier,
    smoothstep,
};
use crate::timeline::{Segment, Timeline};

const SALT_HOVER: u32 = 31;
const SALT_FALLBACK: u32 = 41;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum EntityPhase {
    #[default]
    Launching = 0,
    InTransit = 1,
    Arrived = 2,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityUpdate {
    pub position: Vec3,
    pub heading: Vec3,
    pub group: Group,
    pub phase: EntityPhase,
    pub degenerate: bool,
}

impl EntityUpdate {
    fn held(position: Vec3, group: Group, phase: EntityPhase) -> Self {
        Self {
            position,
            heading: Vec3::NEG_Z,
            group,
            phase,
            degenerate: true,
        }
    }
}

pub struct FrameContext<'a> {
    pub timeline: &'a Timeline,
    pub previous: &'a [Vec3],
    pub groups: &'a [Group],
    pub phases: &'a [EntityPhase],
    pub time: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plan {
    pub position: Vec3,
    pub group: Group,
    pub phase: EntityPhase,
    pub hover_weight: f32,
}

struct Link<'a> {
    segment: &'a Segment,
    delay: f32,
    from: Vec3,
    from_group: Group,
    from_hover: f32,
    launch: bool,
}

struct LinkState {
    position: Vec3,
    group: Group,
    hover: f32,
    progress: f32,
}

impl Link<'_> {
    fn eval(&self, id: u32, time: f32, ctx: &TargetContext, config: &MotionConfig) -> LinkState {
        let target = self.segment.target(id, time, ctx);
        let progress = self.segment.progress(time, self.delay);
        let settled = smoothstep(0.0, config.settle_time, time - self.segment.end());

        if self.launch {
            return LinkState {
                position: target.position,
                group: target.group,
                hover: if progress < 1.0 { 0.0 } else { settled },
                progress,
            };
        }

        LinkState {
            position: blend(self.from, target.position, progress),
            group: if progress >= 0.5 {
                target.group
            } else {
                self.from_group
            },
            hover: if progress < 1.0 {
                self.from_hover * (1.0 - progress)
            } else {
                settled
            },
            progress,
        }
    }
}

pub fn plan_entity(timeline: &Timeline, id: u32, time: f32) -> Plan {
    let ctx = timeline.target_context();
    let config = timeline.config();
    let pad = ctx.pads.position(id);

    let mut segments = timeline.entity_segments(id, time);
    let Some(launch) = segments.next() else {
        return Plan {
            position: pad,
            group: Group::Pad,
            phase: EntityPhase::Launching,
            hover_weight: 0.0,
        };
    };

    let launch_delay = timeline.launch_delay(id, launch);
    let mut link = Link {
        segment: launch,
        delay: launch_delay,
        from: pad,
        from_group: Group::Pad,
        from_hover: 0.0,
        launch: true,
    };
    for next in segments {
        let frozen = link.eval(id, next.start, &ctx, config);
        link = Link {
            segment: next,
            delay: if next.stagger {
                timeline.launch_delay(id, next)
            } else {
                0.0
            },
            from: frozen.position,
            from_group: frozen.group,
            from_hover: frozen.hover,
            launch: false,
        };
    }
    let state = link.eval(id, time, &ctx, config);

    let flight = launch.progress(time, launch_delay);
    let launch_target = launch.target(id, time, &ctx).position;
    let control = control_point(launch_target, launch.formation.center, config);

    let phase = if flight <= 0.0 {
        EntityPhase::Launching
    } else if flight < 1.0 || state.progress < 1.0 {
        EntityPhase::InTransit
    } else {
        EntityPhase::Arrived
    };

    Plan {
        position: quadratic_bezier(pad, control, state.position, flight),
        group: if phase == EntityPhase::Launching {
            Group::Pad
        } else {
            state.group
        },
        phase,
        hover_weight: state.hover * flight,
    }
}

pub fn control_point(target: Vec3, center: Vec3, config: &MotionConfig) -> Vec3 {
    let outward = normalize_to_magnitude(config.math_mode, target - center, config.control_distance)
        .unwrap_or(Vec3::Y * config.control_distance);
    target + outward
}

pub fn hover_offset(config: &MotionConfig, seed: u32, id: u32, time: f32) -> Vec3 {
    let omega = TAU * config.hover_frequency;
    let axis = |salt: u32| {
        (omega * time + hash_unit(seed, id, SALT_HOVER + salt) * TAU).sin() * config.hover_amplitude
    };
    Vec3::new(axis(0), axis(1), axis(2))
}

pub fn repulsion(
    config: &MotionConfig,
    seed: u32,
    id: u32,
    position: Vec3,
    neighbors: &[(u32, Vec3)],
) -> Vec3 {
    let radius = config.repulsion_radius;
    if radius <= 0.0 || config.repulsion_strength <= 0.0 {
        return Vec3::ZERO;
    }

    let radius_sq = radius * radius;
    let mut push = Vec3::ZERO;
    for &(other_id, other) in neighbors {
        let diff = position - other;
        let dist_sq = diff.length_squared();
        if dist_sq >= radius_sq {
            continue;
        }
        let direction = normalize_to_magnitude(config.math_mode, diff, 1.0)
            .unwrap_or_else(|| fallback_direction(seed, id, other_id));
        push += direction * ((radius - dist_sq.sqrt()) * config.repulsion_strength);
    }

    limit_magnitude(config.math_mode, push, config.max_repulsion)
}

// Coincident pair: both sides derive the same axis from the unordered pair
// and take opposite signs.
fn fallback_direction(seed: u32, id: u32, other: u32) -> Vec3 {
    let (lo, hi) = (id.min(other), id.max(other));
    let key = seed ^ lo.wrapping_mul(0x27d4_eb2f);
    let axis = Vec3::new(
        hash_signed(key, hi, SALT_FALLBACK),
        hash_signed(key, hi, SALT_FALLBACK + 1),
        hash_signed(key, hi, SALT_FALLBACK + 2),
    )
    .try_normalize()
    .unwrap_or(Vec3::X);
    if id < other {
        axis
    } else {
        -axis
    }
}

pub fn evaluate_entity(frame: &FrameContext, id: u32) -> EntityUpdate {
    let index = id as usize;
    let previous = frame.previous[index];
    let timeline = frame.timeline;
    let config = timeline.config();

    if !frame.time.is_finite() {
        return EntityUpdate::held(previous, frame.groups[index], frame.phases[index]);
    }

    let plan = plan_entity(timeline, id, frame.time);
    let mut intended = plan.position;
    if plan.hover_weight > 0.0 {
        intended += hover_offset(config, timeline.seed(), id, frame.time) * plan.hover_weight;
    }
    if !intended.is_finite() {
        return EntityUpdate::held(previous, frame.groups[index], frame.phases[index]);
    }

    let mut neighbors = [(0u32, Vec3::ZERO); 8];
    let mut found = 0;
    timeline.grid().for_each_neighbor(id, |j| {
        neighbors[found] = (j, frame.previous[j as usize]);
        found += 1;
    });

    let position = intended + repulsion(config, timeline.seed(), id, intended, &neighbors[..found]);
    if !position.is_finite() {
        return EntityUpdate::held(previous, frame.groups[index], frame.phases[index]);
    }

    EntityUpdate {
        position,
        heading: normalize_to_magnitude(config.math_mode, position - previous, 1.0)
            .unwrap_or(Vec3::NEG_Z),
        group: plan.group,
        phase: plan.phase,
        degenerate: false,
    }
}
