use std::mem;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;
use tracing::warn;

use crate::motion::{evaluate_entity, EntityUpdate, FrameContext};
use crate::Show;

impl Show {
    pub(super) fn advance_frame(&mut self, time: f32) {
        self.frame_index = self.frame_index.wrapping_add(1);
        self.time = time;

        let frame = FrameContext {
            timeline: &self.timeline,
            previous: &self.front,
            groups: &self.groups,
            phases: &self.phases,
            time,
        };
        evaluate_all(&frame, self.parallel, &mut self.updates);

        self.commit_updates();
        self.sync_render_buffers();
        self.debug_validate_state();
    }

    fn commit_updates(&mut self) {
        let mut degenerate = 0;
        for (i, update) in self.updates.iter().enumerate() {
            self.back[i] = update.position;
            self.groups[i] = update.group;
            self.phases[i] = update.phase;
            self.headings[i * 3..i * 3 + 3].copy_from_slice(&update.heading.to_array());
            if update.degenerate {
                degenerate += 1;
            }
        }
        mem::swap(&mut self.front, &mut self.back);

        self.degenerate_last_frame = degenerate;
        if degenerate > 0 && !self.degenerate_logged {
            self.degenerate_logged = true;
            warn!(
                frame = self.frame_index,
                time = self.time,
                entities = degenerate,
                "non-finite entity update; holding last good position"
            );
        }
    }

    pub(super) fn sync_render_buffers(&mut self) {
        let seed = self.timeline.seed();
        for (i, position) in self.front.iter().enumerate() {
            let base = i * 3;
            self.positions[base..base + 3].copy_from_slice(&position.to_array());
            let group = self.groups[i];
            self.colors[base..base + 3].copy_from_slice(&group.color(i as u32, seed));
            self.group_ids[i] = group.as_u32();
        }
    }

    fn debug_validate_state(&self) {
        #[cfg(debug_assertions)]
        {
            debug_assert_eq!(self.front.len(), self.back.len());
            debug_assert_eq!(self.updates.len(), self.front.len());
            debug_assert!(self.positions.iter().all(|v| v.is_finite()));
            debug_assert!(self.headings.iter().all(|v| v.is_finite()));
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn evaluate_all(frame: &FrameContext, parallel: bool, out: &mut Vec<EntityUpdate>) {
    let count = frame.previous.len() as u32;
    out.clear();
    if parallel {
        out.par_extend((0..count).into_par_iter().map(|id| evaluate_entity(frame, id)));
    } else {
        out.extend((0..count).map(|id| evaluate_entity(frame, id)));
    }
}

#[cfg(target_arch = "wasm32")]
fn evaluate_all(frame: &FrameContext, _parallel: bool, out: &mut Vec<EntityUpdate>) {
    let count = frame.previous.len() as u32;
    out.clear();
    out.extend((0..count).map(|id| evaluate_entity(frame, id)));
}
