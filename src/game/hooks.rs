use crate::core::fixed::FixedTime;
use crate::game::chart::{Note, NoteKey, Section};
use crate::game::judgment::Judgement;
use crate::game::life::HealthFixed;

/// Read-only view of the engine handed to every hook call.
#[derive(Clone, Copy, Debug)]
pub struct HookCtx {
    pub time: FixedTime,
    pub step: i32,
    pub beat: i32,
    pub section: Section,
    pub section_index: usize,
    pub score: i32,
    pub combo: u32,
    pub health: HealthFixed,
}

/// Per-stage reactions to engine events. The engine has already applied its
/// own bookkeeping when a hook runs; hooks only layer presentation on top.
pub trait PlayHooks {
    fn step_hit(&mut self, _ctx: &HookCtx) {}

    fn beat_hit(&mut self, _ctx: &HookCtx) {}

    /// Fired for both owners, including opponent auto-hits.
    fn note_hit(&mut self, _ctx: &HookCtx, _note: &Note) {}

    fn note_miss(&mut self, _ctx: &HookCtx, _key: NoteKey) {}

    /// `ctx.combo` is the combo after the event (0 on a break).
    fn show_combo(&mut self, _ctx: &HookCtx, _judgement: Judgement) {}
}
