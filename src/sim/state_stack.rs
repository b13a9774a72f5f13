//! Per-citizen stack of resumable activities.
//!
//! Only the top frame is ticked. A frame delegates by pushing a child and
//! learns the child's outcome through its `FrameMeta` when it becomes the
//! top again. `reset_state_to` drops the whole stack without giving frames a
//! chance to clean up; anything a frame shows to the outside (the equipped
//! tool) is therefore derived from the current top each time it is read.

use serde::{Deserialize, Serialize};

use super::market::TradeAgreement;
use super::needs::NeedKind;
use super::tasks::Task;
use crate::id::BuildingId;
use crate::model::Citizen;

/// Top-level activity a stack belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Working,
    Need(NeedKind),
    Todo,
    /// Forced by a chat command.
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameTag {
    Need(NeedKind),
    Work,
    Trade,
    Social,
}

/// Value a finished frame hands to the frame below it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReturnedData {
    Amount { amount: u32 },
    Building { building: BuildingId },
    Agreement { agreement: TradeAgreement },
}

/// Bookkeeping shared by every frame kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub sub_state_start_time: u64,
    pub returned_data: Option<ReturnedData>,
    /// Set when the child pushed by this frame failed.
    pub previous_task_failed: bool,
}

impl FrameMeta {
    pub fn take_returned(&mut self) -> Option<ReturnedData> {
        self.returned_data.take()
    }

    /// Read and clear the child-failed flag.
    pub fn take_failed(&mut self) -> bool {
        std::mem::take(&mut self.previous_task_failed)
    }

    pub fn enter_sub_state(&mut self, now: u64) {
        self.sub_state_start_time = now;
    }

    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.sub_state_start_time)
    }
}

/// One frame on a citizen's stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitizenState {
    pub task: Task,
    pub tags: Vec<FrameTag>,
    pub meta: FrameMeta,
}

impl CitizenState {
    pub fn new(task: impl Into<Task>, now: u64) -> Self {
        Self {
            task: task.into(),
            tags: Vec::new(),
            meta: FrameMeta {
                sub_state_start_time: now,
                returned_data: None,
                previous_task_failed: false,
            },
        }
    }

    pub fn tagged(mut self, tag: FrameTag) -> Self {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.task.name()
    }

    pub fn has_tag(&self, tag: FrameTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// What a frame asks the engine to do after its tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStep {
    /// Keep the frame on top; tick it again next time.
    Running,
    /// Keep the frame and delegate to a child on top of it.
    Push(CitizenState),
    Success(Option<ReturnedData>),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Tool {
    Axe,
    Hammer,
    Hoe,
    Basket,
}

string_enum!(Tool {
    Axe => "axe",
    Hammer => "hammer",
    Hoe => "hoe",
    Basket => "basket",
});

pub fn push_state(citizen: &mut Citizen, state: CitizenState) {
    tracing::debug!(citizen = %citizen.name, task = state.name(), "push state");
    citizen.state_info.stack.push(state);
}

/// Pop the top frame as succeeded. The new top's returned data is cleared.
pub fn task_success(citizen: &mut Citizen) {
    task_success_with_data(citizen, None);
}

/// Pop the top frame as succeeded, handing `data` to the new top.
pub fn task_success_with_data(citizen: &mut Citizen, data: Option<ReturnedData>) {
    if let Some(done) = citizen.state_info.stack.pop() {
        tracing::debug!(citizen = %citizen.name, task = done.name(), "task succeeded");
    }
    settle_success(citizen, data);
}

/// Pop the top frame as failed and flag the new top.
pub fn task_failed(citizen: &mut Citizen) {
    if let Some(done) = citizen.state_info.stack.pop() {
        tracing::debug!(citizen = %citizen.name, task = done.name(), "task failed");
    }
    settle_failure(citizen);
}

/// Drop the whole stack and start a fresh top-level activity.
///
/// Frames get no cleanup call. Movement is cancelled; any other side effect a
/// frame left in the world is the caller's to undo.
pub fn reset_state_to(citizen: &mut Citizen, activity: Activity) {
    tracing::debug!(
        citizen = %citizen.name,
        dropped = citizen.state_info.stack.len(),
        ?activity,
        "reset state"
    );
    citizen.state_info.stack.clear();
    citizen.state_info.activity = activity;
    citizen.state_info.previous_task_failed = None;
    citizen.move_to = None;
}

/// Apply a step for `frame`, which the engine popped before ticking it.
pub(crate) fn apply_step(citizen: &mut Citizen, frame: CitizenState, step: TaskStep) {
    match step {
        TaskStep::Running => citizen.state_info.stack.push(frame),
        TaskStep::Push(child) => {
            citizen.state_info.stack.push(frame);
            push_state(citizen, child);
        }
        TaskStep::Success(data) => {
            tracing::debug!(citizen = %citizen.name, task = frame.name(), "task succeeded");
            settle_success(citizen, data);
        }
        TaskStep::Failed => {
            tracing::debug!(citizen = %citizen.name, task = frame.name(), "task failed");
            settle_failure(citizen);
        }
    }
}

fn settle_success(citizen: &mut Citizen, data: Option<ReturnedData>) {
    match citizen.state_info.stack.last_mut() {
        Some(top) => {
            top.meta.returned_data = data;
            top.meta.previous_task_failed = false;
        }
        None => citizen.state_info.previous_task_failed = Some(false),
    }
}

fn settle_failure(citizen: &mut Citizen) {
    match citizen.state_info.stack.last_mut() {
        Some(top) => {
            top.meta.returned_data = None;
            top.meta.previous_task_failed = true;
        }
        None => citizen.state_info.previous_task_failed = Some(true),
    }
}

pub fn has_tag(citizen: &Citizen, tag: FrameTag) -> bool {
    citizen.state_info.stack.iter().any(|s| s.has_tag(tag))
}

/// The need whose remedy is currently on the stack, if any.
pub fn active_need(citizen: &Citizen) -> Option<NeedKind> {
    citizen.state_info.stack.iter().find_map(|s| {
        s.tags.iter().find_map(|t| match t {
            FrameTag::Need(kind) => Some(*kind),
            _ => None,
        })
    })
}

/// Tool in hand, read from the current top frame.
pub fn equipped_tool(citizen: &Citizen) -> Option<Tool> {
    citizen.top_state().and_then(|s| s.task.tool())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;
    use crate::sim::tasks::{CutTree, Wait};
    use crate::testutil::test_citizen;

    fn wait(until: u64) -> CitizenState {
        CitizenState::new(Wait { until }, 0)
    }

    #[test]
    fn success_pops_exactly_one_and_clears_returned_data() {
        let mut c = test_citizen(1, "Ada", Position::default());
        push_state(&mut c, wait(1));
        push_state(&mut c, wait(2));
        push_state(&mut c, wait(3));
        c.state_info.stack[1].meta.returned_data = Some(ReturnedData::Amount { amount: 9 });
        task_success(&mut c);
        assert_eq!(c.state_info.stack.len(), 2);
        assert_eq!(c.state_info.stack[1].meta.returned_data, None);
    }

    #[test]
    fn success_with_data_reaches_new_top() {
        let mut c = test_citizen(1, "Ada", Position::default());
        push_state(&mut c, wait(1));
        push_state(&mut c, wait(2));
        task_success_with_data(&mut c, Some(ReturnedData::Amount { amount: 2 }));
        assert_eq!(c.state_info.stack.len(), 1);
        let top = c.top_state().unwrap();
        assert_eq!(top.meta.returned_data, Some(ReturnedData::Amount { amount: 2 }));
        assert!(!top.meta.previous_task_failed);
    }

    #[test]
    fn failure_flags_new_top_or_state_info() {
        let mut c = test_citizen(1, "Ada", Position::default());
        push_state(&mut c, wait(1));
        push_state(&mut c, wait(2));
        task_failed(&mut c);
        assert!(c.top_state().unwrap().meta.previous_task_failed);
        task_failed(&mut c);
        assert!(c.state_info.stack.is_empty());
        assert_eq!(c.state_info.previous_task_failed, Some(true));
    }

    #[test]
    fn reset_discards_everything() {
        let mut c = test_citizen(1, "Ada", Position::default());
        push_state(&mut c, wait(1));
        push_state(&mut c, wait(2));
        c.move_to = Some(Position::new(5.0, 5.0));
        reset_state_to(&mut c, Activity::Need(NeedKind::Sleep));
        assert!(c.state_info.stack.is_empty());
        assert_eq!(c.state_info.activity, Activity::Need(NeedKind::Sleep));
        assert_eq!(c.move_to, None);
    }

    #[test]
    fn tool_follows_top_frame() {
        let mut c = test_citizen(1, "Ada", Position::default());
        push_state(&mut c, CitizenState::new(CutTree::default(), 0));
        assert_eq!(equipped_tool(&c), Some(Tool::Axe));
        push_state(&mut c, wait(5));
        assert_eq!(equipped_tool(&c), None);
        reset_state_to(&mut c, Activity::Working);
        assert_eq!(equipped_tool(&c), None);
    }

    #[test]
    fn active_need_reads_tags() {
        let mut c = test_citizen(1, "Ada", Position::default());
        assert_eq!(active_need(&c), None);
        push_state(&mut c, wait(1).tagged(FrameTag::Need(NeedKind::Food)));
        push_state(&mut c, wait(2));
        assert_eq!(active_need(&c), Some(NeedKind::Food));
        assert!(has_tag(&c, FrameTag::Need(NeedKind::Food)));
    }
}
