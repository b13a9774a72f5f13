use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::chat::ChatLog;
use super::inventory::Inventory;
use super::position::Position;
use super::traits::{CitizenTrait, TraitModifiers, combined_modifiers};
use crate::config::SimConfig;
use crate::id::{BuildingId, CitizenId};
use crate::sim::jobs::Job;
use crate::sim::needs::NeedKind;
use crate::sim::state_stack::{Activity, CitizenState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: u64,
    pub message: String,
}

/// Bounded list of what a citizen did and thought, newest last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitizenLog {
    pub entries: VecDeque<LogEntry>,
    pub capacity: usize,
}

impl CitizenLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, time: u64, message: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            time,
            message: message.into(),
        });
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtBubble {
    pub text: String,
    pub start_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateInfo {
    /// Top-level activity the stack belongs to.
    pub activity: Activity,
    pub stack: Vec<CitizenState>,
    /// Outcome of the last frame that emptied the stack.
    pub previous_task_failed: Option<bool>,
    pub thought: Option<ThoughtBubble>,
}

impl Default for StateInfo {
    fn default() -> Self {
        Self {
            activity: Activity::Working,
            stack: Vec::new(),
            previous_task_failed: None,
            thought: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RememberedCitizen {
    pub id: CitizenId,
    pub name: String,
    /// 0..=1, decays every tick; forgotten at zero.
    pub familiarity: f64,
    pub last_met: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TodoTask {
    /// Someone wants to talk.
    ReplyToChat { partner: CitizenId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoEntry {
    pub priority: f64,
    pub task: TodoTask,
    pub created: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitizenMemory {
    pub citizens: Vec<RememberedCitizen>,
    /// Highest priority first.
    pub todo_list: Vec<TodoEntry>,
}

impl CitizenMemory {
    pub fn remembered(&self, id: CitizenId) -> Option<&RememberedCitizen> {
        self.citizens.iter().find(|c| c.id == id)
    }

    /// Meet (or meet again) a citizen, raising familiarity.
    pub fn remember(&mut self, id: CitizenId, name: &str, gain: f64, now: u64) {
        match self.citizens.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                c.familiarity = (c.familiarity + gain).min(1.0);
                c.last_met = now;
            }
            None => self.citizens.push(RememberedCitizen {
                id,
                name: name.to_string(),
                familiarity: gain.min(1.0),
                last_met: now,
            }),
        }
    }

    pub fn decay(&mut self, amount: f64) {
        for c in &mut self.citizens {
            c.familiarity -= amount;
        }
        self.citizens.retain(|c| c.familiarity > 0.0);
    }

    /// Insert keeping the list ordered by priority; equal priorities stay FIFO.
    /// A duplicate task only refreshes the existing entry.
    pub fn add_todo(&mut self, entry: TodoEntry) {
        if let Some(existing) = self.todo_list.iter_mut().find(|t| t.task == entry.task) {
            existing.created = entry.created;
            return;
        }
        let index = self
            .todo_list
            .iter()
            .position(|t| t.priority < entry.priority)
            .unwrap_or(self.todo_list.len());
        self.todo_list.insert(index, entry);
    }

    pub fn expire_todos(&mut self, now: u64, max_age: u64) {
        self.todo_list
            .retain(|t| now.saturating_sub(t.created) <= max_age);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathReason {
    Starved,
    Exhausted,
    Unhappy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Death {
    pub time: u64,
    pub reason: DeathReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citizen {
    pub id: CitizenId,
    pub name: String,
    pub birth_time: u64,
    pub position: Position,
    pub move_to: Option<Position>,
    pub speed: f64,
    pub food_per_cent: f64,
    pub energy_per_cent: f64,
    /// -1..=1; at -1 the citizen gives up.
    pub happiness: f64,
    pub money: u32,
    pub home: Option<BuildingId>,
    pub inventory: Inventory,
    pub skills: BTreeMap<String, f64>,
    pub job: Job,
    pub state_info: StateInfo,
    pub memory: CitizenMemory,
    pub traits: Vec<CitizenTrait>,
    pub chat: ChatLog,
    pub log: CitizenLog,
    pub death: Option<Death>,
    /// Last time every need was fulfilled.
    pub last_needs_satisfied: Option<u64>,
    /// When each need's remedy last failed.
    pub need_failed_at: BTreeMap<NeedKind, u64>,
}

impl Citizen {
    /// A healthy, homeless citizen with starting money and an empty stack.
    pub fn new(
        id: CitizenId,
        name: impl Into<String>,
        position: Position,
        job: Job,
        config: &SimConfig,
        now: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            birth_time: now,
            position,
            move_to: None,
            speed: config.citizen.speed,
            food_per_cent: 1.0,
            energy_per_cent: 1.0,
            happiness: 0.5,
            money: config.citizen.start_money,
            home: None,
            inventory: Inventory::new(config.citizen.inventory_size),
            skills: BTreeMap::new(),
            job,
            state_info: StateInfo::default(),
            memory: CitizenMemory::default(),
            traits: Vec::new(),
            chat: ChatLog::new(config.chat.history),
            log: CitizenLog::new(config.citizen.log_capacity),
            death: None,
            last_needs_satisfied: None,
            need_failed_at: BTreeMap::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.death.is_none()
    }

    pub fn modifiers(&self) -> TraitModifiers {
        combined_modifiers(&self.traits)
    }

    pub fn skill(&self, name: &str) -> f64 {
        self.skills.get(name).copied().unwrap_or(0.0)
    }

    pub fn train_skill(&mut self, name: &str, amount: f64) {
        *self.skills.entry(name.to_string()).or_insert(0.0) += amount;
    }

    /// Work speed factor: traits times a skill bonus that saturates at 2x.
    pub fn work_speed(&self, skill: &str) -> f64 {
        self.modifiers().work_speed * (1.0 + self.skill(skill).min(1.0))
    }

    /// Show a thought bubble and record it in the log.
    pub fn think(&mut self, now: u64, text: impl Into<String>) {
        let text = text.into();
        self.log.push(now, text.clone());
        self.state_info.thought = Some(ThoughtBubble {
            text,
            start_time: now,
        });
    }

    pub fn top_state(&self) -> Option<&CitizenState> {
        self.state_info.stack.last()
    }

    pub fn is_at(&self, target: &Position, range: f64) -> bool {
        self.position.distance(target) <= range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_bounded() {
        let mut log = CitizenLog::new(2);
        log.push(1, "a");
        log.push(2, "b");
        log.push(3, "c");
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.last().unwrap().message, "c");
    }

    #[test]
    fn todo_list_orders_by_priority_and_dedupes() {
        let mut memory = CitizenMemory::default();
        let low = TodoTask::ReplyToChat { partner: CitizenId(1) };
        let high = TodoTask::ReplyToChat { partner: CitizenId(2) };
        memory.add_todo(TodoEntry { priority: 1.0, task: low, created: 0 });
        memory.add_todo(TodoEntry { priority: 5.0, task: high, created: 0 });
        memory.add_todo(TodoEntry { priority: 1.0, task: low, created: 9 });
        assert_eq!(memory.todo_list.len(), 2);
        assert_eq!(memory.todo_list[0].task, high);
        assert_eq!(memory.todo_list[1].created, 9);
    }

    #[test]
    fn todos_expire() {
        let mut memory = CitizenMemory::default();
        let task = TodoTask::ReplyToChat { partner: CitizenId(1) };
        memory.add_todo(TodoEntry { priority: 1.0, task, created: 0 });
        memory.expire_todos(100, 50);
        assert!(memory.todo_list.is_empty());
    }

    #[test]
    fn familiarity_grows_and_decays_to_forgetting() {
        let mut memory = CitizenMemory::default();
        memory.remember(CitizenId(3), "Bea", 0.2, 0);
        memory.remember(CitizenId(3), "Bea", 0.2, 10);
        let bea = memory.remembered(CitizenId(3)).unwrap();
        assert!((bea.familiarity - 0.4).abs() < 1e-9);
        assert_eq!(bea.last_met, 10);
        memory.decay(0.5);
        assert!(memory.remembered(CitizenId(3)).is_none());
    }
}
