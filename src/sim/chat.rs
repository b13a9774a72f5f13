//! Scripted chat: every spoken line is a `Message` in the speaker's own
//! bounded history, optionally carrying an `Intention` addressed to someone.
//! Listeners poll the speaker's history; a reply is only noticed once it is
//! older than the reaction time, so nobody answers within the tick it was said.

use serde::{Deserialize, Serialize};

use crate::id::CitizenId;
use crate::model::{
    Intention, MarketTradeIntention, MarketTradeStep, Message, SmallTalkStep, TodoEntry,
    TodoTask, World,
};
use crate::sim::context::TickContext;
use crate::sim::helpers::move_near;
use crate::sim::state_stack::{CitizenState, FrameMeta, FrameTag, TaskStep};
use crate::sim::tasks::{Task, TaskBehavior};

/// Priority of answering someone who greeted us.
pub const REPLY_PRIORITY: f64 = 1.0;

fn describe(world: &World, intention: &Intention) -> String {
    let to = world
        .citizen(intention.addressee())
        .map_or("you", |c| c.name.as_str());
    match intention {
        Intention::SmallTalk { step, .. } => match step {
            SmallTalkStep::Greet => format!("Hello {to}!"),
            SmallTalkStep::AskWellbeing => format!("How are you, {to}?"),
            SmallTalkStep::Answer => "I'm doing fine, thanks.".to_string(),
            SmallTalkStep::Farewell => format!("Goodbye {to}."),
        },
        Intention::MarketTrade { trade, .. } => describe_trade(trade),
    }
}

fn describe_trade(trade: &MarketTradeIntention) -> String {
    let MarketTradeIntention {
        item_name: item,
        item_amount: amount,
        single_price: price,
        sell_to_market,
        ..
    } = *trade;
    match trade.step {
        MarketTradeStep::Request if sell_to_market => format!("I want to sell {amount} {item}."),
        MarketTradeStep::Request => format!("I want to buy {amount} {item}."),
        MarketTradeStep::Offer => format!("{amount} {item} for {price} each."),
        MarketTradeStep::CounterOffer => format!("Only {amount} then, at {price}."),
        MarketTradeStep::Accept => "Deal.".to_string(),
        MarketTradeStep::Confirm => "Put it on the counter.".to_string(),
        MarketTradeStep::Decline => "No deal.".to_string(),
    }
}

/// Say a scripted line. A greeting also leaves the addressee a todo to answer.
pub fn say(world: &mut World, speaker: CitizenId, intention: Intention) {
    let text = describe(world, &intention);
    let now = world.time;
    let Some(citizen) = world.citizen_mut(speaker) else {
        return;
    };
    tracing::trace!(citizen = %citizen.name, %text, "say");
    citizen.chat.push(Message {
        by: speaker,
        text,
        time: now,
        intention: Some(intention),
    });

    let Intention::SmallTalk {
        step: SmallTalkStep::Greet,
        to,
    } = intention
    else {
        return;
    };
    if let Some(listener) = world.citizen_mut(to) {
        if listener.is_alive() && !is_replying_to(listener.top_state(), speaker) {
            listener.memory.add_todo(TodoEntry {
                priority: REPLY_PRIORITY,
                task: TodoTask::ReplyToChat { partner: speaker },
                created: now,
            });
        }
    }
}

/// Free text with no intention, e.g. a command echo.
pub fn say_text(world: &mut World, speaker: CitizenId, text: impl Into<String>) {
    let now = world.time;
    if let Some(citizen) = world.citizen_mut(speaker) {
        citizen.chat.push(Message {
            by: speaker,
            text: text.into(),
            time: now,
            intention: None,
        });
    }
}

fn is_replying_to(top: Option<&CitizenState>, speaker: CitizenId) -> bool {
    top.is_some_and(|s| matches!(&s.task, Task::ChatWith(c) if c.partner == speaker))
}

/// The newest line `from` addressed to `to`, whether or not `to` could have
/// reacted to it yet.
pub fn last_line_to(world: &World, from: CitizenId, to: CitizenId) -> Option<&Message> {
    world
        .citizen(from)?
        .chat
        .messages
        .iter()
        .rev()
        .find(|m| m.intention.as_ref().is_some_and(|i| i.addressee() == to))
}

/// The newest line `from` addressed to `to` after `after` that `to` has had
/// time to react to.
pub fn read_reply(world: &World, from: CitizenId, to: CitizenId, after: u64) -> Option<Message> {
    let reaction = world.config.chat.reaction_time_ms;
    let now = world.time;
    world
        .citizen(from)?
        .chat
        .messages
        .iter()
        .rev()
        .skip_while(|m| m.time + reaction > now)
        .take_while(|m| m.time > after)
        .find(|m| m.intention.as_ref().is_some_and(|i| i.addressee() == to))
        .cloned()
}

/// Small talk between two citizens. The initiator greets; the responder was
/// prompted by that greeting through its todo list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatWith {
    pub partner: CitizenId,
    pub initiator: bool,
    /// The line we wait to hear next; `None` before the initiator opens.
    pub expecting: Option<SmallTalkStep>,
    /// Partner lines at or before this time are already answered.
    pub heard_until: u64,
    pub last_progress: u64,
}

impl ChatWith {
    pub fn start(partner: CitizenId, now: u64) -> Self {
        Self {
            partner,
            initiator: true,
            expecting: None,
            heard_until: now,
            last_progress: now,
        }
    }

    /// Answer a greeting said at `greeted_at`.
    pub fn respond(partner: CitizenId, greeted_at: u64, now: u64) -> Self {
        Self {
            partner,
            initiator: false,
            expecting: Some(SmallTalkStep::Greet),
            heard_until: greeted_at.saturating_sub(1),
            last_progress: now,
        }
    }

    pub fn into_state(self, now: u64) -> CitizenState {
        CitizenState::new(self, now).tagged(FrameTag::Social)
    }

    /// What to say after hearing `heard`, and whether the conversation is over
    /// for this side afterwards.
    fn next_line(&self, heard: SmallTalkStep) -> (Option<SmallTalkStep>, Option<SmallTalkStep>) {
        use SmallTalkStep::*;
        match (self.initiator, heard) {
            (true, Greet) => (Some(AskWellbeing), Some(Answer)),
            (true, Answer) => (Some(Farewell), Some(Farewell)),
            (true, Farewell) => (None, None),
            (false, Greet) => (Some(Greet), Some(AskWellbeing)),
            (false, AskWellbeing) => (Some(Answer), Some(Farewell)),
            (false, Farewell) => (Some(Farewell), None),
            (_, AskWellbeing | Answer) => (None, self.expecting),
        }
    }

    fn finish(&self, world: &mut World, id: CitizenId) -> TaskStep {
        let now = world.time;
        let gain = world.config.chat.happiness_gain;
        let familiarity = world.config.chat.familiarity_gain;
        let partner_name = world
            .citizen(self.partner)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let citizen = world.expect_citizen_mut(id);
        let gained = gain * citizen.modifiers().social_gain;
        citizen.happiness = (citizen.happiness + gained).min(1.0);
        citizen
            .memory
            .remember(self.partner, &partner_name, familiarity, now);
        tracing::debug!(citizen = %citizen.name, partner = %partner_name, gained, "chat finished");
        TaskStep::Success(None)
    }
}

impl TaskBehavior for ChatWith {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        let world = &mut *ctx.world;
        if now.saturating_sub(self.last_progress) > world.config.chat.chat_timeout_ms {
            world
                .expect_citizen_mut(id)
                .think(now, "They stopped talking to me.");
            return TaskStep::Failed;
        }
        let Some(partner_at) = world
            .citizen(self.partner)
            .filter(|c| c.is_alive())
            .map(|c| c.position)
        else {
            return TaskStep::Failed;
        };
        let reach = world.config.chat.chat_distance;
        if !move_near(world.expect_citizen_mut(id), partner_at, reach) {
            return TaskStep::Running;
        }

        let Some(expecting) = self.expecting else {
            say(world, id, Intention::SmallTalk {
                step: SmallTalkStep::Greet,
                to: self.partner,
            });
            self.expecting = Some(SmallTalkStep::Greet);
            self.heard_until = now;
            self.last_progress = now;
            return TaskStep::Running;
        };

        let Some(message) = read_reply(world, self.partner, id, self.heard_until) else {
            return TaskStep::Running;
        };
        self.heard_until = message.time;
        let Some(Intention::SmallTalk { step: heard, .. }) = message.intention else {
            return TaskStep::Running;
        };
        if heard != expecting {
            return TaskStep::Running;
        }
        self.last_progress = now;
        let (line, next) = self.next_line(heard);
        if let Some(step) = line {
            say(world, id, Intention::SmallTalk {
                step,
                to: self.partner,
            });
        }
        match next {
            Some(step) => {
                self.expecting = Some(step);
                TaskStep::Running
            }
            None => self.finish(world, id),
        }
    }
}
