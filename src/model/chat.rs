use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::item::ItemName;
use crate::id::CitizenId;

/// Steps of the scripted small-talk dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmallTalkStep {
    Greet,
    AskWellbeing,
    Answer,
    Farewell,
}

/// Steps of a market negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketTradeStep {
    Request,
    Offer,
    CounterOffer,
    Accept,
    Confirm,
    Decline,
}

/// Market negotiation payload. `sell_to_market` is from the customer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketTradeIntention {
    pub step: MarketTradeStep,
    pub item_name: ItemName,
    pub item_amount: u32,
    pub single_price: u32,
    pub sell_to_market: bool,
}

/// Structured purpose attached to a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intention {
    SmallTalk { step: SmallTalkStep, to: CitizenId },
    MarketTrade { to: CitizenId, trade: MarketTradeIntention },
}

impl Intention {
    /// The citizen this message is addressed to.
    pub fn addressee(&self) -> CitizenId {
        match self {
            Intention::SmallTalk { to, .. } | Intention::MarketTrade { to, .. } => *to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub by: CitizenId,
    pub text: String,
    pub time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intention: Option<Intention>,
}

/// Bounded history of what one citizen has said, newest last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLog {
    pub messages: VecDeque<Message>,
    pub capacity: usize,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, message: Message) {
        if self.capacity == 0 {
            return;
        }
        while self.messages.len() >= self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.back()
    }

    /// The newest message addressed to `to` that was said strictly after `after`.
    pub fn latest_addressed_to(&self, to: CitizenId, after: u64) -> Option<&Message> {
        self.messages.iter().rev().take_while(|m| m.time > after).find(|m| {
            m.intention
                .as_ref()
                .is_some_and(|i| i.addressee() == to)
        })
    }
}
