use rand::RngCore;

use super::signal::{Signal, SignalKind};
use crate::model::World;

/// Context passed to each system, and down into every frame tick.
pub struct TickContext<'a> {
    pub world: &'a mut World,
    pub rng: &'a mut dyn RngCore,
    /// Systems push signals here during tick/handle_signals.
    pub signals: &'a mut Vec<Signal>,
    /// Signals emitted by other systems in the previous pass (read-only).
    pub inbox: &'a [Signal],
}

impl TickContext<'_> {
    pub fn now(&self) -> u64 {
        self.world.time
    }

    pub fn emit(&mut self, kind: SignalKind) {
        let time = self.world.time;
        self.signals.push(Signal { time, kind });
    }
}
