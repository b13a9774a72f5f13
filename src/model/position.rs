use serde::{Deserialize, Serialize};

/// A point in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }

    /// Move up to `max_step` toward `target`. Returns true when the target was reached.
    pub fn step_toward(&mut self, target: &Position, max_step: f64) -> bool {
        let dist = self.distance(target);
        if dist <= max_step {
            *self = *target;
            return true;
        }
        self.x += (target.x - self.x) / dist * max_step;
        self.y += (target.y - self.y) / dist * max_step;
        false
    }
}
