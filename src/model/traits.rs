use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Personality modifiers a citizen is born with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CitizenTrait {
    Glutton,
    Frugal,
    Sleepyhead,
    EarlyBird,
    Sociable,
    Loner,
    Diligent,
    Lazy,
}

string_enum!(CitizenTrait {
    Glutton => "glutton",
    Frugal => "frugal",
    Sleepyhead => "sleepyhead",
    EarlyBird => "early_bird",
    Sociable => "sociable",
    Loner => "loner",
    Diligent => "diligent",
    Lazy => "lazy",
});

/// Multipliers applied on top of the configured base rates. 1.0 is neutral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraitModifiers {
    pub food_drain: f64,
    pub energy_drain: f64,
    pub happiness_drain: f64,
    pub social_gain: f64,
    pub work_speed: f64,
}

impl TraitModifiers {
    pub const NEUTRAL: TraitModifiers = TraitModifiers {
        food_drain: 1.0,
        energy_drain: 1.0,
        happiness_drain: 1.0,
        social_gain: 1.0,
        work_speed: 1.0,
    };

    fn combine(self, other: TraitModifiers) -> TraitModifiers {
        TraitModifiers {
            food_drain: self.food_drain * other.food_drain,
            energy_drain: self.energy_drain * other.energy_drain,
            happiness_drain: self.happiness_drain * other.happiness_drain,
            social_gain: self.social_gain * other.social_gain,
            work_speed: self.work_speed * other.work_speed,
        }
    }
}

impl CitizenTrait {
    pub fn modifiers(&self) -> TraitModifiers {
        let n = TraitModifiers::NEUTRAL;
        match self {
            CitizenTrait::Glutton => TraitModifiers { food_drain: 1.4, ..n },
            CitizenTrait::Frugal => TraitModifiers { food_drain: 0.7, ..n },
            CitizenTrait::Sleepyhead => TraitModifiers { energy_drain: 1.4, ..n },
            CitizenTrait::EarlyBird => TraitModifiers { energy_drain: 0.7, ..n },
            CitizenTrait::Sociable => TraitModifiers {
                happiness_drain: 1.5,
                social_gain: 1.5,
                ..n
            },
            CitizenTrait::Loner => TraitModifiers {
                happiness_drain: 0.5,
                social_gain: 0.6,
                ..n
            },
            CitizenTrait::Diligent => TraitModifiers { work_speed: 1.3, ..n },
            CitizenTrait::Lazy => TraitModifiers { work_speed: 0.75, ..n },
        }
    }
}

/// Opposing pairs: a citizen cannot have both traits in a pair.
pub const OPPOSING_PAIRS: [(CitizenTrait, CitizenTrait); 4] = [
    (CitizenTrait::Glutton, CitizenTrait::Frugal),
    (CitizenTrait::Sleepyhead, CitizenTrait::EarlyBird),
    (CitizenTrait::Sociable, CitizenTrait::Loner),
    (CitizenTrait::Diligent, CitizenTrait::Lazy),
];

fn opposite_of(t: CitizenTrait) -> Option<CitizenTrait> {
    OPPOSING_PAIRS.iter().find_map(|&(a, b)| {
        if t == a {
            Some(b)
        } else if t == b {
            Some(a)
        } else {
            None
        }
    })
}

/// Combined modifiers of a trait list.
pub fn combined_modifiers(traits: &[CitizenTrait]) -> TraitModifiers {
    traits
        .iter()
        .fold(TraitModifiers::NEUTRAL, |acc, t| acc.combine(t.modifiers()))
}

/// Draw between 0 and `max` traits, respecting opposing pairs.
pub fn generate_traits(max: usize, rng: &mut dyn RngCore) -> Vec<CitizenTrait> {
    let count = if max == 0 {
        0
    } else {
        (rng.next_u32() as usize) % (max + 1)
    };
    let mut chosen: Vec<CitizenTrait> = Vec::with_capacity(count);

    for _ in 0..count {
        let candidates: Vec<CitizenTrait> = CitizenTrait::ALL
            .iter()
            .copied()
            .filter(|t| !chosen.contains(t))
            .filter(|t| opposite_of(*t).is_none_or(|opp| !chosen.contains(&opp)))
            .collect();
        if candidates.is_empty() {
            break;
        }
        let picked = candidates[(rng.next_u32() as usize) % candidates.len()];
        chosen.push(picked);
    }

    chosen
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn generated_traits_respect_bounds_and_opposites() {
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..200 {
            let traits = generate_traits(3, &mut rng);
            assert!(traits.len() <= 3);
            for (a, b) in OPPOSING_PAIRS {
                assert!(
                    !(traits.contains(&a) && traits.contains(&b)),
                    "opposing pair {a} / {b} drawn together"
                );
            }
        }
    }

    #[test]
    fn zero_max_draws_nothing() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(generate_traits(0, &mut rng).is_empty());
    }

    #[test]
    fn modifiers_multiply() {
        let m = combined_modifiers(&[CitizenTrait::Glutton, CitizenTrait::Diligent]);
        assert!((m.food_drain - 1.4).abs() < 1e-9);
        assert!((m.work_speed - 1.3).abs() < 1e-9);
        assert!((m.energy_drain - 1.0).abs() < 1e-9);
    }
}
