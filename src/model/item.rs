use serde::{Deserialize, Serialize};

/// Every kind of item a citizen or building can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ItemName {
    Mushroom,
    Wheat,
    TreeLog,
    Wood,
}

string_enum!(ItemName {
    Mushroom => "mushroom",
    Wheat => "wheat",
    TreeLog => "tree_log",
    Wood => "wood",
});

impl ItemName {
    /// Food restored per unit eaten. Zero means inedible.
    pub fn food_value(&self) -> f64 {
        match self {
            ItemName::Mushroom => 0.15,
            ItemName::Wheat => 0.1,
            ItemName::TreeLog | ItemName::Wood => 0.0,
        }
    }

    pub fn is_food(&self) -> bool {
        self.food_value() > 0.0
    }

    /// Price a market pays per unit; it sells for this plus the configured markup.
    pub fn base_price(&self) -> u32 {
        match self {
            ItemName::Mushroom => 2,
            ItemName::Wheat => 2,
            ItemName::TreeLog => 2,
            ItemName::Wood => 3,
        }
    }

    pub fn food_items() -> impl Iterator<Item = ItemName> {
        Self::ALL.iter().copied().filter(|i| i.is_food())
    }
}
