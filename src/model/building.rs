use serde::{Deserialize, Serialize};

use super::inventory::Inventory;
use super::item::ItemName;
use crate::config::SimConfig;
use crate::id::CitizenId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum BuildingKind {
    House,
    FoodMarket,
    WoodMarket,
}

string_enum!(BuildingKind {
    House => "house",
    FoodMarket => "food_market",
    WoodMarket => "wood_market",
});

impl BuildingKind {
    pub fn is_market(&self) -> bool {
        matches!(self, BuildingKind::FoodMarket | BuildingKind::WoodMarket)
    }

    /// Item kinds a market of this kind buys and sells.
    pub fn traded_items(&self) -> &'static [ItemName] {
        match self {
            BuildingKind::House => &[],
            BuildingKind::FoodMarket => &[ItemName::Mushroom, ItemName::Wheat],
            BuildingKind::WoodMarket => &[ItemName::Wood],
        }
    }

    pub fn wood_cost(&self, config: &SimConfig) -> u32 {
        match self {
            BuildingKind::House => config.jobs.house_wood_cost,
            BuildingKind::FoodMarket | BuildingKind::WoodMarket => config.jobs.market_wood_cost,
        }
    }
}

/// The physical exchange surface between a merchant and a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCounter {
    pub items: Inventory,
    pub money: u32,
    /// Customer whose goods lie on the counter waiting to be paid for.
    pub placed_by: Option<CitizenId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub counter: MarketCounter,
    /// FIFO of waiting customers; index 0 is the one being served.
    pub queue: Vec<CitizenId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub kind: BuildingKind,
    pub owner: CitizenId,
    pub inhabited_by: Option<CitizenId>,
    /// `Some` while under construction, `None` once built.
    pub build_progress: Option<f64>,
    /// Reaching 1.0 removes the building from the map.
    pub deterioration: f64,
    pub inventory: Inventory,
    pub market: Option<MarketState>,
}

impl Building {
    /// A fresh construction site owned by `owner`.
    pub fn new_construction(kind: BuildingKind, owner: CitizenId, config: &SimConfig) -> Self {
        let market_cfg = &config.market;
        let (inventory, market) = if kind.is_market() {
            let reserved: Vec<(ItemName, u32)> = kind
                .traded_items()
                .iter()
                .map(|&item| (item, market_cfg.reserved_per_item))
                .collect();
            (
                Inventory::with_reserved(market_cfg.inventory_size, &reserved),
                Some(MarketState {
                    counter: MarketCounter {
                        items: Inventory::new(market_cfg.counter_size),
                        money: 0,
                        placed_by: None,
                    },
                    queue: Vec::new(),
                }),
            )
        } else {
            (Inventory::new(market_cfg.home_inventory_size), None)
        };
        Self {
            kind,
            owner,
            inhabited_by: None,
            build_progress: Some(0.0),
            deterioration: 0.0,
            inventory,
            market,
        }
    }

    pub fn is_built(&self) -> bool {
        self.build_progress.is_none()
    }

    /// Still standing and not rotted away.
    pub fn is_usable(&self) -> bool {
        self.deterioration < 1.0
    }

    /// Unit price a market charges when selling `item` to a customer.
    pub fn sell_price(&self, item: ItemName, config: &SimConfig) -> u32 {
        item.base_price() + config.market.markup
    }

    /// Unit price a market pays when buying `item` from a customer.
    pub fn buy_price(&self, item: ItemName) -> u32 {
        item.base_price()
    }
}
