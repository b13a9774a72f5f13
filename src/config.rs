//! Configuration for a simulation run, loadable from TOML.
//!
//! Every table and field has a default, so an empty document is a valid
//! configuration and a TOML file only needs to name what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the simulation RNG. Same seed, same run.
    pub seed: u64,
    /// Simulated milliseconds per tick.
    pub tick_ms: u64,
    /// Chat user allowed to run map-wide commands.
    pub streamer_name: String,
    pub map: MapConfig,
    pub citizen: CitizenConfig,
    pub needs: NeedsConfig,
    pub jobs: JobsConfig,
    pub market: MarketConfig,
    pub chat: ChatConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_ms: 16,
            streamer_name: "streamer".to_string(),
            map: MapConfig::default(),
            citizen: CitizenConfig::default(),
            needs: NeedsConfig::default(),
            jobs: JobsConfig::default(),
            market: MarketConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `SimError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| SimError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// World size, chunking and deferred object updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub width_tiles: i32,
    pub height_tiles: i32,
    /// Chunk edge length in tiles.
    pub chunk_tiles: i32,
    /// Tile edge length in world units.
    pub tile_size: f64,
    /// Random probes tried after the center tile when placing an object.
    pub placement_probes: u32,
    pub min_trees: usize,
    pub max_mushrooms: usize,
    pub mushroom_spawn_interval_ms: u64,
    pub tree_growth_interval_ms: u64,
    pub tree_growth_step: f64,
    pub crop_growth_interval_ms: u64,
    pub crop_growth_step: f64,
    pub deterioration_interval_ms: u64,
    pub deterioration_step: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width_tiles: 60,
            height_tiles: 60,
            chunk_tiles: 10,
            tile_size: 20.0,
            placement_probes: 30,
            min_trees: 20,
            max_mushrooms: 30,
            mushroom_spawn_interval_ms: 5_000,
            tree_growth_interval_ms: 4_000,
            tree_growth_step: 0.1,
            crop_growth_interval_ms: 3_000,
            crop_growth_step: 0.1,
            deterioration_interval_ms: 10_000,
            deterioration_step: 0.002,
        }
    }
}

/// Per-citizen physical constants and vital drains.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CitizenConfig {
    /// World units moved per tick.
    pub speed: f64,
    /// Distance at which two things count as "next to each other".
    pub interaction_distance: f64,
    pub search_radius: f64,
    pub max_search_radius: f64,
    pub inventory_size: u32,
    pub start_money: u32,
    pub food_drain_per_tick: f64,
    pub energy_drain_per_tick: f64,
    pub happiness_drain_per_tick: f64,
    pub sleep_regen_per_tick: f64,
    pub death_display_ms: u64,
    pub log_capacity: usize,
    pub thought_duration_ms: u64,
    pub max_traits: usize,
    pub familiarity_decay_per_tick: f64,
    pub todo_expiry_ms: u64,
}

impl Default for CitizenConfig {
    fn default() -> Self {
        Self {
            speed: 2.0,
            interaction_distance: 20.0,
            search_radius: 400.0,
            max_search_radius: 1_600.0,
            inventory_size: 10,
            start_money: 10,
            food_drain_per_tick: 0.000_05,
            energy_drain_per_tick: 0.000_03,
            happiness_drain_per_tick: 0.000_01,
            sleep_regen_per_tick: 0.001,
            death_display_ms: 3_000,
            log_capacity: 20,
            thought_duration_ms: 3_000,
            max_traits: 2,
            familiarity_decay_per_tick: 0.000_01,
            todo_expiry_ms: 10_000,
        }
    }
}

/// Thresholds for the needs evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedsConfig {
    pub sleep_threshold: f64,
    pub starving_threshold: f64,
    pub hunger_threshold: f64,
    pub happiness_threshold: f64,
    /// Home deterioration above which the owner repairs it.
    pub home_repair_threshold: f64,
    /// Skip needs evaluation for this long after everything was satisfied.
    pub check_cooldown_ms: u64,
    /// A need whose remedy failed is not retried for this long.
    pub failure_backoff_ms: u64,
}

impl Default for NeedsConfig {
    fn default() -> Self {
        Self {
            sleep_threshold: 0.15,
            starving_threshold: 0.2,
            hunger_threshold: 0.5,
            happiness_threshold: -0.3,
            home_repair_threshold: 0.6,
            check_cooldown_ms: 500,
            failure_backoff_ms: 5_000,
        }
    }
}

/// Work durations and yields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub gather_batch: u32,
    pub pick_ticks: u32,
    pub sell_threshold: u32,
    pub cut_tree_ticks: u32,
    pub planks_ticks: u32,
    pub wood_per_log: u32,
    pub build_progress_per_tick: f64,
    pub repair_ticks: u32,
    pub repair_per_wood: f64,
    pub house_wood_cost: u32,
    pub market_wood_cost: u32,
    pub farm_tiles: usize,
    pub farm_work_ticks: u32,
    pub wheat_per_harvest: u32,
    pub wander_distance: f64,
    pub idle_wait_ms: u64,
    pub emote_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            gather_batch: 5,
            pick_ticks: 20,
            sell_threshold: 6,
            cut_tree_ticks: 120,
            planks_ticks: 90,
            wood_per_log: 4,
            build_progress_per_tick: 0.004,
            repair_ticks: 60,
            repair_per_wood: 0.5,
            house_wood_cost: 5,
            market_wood_cost: 5,
            farm_tiles: 3,
            farm_work_ticks: 60,
            wheat_per_harvest: 2,
            wander_distance: 100.0,
            idle_wait_ms: 2_000,
            emote_ms: 2_000,
        }
    }
}

/// Market sizes, pricing and queue layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Added to the base price when the market sells.
    pub markup: u32,
    pub counter_size: u32,
    pub inventory_size: u32,
    /// Reserved stock per traded item kind.
    pub reserved_per_item: u32,
    /// Distance between consecutive queue slots.
    pub queue_spacing: f64,
    pub home_inventory_size: u32,
    /// A merchant with an empty queue stops serving after this long.
    pub serve_idle_ms: u64,
    /// A customer repeats an unanswered negotiation line after this long.
    pub request_retry_ms: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            markup: 1,
            counter_size: 20,
            inventory_size: 40,
            reserved_per_item: 10,
            queue_spacing: 10.0,
            home_inventory_size: 20,
            serve_idle_ms: 5_000,
            request_retry_ms: 2_000,
        }
    }
}

/// Chat pacing and social rewards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub history: usize,
    /// Minimum delay before answering a message.
    pub reaction_time_ms: u64,
    pub chat_distance: f64,
    pub chat_timeout_ms: u64,
    pub happiness_gain: f64,
    pub familiarity_gain: f64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history: 20,
            reaction_time_ms: 300,
            chat_distance: 40.0,
            chat_timeout_ms: 8_000,
            happiness_gain: 0.3,
            familiarity_gain: 0.2,
        }
    }
}
