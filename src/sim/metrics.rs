//! Tick-local counters
//!
//! A fresh `TickMetrics` is created for every tick and handed to each
//! system by `&mut`; callers accumulate across ticks with `merge`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickMetrics {
    pub requests: u32,
    pub rejected_requests: u32,
    pub spawns: u32,
    pub spawn_failures: u32,
    pub kills: u32,
    pub despawns: u32,
    pub damage_dealt: i64,
    pub knockbacks: u32,
    pub soft_collisions: u32,
    pub elastic_collisions: u32,
    pub zaps: u32,
    pub teleports: u32,
    pub drains_absorbed: u32,
    pub depth_nudges: u32,
    pub events: u32,
}

impl TickMetrics {
    pub fn merge(&mut self, other: &TickMetrics) {
        self.requests += other.requests;
        self.rejected_requests += other.rejected_requests;
        self.spawns += other.spawns;
        self.spawn_failures += other.spawn_failures;
        self.kills += other.kills;
        self.despawns += other.despawns;
        self.damage_dealt += other.damage_dealt;
        self.knockbacks += other.knockbacks;
        self.soft_collisions += other.soft_collisions;
        self.elastic_collisions += other.elastic_collisions;
        self.zaps += other.zaps;
        self.teleports += other.teleports;
        self.drains_absorbed += other.drains_absorbed;
        self.depth_nudges += other.depth_nudges;
        self.events += other.events;
    }
}
