use chanmint_config::{ServiceConfig, DEFAULT_CHANNEL_TTL};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::names::ChannelNameGenerator;

/// A minted channel and the moment it stops existing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRecord {
    pub name: String,
    /// Seconds since the epoch
    pub expires_at: i64,
}

impl ChannelRecord {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Process-local registry of live channels.
///
/// Records are kept in insertion order behind a single mutex. A record is
/// removed once `expires_at <= now`, either lazily by [`ChannelRegistry::exists`]
/// or by an explicit [`ChannelRegistry::sweep_expired`]. Nothing else deletes
/// or modifies a record.
#[derive(Debug)]
pub struct ChannelRegistry {
    records: Mutex<Vec<ChannelRecord>>,
    ttl: i64,
    names: ChannelNameGenerator,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_TTL, ChannelNameGenerator::default())
    }
}

impl ChannelRegistry {
    /// A non-positive `ttl` is raised to one second.
    pub fn new(ttl: i64, names: ChannelNameGenerator) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            ttl: ttl.max(1),
            names,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.channel_ttl,
            ChannelNameGenerator::new(
                config.channel_prefix.clone(),
                config.channel_name_min,
                config.channel_name_max,
            ),
        )
    }

    pub fn ttl(&self) -> i64 {
        self.ttl
    }

    /// Mint a channel living for `lifetime` seconds, or the registry TTL when
    /// `lifetime` is omitted or not positive.
    pub fn mint_channel(&self, lifetime: Option<i64>) -> ChannelRecord {
        self.mint_channel_with_time(lifetime, Utc::now().timestamp())
    }

    pub fn mint_channel_with_time(&self, lifetime: Option<i64>, now: i64) -> ChannelRecord {
        let lifetime = lifetime.filter(|seconds| *seconds > 0).unwrap_or(self.ttl);
        let record = ChannelRecord {
            name: self.names.generate(),
            expires_at: now.saturating_add(lifetime),
        };

        self.lock().push(record.clone());
        debug!(channel = %record.name, expires_at = record.expires_at, "minted channel");

        record
    }

    /// Evict expired records, then report whether `name` is still live.
    pub fn exists(&self, name: &str) -> bool {
        self.exists_at(name, Utc::now().timestamp())
    }

    pub fn exists_at(&self, name: &str, now: i64) -> bool {
        let mut records = self.lock();
        evict_expired(&mut records, now);
        records.iter().any(|record| record.name == name)
    }

    /// Remove every expired record and return how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now().timestamp())
    }

    pub fn sweep_expired_at(&self, now: i64) -> usize {
        let removed = evict_expired(&mut self.lock(), now);
        if removed > 0 {
            debug!(removed, "swept expired channels");
        }
        removed
    }

    /// Live records in insertion order, after evicting expired ones.
    pub fn live_channels(&self) -> Vec<ChannelRecord> {
        self.live_channels_at(Utc::now().timestamp())
    }

    pub fn live_channels_at(&self, now: i64) -> Vec<ChannelRecord> {
        let mut records = self.lock();
        evict_expired(&mut records, now);
        records.clone()
    }

    /// Number of records held, including any not yet evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Every critical section leaves the Vec consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<ChannelRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn evict_expired(records: &mut Vec<ChannelRecord>, now: i64) -> usize {
    let before = records.len();
    records.retain(|record| !record.is_expired_at(now));
    before - records.len()
}
