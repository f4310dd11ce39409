use chanmint_config::{DEFAULT_CHANNEL_NAME_MAX, DEFAULT_CHANNEL_NAME_MIN, DEFAULT_CHANNEL_PREFIX};
use rand::Rng;
use std::ops::RangeInclusive;

/// Generates channel names as a fixed prefix followed by a random integer.
///
/// Names are unique only in the probabilistic sense; nothing checks a new
/// name against the ones already handed out.
#[derive(Debug, Clone)]
pub struct ChannelNameGenerator {
    prefix: String,
    range: RangeInclusive<u32>,
}

impl ChannelNameGenerator {
    /// Bounds given in the wrong order are swapped.
    pub fn new(prefix: impl Into<String>, min: u32, max: u32) -> Self {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        Self {
            prefix: prefix.into(),
            range: low..=high,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn range(&self) -> &RangeInclusive<u32> {
        &self.range
    }

    pub fn generate(&self) -> String {
        let suffix = rand::thread_rng().gen_range(self.range.clone());
        format!("{}{}", self.prefix, suffix)
    }
}

impl Default for ChannelNameGenerator {
    fn default() -> Self {
        Self::new(
            DEFAULT_CHANNEL_PREFIX,
            DEFAULT_CHANNEL_NAME_MIN,
            DEFAULT_CHANNEL_NAME_MAX,
        )
    }
}
