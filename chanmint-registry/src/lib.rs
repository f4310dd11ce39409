//! # Chanmint Registry
//!
//! In-memory bookkeeping of minted channels.
//!
//! A [`ChannelRegistry`] hands out channel names from a
//! [`ChannelNameGenerator`], remembers when each channel expires and answers
//! liveness queries, purging expired records before it answers. Contents are
//! process-local and do not survive a restart.
//!
//! ```
//! use chanmint_registry::{ChannelNameGenerator, ChannelRegistry};
//!
//! let registry = ChannelRegistry::new(3600, ChannelNameGenerator::new("channel_", 1, 9999));
//! let record = registry.mint_channel_with_time(None, 0);
//!
//! assert!(registry.exists_at(&record.name, 3599));
//! assert!(!registry.exists_at(&record.name, 3601));
//! ```

mod names;
mod registry;

pub use names::ChannelNameGenerator;
pub use registry::{ChannelRecord, ChannelRegistry};
