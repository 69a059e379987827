use std::time::Duration;

pub const DEFAULT_ENTITY_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_LIST_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_SOCIAL_TTL: Duration = Duration::from_secs(30);

/// Freshness class of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlTier {
    /// Point keys and child collections.
    Entity,
    /// Entry listings.
    List,
    /// Comment pages and like counts.
    Social,
}

/// Expiry per tier. Zero durations fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub entity: Duration,
    pub list: Duration,
    pub social: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            entity: DEFAULT_ENTITY_TTL,
            list: DEFAULT_LIST_TTL,
            social: DEFAULT_SOCIAL_TTL,
        }
    }
}

impl CacheTtls {
    /// Builds tiers from optional seconds; `None` or zero selects the default.
    pub fn from_secs(entity: Option<u64>, list: Option<u64>, social: Option<u64>) -> Self {
        Self {
            entity: or_default(entity, DEFAULT_ENTITY_TTL),
            list: or_default(list, DEFAULT_LIST_TTL),
            social: or_default(social, DEFAULT_SOCIAL_TTL),
        }
    }

    pub fn for_tier(&self, tier: TtlTier) -> Duration {
        match tier {
            TtlTier::Entity => self.entity,
            TtlTier::List => self.list,
            TtlTier::Social => self.social,
        }
    }
}

fn or_default(secs: Option<u64>, default: Duration) -> Duration {
    match secs {
        Some(s) if s > 0 => Duration::from_secs(s),
        _ => default,
    }
}
