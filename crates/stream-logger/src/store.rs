//! The local half of the logger: database, configuration and registry.

use crate::config::ConfigFacet;
use crate::registry::StreamRegistry;
use crate::LoggerResult;
use logger_database::Database;

/// Everything guarded by the store lock.
pub(crate) struct LocalStore {
    pub(crate) db: Database,
    pub(crate) config: ConfigFacet,
    pub(crate) registry: StreamRegistry,
    /// Newest timestamp handed out, used to keep timestamps strictly increasing.
    pub(crate) last_timestamp: f64,
}

impl LocalStore {
    pub(crate) fn load(db: Database) -> LoggerResult<Self> {
        let config = ConfigFacet::load(&db)?;
        let registry = StreamRegistry::load(&db)?;
        let last_timestamp = db
            .latest_pending_timestamp()?
            .unwrap_or(0.0)
            .max(config.last_sync_time());
        Ok(Self {
            db,
            config,
            registry,
            last_timestamp,
        })
    }

    /// Timestamp for the next point: `now`, or just after the previous one
    /// if the clock has not moved past it.
    pub(crate) fn next_timestamp(&self, now: f64) -> f64 {
        stamp_after(self.last_timestamp, now)
    }
}

/// `now` if it is later than `previous`, otherwise the smallest step past it.
pub(crate) fn stamp_after(previous: f64, now: f64) -> f64 {
    if now > previous {
        now
    } else {
        next_after(previous)
    }
}

const MIN_STEP: f64 = 1e-6;

fn next_after(timestamp: f64) -> f64 {
    let stepped = timestamp + MIN_STEP;
    if stepped > timestamp {
        stepped
    } else {
        f64::from_bits(timestamp.to_bits() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logger_database::{PendingPoint, StoredConfig};

    fn store_with(points: &[f64], last_sync: f64) -> LocalStore {
        let db = Database::open_in_memory().unwrap();
        db.ensure_config(&StoredConfig::with_endpoint_url("https://example.com"))
            .unwrap();
        db.set_last_sync_time(last_sync).unwrap();
        for &timestamp in points {
            db.insert_pending_point(&PendingPoint {
                stream: "temp".to_string(),
                timestamp,
                payload: "1".to_string(),
            })
            .unwrap();
        }
        LocalStore::load(db).unwrap()
    }

    #[test]
    fn seeds_last_timestamp_from_pending_points() {
        let store = store_with(&[5.0, 9.0, 7.0], 3.0);
        assert_eq!(store.last_timestamp, 9.0);
    }

    #[test]
    fn seeds_last_timestamp_from_last_sync_when_buffer_is_empty() {
        let store = store_with(&[], 12.0);
        assert_eq!(store.last_timestamp, 12.0);
    }

    #[test]
    fn next_timestamp_uses_clock_when_it_moved_forward() {
        let store = store_with(&[5.0], 0.0);
        assert_eq!(store.next_timestamp(6.0), 6.0);
    }

    #[test]
    fn next_timestamp_nudges_past_stalled_or_backward_clock() {
        let store = store_with(&[5.0], 0.0);
        let same = store.next_timestamp(5.0);
        let back = store.next_timestamp(1.0);
        assert!(same > 5.0 && same < 5.001);
        assert_eq!(same, back);
    }

    #[test]
    fn next_after_always_increases() {
        let huge = 1e300;
        assert!(next_after(huge) > huge);
        assert!(next_after(0.0) > 0.0);
    }
}
