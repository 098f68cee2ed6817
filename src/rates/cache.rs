use chrono::{DateTime, Duration, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use tracing::debug;

use crate::rates::model::RateSet;

#[derive(Debug, Clone)]
pub struct CacheRecord {
    pub data: RateSet,
    // epoch milliseconds
    pub timestamp: i64,
    pub ttl: Duration,
}

impl CacheRecord {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() - self.timestamp < self.ttl.num_milliseconds()
    }
}

/// Process-wide TTL cache of rate sets, one record per quote currency.
///
/// A record expires as a whole; refreshing swaps in a new record rather
/// than touching the old one, so readers never observe a partial update.
#[derive(Debug)]
pub struct RateCache {
    ttl: Duration,
    records: RwLock<HashMap<String, Arc<CacheRecord>>>,
}

impl RateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, quote: &str) -> Option<RateSet> {
        self.get_at(quote, Utc::now())
    }

    pub fn get_at(&self, quote: &str, now: DateTime<Utc>) -> Option<RateSet> {
        let record = {
            let records = self.records.read().unwrap_or_else(|e| e.into_inner());
            records.get(quote).cloned()
        };

        match record {
            Some(record) if record.is_fresh_at(now) => {
                debug!("Rate cache hit for {}", quote);
                Some(record.data.clone())
            }
            Some(_) => {
                debug!("Rate cache expired for {}", quote);
                None
            }
            None => {
                debug!("Rate cache miss for {}", quote);
                None
            }
        }
    }

    pub fn put(&self, quote: &str, data: RateSet) {
        self.put_at(quote, data, Utc::now());
    }

    pub fn put_at(&self, quote: &str, data: RateSet, now: DateTime<Utc>) {
        let record = Arc::new(CacheRecord {
            data,
            timestamp: now.timestamp_millis(),
            ttl: self.ttl,
        });

        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(quote.to_string(), record);
    }
}
