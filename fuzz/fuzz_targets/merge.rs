#![no_main]

use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;

use flowsentry_analytics::{AnalyticsEngine, AnalyticsParams};
use flowsentry_core::types::AlertRecord;

fuzz_target!(|data: &[u8]| {
    let Ok(records) = serde_json::from_slice::<Vec<AlertRecord>>(data) else {
        return;
    };

    let Ok(mut engine) = AnalyticsEngine::new(AnalyticsParams {
        window_secs: 3600,
        bucket_secs: 300,
        top_sources: 5,
    }) else {
        return;
    };

    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let _ = engine.merge(&records, now);
    let _ = engine.summary(now);
});
