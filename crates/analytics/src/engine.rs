//! 분석 엔진 — 알림 배치의 증분 병합과 파생 시계열
//!
//! 병합/버킷팅은 순수 동기 연산이며, `now`를 인자로 받아
//! 결정적으로 동작합니다 (테스트에서 시간 주입 가능).
//!
//! # 멱등성
//! 알림 ID 중복 제거 집합을 유지하므로 같은 배치를 반복 병합해도
//! 카운트가 바뀌지 않습니다. 중복 제거 집합은 윈도우 밖 항목을
//! 버킷과 함께 제거하여 유한하게 유지됩니다.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;

use flowsentry_core::config::AnalyticsConfig;
use flowsentry_core::error::AnalyticsError;
use flowsentry_core::metrics as m;
use flowsentry_core::types::AlertRecord;

use crate::bucket::{SourceCounts, TimeBucket, bucket_start};
use crate::timestamp::resolve_timestamp;

/// 분석 파라미터 (윈도우 W, 버킷 폭 B, top-K)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnalyticsParams {
    /// 슬라이딩 윈도우 길이 (초)
    pub window_secs: u64,
    /// 버킷 폭 (초)
    pub bucket_secs: u64,
    /// top sources 랭킹 크기
    pub top_sources: usize,
}

impl AnalyticsParams {
    /// core 설정에서 파라미터를 생성합니다.
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            window_secs: config.window_secs,
            bucket_secs: config.bucket_secs,
            top_sources: config.top_sources,
        }
    }

    /// 파라미터 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.bucket_secs == 0 {
            return Err(AnalyticsError::InvalidParams {
                reason: "bucket_secs must be greater than zero".to_owned(),
            });
        }
        if self.window_secs < self.bucket_secs {
            return Err(AnalyticsError::InvalidParams {
                reason: "window_secs must be at least bucket_secs".to_owned(),
            });
        }
        Ok(())
    }

    /// 윈도우가 덮는 버킷 수 = ceil(W/B)
    pub fn bucket_count(&self) -> usize {
        (self.window_secs.div_ceil(self.bucket_secs)) as usize
    }
}

impl Default for AnalyticsParams {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

/// 병합 한 번의 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// 새로 병합된 레코드 수
    pub merged: usize,
    /// ID 중복으로 건너뛴 수
    pub duplicates: usize,
    /// 타임스탬프 해석 실패로 드롭된 수 (데이터 오류)
    pub data_errors: usize,
    /// 병합 후 윈도우 밖으로 제거된 버킷 수
    pub evicted_buckets: usize,
}

/// 갭 필링된 버킷 요약 (시계열의 한 점)
#[derive(Debug, Clone, Serialize)]
pub struct BucketSummary {
    /// 버킷 시작 (epoch 초)
    pub start_ts: i64,
    /// 버킷 시작 (RFC 3339)
    pub start_iso: String,
    /// 버킷 내 전체 알림 수
    pub total: u64,
    /// 심각도별 카운트
    pub counts_by_severity: BTreeMap<String, u64>,
    /// 공격 유형별 카운트
    pub counts_by_attack_type: BTreeMap<String, u64>,
}

/// 출발지 IP 랭킹 엔트리
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopSource {
    /// 출발지 IP
    pub source_ip: String,
    /// 전체 알림 수
    pub total: u64,
    /// critical 알림 수
    pub critical: u64,
    /// high 알림 수
    pub high: u64,
    /// 최빈 공격 유형 (동률이면 최초 관측)
    pub top_attack_type: Option<String>,
}

/// 분석 요약 — `analytics()` 호출의 결과
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    /// 적용된 파라미터
    pub params: AnalyticsParams,
    /// 갭 필링된 버킷 시계열 (오름차순, 정확히 ceil(W/B)개 — 입력이
    /// 전혀 없었다면 빈 목록)
    pub series: Vec<BucketSummary>,
    /// 심각도별 시계열 — `series`와 같은 인덱스 정렬
    pub severity_series: BTreeMap<String, Vec<u64>>,
    /// 공격 유형별 시계열 — `series`와 같은 인덱스 정렬
    pub attack_type_series: BTreeMap<String, Vec<u64>>,
    /// 출발지 IP 랭킹 (내림차순, 최대 top-K)
    pub top_sources: Vec<TopSource>,
    /// 누적 데이터 오류 수
    pub data_errors: u64,
}

/// 시간 버킷 분석 엔진
///
/// 명시적으로 생성되는 상태 객체입니다. 병합은 동기이며
/// 어떤 갱신 루프에서든 호출할 수 있습니다.
pub struct AnalyticsEngine {
    params: AnalyticsParams,
    buckets: BTreeMap<i64, TimeBucket>,
    /// 멱등 병합을 위한 ID → 타임스탬프 맵 (윈도우와 함께 제거)
    seen_ids: HashMap<String, i64>,
    merged_total: u64,
    data_errors: u64,
}

impl AnalyticsEngine {
    /// 파라미터 검증 후 엔진을 생성합니다.
    pub fn new(params: AnalyticsParams) -> Result<Self, AnalyticsError> {
        params.validate()?;
        Ok(Self {
            params,
            buckets: BTreeMap::new(),
            seen_ids: HashMap::new(),
            merged_total: 0,
            data_errors: 0,
        })
    }

    /// 적용 중인 파라미터
    pub fn params(&self) -> AnalyticsParams {
        self.params
    }

    /// 현재 버킷 수 (제거 이후)
    pub fn bucket_len(&self) -> usize {
        self.buckets.len()
    }

    /// 알림 레코드 배치를 병합합니다.
    ///
    /// - 타임스탬프 해석 실패 → 데이터 오류로 집계하고 드롭
    /// - 이미 본 ID → 건너뜀 (멱등)
    /// - 카운트는 기존 버킷에 *합산*
    /// - 병합 후 `[now - W, now]` 밖의 버킷 제거
    pub fn merge(&mut self, records: &[AlertRecord], now: DateTime<Utc>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let bucket_secs = self.params.bucket_secs as i64;

        for record in records {
            let Some(ts) = resolve_timestamp(record) else {
                outcome.data_errors += 1;
                self.data_errors += 1;
                counter!(m::ANALYTICS_DATA_ERRORS_TOTAL).increment(1);
                tracing::debug!(id = %record.id, "dropping record with unresolvable timestamp");
                continue;
            };

            if self.seen_ids.contains_key(&record.id) {
                outcome.duplicates += 1;
                continue;
            }

            let start = bucket_start(ts, bucket_secs);
            self.buckets
                .entry(start)
                .or_insert_with(|| TimeBucket::new(start))
                .absorb(record);
            self.seen_ids.insert(record.id.clone(), ts);
            outcome.merged += 1;
            self.merged_total += 1;
        }

        counter!(m::ANALYTICS_MERGED_TOTAL).increment(outcome.merged as u64);
        outcome.evicted_buckets = self.evict(now);
        gauge!(m::ANALYTICS_BUCKETS).set(self.buckets.len() as f64);
        outcome
    }

    /// 윈도우 밖의 버킷과 중복 제거 항목을 제거합니다.
    fn evict(&mut self, now: DateTime<Utc>) -> usize {
        let (window_start, window_end) = self.window_bounds(now);
        let before = self.buckets.len();
        self.buckets
            .retain(|start, _| (window_start..=window_end).contains(start));
        let evicted = before - self.buckets.len();

        if evicted > 0 {
            // ID 집합도 같이 정리해 메모리를 유한하게 유지
            let cutoff = window_start;
            self.seen_ids.retain(|_, ts| *ts >= cutoff);
        }
        evicted
    }

    /// 윈도우가 덮는 버킷 시작 범위 [첫 버킷, 마지막 버킷]
    fn window_bounds(&self, now: DateTime<Utc>) -> (i64, i64) {
        let bucket_secs = self.params.bucket_secs as i64;
        let last = bucket_start(now.timestamp(), bucket_secs);
        let first = last - (self.params.bucket_count() as i64 - 1) * bucket_secs;
        (first, last)
    }

    /// 현재 윈도우의 분석 요약을 생성합니다.
    ///
    /// 갭 필링: 윈도우 내 모든 버킷 경계마다 정확히 하나의 엔트리를
    /// 만듭니다 (0 카운트 포함). 단, 지금까지 아무것도 병합되지 않은
    /// 엔진은 빈 시계열을 반환합니다 (전부 0과 구분 가능).
    pub fn summary(&self, now: DateTime<Utc>) -> AnalyticsSummary {
        if self.merged_total == 0 {
            return AnalyticsSummary {
                params: self.params,
                series: Vec::new(),
                severity_series: BTreeMap::new(),
                attack_type_series: BTreeMap::new(),
                top_sources: Vec::new(),
                data_errors: self.data_errors,
            };
        }

        let bucket_secs = self.params.bucket_secs as i64;
        let (window_start, window_end) = self.window_bounds(now);

        // 갭 필링된 기본 시계열
        let mut series = Vec::with_capacity(self.params.bucket_count());
        let mut start = window_start;
        while start <= window_end {
            let summary = match self.buckets.get(&start) {
                Some(bucket) => BucketSummary {
                    start_ts: start,
                    start_iso: iso_of(start),
                    total: bucket.total,
                    counts_by_severity: bucket.counts_by_severity.clone(),
                    counts_by_attack_type: bucket.counts_by_attack_type.clone(),
                },
                None => BucketSummary {
                    start_ts: start,
                    start_iso: iso_of(start),
                    total: 0,
                    counts_by_severity: BTreeMap::new(),
                    counts_by_attack_type: BTreeMap::new(),
                },
            };
            series.push(summary);
            start += bucket_secs;
        }

        // 파생 시계열: 심각도/공격 유형별, series와 인덱스 정렬
        let mut severity_series: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        let mut attack_type_series: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for key in series
            .iter()
            .flat_map(|b| b.counts_by_severity.keys().cloned())
        {
            severity_series.entry(key).or_insert_with(|| vec![0; series.len()]);
        }
        for key in series
            .iter()
            .flat_map(|b| b.counts_by_attack_type.keys().cloned())
        {
            attack_type_series.entry(key).or_insert_with(|| vec![0; series.len()]);
        }
        for (idx, bucket) in series.iter().enumerate() {
            for (key, count) in &bucket.counts_by_severity {
                if let Some(points) = severity_series.get_mut(key) {
                    points[idx] = *count;
                }
            }
            for (key, count) in &bucket.counts_by_attack_type {
                if let Some(points) = attack_type_series.get_mut(key) {
                    points[idx] = *count;
                }
            }
        }

        AnalyticsSummary {
            params: self.params,
            series,
            severity_series,
            attack_type_series,
            top_sources: self.top_sources(window_start, window_end),
            data_errors: self.data_errors,
        }
    }

    /// 윈도우 내 출발지 IP 랭킹을 계산합니다.
    ///
    /// 소스별 최빈 공격 유형의 동률은 최초 관측 순서로 깨고,
    /// 소스 정렬의 동률은 IP 사전순으로 깨서 출력이 결정적입니다.
    fn top_sources(&self, window_start: i64, window_end: i64) -> Vec<TopSource> {
        struct SourceAgg {
            total: u64,
            critical: u64,
            high: u64,
            attacks: Vec<(String, u64)>,
        }

        let mut aggregates: HashMap<String, SourceAgg> = HashMap::new();

        // 버킷 오름차순 순회 → 공격 유형 최초 관측 순서 보존
        for bucket in self
            .buckets
            .range(window_start..=window_end)
            .map(|(_, b)| b)
        {
            for (ip, counts) in &bucket.sources {
                let agg = aggregates.entry(ip.clone()).or_insert(SourceAgg {
                    total: 0,
                    critical: 0,
                    high: 0,
                    attacks: Vec::new(),
                });
                agg.total += counts.total;
                agg.critical += counts.critical;
                agg.high += counts.high;
                merge_attack_counts(&mut agg.attacks, counts);
            }
        }

        let mut ranked: Vec<TopSource> = aggregates
            .into_iter()
            .map(|(source_ip, agg)| TopSource {
                source_ip,
                total: agg.total,
                critical: agg.critical,
                high: agg.high,
                top_attack_type: most_frequent(&agg.attacks),
            })
            .collect();

        ranked.sort_by(|a, b| b.total.cmp(&a.total).then(a.source_ip.cmp(&b.source_ip)));
        ranked.truncate(self.params.top_sources);
        ranked
    }
}

/// 알림 배치 하나를 일회성으로 분석합니다.
///
/// 엔진 상태를 유지할 필요 없는 호출자를 위한 편의 함수입니다.
/// 증분 병합이 필요하면 [`AnalyticsEngine`]을 직접 보유하세요.
pub fn analyze(
    records: &[AlertRecord],
    params: AnalyticsParams,
    now: DateTime<Utc>,
) -> Result<AnalyticsSummary, AnalyticsError> {
    let mut engine = AnalyticsEngine::new(params)?;
    engine.merge(records, now);
    Ok(engine.summary(now))
}

/// 버킷의 소스 공격 카운트를 집계에 합칩니다 (관측 순서 유지).
fn merge_attack_counts(target: &mut Vec<(String, u64)>, counts: &SourceCounts) {
    for (attack, count) in &counts.attacks {
        match target.iter_mut().find(|(a, _)| a == attack) {
            Some((_, existing)) => *existing += count,
            None => target.push((attack.clone(), *count)),
        }
    }
}

/// 최빈 공격 유형 — 엄격히 더 클 때만 교체하므로 동률은 최초 관측이 이김
fn most_frequent(attacks: &[(String, u64)]) -> Option<String> {
    let mut best: Option<(&str, u64)> = None;
    for (attack, count) in attacks {
        match best {
            Some((_, best_count)) if *count <= best_count => {}
            _ => best = Some((attack, *count)),
        }
    }
    best.map(|(attack, _)| attack.to_owned())
}

fn iso_of(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn params(window: u64, bucket: u64) -> AnalyticsParams {
        AnalyticsParams {
            window_secs: window,
            bucket_secs: bucket,
            top_sources: 5,
        }
    }

    fn record_at(id: &str, ts: i64, src_ip: &str, attack: &str, severity: &str) -> AlertRecord {
        AlertRecord {
            id: id.to_owned(),
            timestamp: iso_of(ts),
            src_ip: src_ip.to_owned(),
            src_port: 1,
            dst_ip: "10.9.9.9".to_owned(),
            dst_port: 2,
            protocol: "TCP".to_owned(),
            attack_type: attack.to_owned(),
            severity: severity.to_owned(),
            score: 0.8,
        }
    }

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    #[test]
    fn invalid_params_rejected() {
        assert!(AnalyticsEngine::new(params(3600, 0)).is_err());
        assert!(AnalyticsEngine::new(params(100, 300)).is_err());
    }

    #[test]
    fn never_fed_engine_yields_empty_series() {
        let engine = AnalyticsEngine::new(params(3600, 300)).unwrap();
        let summary = engine.summary(at(10_000));
        assert!(summary.series.is_empty());
        assert!(summary.top_sources.is_empty());
    }

    #[test]
    fn empty_series_distinguishable_from_all_zero() {
        let mut engine = AnalyticsEngine::new(params(600, 300)).unwrap();
        let now = at(100_000);

        // 병합은 했지만 전부 윈도우 밖 → 버킷은 없어도 시계열은 0으로 채워짐
        engine.merge(
            &[record_at("a", 1_000, "10.0.0.1", "mitm", "high")],
            now,
        );
        let summary = engine.summary(now);
        assert_eq!(summary.series.len(), 2);
        assert!(summary.series.iter().all(|b| b.total == 0));
    }

    /// 스펙 §8: 출력은 정확히 ceil(W/B)개이고, 카운트 합은
    /// 윈도우 내 타임스탬프를 가진 알림 수와 같음
    #[test]
    fn series_has_exactly_ceil_w_over_b_entries() {
        let mut engine = AnalyticsEngine::new(params(3600, 300)).unwrap();
        let now = at(1_700_003_600);
        engine.merge(
            &[
                record_at("a", 1_700_003_000, "10.0.0.1", "syn-flood", "high"),
                record_at("b", 1_700_002_000, "10.0.0.2", "mitm", "low"),
                record_at("out", 1_600_000_000, "10.0.0.3", "mitm", "low"), // 윈도우 밖
            ],
            now,
        );

        let summary = engine.summary(now);
        assert_eq!(summary.series.len(), 12); // ceil(3600/300)
        let total: u64 = summary.series.iter().map(|b| b.total).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn uneven_window_rounds_bucket_count_up() {
        let engine = AnalyticsEngine::new(params(700, 300)).unwrap();
        assert_eq!(engine.params().bucket_count(), 3); // ceil(700/300)
    }

    /// 스펙 §8: 동일한 배치 재병합은 카운트에 영향 없음 (no-op)
    #[test]
    fn merge_is_idempotent_under_id_dedupe() {
        let mut engine = AnalyticsEngine::new(params(3600, 300)).unwrap();
        let now = at(1_700_003_600);
        let batch = vec![
            record_at("a", 1_700_003_000, "10.0.0.1", "syn-flood", "high"),
            record_at("b", 1_700_003_100, "10.0.0.1", "syn-flood", "critical"),
        ];

        let first = engine.merge(&batch, now);
        assert_eq!(first.merged, 2);

        let second = engine.merge(&batch, now);
        assert_eq!(second.merged, 0);
        assert_eq!(second.duplicates, 2);

        let total: u64 = engine.summary(now).series.iter().map(|b| b.total).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn counts_summed_into_existing_buckets_not_overwritten() {
        let mut engine = AnalyticsEngine::new(params(3600, 300)).unwrap();
        let now = at(1_700_003_600);

        engine.merge(
            &[record_at("a", 1_700_003_010, "10.0.0.1", "syn-flood", "high")],
            now,
        );
        engine.merge(
            &[record_at("b", 1_700_003_020, "10.0.0.1", "syn-flood", "high")],
            now,
        );

        let summary = engine.summary(now);
        let bucket = summary
            .series
            .iter()
            .find(|b| b.start_ts == 1_700_002_800)
            .unwrap();
        assert_eq!(bucket.total, 2);
        assert_eq!(bucket.counts_by_attack_type["syn-flood"], 2);
    }

    #[test]
    fn malformed_timestamps_counted_as_data_errors() {
        let mut engine = AnalyticsEngine::new(params(3600, 300)).unwrap();
        let now = at(1_700_003_600);
        let mut bad = record_at("bad", 1_700_003_000, "10.0.0.1", "mitm", "high");
        bad.timestamp = "yesterday-ish".to_owned();

        let outcome = engine.merge(&[bad], now);
        assert_eq!(outcome.merged, 0);
        assert_eq!(outcome.data_errors, 1);
        assert_eq!(engine.summary(now).data_errors, 1);
    }

    #[test]
    fn structured_id_fallback_buckets_correctly() {
        let mut engine = AnalyticsEngine::new(params(3600, 300)).unwrap();
        let now = at(1_700_003_600);
        let mut r = record_at("alert-1700003000500-7", 0, "10.0.0.1", "mitm", "high");
        r.timestamp = "garbage".to_owned();

        let outcome = engine.merge(&[r], now);
        assert_eq!(outcome.merged, 1);
        let bucket = engine
            .summary(now)
            .series
            .into_iter()
            .find(|b| b.start_ts == bucket_start(1_700_003_000, 300))
            .unwrap();
        assert_eq!(bucket.total, 1);
    }

    #[test]
    fn sliding_window_evicts_old_buckets() {
        let mut engine = AnalyticsEngine::new(params(600, 300)).unwrap();

        engine.merge(
            &[record_at("a", 1_000, "10.0.0.1", "mitm", "high")],
            at(1_100),
        );
        assert_eq!(engine.bucket_len(), 1);

        // 윈도우가 훨씬 뒤로 이동 → 이전 버킷 제거
        let outcome = engine.merge(
            &[record_at("b", 10_000, "10.0.0.1", "mitm", "high")],
            at(10_100),
        );
        assert_eq!(outcome.evicted_buckets, 1);
        assert_eq!(engine.bucket_len(), 1);
    }

    #[test]
    fn severity_series_aligned_with_buckets() {
        let mut engine = AnalyticsEngine::new(params(900, 300)).unwrap();
        let now = at(900);
        engine.merge(
            &[
                record_at("a", 350, "10.0.0.1", "syn-flood", "high"),
                record_at("b", 650, "10.0.0.1", "syn-flood", "critical"),
                record_at("c", 660, "10.0.0.1", "mitm", "critical"),
            ],
            now,
        );

        let summary = engine.summary(now);
        assert_eq!(summary.series.len(), 3);
        // 버킷 경계: [300, 600, 900] — 350은 버킷 300, 650/660은 버킷 600
        assert_eq!(summary.severity_series["high"], vec![1, 0, 0]);
        assert_eq!(summary.severity_series["critical"], vec![0, 2, 0]);
        assert_eq!(summary.attack_type_series["mitm"], vec![0, 1, 0]);
    }

    #[test]
    fn top_sources_ranked_and_truncated() {
        let mut engine = AnalyticsEngine::new(AnalyticsParams {
            window_secs: 900,
            bucket_secs: 300,
            top_sources: 2,
        })
        .unwrap();
        let now = at(900);

        let mut batch = Vec::new();
        for i in 0..5 {
            batch.push(record_at(
                &format!("a{i}"),
                400,
                "10.0.0.1",
                "syn-flood",
                "critical",
            ));
        }
        for i in 0..3 {
            batch.push(record_at(&format!("b{i}"), 400, "10.0.0.2", "mitm", "high"));
        }
        batch.push(record_at("c0", 400, "10.0.0.3", "port-scan", "low"));
        engine.merge(&batch, now);

        let top = engine.summary(now).top_sources;
        assert_eq!(top.len(), 2); // top-K 절단
        assert_eq!(top[0].source_ip, "10.0.0.1");
        assert_eq!(top[0].total, 5);
        assert_eq!(top[0].critical, 5);
        assert_eq!(top[0].top_attack_type.as_deref(), Some("syn-flood"));
        assert_eq!(top[1].source_ip, "10.0.0.2");
        assert_eq!(top[1].high, 3);
    }

    #[test]
    fn top_attack_tie_broken_by_first_seen() {
        let mut engine = AnalyticsEngine::new(params(900, 300)).unwrap();
        let now = at(900);
        engine.merge(
            &[
                record_at("a", 400, "10.0.0.1", "mitm", "high"),
                record_at("b", 500, "10.0.0.1", "syn-flood", "high"),
            ],
            now,
        );

        // 동률 1:1 — 먼저 관측된 mitm이 이김
        let top = engine.summary(now).top_sources;
        assert_eq!(top[0].top_attack_type.as_deref(), Some("mitm"));
    }

    proptest! {
        /// 스펙 §8: 임의의 W, B에 대해 시계열 길이는 ceil(W/B),
        /// 카운트 합은 윈도우 내 알림 수와 일치
        #[test]
        fn bucket_count_and_conservation(
            window in 1u64..5000,
            bucket in 1u64..600,
            offsets in proptest::collection::vec(0i64..5000, 1..40),
        ) {
            prop_assume!(window >= bucket);
            let mut engine = AnalyticsEngine::new(AnalyticsParams {
                window_secs: window,
                bucket_secs: bucket,
                top_sources: 5,
            }).unwrap();

            let now_ts: i64 = 1_700_000_000;
            let records: Vec<AlertRecord> = offsets
                .iter()
                .enumerate()
                .map(|(i, off)| record_at(
                    &format!("id-{i}"),
                    now_ts - off,
                    "10.0.0.1",
                    "syn-flood",
                    "high",
                ))
                .collect();

            engine.merge(&records, at(now_ts));
            let summary = engine.summary(at(now_ts));

            prop_assert_eq!(
                summary.series.len(),
                window.div_ceil(bucket) as usize
            );

            // 윈도우가 덮는 버킷 범위 내 레코드 수와 합이 일치
            let bucket_i = bucket as i64;
            let last = bucket_start(now_ts, bucket_i);
            let first = last - (window.div_ceil(bucket) as i64 - 1) * bucket_i;
            let expected = records
                .iter()
                .filter(|r| {
                    let ts = resolve_timestamp(r).unwrap();
                    let b = bucket_start(ts, bucket_i);
                    (first..=last).contains(&b)
                })
                .count() as u64;
            let total: u64 = summary.series.iter().map(|b| b.total).sum();
            prop_assert_eq!(total, expected);
        }
    }
}
