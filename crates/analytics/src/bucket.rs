//! 시간 버킷 — 한 시간 조각의 카운트
//!
//! 버킷 경계는 `floor(ts / B) * B` 내림으로 정합니다 (반올림 아님).
//! 병합은 기존 카운트에 *합산*하며 덮어쓰지 않습니다.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use flowsentry_core::types::AlertRecord;

/// 타임스탬프가 속하는 버킷 시작을 계산합니다 (내림).
pub fn bucket_start(ts: i64, bucket_secs: i64) -> i64 {
    ts.div_euclid(bucket_secs) * bucket_secs
}

/// 출발지 IP 하나의 버킷 내 카운트
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceCounts {
    /// 전체 알림 수
    pub total: u64,
    /// critical 알림 수
    pub critical: u64,
    /// high 알림 수
    pub high: u64,
    /// 공격 유형별 카운트 — 최초 관측 순서 유지 (동률 타이브레이크용)
    pub attacks: Vec<(String, u64)>,
}

impl SourceCounts {
    fn absorb(&mut self, record: &AlertRecord) {
        self.total += 1;
        match record.severity.as_str() {
            "critical" => self.critical += 1,
            "high" => self.high += 1,
            _ => {}
        }
        match self
            .attacks
            .iter_mut()
            .find(|(attack, _)| attack == &record.attack_type)
        {
            Some((_, count)) => *count += 1,
            None => self.attacks.push((record.attack_type.clone(), 1)),
        }
    }
}

/// 시간 버킷 하나
///
/// 분석 엔진이 소유하며, 윈도우 내에서 연속적으로 유지됩니다.
#[derive(Debug, Clone, Serialize)]
pub struct TimeBucket {
    /// 버킷 시작 (epoch 초)
    pub start_ts: i64,
    /// 버킷 내 전체 알림 수
    pub total: u64,
    /// 심각도별 카운트 (레코드의 문자열 그대로)
    pub counts_by_severity: BTreeMap<String, u64>,
    /// 공격 유형별 카운트
    pub counts_by_attack_type: BTreeMap<String, u64>,
    /// 출발지 IP별 카운트 (top sources 집계용)
    pub sources: HashMap<String, SourceCounts>,
}

impl TimeBucket {
    /// 빈 버킷을 생성합니다.
    pub fn new(start_ts: i64) -> Self {
        Self {
            start_ts,
            total: 0,
            counts_by_severity: BTreeMap::new(),
            counts_by_attack_type: BTreeMap::new(),
            sources: HashMap::new(),
        }
    }

    /// 레코드 하나를 버킷에 합산합니다.
    pub fn absorb(&mut self, record: &AlertRecord) {
        self.total += 1;
        *self
            .counts_by_severity
            .entry(record.severity.clone())
            .or_insert(0) += 1;
        *self
            .counts_by_attack_type
            .entry(record.attack_type.clone())
            .or_insert(0) += 1;
        self.sources
            .entry(record.src_ip.clone())
            .or_default()
            .absorb(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(src_ip: &str, attack: &str, severity: &str) -> AlertRecord {
        AlertRecord {
            id: uuid_like(src_ip, attack),
            timestamp: "2024-01-01T00:00:00Z".to_owned(),
            src_ip: src_ip.to_owned(),
            src_port: 1,
            dst_ip: "10.0.0.2".to_owned(),
            dst_port: 2,
            protocol: "TCP".to_owned(),
            attack_type: attack.to_owned(),
            severity: severity.to_owned(),
            score: 0.8,
        }
    }

    fn uuid_like(a: &str, b: &str) -> String {
        format!("{a}-{b}")
    }

    #[test]
    fn bucket_start_truncates() {
        assert_eq!(bucket_start(0, 300), 0);
        assert_eq!(bucket_start(299, 300), 0);
        assert_eq!(bucket_start(300, 300), 300);
        assert_eq!(bucket_start(301, 300), 300);
        // 반올림이 아님: 599는 300 버킷
        assert_eq!(bucket_start(599, 300), 300);
    }

    #[test]
    fn bucket_start_handles_negative_ts() {
        assert_eq!(bucket_start(-1, 300), -300);
        assert_eq!(bucket_start(-300, 300), -300);
    }

    #[test]
    fn absorb_sums_counts() {
        let mut bucket = TimeBucket::new(0);
        bucket.absorb(&record("10.0.0.1", "syn-flood", "high"));
        bucket.absorb(&record("10.0.0.1", "syn-flood", "critical"));
        bucket.absorb(&record("10.0.0.9", "mitm", "low"));

        assert_eq!(bucket.total, 3);
        assert_eq!(bucket.counts_by_severity["high"], 1);
        assert_eq!(bucket.counts_by_severity["critical"], 1);
        assert_eq!(bucket.counts_by_attack_type["syn-flood"], 2);
        assert_eq!(bucket.sources["10.0.0.1"].total, 2);
        assert_eq!(bucket.sources["10.0.0.1"].critical, 1);
        assert_eq!(bucket.sources["10.0.0.9"].high, 0);
    }

    #[test]
    fn source_attacks_keep_first_seen_order() {
        let mut bucket = TimeBucket::new(0);
        bucket.absorb(&record("10.0.0.1", "mitm", "high"));
        bucket.absorb(&record("10.0.0.1", "syn-flood", "high"));
        bucket.absorb(&record("10.0.0.1", "syn-flood", "high"));

        let attacks = &bucket.sources["10.0.0.1"].attacks;
        assert_eq!(attacks[0], ("mitm".to_owned(), 1));
        assert_eq!(attacks[1], ("syn-flood".to_owned(), 2));
    }
}
