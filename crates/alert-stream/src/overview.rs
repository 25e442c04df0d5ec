//! 개요 집계 — 최근 알림 링 버퍼 위의 TTL 캐시 통계
//!
//! [`OverviewAggregator`]는 최근 M개의 알림을 유한 링 버퍼에 보존하고,
//! 그 위에서 계산한 개요 스냅샷을 TTL 동안 캐시합니다.
//!
//! # 캐시 계약
//! - TTL 내의 호출은 동일한 캐시 스냅샷을 반환
//! - 만료 후 첫 호출이 재계산하고 캐시를 교체
//! - 무효화는 순수하게 시간 기반 (유한 staleness는 수용된 트레이드오프)
//! - 재계산이 일시적으로 불가능하면 이전 스냅샷을 TTL 너머로 제공하고
//!   경고만 남김 (실패로 표면화하지 않음)

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, SystemTime};

use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use flowsentry_core::config::OverviewConfig;
use flowsentry_core::metrics as m;
use flowsentry_core::types::{Alert, AttackType, Severity};

/// 개요 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewSnapshot {
    /// 보존 버퍼 안의 알림 수
    pub total: u64,
    /// 심각도별 분포
    pub severity_distribution: BTreeMap<Severity, u64>,
    /// 공격 유형별 분포
    pub attack_type_distribution: BTreeMap<AttackType, u64>,
    /// 경보 수준 알림 비율 (Info 제외)
    pub detection_rate: f64,
    /// 스냅샷 계산 시각
    pub last_updated: SystemTime,
}

struct CachedSnapshot {
    snapshot: OverviewSnapshot,
    computed_at: Instant,
}

/// 개요 집계기
///
/// 시작 시 명시적으로 생성되어 주입되는 상태 객체입니다.
pub struct OverviewAggregator {
    retention: Mutex<VecDeque<Alert>>,
    cached: Mutex<Option<CachedSnapshot>>,
    capacity: usize,
    ttl: Duration,
    recomputes: std::sync::atomic::AtomicU64,
}

impl OverviewAggregator {
    /// 설정에서 집계기를 생성합니다.
    pub fn from_config(config: &OverviewConfig) -> Self {
        Self::new(config.retention, Duration::from_secs(config.ttl_secs))
    }

    /// 보존 용량 M과 TTL T로 집계기를 생성합니다.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            retention: Mutex::new(VecDeque::with_capacity(capacity.min(10_000))),
            cached: Mutex::new(None),
            capacity,
            ttl,
            recomputes: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// 알림을 보존 버퍼에 기록합니다.
    ///
    /// 버퍼가 가득 차면 가장 오래된 알림을 제거합니다.
    pub fn record(&self, alert: &Alert) {
        let mut retention = self.retention.lock();
        if retention.len() >= self.capacity {
            retention.pop_front();
        }
        retention.push_back(alert.clone());
    }

    /// 개요 통계를 반환합니다.
    ///
    /// TTL 내에서는 동일한 캐시 값을, 만료 후에는 재계산 값을 반환합니다.
    pub fn overview(&self) -> OverviewSnapshot {
        let mut cached = self.cached.lock();

        if let Some(entry) = cached.as_ref()
            && entry.computed_at.elapsed() < self.ttl
        {
            counter!(m::OVERVIEW_CACHE_HITS_TOTAL).increment(1);
            return entry.snapshot.clone();
        }

        // TTL 만료 — 재계산 시도. 보존 버퍼가 잠시 잠겨있으면
        // 이전 스냅샷을 TTL 너머로 제공 (경고만 남김)
        let snapshot = match self.retention.try_lock() {
            Some(retention) => Self::compute(&retention),
            None => {
                if let Some(entry) = cached.as_ref() {
                    tracing::warn!("overview recompute unavailable, serving stale snapshot");
                    return entry.snapshot.clone();
                }
                // 캐시가 아예 없으면 잠금 해제를 기다림 (첫 호출 정확성)
                Self::compute(&self.retention.lock())
            }
        };

        self.recomputes
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        counter!(m::OVERVIEW_RECOMPUTES_TOTAL).increment(1);

        *cached = Some(CachedSnapshot {
            snapshot: snapshot.clone(),
            computed_at: Instant::now(),
        });
        snapshot
    }

    /// 지금까지의 재계산 횟수 (테스트/진단용)
    pub fn recompute_count(&self) -> u64 {
        self.recomputes.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// 보존 버퍼의 현재 길이
    pub fn retained(&self) -> usize {
        self.retention.lock().len()
    }

    /// 보존 버퍼의 알림을 복사해 반환합니다 (최신 이력 조회용).
    ///
    /// 스트림 구독을 놓친 소비자가 연속성을 복구할 때 사용합니다.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.retention.lock().iter().cloned().collect()
    }

    fn compute(retention: &VecDeque<Alert>) -> OverviewSnapshot {
        let mut severity_distribution: BTreeMap<Severity, u64> = BTreeMap::new();
        let mut attack_type_distribution: BTreeMap<AttackType, u64> = BTreeMap::new();
        let mut alerting = 0u64;

        for alert in retention {
            *severity_distribution.entry(alert.severity).or_insert(0) += 1;
            *attack_type_distribution
                .entry(alert.attack_type)
                .or_insert(0) += 1;
            if alert.severity.is_alerting() {
                alerting += 1;
            }
        }

        let total = retention.len() as u64;
        OverviewSnapshot {
            total,
            severity_distribution,
            attack_type_distribution,
            detection_rate: if total > 0 {
                alerting as f64 / total as f64
            } else {
                0.0
            },
            last_updated: SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    use flowsentry_core::types::{FlowMetadata, Protocol};

    fn make_alert(attack: AttackType, severity: Severity) -> Alert {
        Alert {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: SystemTime::now(),
            flow: FlowMetadata {
                src_ip: "10.0.0.1".parse().unwrap(),
                src_port: 1000,
                dst_ip: "192.168.0.1".parse().unwrap(),
                dst_port: 443,
                protocol: Protocol::Tcp,
            },
            attack_type: attack,
            severity,
            score: 0.8,
            label_human: attack.human_label().to_owned(),
            chain_stage: None,
            top_features: vec![],
        }
    }

    #[tokio::test]
    async fn empty_aggregator_gives_zero_overview() {
        let agg = OverviewAggregator::new(10, Duration::from_secs(60));
        let snapshot = agg.overview();
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.detection_rate, 0.0);
        assert!(snapshot.severity_distribution.is_empty());
    }

    #[tokio::test]
    async fn distributions_counted() {
        let agg = OverviewAggregator::new(10, Duration::ZERO);
        agg.record(&make_alert(AttackType::SynFlood, Severity::High));
        agg.record(&make_alert(AttackType::SynFlood, Severity::Critical));
        agg.record(&make_alert(AttackType::Mitm, Severity::Info));

        let snapshot = agg.overview();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.severity_distribution[&Severity::High], 1);
        assert_eq!(snapshot.severity_distribution[&Severity::Critical], 1);
        assert_eq!(snapshot.attack_type_distribution[&AttackType::SynFlood], 2);
        // Info 1건은 경보가 아님 → 2/3
        assert!((snapshot.detection_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn retention_is_bounded() {
        let agg = OverviewAggregator::new(5, Duration::ZERO);
        for _ in 0..20 {
            agg.record(&make_alert(AttackType::PortScan, Severity::Medium));
        }
        assert_eq!(agg.retained(), 5);
        assert_eq!(agg.overview().total, 5);
    }

    /// 스펙 §8: TTL 내 두 호출은 동일한 캐시 값, TTL 경과 후
    /// 세 번째 호출이 정확히 한 번의 재계산을 유발
    #[tokio::test(start_paused = true)]
    async fn ttl_cache_serves_identical_until_expiry() {
        let agg = OverviewAggregator::new(10, Duration::from_secs(60));
        agg.record(&make_alert(AttackType::SynFlood, Severity::High));

        let first = agg.overview();
        assert_eq!(agg.recompute_count(), 1);

        // 버퍼에 더 기록해도 TTL 내에는 캐시 값이 그대로
        agg.record(&make_alert(AttackType::Mitm, Severity::Critical));
        tokio::time::advance(Duration::from_secs(30)).await;
        let second = agg.overview();
        assert_eq!(first, second);
        assert_eq!(agg.recompute_count(), 1);

        // TTL 경과 후 정확히 한 번 재계산
        tokio::time::advance(Duration::from_secs(31)).await;
        let third = agg.overview();
        assert_eq!(third.total, 2);
        assert_eq!(agg.recompute_count(), 2);

        // 재계산 직후 호출은 다시 캐시 적중
        let fourth = agg.overview();
        assert_eq!(third, fourth);
        assert_eq!(agg.recompute_count(), 2);
    }

    #[tokio::test]
    async fn recent_alerts_returns_retained_history() {
        let agg = OverviewAggregator::new(3, Duration::from_secs(60));
        for _ in 0..5 {
            agg.record(&make_alert(AttackType::BruteForce, Severity::Low));
        }
        assert_eq!(agg.recent_alerts().len(), 3);
    }
}
