//! 예측 캐시 — 모델별 유한 FIFO로 추론 지연을 숨깁니다.
//!
//! 모델 하나당 용량 C의 큐를 두고, `pop()`이 큐 길이를 리필 임계값 R
//! 아래로 떨어뜨리면 비동기 리필을 스케줄합니다. 리필 스케줄은
//! 모델당 단일 비행(single-flight)으로 제한됩니다 (CAS 플래그).
//!
//! # 계약
//! - `pop()`은 O(1)이며 리필을 기다리지 않습니다 (논블로킹)
//! - 큐가 비면 어댑터 동기 폴백을 한 번 시도하고, 그것도 실패하면
//!   [`CacheError::Empty`]를 반환합니다 (치명적 아님)
//! - 한 슬롯에서 같은 판정이 두 번 나가지 않습니다 (`pop_front` 단일 소비)

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use flowsentry_classifier::{AdapterRegistry, RotatingFeatureSource};
use flowsentry_core::config::CacheConfig;
use flowsentry_core::error::CacheError;
use flowsentry_core::metrics as m;
use flowsentry_core::types::{Detection, FlowMetadata};

/// 캐시에서 꺼낸 예측 하나
///
/// 알림 빌더가 판정과 플로우 메타데이터를 함께 요구하므로
/// 판정을 만든 보류 행의 플로우 정보가 같이 이동합니다.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// 분류기 판정
    pub detection: Detection,
    /// 판정 대상 플로우의 메타데이터
    pub flow: FlowMetadata,
}

/// 리필 요청 — 캐시에서 리필러로 전달됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplenishRequest {
    /// 리필 대상 모델
    pub model_id: String,
}

/// 모델 하나의 캐시 슬롯
pub(crate) struct ModelSlot {
    pub(crate) model_id: String,
    /// 대기 중인 예측 큐 (FIFO)
    queue: Mutex<VecDeque<Prediction>>,
    /// 리필 단일 비행 플래그
    replenish_in_flight: AtomicBool,
    /// 동기 폴백 전용 모드 (리필 연속 실패 시)
    degraded: AtomicBool,
    // 통계 카운터
    hits: AtomicU64,
    misses: AtomicU64,
    sync_fallbacks: AtomicU64,
}

impl ModelSlot {
    fn new(model_id: String) -> Self {
        Self {
            model_id,
            queue: Mutex::new(VecDeque::new()),
            replenish_in_flight: AtomicBool::new(false),
            degraded: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sync_fallbacks: AtomicU64::new(0),
        }
    }

    /// 현재 큐 길이
    pub(crate) fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// 리필 배치를 원자적으로 커밋합니다.
    ///
    /// 한 번의 잠금 획득으로 전체 배치를 반영하므로 부분 상태가
    /// 외부에 보이지 않습니다. 용량을 넘는 항목은 버립니다.
    pub(crate) fn commit_batch(&self, batch: Vec<Prediction>, capacity: usize) -> usize {
        let mut queue = self.queue.lock();
        let mut committed = 0;
        for prediction in batch {
            if queue.len() >= capacity {
                break;
            }
            queue.push_back(prediction);
            committed += 1;
        }
        gauge!(m::CACHE_QUEUE_LENGTH, m::LABEL_MODEL => self.model_id.clone())
            .set(queue.len() as f64);
        committed
    }

    /// 리필 비행 플래그를 해제합니다.
    pub(crate) fn clear_in_flight(&self) {
        self.replenish_in_flight.store(false, Ordering::Release);
    }

    /// 슬롯을 동기 폴백 전용 모드로 전환합니다.
    pub(crate) fn mark_degraded(&self) {
        self.degraded.store(true, Ordering::Release);
    }

    /// 동기 폴백 전용 모드 여부
    pub(crate) fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }
}

/// 모델별 예측 캐시
///
/// 시작 시 명시적으로 생성되어 주입되는 상태 객체입니다.
/// 전역 싱글톤이 아니므로 테스트는 독립 인스턴스를 만들 수 있습니다.
pub struct PredictionCache {
    slots: HashMap<String, Arc<ModelSlot>>,
    registry: Arc<AdapterRegistry>,
    source: RotatingFeatureSource,
    capacity: usize,
    refill_threshold: usize,
    replenish_tx: mpsc::Sender<ReplenishRequest>,
}

impl PredictionCache {
    /// 레지스트리에 등록된 모든 모델에 대한 캐시를 생성합니다.
    pub fn new(
        config: &CacheConfig,
        registry: Arc<AdapterRegistry>,
        source: RotatingFeatureSource,
        replenish_tx: mpsc::Sender<ReplenishRequest>,
    ) -> Self {
        let slots = registry
            .model_ids()
            .into_iter()
            .map(|id| (id.clone(), Arc::new(ModelSlot::new(id))))
            .collect();

        Self {
            slots,
            registry,
            source,
            capacity: config.capacity,
            refill_threshold: config.refill_threshold,
            replenish_tx,
        }
    }

    /// 캐시가 관리하는 모델 ID 목록 (정렬됨)
    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 큐 최대 용량 (C)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 리필 임계값 (R)
    pub fn refill_threshold(&self) -> usize {
        self.refill_threshold
    }

    /// 모델의 현재 큐 길이를 반환합니다.
    pub fn queue_len(&self, model_id: &str) -> Option<usize> {
        self.slots.get(model_id).map(|s| s.len())
    }

    /// 동기 폴백 전용 모드인 모델 목록
    pub fn degraded_models(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .slots
            .values()
            .filter(|s| s.is_degraded())
            .map(|s| s.model_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// pop 통계: (적중, 소진, 동기 폴백)
    pub fn stats(&self, model_id: &str) -> Option<(u64, u64, u64)> {
        self.slots.get(model_id).map(|s| {
            (
                s.hits.load(Ordering::Relaxed),
                s.misses.load(Ordering::Relaxed),
                s.sync_fallbacks.load(Ordering::Relaxed),
            )
        })
    }

    pub(crate) fn slot(&self, model_id: &str) -> Option<Arc<ModelSlot>> {
        self.slots.get(model_id).cloned()
    }

    /// 가장 오래된 예측을 꺼냅니다.
    ///
    /// 꺼낸 뒤 남은 길이가 리필 임계값 아래면 비동기 리필을 스케줄합니다
    /// (모델당 단일 비행, 논블로킹). 큐가 비어있으면 어댑터 동기 폴백을
    /// 한 번 시도하고, 그것도 실패하면 [`CacheError::Empty`]를 반환합니다.
    pub fn pop(&self, model_id: &str) -> Result<Prediction, CacheError> {
        let slot = self
            .slots
            .get(model_id)
            .ok_or_else(|| CacheError::UnknownModel {
                model_id: model_id.to_owned(),
            })?;

        let (popped, remaining) = {
            let mut queue = slot.queue.lock();
            let popped = queue.pop_front();
            (popped, queue.len())
        };

        gauge!(m::CACHE_QUEUE_LENGTH, m::LABEL_MODEL => slot.model_id.clone())
            .set(remaining as f64);

        if remaining < self.refill_threshold {
            self.maybe_schedule_replenish(slot);
        }

        match popped {
            Some(prediction) => {
                slot.hits.fetch_add(1, Ordering::Relaxed);
                counter!(m::CACHE_HITS_TOTAL, m::LABEL_MODEL => slot.model_id.clone())
                    .increment(1);
                Ok(prediction)
            }
            None => {
                slot.misses.fetch_add(1, Ordering::Relaxed);
                counter!(m::CACHE_MISSES_TOTAL, m::LABEL_MODEL => slot.model_id.clone())
                    .increment(1);
                self.sync_fallback(slot)
            }
        }
    }

    /// 모든 슬롯을 용량까지 동기적으로 채웁니다.
    ///
    /// 시작 시 1회 호출됩니다. 채운 예측 수를 반환합니다.
    pub fn prefill(&self) -> usize {
        let mut total = 0;
        for slot in self.slots.values() {
            let need = self.capacity.saturating_sub(slot.len());
            if need == 0 {
                continue;
            }
            let batch = self.predict_batch(&slot.model_id, need);
            total += slot.commit_batch(batch, self.capacity);
        }
        tracing::info!(predictions = total, models = self.slots.len(), "cache prefilled");
        total
    }

    /// 보류 소스에서 행을 뽑아 판정 배치를 만듭니다.
    ///
    /// 분류기 에러가 난 행은 드롭 카운터에 반영하고 건너뜁니다.
    pub(crate) fn predict_batch(&self, model_id: &str, count: usize) -> Vec<Prediction> {
        let Ok(adapter) = self.registry.require(model_id) else {
            return Vec::new();
        };

        let mut batch = Vec::with_capacity(count);
        for row in self.source.next_batch(count) {
            match adapter.predict(&row.features) {
                Ok(detection) => batch.push(Prediction {
                    detection,
                    flow: row.flow,
                }),
                Err(e) => {
                    counter!(m::DETECTIONS_DROPPED_TOTAL).increment(1);
                    tracing::debug!(model_id, error = %e, "dropping undecidable row");
                }
            }
        }
        batch
    }

    /// 단일 비행 보장 하에 리필 요청을 보냅니다.
    fn maybe_schedule_replenish(&self, slot: &Arc<ModelSlot>) {
        if slot.is_degraded() {
            return;
        }
        // CAS로 단일 비행 보장: 이미 비행 중이면 아무것도 하지 않음
        if slot
            .replenish_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let request = ReplenishRequest {
            model_id: slot.model_id.clone(),
        };
        if let Err(e) = self.replenish_tx.try_send(request) {
            // 채널이 가득 찼거나 리필러가 내려감 — 플래그를 되돌려
            // 다음 pop이 다시 시도할 수 있게 함
            slot.clear_in_flight();
            tracing::warn!(model_id = %slot.model_id, error = %e, "replenish request not queued");
        }
    }

    /// 캐시 소진 시 어댑터 동기 폴백
    fn sync_fallback(&self, slot: &Arc<ModelSlot>) -> Result<Prediction, CacheError> {
        slot.sync_fallbacks.fetch_add(1, Ordering::Relaxed);
        counter!(m::CACHE_SYNC_FALLBACKS_TOTAL, m::LABEL_MODEL => slot.model_id.clone())
            .increment(1);

        let mut fallback = self.predict_batch(&slot.model_id, 1);
        match fallback.pop() {
            Some(prediction) => Ok(prediction),
            None => {
                tracing::warn!(
                    model_id = %slot.model_id,
                    "cache empty and sync fallback failed, degraded service"
                );
                Err(CacheError::Empty {
                    model_id: slot.model_id.clone(),
                })
            }
        }
    }
}
