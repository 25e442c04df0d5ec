//! 스트리밍 발행자 — 구독자별 유한 백로그 팬아웃
//!
//! `publish()`는 모든 활성 구독자의 백로그에 알림을 넣습니다.
//! 백로그가 가득 차면 가장 오래된 항목을 버리고 (drop-oldest)
//! 새 항목을 넣으므로 발행자는 느린 소비자를 기다리지 않습니다.
//!
//! # 전달 보장
//! - 도착 순서 전달, 구독자당 최대 1회 (at-most-once)
//! - 새 구독은 이력을 재생하지 않음 — 연속성이 필요하면
//!   개요 집계의 보존 버퍼를 따로 조회
//! - 구독 해제(드롭 포함) 시 백로그 메모리 즉시 해제

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::sync::Notify;

use flowsentry_core::metrics as m;
use flowsentry_core::types::Alert;

/// 구독자 한 명의 공유 상태
struct SubscriberShared {
    /// 유한 백로그 (drop-oldest)
    backlog: Mutex<VecDeque<Alert>>,
    /// 새 알림 도착 알림
    notify: Notify,
    /// 이 구독자에서 드롭된 알림 수
    dropped: AtomicU64,
}

struct PublisherInner {
    subscribers: Mutex<HashMap<u64, Arc<SubscriberShared>>>,
    next_id: AtomicU64,
    backlog_capacity: usize,
    published: AtomicU64,
    dropped_total: AtomicU64,
}

/// 알림 스트리밍 발행자
///
/// `Clone`은 같은 구독자 집합을 공유합니다.
#[derive(Clone)]
pub struct AlertPublisher {
    inner: Arc<PublisherInner>,
}

impl AlertPublisher {
    /// 구독자별 백로그 용량 N으로 발행자를 생성합니다.
    pub fn new(backlog_capacity: usize) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                backlog_capacity,
                published: AtomicU64::new(0),
                dropped_total: AtomicU64::new(0),
            }),
        }
    }

    /// 새 구독을 만듭니다. 이력은 재생되지 않습니다.
    pub fn subscribe(&self) -> AlertSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(SubscriberShared {
            backlog: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        });

        let count = {
            let mut subscribers = self.inner.subscribers.lock();
            subscribers.insert(id, Arc::clone(&shared));
            subscribers.len()
        };
        gauge!(m::PUBLISHER_SUBSCRIBERS).set(count as f64);
        tracing::debug!(subscriber_id = id, subscribers = count, "subscriber added");

        AlertSubscription {
            id,
            shared,
            publisher: Arc::downgrade(&self.inner),
        }
    }

    /// 모든 활성 구독자에게 알림을 전달합니다.
    ///
    /// 느린 구독자의 백로그가 가득 차면 가장 오래된 항목을 버립니다.
    /// 어떤 경우에도 발행자는 블로킹되지 않습니다.
    pub fn publish(&self, alert: &Alert) {
        // 구독자 목록 스냅샷 — 전달 중에는 맵 잠금을 잡지 않음
        let targets: Vec<Arc<SubscriberShared>> = {
            let subscribers = self.inner.subscribers.lock();
            subscribers.values().cloned().collect()
        };

        for shared in targets {
            {
                let mut backlog = shared.backlog.lock();
                if backlog.len() >= self.inner.backlog_capacity {
                    backlog.pop_front();
                    shared.dropped.fetch_add(1, Ordering::Relaxed);
                    self.inner.dropped_total.fetch_add(1, Ordering::Relaxed);
                    counter!(m::PUBLISHER_DROPPED_TOTAL).increment(1);
                }
                backlog.push_back(alert.clone());
            }
            shared.notify.notify_one();
        }

        self.inner.published.fetch_add(1, Ordering::Relaxed);
        counter!(m::PUBLISHER_PUBLISHED_TOTAL).increment(1);
    }

    /// 활성 구독자 수
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// 발행된 총 알림 수
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// 백로그 초과로 드롭된 총 알림 수
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped_total.load(Ordering::Relaxed)
    }
}

/// 알림 구독 핸들
///
/// 드롭하면 구독이 해제되고 백로그가 즉시 해제됩니다.
pub struct AlertSubscription {
    id: u64,
    shared: Arc<SubscriberShared>,
    publisher: Weak<PublisherInner>,
}

impl AlertSubscription {
    /// 다음 알림을 기다립니다.
    ///
    /// 발행자가 사라지고 백로그도 비어있으면 `None`을 반환합니다.
    pub async fn recv(&mut self) -> Option<Alert> {
        loop {
            if let Some(alert) = self.shared.backlog.lock().pop_front() {
                return Some(alert);
            }
            if self.publisher.upgrade().is_none() {
                return None;
            }
            self.shared.notify.notified().await;
        }
    }

    /// 대기 없이 다음 알림을 시도합니다.
    pub fn try_recv(&mut self) -> Option<Alert> {
        self.shared.backlog.lock().pop_front()
    }

    /// 현재 백로그 길이
    pub fn backlog_len(&self) -> usize {
        self.shared.backlog.lock().len()
    }

    /// 이 구독자에서 드롭된 알림 수
    ///
    /// 소비자는 이 값으로 자신이 뒤처졌음을 관찰할 수 있습니다.
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// 구독을 명시적으로 해제합니다.
    pub fn unsubscribe(self) {
        // Drop 구현이 정리를 수행
    }
}

impl Drop for AlertSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.publisher.upgrade() {
            let count = {
                let mut subscribers = inner.subscribers.lock();
                subscribers.remove(&self.id);
                subscribers.len()
            };
            gauge!(m::PUBLISHER_SUBSCRIBERS).set(count as f64);
            tracing::debug!(subscriber_id = self.id, subscribers = count, "subscriber removed");
        }
        // 백로그는 shared의 마지막 Arc와 함께 해제됨
        self.shared.backlog.lock().clear();
    }
}
