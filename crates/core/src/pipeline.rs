//! 파이프라인 trait — 모듈 생명주기와 확장 포인트 정의
//!
//! 모든 모듈은 [`Pipeline`]을 구현하여 `flowsentry-daemon`에서
//! 동일한 생명주기(start/stop/health_check)로 관리됩니다.
//! 데몬의 모듈 레지스트리는 [`DynPipeline`]을 통해
//! 서로 다른 모듈을 하나의 목록으로 다룹니다.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::FlowsentryError;

/// Boxed future 타입 별칭 (dyn 호환 파이프라인용)
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 헬스 상태
///
/// 데몬은 전체 모듈 중 최악의 상태를 데몬 상태로 집계합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 성능 저하 (동작은 계속됨)
    Degraded(String),
    /// 비정상
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 성능 저하 상태인지 확인합니다.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 모듈 생명주기 trait
///
/// 새로운 모듈을 추가하려면 이 trait을 구현합니다.
pub trait Pipeline: Send {
    /// 모듈을 시작합니다. 이미 실행 중이면 에러를 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), FlowsentryError>> + Send;

    /// 모듈을 정지합니다. 실행 중이 아니면 에러를 반환합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), FlowsentryError>> + Send;

    /// 현재 헬스 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn 호환 파이프라인 trait
///
/// [`Pipeline`] 구현체는 blanket impl을 통해 자동으로 이 trait을
/// 구현하므로, 데몬은 `Box<dyn DynPipeline>` 목록으로 모듈을 관리합니다.
pub trait DynPipeline: Send {
    /// 모듈 시작 (boxed future)
    fn start(&mut self) -> BoxFuture<'_, Result<(), FlowsentryError>>;

    /// 모듈 정지 (boxed future)
    fn stop(&mut self) -> BoxFuture<'_, Result<(), FlowsentryError>>;

    /// 헬스 체크 (boxed future)
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<P: Pipeline> DynPipeline for P {
    fn start(&mut self) -> BoxFuture<'_, Result<(), FlowsentryError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), FlowsentryError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopPipeline {
        running: bool,
    }

    impl Pipeline for NoopPipeline {
        async fn start(&mut self) -> Result<(), FlowsentryError> {
            self.running = true;
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), FlowsentryError> {
            self.running = false;
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            if self.running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy("not started".to_owned())
            }
        }
    }

    #[tokio::test]
    async fn pipeline_usable_as_dyn() {
        let mut boxed: Box<dyn DynPipeline> = Box::new(NoopPipeline { running: false });
        assert!(boxed.health_check().await.is_unhealthy());

        boxed.start().await.unwrap();
        assert!(boxed.health_check().await.is_healthy());

        boxed.stop().await.unwrap();
        assert!(boxed.health_check().await.is_unhealthy());
    }

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(HealthStatus::Degraded("slow".to_owned()).is_degraded());
        assert!(HealthStatus::Unhealthy("dead".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("cache low".to_owned()).to_string(),
            "degraded: cache low"
        );
    }
}
