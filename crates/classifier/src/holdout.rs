//! 보류(held-out) 데이터셋 — 레이블된 행과 순환 커서 소스
//!
//! 학습에서 제외된 레이블 파티션입니다. 평가 하니스는 레이블을,
//! 예측 캐시 리필러는 특징 벡터만을 사용합니다.
//!
//! [`RotatingFeatureSource`]는 원자적 커서로 행을 순환 공급하여
//! 반복 호출이 같은 접두사를 재사용하지 않고 전체 집합을 돌게 합니다.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use flowsentry_core::error::ClassifierError;
use flowsentry_core::types::{
    AttackType, DetectionLabel, FlowFeatureVector, FlowMetadata, Protocol,
};

use crate::schema::default_flow_schema;

/// 레이블된 플로우 행
///
/// JSON lines 파일의 한 줄에 대응합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledFlow {
    /// 플로우 메타데이터
    pub flow: FlowMetadata,
    /// 특징 벡터
    pub features: FlowFeatureVector,
    /// 정답 레이블
    pub label: DetectionLabel,
    /// 공격 행의 공격 유형 (benign이면 None)
    pub attack_type: Option<AttackType>,
}

impl LabeledFlow {
    /// 공격 행인지 확인합니다.
    pub fn is_attack(&self) -> bool {
        self.label == DetectionLabel::Attack
    }
}

/// 보류 데이터셋
#[derive(Debug, Clone, Default)]
pub struct HoldoutSet {
    rows: Vec<LabeledFlow>,
}

impl HoldoutSet {
    /// 행 목록에서 데이터셋을 생성합니다.
    pub fn from_rows(rows: Vec<LabeledFlow>) -> Self {
        Self { rows }
    }

    /// JSON lines 파일에서 데이터셋을 로드합니다.
    ///
    /// 파싱할 수 없는 행은 경고 로그를 남기고 건너뜁니다.
    pub async fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ClassifierError::ModelLoad {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;

        let mut rows = Vec::new();
        let mut skipped = 0usize;

        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LabeledFlow>(line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        path = %path.display(),
                        line = line_no + 1,
                        error = %e,
                        "skipping malformed holdout row"
                    );
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(path = %path.display(), skipped, "holdout rows skipped");
        }
        tracing::info!(path = %path.display(), rows = rows.len(), "holdout set loaded");

        Ok(Self { rows })
    }

    /// 전체 행 슬라이스
    pub fn rows(&self) -> &[LabeledFlow] {
        &self.rows
    }

    /// 행 수
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 데이터셋이 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// benign 행만 반환합니다.
    pub fn benign_rows(&self) -> Vec<&LabeledFlow> {
        self.rows.iter().filter(|r| !r.is_attack()).collect()
    }

    /// 공격 행만 반환합니다.
    ///
    /// `attack`이 지정되면 해당 공격 유형만 필터링합니다.
    pub fn attack_rows(&self, attack: Option<AttackType>) -> Vec<&LabeledFlow> {
        self.rows
            .iter()
            .filter(|r| r.is_attack() && attack.is_none_or(|a| r.attack_type == Some(a)))
            .collect()
    }

    /// 결정적 합성 데이터셋을 생성합니다.
    ///
    /// 모델 디렉토리/보류 파일이 없는 개발 환경과 테스트에서 사용합니다.
    /// 공격 행은 내장 모델의 민감 특징을 증폭한 분포에서 샘플링되어
    /// 내장 모델 팩과 함께 쓸 때 유의미한 판정 분포가 나옵니다.
    pub fn synthetic(benign_count: usize, attack_count_per_family: usize, seed: u64) -> Self {
        let schema = default_flow_schema();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::with_capacity(
            benign_count + attack_count_per_family * AttackType::ALL.len(),
        );

        for _ in 0..benign_count {
            let values: Vec<f64> = (0..schema.len())
                .map(|_| rng.gen_range(0.0..0.4))
                .collect();
            rows.push(LabeledFlow {
                flow: synthetic_flow(&mut rng, Protocol::Tcp),
                features: FlowFeatureVector::new(schema.id.clone(), values),
                label: DetectionLabel::Benign,
                attack_type: None,
            });
        }

        for attack in AttackType::ALL {
            let hot_indices = hot_feature_indices(attack);
            for _ in 0..attack_count_per_family {
                let mut values: Vec<f64> = (0..schema.len())
                    .map(|_| rng.gen_range(0.0..0.4))
                    .collect();
                for &idx in &hot_indices {
                    values[idx] = rng.gen_range(1.5..3.0);
                }
                rows.push(LabeledFlow {
                    flow: synthetic_flow(&mut rng, attack.protocol_hint()),
                    features: FlowFeatureVector::new(schema.id.clone(), values),
                    label: DetectionLabel::Attack,
                    attack_type: Some(attack),
                });
            }
        }

        Self { rows }
    }
}

/// 공격 유형별 민감 특징 인덱스 ("flow-v1" 스키마 기준)
fn hot_feature_indices(attack: AttackType) -> Vec<usize> {
    match attack {
        AttackType::SynFlood => vec![0, 1],
        AttackType::PortScan => vec![3],
        AttackType::Mitm => vec![5, 6],
        AttackType::DnsExfiltration => vec![4, 6],
        AttackType::BruteForce => vec![7],
    }
}

fn synthetic_flow(rng: &mut StdRng, protocol: Protocol) -> FlowMetadata {
    FlowMetadata {
        src_ip: IpAddr::V4(Ipv4Addr::new(10, 0, rng.gen_range(0..8), rng.gen_range(1..255))),
        src_port: rng.gen_range(1024..65535),
        dst_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, rng.gen_range(1..32))),
        dst_port: match protocol {
            Protocol::Udp => 53,
            _ => 443,
        },
        protocol,
    }
}

/// 순환 커서 특징 소스
///
/// 여러 태스크가 공유해도 안전하도록 커서는 원자적으로 증가합니다.
/// 커서가 끝에 도달하면 처음부터 다시 순환합니다.
#[derive(Debug, Clone)]
pub struct RotatingFeatureSource {
    rows: Arc<Vec<LabeledFlow>>,
    cursor: Arc<AtomicUsize>,
}

impl RotatingFeatureSource {
    /// 보류 데이터셋에서 소스를 생성합니다.
    pub fn new(set: &HoldoutSet) -> Self {
        Self {
            rows: Arc::new(set.rows.clone()),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 다음 행을 반환합니다. 소스가 비어있으면 `None`.
    pub fn next_row(&self) -> Option<LabeledFlow> {
        if self.rows.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.rows.len();
        Some(self.rows[idx].clone())
    }

    /// 다음 `n`개 행을 반환합니다 (순환).
    pub fn next_batch(&self, n: usize) -> Vec<LabeledFlow> {
        (0..n).filter_map(|_| self.next_row()).collect()
    }

    /// 소스의 전체 행 수
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 소스가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
