//! 어댑터 레지스트리 — model_id 기준 분류기 조회
//!
//! 모델 스펙 JSON 디렉토리를 스캔하여 [`LinearClassifier`]를 등록하거나,
//! 내장 모델 팩으로 레지스트리를 구성합니다.
//! 개별 파일 로딩 실패는 경고 로그를 남기고 건너뜁니다.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use flowsentry_core::error::ClassifierError;
use flowsentry_core::types::AttackType;

use crate::adapter::ClassifierAdapter;
use crate::linear::{LinearClassifier, ModelSpec};
use crate::schema::default_flow_schema;

/// 스펙 파일 최대 크기
const MAX_SPEC_FILE_SIZE: u64 = 1024 * 1024; // 1MB

/// 어댑터 레지스트리
///
/// 시작 시 구성되고 이후 읽기 전용으로 공유됩니다.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ClassifierAdapter>>,
}

impl AdapterRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 어댑터를 등록합니다.
    ///
    /// 중복된 model_id는 거부됩니다.
    pub fn register(
        &mut self,
        adapter: Arc<dyn ClassifierAdapter>,
    ) -> Result<(), ClassifierError> {
        let model_id = adapter.model_id().to_owned();
        if self.adapters.contains_key(&model_id) {
            return Err(ClassifierError::DuplicateModel { model_id });
        }
        tracing::debug!(model_id = %model_id, attack = %adapter.attack_type(), "adapter registered");
        self.adapters.insert(model_id, adapter);
        Ok(())
    }

    /// model_id로 어댑터를 조회합니다.
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn ClassifierAdapter>> {
        self.adapters.get(model_id).cloned()
    }

    /// model_id로 어댑터를 조회하고, 없으면 에러를 반환합니다.
    pub fn require(&self, model_id: &str) -> Result<Arc<dyn ClassifierAdapter>, ClassifierError> {
        self.get(model_id)
            .ok_or_else(|| ClassifierError::ModelNotFound {
                model_id: model_id.to_owned(),
            })
    }

    /// 등록된 model_id 목록 (정렬됨)
    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 등록된 어댑터 수
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// 레지스트리가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// 등록된 어댑터 순회
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ClassifierAdapter>> {
        self.adapters.values()
    }

    /// 디렉토리에서 모든 모델 스펙 JSON 파일을 로드합니다.
    ///
    /// `.json` 확장자를 가진 파일만 처리합니다.
    /// 개별 파일 로딩 실패는 경고 로그를 남기고 건너뜁니다.
    /// 로드된 모델 수를 반환합니다.
    ///
    /// # Errors
    /// 디렉토리를 읽을 수 없는 경우 실패합니다.
    pub async fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, ClassifierError> {
        let dir = dir.as_ref();

        let mut entries =
            tokio::fs::read_dir(dir)
                .await
                .map_err(|e| ClassifierError::ModelLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory: {e}"),
                })?;

        let mut loaded = 0;

        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| ClassifierError::ModelLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory entry: {e}"),
                })?
        {
            let path = entry.path();

            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            match Self::load_spec_file(&path).await {
                Ok(spec) => {
                    let model_id = spec.model_id.clone();
                    match LinearClassifier::from_spec(spec) {
                        Ok(clf) => {
                            if let Err(e) = self.register(Arc::new(clf)) {
                                tracing::warn!(
                                    path = %path.display(),
                                    error = %e,
                                    "skipping model spec"
                                );
                                continue;
                            }
                            tracing::info!(model_id = %model_id, path = %path.display(), "model loaded");
                            loaded += 1;
                        }
                        Err(e) => {
                            tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                "invalid model spec, skipping"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load model spec, skipping"
                    );
                }
            }
        }

        Ok(loaded)
    }

    /// 스펙 파일 하나를 로드합니다.
    async fn load_spec_file(path: &Path) -> Result<ModelSpec, ClassifierError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ClassifierError::ModelLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        if meta.len() > MAX_SPEC_FILE_SIZE {
            return Err(ClassifierError::ModelLoad {
                path: path.display().to_string(),
                reason: format!("file too large: {} bytes", meta.len()),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ClassifierError::ModelLoad {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;

        serde_json::from_str(&content).map_err(|e| ClassifierError::ModelLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// 내장 모델 팩으로 레지스트리를 구성합니다.
    ///
    /// 공격 유형마다 "flow-v1" 스키마 위의 선형 모델 하나씩입니다.
    /// 모델 디렉토리가 없는 개발/데모 환경에서 사용합니다.
    pub fn with_builtin_models() -> Self {
        let schema = default_flow_schema();
        let mut registry = Self::new();

        for attack in AttackType::ALL {
            let spec = ModelSpec {
                model_id: attack.as_str().to_owned(),
                attack_type: attack,
                schema_id: schema.id.clone(),
                features: schema.features.clone(),
                weights: builtin_weights(attack),
                bias: -3.0,
                decision_threshold: 0.5,
            };
            let clf = LinearClassifier::from_spec(spec)
                .unwrap_or_else(|e| unreachable!("builtin spec is well-formed: {e}"));
            registry
                .register(Arc::new(clf))
                .unwrap_or_else(|e| unreachable!("builtin ids are unique: {e}"));
        }

        registry
    }
}

/// 내장 모델 가중치
///
/// "flow-v1" 스키마의 특징 순서에 맞춰 공격 유형별로
/// 특징 민감도를 다르게 배치합니다.
fn builtin_weights(attack: AttackType) -> Vec<f64> {
    // [pkts_per_sec, syn_ratio, mean_pkt_len, uniq_dst_ports,
    //  dns_qname_entropy, conn_duration, bytes_out_in_ratio, auth_failures]
    match attack {
        AttackType::SynFlood => vec![2.5, 4.0, -0.5, 0.2, 0.0, -0.8, 0.1, 0.0],
        AttackType::PortScan => vec![1.0, 0.5, -1.0, 4.5, 0.0, -1.2, 0.0, 0.2],
        AttackType::Mitm => vec![0.3, 0.0, 0.8, 0.1, 0.0, 1.5, 2.8, 0.0],
        AttackType::DnsExfiltration => vec![0.5, 0.0, 0.6, 0.0, 4.2, 0.4, 1.8, 0.0],
        AttackType::BruteForce => vec![0.8, 0.2, -0.3, 0.1, 0.0, 0.6, 0.0, 4.5],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsentry_core::types::FlowFeatureVector;

    #[test]
    fn builtin_registry_covers_all_attack_families() {
        let registry = AdapterRegistry::with_builtin_models();
        assert_eq!(registry.len(), AttackType::ALL.len());
        for attack in AttackType::ALL {
            assert!(registry.get(attack.as_str()).is_some());
        }
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = AdapterRegistry::with_builtin_models();
        let adapter = registry.get("syn-flood").unwrap();
        let err = registry.register(adapter).unwrap_err();
        assert!(matches!(err, ClassifierError::DuplicateModel { .. }));
    }

    #[test]
    fn require_unknown_model_fails() {
        let registry = AdapterRegistry::new();
        assert!(matches!(
            registry.require("nope"),
            Err(ClassifierError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn builtin_models_separate_attack_from_benign() {
        let registry = AdapterRegistry::with_builtin_models();
        let clf = registry.require("syn-flood").unwrap();

        // SYN 플러드 특성이 강한 벡터 vs 조용한 벡터
        let attack = FlowFeatureVector::new(
            "flow-v1",
            vec![3.0, 2.0, 0.1, 0.2, 0.0, 0.1, 0.3, 0.0],
        );
        let benign = FlowFeatureVector::new(
            "flow-v1",
            vec![0.1, 0.05, 0.5, 0.1, 0.2, 0.5, 0.4, 0.0],
        );

        let hot = clf.predict(&attack).unwrap();
        let cold = clf.predict(&benign).unwrap();
        assert!(hot.confidence > cold.confidence);
        assert!(hot.is_attack());
        assert!(!cold.is_attack());
    }

    #[tokio::test]
    async fn load_dir_reads_json_specs() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ModelSpec {
            model_id: "custom-syn".to_owned(),
            attack_type: AttackType::SynFlood,
            schema_id: "flow-v1".to_owned(),
            features: vec!["a".to_owned(), "b".to_owned()],
            weights: vec![1.0, 2.0],
            bias: 0.0,
            decision_threshold: 0.5,
        };
        tokio::fs::write(
            dir.path().join("custom-syn.json"),
            serde_json::to_string(&spec).unwrap(),
        )
        .await
        .unwrap();
        // JSON이 아닌 파일은 무시됨
        tokio::fs::write(dir.path().join("notes.txt"), "ignore me")
            .await
            .unwrap();

        let mut registry = AdapterRegistry::new();
        let loaded = registry.load_dir(dir.path()).await.unwrap();
        assert_eq!(loaded, 1);
        assert!(registry.get("custom-syn").is_some());
    }

    #[tokio::test]
    async fn load_dir_skips_broken_spec() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("broken.json"), "{ not json")
            .await
            .unwrap();

        let mut registry = AdapterRegistry::new();
        let loaded = registry.load_dir(dir.path()).await.unwrap();
        assert_eq!(loaded, 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn load_dir_missing_directory_fails() {
        let mut registry = AdapterRegistry::new();
        let result = registry.load_dir("/nonexistent/models").await;
        assert!(matches!(result, Err(ClassifierError::ModelLoad { .. })));
    }
}
