//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 모든 모듈이 공유하는 데이터 구조를 정의합니다.
//! 분류기 출력([`Detection`])과 소비자용 알림([`Alert`]),
//! 그리고 외부 교환용 평면 레코드([`AlertRecord`])를 구분합니다.

use std::fmt;
use std::net::IpAddr;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// 전송 계층 프로토콜
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP
    #[default]
    Tcp,
    /// UDP
    Udp,
    /// ICMP
    Icmp,
    /// 기타 프로토콜
    Other,
}

impl Protocol {
    /// 문자열에서 프로토콜을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않으며, 알 수 없는 값은 `Other`로 처리합니다.
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "tcp" => Self::Tcp,
            "udp" => Self::Udp,
            "icmp" => Self::Icmp,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
            Self::Icmp => write!(f, "ICMP"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// 공격 유형 (attack family)
///
/// 각 공격 유형은 전용 분류 모델이 담당합니다.
/// 사람이 읽을 수 있는 레이블과 프로토콜 힌트,
/// 공격 체인의 2차 단계 정보를 함께 제공합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttackType {
    /// TCP SYN 플러드 (DoS)
    SynFlood,
    /// 포트 스캔 (정찰)
    PortScan,
    /// 중간자 공격 (ARP 스푸핑 등)
    Mitm,
    /// DNS 터널링을 통한 데이터 유출
    DnsExfiltration,
    /// 인증 무차별 대입
    BruteForce,
}

impl AttackType {
    /// 전체 공격 유형 목록 (모델 카탈로그 순회용)
    pub const ALL: [Self; 5] = [
        Self::SynFlood,
        Self::PortScan,
        Self::Mitm,
        Self::DnsExfiltration,
        Self::BruteForce,
    ];

    /// kebab-case 식별자를 반환합니다 (serde 표현과 동일).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SynFlood => "syn-flood",
            Self::PortScan => "port-scan",
            Self::Mitm => "mitm",
            Self::DnsExfiltration => "dns-exfiltration",
            Self::BruteForce => "brute-force",
        }
    }

    /// 문자열에서 공격 유형을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "syn-flood" | "syn_flood" | "synflood" => Some(Self::SynFlood),
            "port-scan" | "port_scan" | "portscan" => Some(Self::PortScan),
            "mitm" | "arp-spoof" | "arp_spoof" => Some(Self::Mitm),
            "dns-exfiltration" | "dns_exfiltration" | "dns-exfil" => Some(Self::DnsExfiltration),
            "brute-force" | "brute_force" | "bruteforce" => Some(Self::BruteForce),
            _ => None,
        }
    }

    /// UI에 표시되는 사람이 읽을 수 있는 레이블
    pub fn human_label(&self) -> &'static str {
        match self {
            Self::SynFlood => "SYN Flood (DoS)",
            Self::PortScan => "Port Scan (Reconnaissance)",
            Self::Mitm => "Man-in-the-Middle (ARP Spoofing)",
            Self::DnsExfiltration => "DNS Data Exfiltration",
            Self::BruteForce => "Authentication Brute Force",
        }
    }

    /// 공격 유형별 대표 프로토콜 힌트
    pub fn protocol_hint(&self) -> Protocol {
        match self {
            Self::SynFlood => Protocol::Tcp,
            Self::PortScan => Protocol::Tcp,
            Self::Mitm => Protocol::Other,
            Self::DnsExfiltration => Protocol::Udp,
            Self::BruteForce => Protocol::Tcp,
        }
    }

    /// 공격 체인에서 동반되는 2차 단계
    ///
    /// 별도 알림으로 발행되지 않고 알림 메타데이터로만 첨부됩니다.
    pub fn secondary_stage(&self) -> Option<&'static str> {
        match self {
            Self::Mitm => Some("traffic-sniffing"),
            Self::DnsExfiltration => Some("data-staging"),
            Self::BruteForce => Some("credential-access"),
            Self::SynFlood | Self::PortScan => None,
        }
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 심각도 레벨
///
/// 보안 알림의 긴급도를 나타냅니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 정보성 — BENIGN 판정의 informational 모드 전용
    #[default]
    Info,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 경보 수준인지 확인합니다.
    ///
    /// `Info`는 경보가 아닙니다. BENIGN 판정은 어떤 경로로도
    /// 경보 수준의 알림을 만들 수 없습니다.
    pub fn is_alerting(&self) -> bool {
        !matches!(self, Self::Info)
    }

    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" | "informational" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 플로우 특징 벡터
///
/// 네트워크 세션 하나를 고정 스키마의 수치 벡터로 축약한 것입니다.
/// 외부 특징 파이프라인에서 생성되며 불변 입력으로 취급됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowFeatureVector {
    /// 스키마 식별자 (모델별 특징 스키마와 대조)
    pub schema_id: String,
    /// 스키마 순서대로 정렬된 특징 값
    pub values: Vec<f64>,
}

impl FlowFeatureVector {
    /// 새 특징 벡터를 생성합니다.
    pub fn new(schema_id: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            schema_id: schema_id.into(),
            values,
        }
    }

    /// 특징 개수를 반환합니다.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 특징이 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 플로우 메타데이터
///
/// 알림 구성에 필요한 네트워크 세션 식별 정보입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMetadata {
    /// 출발지 IP
    pub src_ip: IpAddr,
    /// 출발지 포트
    pub src_port: u16,
    /// 목적지 IP
    pub dst_ip: IpAddr,
    /// 목적지 포트
    pub dst_port: u16,
    /// 프로토콜
    pub protocol: Protocol,
}

impl fmt::Display for FlowMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} proto={}",
            self.src_ip, self.src_port, self.dst_ip, self.dst_port, self.protocol,
        )
    }
}

/// 탐지 판정 레이블
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionLabel {
    /// 정상 트래픽
    Benign,
    /// 공격 트래픽
    Attack,
}

/// 특징 기여도
///
/// 분류기가 제공하는 특징별 판정 기여도입니다.
/// 기여도가 없는 모델은 빈 목록을 반환합니다 (null 아님).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    /// 특징 이름
    pub feature: String,
    /// 기여도 (부호 있음, 절대값이 클수록 영향 큼)
    pub contribution: f64,
}

/// 분류기 원시 출력
///
/// 플로우 하나에 대한 단일 모델의 판정입니다.
/// 예측 캐시의 엔트리로 잠시 머물다가 알림 빌더에서 소비됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// 판정을 내린 모델 ID
    pub model_id: String,
    /// 모델이 담당하는 공격 유형
    pub attack_type: AttackType,
    /// 판정 레이블
    pub label: DetectionLabel,
    /// 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
    /// 특징별 기여도 (없으면 빈 목록)
    pub attributions: Vec<FeatureAttribution>,
}

impl Detection {
    /// 공격 판정인지 확인합니다.
    pub fn is_attack(&self) -> bool {
        self.label == DetectionLabel::Attack
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.label {
            DetectionLabel::Benign => "benign",
            DetectionLabel::Attack => "attack",
        };
        write!(
            f,
            "Detection[{}] {} conf={:.2}",
            self.model_id, label, self.confidence,
        )
    }
}

/// 보안 알림
///
/// 탐지 판정과 플로우 메타데이터에서 구성된 소비자용 레코드입니다.
/// 생성 이후 불변이며, 보존 링 버퍼와 구독자 백로그의
/// 용량 제한에 의해서만 제거됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// 알림 ID (UUID v4)
    pub id: String,
    /// 생성 시각
    pub created_at: SystemTime,
    /// 관련 플로우 정보
    pub flow: FlowMetadata,
    /// 공격 유형
    pub attack_type: AttackType,
    /// 심각도
    pub severity: Severity,
    /// 판정 신뢰도 점수 (0.0 ~ 1.0)
    pub score: f64,
    /// 사람이 읽을 수 있는 레이블
    pub label_human: String,
    /// 공격 체인 2차 단계 주석 (있을 경우)
    pub chain_stage: Option<String>,
    /// 기여도 상위 특징 (절대값 내림차순, 최대 K개)
    pub top_features: Vec<FeatureAttribution>,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} score={:.2} ({})",
            self.severity, self.attack_type, self.score, self.flow,
        )
    }
}

/// 알림 교환 레코드
///
/// [`Alert`]의 평면(flat) 직렬화 형태입니다. 타임스탬프는 RFC 3339
/// 문자열이며, 분석 엔진은 이 형태의 레코드를 입력으로 받습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// 알림 ID
    pub id: String,
    /// 생성 시각 (RFC 3339)
    pub timestamp: String,
    /// 출발지 IP
    pub src_ip: String,
    /// 출발지 포트
    pub src_port: u16,
    /// 목적지 IP
    pub dst_ip: String,
    /// 목적지 포트
    pub dst_port: u16,
    /// 프로토콜
    pub protocol: String,
    /// 공격 유형 (kebab-case)
    pub attack_type: String,
    /// 심각도 (소문자)
    pub severity: String,
    /// 판정 점수
    pub score: f64,
}

impl From<&Alert> for AlertRecord {
    fn from(alert: &Alert) -> Self {
        let ts: DateTime<Utc> = alert.created_at.into();
        Self {
            id: alert.id.clone(),
            timestamp: ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            src_ip: alert.flow.src_ip.to_string(),
            src_port: alert.flow.src_port,
            dst_ip: alert.flow.dst_ip.to_string(),
            dst_port: alert.flow.dst_port,
            protocol: alert.flow.protocol.to_string(),
            attack_type: alert.attack_type.as_str().to_owned(),
            severity: alert.severity.to_string().to_lowercase(),
            score: alert.score,
        }
    }
}
