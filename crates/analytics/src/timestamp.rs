//! 타임스탬프 해석 — 하나의 결정적 순서
//!
//! 1. 기본 `timestamp` 필드 (RFC 3339)
//! 2. 구조화 ID 폴백: `alert-<unix_ms>-<seq>` 형태의 ID에 박힌 밀리초
//! 3. 둘 다 실패하면 `None` — 호출측이 데이터 오류로 집계하고 드롭
//!
//! 잘못된 타임스탬프를 "지금"으로 대체하면 버킷 카운트가 조용히
//! 왜곡되므로 절대 그렇게 하지 않습니다.

use chrono::DateTime;

use flowsentry_core::types::AlertRecord;

/// ID 폴백이 허용하는 epoch 밀리초 범위 (2000-01-01 ~ 2100-01-01)
const MIN_EPOCH_MS: i64 = 946_684_800_000;
const MAX_EPOCH_MS: i64 = 4_102_444_800_000;

/// 레코드의 타임스탬프를 epoch 초로 해석합니다.
///
/// 해석 불가능하면 `None`을 반환하며, 이 레코드는 버킷에 넣지 않고
/// 데이터 오류로 집계해야 합니다.
pub fn resolve_timestamp(record: &AlertRecord) -> Option<i64> {
    if let Some(ts) = parse_rfc3339(&record.timestamp) {
        return Some(ts);
    }
    from_structured_id(&record.id)
}

/// RFC 3339 타임스탬프를 epoch 초로 파싱합니다.
fn parse_rfc3339(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp())
}

/// 구조화 ID에 박힌 밀리초를 추출합니다.
///
/// 허용 형태: `alert-<unix_ms>-<seq>`. 밀리초가 합리적 범위를
/// 벗어나면 타임스탬프로 취급하지 않습니다.
fn from_structured_id(id: &str) -> Option<i64> {
    let rest = id.strip_prefix("alert-")?;
    let millis_part = rest.split('-').next()?;
    let millis: i64 = millis_part.parse().ok()?;
    if !(MIN_EPOCH_MS..MAX_EPOCH_MS).contains(&millis) {
        return None;
    }
    Some(millis / 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, timestamp: &str) -> AlertRecord {
        AlertRecord {
            id: id.to_owned(),
            timestamp: timestamp.to_owned(),
            src_ip: "10.0.0.1".to_owned(),
            src_port: 1,
            dst_ip: "10.0.0.2".to_owned(),
            dst_port: 2,
            protocol: "TCP".to_owned(),
            attack_type: "syn-flood".to_owned(),
            severity: "high".to_owned(),
            score: 0.9,
        }
    }

    #[test]
    fn primary_field_wins() {
        // ID에도 타임스탬프가 있지만 기본 필드가 우선
        let r = record("alert-1700000099000-5", "2023-11-14T22:13:20Z");
        assert_eq!(resolve_timestamp(&r), Some(1_700_000_000));
    }

    #[test]
    fn rfc3339_with_offset() {
        let r = record("x", "2023-11-15T07:13:20+09:00");
        assert_eq!(resolve_timestamp(&r), Some(1_700_000_000));
    }

    #[test]
    fn structured_id_fallback() {
        let r = record("alert-1700000000123-42", "not-a-timestamp");
        assert_eq!(resolve_timestamp(&r), Some(1_700_000_000));
    }

    #[test]
    fn uuid_id_is_not_a_timestamp() {
        let r = record("7c0a1c8e-6f3b-4c42-9a6e-51b8f3a0d001", "garbage");
        assert_eq!(resolve_timestamp(&r), None);
    }

    #[test]
    fn out_of_range_id_millis_rejected() {
        // 1970년대 밀리초 — 구조화 ID로 보기엔 비합리적
        let r = record("alert-12345-1", "bad");
        assert_eq!(resolve_timestamp(&r), None);

        // 2200년 — 범위 초과
        let r = record("alert-7258118400000-1", "bad");
        assert_eq!(resolve_timestamp(&r), None);
    }

    #[test]
    fn malformed_everything_is_dropped_not_defaulted() {
        let r = record("alert-abc-1", "2023-13-45T99:99:99Z");
        // "지금"으로 대체하지 않고 None
        assert_eq!(resolve_timestamp(&r), None);
    }
}
