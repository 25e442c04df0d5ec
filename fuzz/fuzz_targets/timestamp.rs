#![no_main]

use libfuzzer_sys::fuzz_target;

use flowsentry_analytics::resolve_timestamp;
use flowsentry_core::types::AlertRecord;

fuzz_target!(|input: (&str, &str)| {
    let (id, timestamp) = input;
    let record = AlertRecord {
        id: id.to_owned(),
        timestamp: timestamp.to_owned(),
        src_ip: "10.0.0.1".to_owned(),
        src_port: 1,
        dst_ip: "10.0.0.2".to_owned(),
        dst_port: 2,
        protocol: "TCP".to_owned(),
        attack_type: "syn-flood".to_owned(),
        severity: "high".to_owned(),
        score: 0.5,
    };

    // 어떤 입력에서도 패닉 없이 Some 또는 None
    let _ = resolve_timestamp(&record);
});
