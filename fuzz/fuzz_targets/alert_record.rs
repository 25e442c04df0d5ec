#![no_main]

use libfuzzer_sys::fuzz_target;

use flowsentry_core::types::AlertRecord;

fuzz_target!(|data: &[u8]| {
    // 크래시나 패닉 없이 Ok 또는 Err을 반환해야 한다
    let _ = serde_json::from_slice::<AlertRecord>(data);
});
