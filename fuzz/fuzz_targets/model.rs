#![no_main]

use libfuzzer_sys::fuzz_target;
use disposetrack::{CodeModel, Weaver};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(mut model) = CodeModel::from_json(text) {
        let _ = Weaver::default().execute(&mut model);
    }
});
