#![no_main]

use libfuzzer_sys::fuzz_target;
use zapadmin_config::Config;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Parsing must never panic, whatever the input.
        let _ = toml::from_str::<Config>(s);
    }
});
