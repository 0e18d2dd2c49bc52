#![no_main]

use libfuzzer_sys::fuzz_target;
use zapadmin::Key;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(key) = Key::parse(s)
    {
        let rendered = key.to_string();
        assert_eq!(Key::parse(&rendered).ok(), Some(key));
    }
});
