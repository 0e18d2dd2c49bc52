#![no_main]

use libfuzzer_sys::fuzz_target;
use zapadmin::manifest::extract_add_on_id;
use zapadmin::updater::daily_version_from_file_name;

fuzz_target!(|data: &[u8]| {
    let Ok(file_name) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(id) = extract_add_on_id(file_name) {
        assert!(!id.is_empty());
        assert!(file_name.starts_with(&id));
        assert!(!id.contains('.') && !id.contains('-'));
    }

    if let Ok(version) = daily_version_from_file_name(file_name) {
        assert!(version.starts_with("D-"));
    }
});
