#![no_main]

use libfuzzer_sys::fuzz_target;
use zapadmin::Document;

fuzz_target!(|data: &[u8]| {
    let Ok(xml) = std::str::from_utf8(data) else {
        return;
    };

    // Anything that loads must save to a stable layout.
    if let Ok(document) = Document::parse(xml) {
        let saved = document.to_xml_string();
        let reloaded = Document::parse(&saved).expect("saved document must load");
        assert_eq!(reloaded.to_xml_string(), saved);
    }
});
