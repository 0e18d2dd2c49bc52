#![no_main]

use libfuzzer_sys::fuzz_target;
use zapadmin_types::{AddOnReleaseData, ReleaseState};

fuzz_target!(|data: &[u8]| {
    if let Ok(state) = serde_json::from_slice::<ReleaseState>(data) {
        let _ = state.is_new_main_release();
        let _ = state.is_new_weekly_release();
        let _ = state.new_add_ons().count();

        let json = serde_json::to_string(&state).expect("serialize");
        let parsed: ReleaseState = serde_json::from_str(&json).expect("roundtrip");
        assert_eq!(parsed, state);
    }

    let _ = serde_json::from_slice::<AddOnReleaseData>(data);
});
