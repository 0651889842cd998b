//! Fuzz target: `SystemConfig::from_json`
//!
//! Any override that is accepted must also pass validation on its own.
//!
//! cargo fuzz run fuzz_config_override

#![no_main]

use libfuzzer_sys::fuzz_target;
use waterly::config::SystemConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(cfg) = SystemConfig::from_json(text) {
        assert!(cfg.validate().is_ok());
        assert!(cfg.deep_sleep_us() >= u64::from(cfg.deep_sleep_secs));
    }
});
