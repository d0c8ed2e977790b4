#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // Settings parsing must never panic
        if let Ok(settings) = toml::from_str::<buildcache::Settings>(content) {
            let _ = settings.cache.ttl();
            let _ = settings.watch.debounce();
        }
    }
});
