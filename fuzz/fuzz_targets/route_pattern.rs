#![no_main]
use dashboard_registry::Pattern;
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;

fuzz_target!(|data: &[u8]| {
    // Panel route patterns are supplied by plugins: compile, match and
    // reverse must never panic, and a reversed path must match its pattern
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let (pattern, path) = source.split_once('\n').unwrap_or((source, ""));
    let Ok(pattern) = Pattern::new(pattern) else {
        return;
    };

    if let Some(m) = pattern.match_prefix(path) {
        assert!(m.consumed <= path.len());
        if let Some(reversed) = pattern.reverse(&m.kwargs) {
            assert!(pattern.match_prefix(&reversed).is_some());
        }
    }
    let _ = pattern.reverse(&BTreeMap::new());
});
