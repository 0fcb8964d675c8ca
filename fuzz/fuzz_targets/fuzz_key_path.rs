#![no_main]

use libfuzzer_sys::fuzz_target;
use surface_reactive::KeyPath;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if text.len() > 4096 {
        return;
    }
    let Ok(path) = KeyPath::parse(text) else {
        return;
    };
    assert!(path.iter().all(|key| !key.as_str().is_empty()));
    // Bracketed keys may hold separators; only plain keys print back verbatim.
    let plain = path
        .iter()
        .all(|key| !key.as_str().contains(['.', '[', ']']));
    if plain {
        let again = KeyPath::parse(&path.to_string()).expect("display output parses");
        assert_eq!(path, again);
    }
});
