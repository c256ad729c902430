#![no_main]

use libfuzzer_sys::fuzz_target;
use logtrig_source::SourceLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        let _ = SourceLoader::parse_yaml(yaml_str, "fuzz-input.yml");
    }
});
