#![no_main]

use libfuzzer_sys::fuzz_target;
use logtrig_trigger::RecipeLoader;

fuzz_target!(|data: &[u8]| {
    // YAML 파서는 &str을 받으므로 UTF-8 변환 필요
    let Ok(yaml_str) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(recipe) = RecipeLoader::parse_yaml(yaml_str, "fuzz-input.yml") {
        let _ = recipe.lint();
    }
});
