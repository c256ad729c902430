#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logtrig_core::pattern::{Captures, CompiledPattern};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// `<<name>>`, `@<<name>>@` 표기를 포함할 수 있는 패턴
    pattern: String,
    /// 역참조 바인딩 (최대 4개로 제한)
    bindings: Vec<(String, String)>,
    line: String,
}

fuzz_target!(|input: FuzzInput| {
    let mut bindings = Captures::new();
    for (name, value) in input.bindings.into_iter().take(4) {
        bindings.insert(name, value);
    }

    // 컴파일 실패는 에러로만 보고되어야 함
    let Ok(pattern) = CompiledPattern::compile_with(&input.pattern, Some(&bindings)) else {
        return;
    };

    let matched = pattern.is_match(&input.line);
    let captures = pattern.captures(&input.line);
    assert_eq!(matched, captures.is_some());
    let _ = pattern.numbered_captures(&input.line, 5);
});
