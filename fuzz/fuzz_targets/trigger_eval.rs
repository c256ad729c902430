#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logtrig_trigger::recipe::{RecipeClass, Step, TriggerRecipe};
use logtrig_trigger::{EvalOptions, TriggerEngine};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    multi: bool,
    times: u8,
    /// 로그 라인 (최대 64개로 제한)
    lines: Vec<(u8, u8, FuzzWord)>,
}

#[derive(Arbitrary, Debug)]
enum FuzzWord {
    Open,
    Close,
    Noise,
}

fuzz_target!(|input: FuzzInput| {
    let recipe = TriggerRecipe {
        id: "fuzz".to_owned(),
        class: if input.multi {
            RecipeClass::Multi
        } else {
            RecipeClass::Single
        },
        steps: vec![
            Step::regex("open", &[r"\S+ open id=<<id>>"])
                .with_times(u32::from(input.times % 4).max(1))
                .with_duration("10 seconds")
                .with_next("quiet"),
            Step::delay("quiet", &[r"\S+ close id=@<<id>>@"], "5 seconds"),
        ],
        ..Default::default()
    };

    let text: String = input
        .lines
        .iter()
        .take(64)
        .map(|(minute, key, word)| {
            let word = match word {
                FuzzWord::Open => "open",
                FuzzWord::Close => "close",
                FuzzWord::Noise => "noise",
            };
            format!("10:{:02}:00 {word} id={}\n", minute % 60, key % 4)
        })
        .collect();

    let options = EvalOptions::default().with_timestamp_format("HH:mm:ss");
    let report = TriggerEngine::evaluate(&recipe, &text, &options);

    // 억제된 발사도 기록되므로 요약과 목록의 수가 일치해야 함
    if input.multi {
        assert!(report.summary.firings <= report.instances.len());
    } else {
        assert_eq!(report.summary.firings, report.firings.len());
    }
});
