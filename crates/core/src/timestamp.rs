//! 타임스탬프 추출기 -- 토큰 기반 형식에서 추출 정규식과 파서를 생성합니다.
//!
//! # 지원 토큰
//! | 토큰 | 의미 | 자릿수 |
//! |------|------|--------|
//! | `yyyy` | 연도 | 4 |
//! | `MM` | 월 | 2 |
//! | `dd` | 일 | 2 |
//! | `HH` | 시 (24시간) | 2 |
//! | `mm` | 분 | 2 |
//! | `ss` | 초 | 2 |
//! | `SSS` | 밀리초 | 3 |
//!
//! 토큰이 아닌 문자는 리터럴로 이스케이프됩니다.
//! 형식에 없는 필드는 고정 기준점(2000-01-01 00:00:00.000)으로 채워지므로,
//! 날짜가 없는 형식(`HH:mm:ss`)도 비교 가능한 타임스탬프를 만듭니다.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;

const DEFAULT_YEAR: i32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millis,
}

impl Token {
    fn regex(self) -> &'static str {
        match self {
            Token::Year => r"(\d{4})",
            Token::Millis => r"(\d{3})",
            _ => r"(\d{2})",
        }
    }
}

/// 긴 토큰을 먼저 검사해야 `SSS`와 `ss` 등이 충돌하지 않습니다.
const TOKENS: [(&str, Token); 7] = [
    ("yyyy", Token::Year),
    ("SSS", Token::Millis),
    ("MM", Token::Month),
    ("dd", Token::Day),
    ("HH", Token::Hour),
    ("mm", Token::Minute),
    ("ss", Token::Second),
];

#[derive(Debug, Clone)]
enum Piece {
    Token(Token),
    Literal(char),
}

/// 컴파일된 타임스탬프 형식
#[derive(Debug, Clone)]
pub struct TimestampFormat {
    format: String,
    pieces: Vec<Piece>,
    tokens: Vec<Token>,
    search: Regex,
    exact: Regex,
}

impl TimestampFormat {
    /// 형식 문자열에서 추출기를 생성합니다.
    ///
    /// 토큰이 하나도 없으면 `None`을 반환합니다 (필터링 비활성화).
    pub fn new(format: &str) -> Option<Self> {
        let pieces = tokenize(format);
        let tokens: Vec<Token> = pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Token(t) => Some(*t),
                Piece::Literal(_) => None,
            })
            .collect();
        if tokens.is_empty() {
            return None;
        }

        let mut body = String::new();
        for piece in &pieces {
            match piece {
                Piece::Token(t) => body.push_str(t.regex()),
                Piece::Literal(c) => body.push_str(&regex::escape(&c.to_string())),
            }
        }

        let search = Regex::new(&body).ok()?;
        let exact = Regex::new(&format!("^{body}$")).ok()?;
        Some(Self {
            format: format.to_owned(),
            pieces,
            tokens,
            search,
            exact,
        })
    }

    /// 원본 형식 문자열
    pub fn as_str(&self) -> &str {
        &self.format
    }

    /// 라인 안에서 첫 번째 타임스탬프를 찾아 파싱합니다.
    pub fn extract(&self, line: &str) -> Option<NaiveDateTime> {
        let caps = self.search.captures(line)?;
        self.build(&caps)
    }

    /// 문자열 전체가 타임스탬프일 때만 파싱합니다.
    pub fn parse(&self, text: &str) -> Option<NaiveDateTime> {
        let caps = self.exact.captures(text.trim())?;
        self.build(&caps)
    }

    /// 주어진 시각을 이 형식으로 렌더링합니다.
    pub fn render(&self, at: &NaiveDateTime) -> String {
        let mut out = String::with_capacity(self.format.len());
        for piece in &self.pieces {
            match piece {
                Piece::Literal(c) => out.push(*c),
                Piece::Token(Token::Year) => out.push_str(&format!("{:04}", at.year())),
                Piece::Token(Token::Month) => out.push_str(&format!("{:02}", at.month())),
                Piece::Token(Token::Day) => out.push_str(&format!("{:02}", at.day())),
                Piece::Token(Token::Hour) => out.push_str(&format!("{:02}", at.hour())),
                Piece::Token(Token::Minute) => out.push_str(&format!("{:02}", at.minute())),
                Piece::Token(Token::Second) => out.push_str(&format!("{:02}", at.second())),
                Piece::Token(Token::Millis) => {
                    out.push_str(&format!("{:03}", at.nanosecond() / 1_000_000 % 1_000))
                }
            }
        }
        out
    }

    fn build(&self, caps: &regex::Captures<'_>) -> Option<NaiveDateTime> {
        let mut year = DEFAULT_YEAR;
        let (mut month, mut day, mut hour, mut minute, mut second, mut millis) =
            (1u32, 1u32, 0u32, 0u32, 0u32, 0u32);

        for (idx, token) in self.tokens.iter().enumerate() {
            let raw = caps.get(idx + 1)?.as_str();
            match token {
                Token::Year => year = raw.parse().ok()?,
                Token::Month => month = raw.parse().ok()?,
                Token::Day => day = raw.parse().ok()?,
                Token::Hour => hour = raw.parse().ok()?,
                Token::Minute => minute = raw.parse().ok()?,
                Token::Second => second = raw.parse().ok()?,
                Token::Millis => millis = raw.parse().ok()?,
            }
        }

        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_milli_opt(hour, minute, second, millis)
    }
}

fn tokenize(format: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut rest = format;
    'outer: while !rest.is_empty() {
        for (text, token) in TOKENS {
            if let Some(after) = rest.strip_prefix(text) {
                pieces.push(Piece::Token(token));
                rest = after;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            pieces.push(Piece::Literal(c));
        }
        rest = chars.as_str();
    }
    pieces
}

/// 텍스트 안의 `{형식}` 블록을 주어진 시각으로 렌더링합니다.
///
/// 예: `"auth-{yyyy-MM-dd}.log"` → `"auth-2024-03-09.log"`.
/// 토큰이 없는 블록이나 닫히지 않은 중괄호는 그대로 남습니다.
pub fn resolve_date_tokens(text: &str, at: &NaiveDateTime) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let inner = &after[..close];
                match TimestampFormat::new(inner) {
                    Some(fmt) => out.push_str(&fmt.render(at)),
                    None => {
                        out.push('{');
                        out.push_str(inner);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
