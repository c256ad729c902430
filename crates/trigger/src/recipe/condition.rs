//! 사후 조건 -- 패턴 매칭 뒤 이름 있는 캡처에 대해 평가하는 수치 조건
//!
//! # 문법
//! ```text
//! <id>,<compareValue>,<op>,<name>;<id>,<compareValue>,<op>,<name>;...
//! ```
//!
//! `op`는 `> >= < <= == !=` 또는 `gt ge lt le eq ne`입니다.
//! 절은 `capture <op> compareValue`가 참일 때 통과하며, 모든 절이 통과해야 합니다.
//! 캡처가 없거나 숫자가 아니면 해당 절은 실패합니다.
//! 파싱할 수 없는 식은 [`PostConditions::Malformed`]로 보존되며 항상 실패합니다.

use std::fmt;

use logtrig_core::pattern::Captures;
use serde::Serialize;

/// 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    fn parse(op: &str) -> Option<Self> {
        match op.trim().to_ascii_lowercase().as_str() {
            ">" | "gt" => Some(Self::Gt),
            ">=" | "ge" => Some(Self::Ge),
            "<" | "lt" => Some(Self::Lt),
            "<=" | "le" => Some(Self::Le),
            "==" | "=" | "eq" => Some(Self::Eq),
            "!=" | "<>" | "ne" => Some(Self::Ne),
            _ => None,
        }
    }

    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// 단일 조건 절
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    /// 절 식별자 (표시용)
    pub id: String,
    /// 비교 기준값
    pub compare: f64,
    pub op: CompareOp,
    /// 비교할 캡처 이름
    pub name: String,
}

impl Condition {
    /// 캡처 값에 대해 절을 평가합니다.
    pub fn evaluate(&self, captures: &Captures) -> bool {
        captures
            .get(&self.name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .is_some_and(|value| self.op.holds(value, self.compare))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.op.symbol(), self.compare)
    }
}

/// 패턴에 붙은 사후 조건 목록
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PostConditions {
    /// 파싱된 조건 (AND 결합)
    Parsed { clauses: Vec<Condition> },
    /// 파싱 실패한 식 (항상 실패)
    Malformed { raw: String, reason: String },
}

impl PostConditions {
    /// `params` 식을 파싱합니다. 빈 식은 `None`입니다.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let mut clauses = Vec::new();
        for clause in trimmed.split(';').map(str::trim).filter(|c| !c.is_empty()) {
            match parse_clause(clause) {
                Ok(condition) => clauses.push(condition),
                Err(reason) => {
                    return Some(Self::Malformed {
                        raw: raw.to_owned(),
                        reason,
                    });
                }
            }
        }
        Some(Self::Parsed { clauses })
    }

    /// 모든 절이 통과하는지 확인합니다.
    pub fn evaluate(&self, captures: &Captures) -> bool {
        match self {
            Self::Parsed { clauses } => clauses.iter().all(|c| c.evaluate(captures)),
            Self::Malformed { .. } => false,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

fn parse_clause(clause: &str) -> Result<Condition, String> {
    let parts: Vec<&str> = clause.split(',').map(str::trim).collect();
    let [id, compare, op, name] = parts.as_slice() else {
        return Err(format!(
            "clause '{clause}' must have 4 comma-separated fields, found {}",
            parts.len()
        ));
    };

    let compare: f64 = compare
        .parse()
        .map_err(|_| format!("compare value '{compare}' is not a number"))?;
    let op = CompareOp::parse(op).ok_or_else(|| format!("unknown operator '{op}'"))?;
    if name.is_empty() {
        return Err(format!("clause '{clause}' has an empty capture name"));
    }

    Ok(Condition {
        id: (*id).to_owned(),
        compare,
        op,
        name: (*name).to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(pairs: &[(&str, &str)]) -> Captures {
        let mut c = Captures::new();
        for (k, v) in pairs {
            c.insert(*k, *v);
        }
        c
    }

    #[test]
    fn parses_symbolic_and_word_operators() {
        let parsed = PostConditions::parse("1,500,>,ms; 2,10,le,count").unwrap();
        let PostConditions::Parsed { clauses } = parsed else {
            panic!("expected parsed conditions");
        };
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].op, CompareOp::Gt);
        assert_eq!(clauses[1].op, CompareOp::Le);
        assert_eq!(clauses[1].to_string(), "count <= 10");
    }

    #[test]
    fn all_clauses_must_pass() {
        let conds = PostConditions::parse("1,500,>,ms;2,3,<,retries").unwrap();
        assert!(conds.evaluate(&caps(&[("ms", "750"), ("retries", "1")])));
        assert!(!conds.evaluate(&caps(&[("ms", "750"), ("retries", "5")])));
    }

    #[test]
    fn non_numeric_or_missing_capture_fails() {
        let conds = PostConditions::parse("1,5,==,n").unwrap();
        assert!(!conds.evaluate(&caps(&[("n", "five")])));
        assert!(!conds.evaluate(&caps(&[])));
        assert!(conds.evaluate(&caps(&[("n", "5.0")])));
    }

    #[test]
    fn malformed_expression_always_fails() {
        let conds = PostConditions::parse("1,abc,>,ms").unwrap();
        assert!(conds.is_malformed());
        assert!(!conds.evaluate(&caps(&[("ms", "1000")])));

        let conds = PostConditions::parse("1,5,~,ms").unwrap();
        assert!(conds.is_malformed());

        let conds = PostConditions::parse("only,three,fields").unwrap();
        assert!(conds.is_malformed());
    }

    #[test]
    fn empty_expression_means_no_conditions() {
        assert!(PostConditions::parse("").is_none());
        assert!(PostConditions::parse("   ").is_none());
    }

    #[test]
    fn trailing_separator_is_tolerated() {
        let conds = PostConditions::parse("1,1,ne,x;").unwrap();
        assert!(!conds.is_malformed());
        assert!(conds.evaluate(&caps(&[("x", "2")])));
    }
}
