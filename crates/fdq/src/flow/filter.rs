//! Filter expression compile/match capability ( Design Notes:
//! "Filter and aggregation table ... Treated as a capability:
//! `compile(str) -> Filter`, `match(filter, record) -> bool`").
//!
//! The compiled representation is a small boolean-expression tree over field
//! comparisons, not a general column-store query plan — the same scoping
//! choice  makes for the aggregation table. Grammar:
//!
//! ```text
//! expr   := term (("and" | "or") term)*
//! term   := "(" expr ")" | field cmp value
//! field  := identifier naming a FieldId (case-insensitive, e.g. "proto", "octets")
//! cmp    := "==" | "!=" | "<" | "<=" | ">" | ">="
//! value  := integer literal
//! ```

use crate::error::{Error, Result};
use crate::flow::record::{FieldId, FieldValue, FlowRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone)]
enum Node {
    Compare { field: FieldId, op: Cmp, value: u64 },
    Combine { op: BoolOp, lhs: Box<Node>, rhs: Box<Node> },
}

/// A compiled filter expression ( "filter expression (string)").
#[derive(Debug, Clone)]
pub struct Filter {
    root: Option<Node>, // None means "match everything" (empty filter)
    source: String,
}

impl Filter {
    /// Compile a filter expression. Fails with `Error::BadFilter` on invalid
    /// syntax ( "compiles the filter (fails with `BadFilter` on
    /// invalid syntax)").
    pub fn compile(expr: &str) -> Result<Self> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Ok(Filter { root: None, source: String::new() });
        }
        let tokens = tokenize(trimmed).map_err(|detail| {
            Error::bad_filter(trimmed, detail, crate::origin!())
        })?;
        let mut pos = 0usize;
        let root = parse_expr(&tokens, &mut pos).map_err(|detail| {
            Error::bad_filter(trimmed, detail, crate::origin!())
        })?;
        if pos != tokens.len() {
            return Err(Error::bad_filter(trimmed, "trailing tokens after expression", crate::origin!()));
        }
        Ok(Filter { root: Some(root), source: trimmed.to_string() })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the filter against a record ( "applies the filter
    /// (non-matching records are skipped but counted in metadata)").
    pub fn matches(&self, record: &FlowRecord) -> bool {
        match &self.root {
            None => true,
            Some(node) => eval(node, record),
        }
    }
}

fn eval(node: &Node, record: &FlowRecord) -> bool {
    match node {
        Node::Compare { field, op, value } => {
            let actual = match record.get(*field) {
                Some(FieldValue::U64(v)) => v,
                _ => return false,
            };
            match op {
                Cmp::Eq => actual == *value,
                Cmp::Ne => actual != *value,
                Cmp::Lt => actual < *value,
                Cmp::Le => actual <= *value,
                Cmp::Gt => actual > *value,
                Cmp::Ge => actual >= *value,
            }
        }
        Node::Combine { op, lhs, rhs } => match op {
            BoolOp::And => eval(lhs, record) && eval(rhs, record),
            BoolOp::Or => eval(lhs, record) || eval(rhs, record),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Number(u64),
    Cmp(Cmp),
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value = text.parse::<u64>().map_err(|_| format!("invalid integer literal '{text}'"))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.to_ascii_lowercase().as_str() {
                "and" => tokens.push(Token::And),
                "or" => tokens.push(Token::Or),
                _ => tokens.push(Token::Ident(word)),
            }
        } else if matches!(c, '=' | '!' | '<' | '>') {
            let start = i;
            i += 1;
            if i < chars.len() && chars[i] == '=' {
                i += 1;
            }
            let op_text: String = chars[start..i].iter().collect();
            let op = match op_text.as_str() {
                "==" => Cmp::Eq,
                "!=" => Cmp::Ne,
                "<" => Cmp::Lt,
                "<=" => Cmp::Le,
                ">" => Cmp::Gt,
                ">=" => Cmp::Ge,
                other => return Err(format!("unknown comparison operator '{other}'")),
            };
            tokens.push(Token::Cmp(op));
        } else {
            return Err(format!("unexpected character '{c}'"));
        }
    }
    Ok(tokens)
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> std::result::Result<Node, String> {
    let mut node = parse_term(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::And) => {
                *pos += 1;
                let rhs = parse_term(tokens, pos)?;
                node = Node::Combine { op: BoolOp::And, lhs: Box::new(node), rhs: Box::new(rhs) };
            }
            Some(Token::Or) => {
                *pos += 1;
                let rhs = parse_term(tokens, pos)?;
                node = Node::Combine { op: BoolOp::Or, lhs: Box::new(node), rhs: Box::new(rhs) };
            }
            _ => break,
        }
    }
    Ok(node)
}

fn parse_term(tokens: &[Token], pos: &mut usize) -> std::result::Result<Node, String> {
    match tokens.get(*pos) {
        Some(Token::LParen) => {
            *pos += 1;
            let node = parse_expr(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Token::RParen) => {
                    *pos += 1;
                    Ok(node)
                }
                _ => Err("expected ')'".to_string()),
            }
        }
        Some(Token::Ident(name)) => {
            let field = field_by_name(name)?;
            *pos += 1;
            let op = match tokens.get(*pos) {
                Some(Token::Cmp(op)) => *op,
                _ => return Err(format!("expected a comparison operator after field '{name}'")),
            };
            *pos += 1;
            let value = match tokens.get(*pos) {
                Some(Token::Number(v)) => *v,
                _ => return Err("expected an integer literal after comparison operator".to_string()),
            };
            *pos += 1;
            Ok(Node::Compare { field, op, value })
        }
        other => Err(format!("expected a field name or '(', got {other:?}")),
    }
}

/// Shared with `fdq_node::cli`'s `--field name=role` parsing so the filter
/// language and the CLI field-selection flags recognize exactly the same
/// names.
pub fn field_by_name(name: &str) -> std::result::Result<FieldId, String> {
    match name.to_ascii_lowercase().as_str() {
        "srcport" | "sport" => Ok(FieldId::SrcPort),
        "dstport" | "dport" => Ok(FieldId::DstPort),
        "proto" | "protocol" => Ok(FieldId::Protocol),
        "tcpflags" | "flags" => Ok(FieldId::TcpFlags),
        "firstseen" | "first" => Ok(FieldId::FirstSeen),
        "lastseen" | "last" => Ok(FieldId::LastSeen),
        "octets" | "bytes" => Ok(FieldId::Octets),
        "packets" | "pkts" => Ok(FieldId::Packets),
        "flows" | "aggregatedflows" => Ok(FieldId::AggregatedFlows),
        other => Err(format!("unknown field name '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::record::FieldValue;

    fn record_with(proto: u64, octets: u64) -> FlowRecord {
        let mut r = FlowRecord::new();
        r.set(FieldId::Protocol, FieldValue::U64(proto));
        r.set(FieldId::Octets, FieldValue::U64(octets));
        r
    }

    #[test]
    fn empty_filter_matches_everything() {
        let f = Filter::compile("").unwrap();
        assert!(f.matches(&record_with(6, 0)));
    }

    #[test]
    fn simple_comparison() {
        let f = Filter::compile("proto == 6").unwrap();
        assert!(f.matches(&record_with(6, 100)));
        assert!(!f.matches(&record_with(17, 100)));
    }

    #[test]
    fn conjunction_and_disjunction() {
        let f = Filter::compile("proto == 6 and octets > 1000").unwrap();
        assert!(f.matches(&record_with(6, 1001)));
        assert!(!f.matches(&record_with(6, 999)));

        let f = Filter::compile("proto == 6 or proto == 17").unwrap();
        assert!(f.matches(&record_with(17, 0)));
        assert!(!f.matches(&record_with(1, 0)));
    }

    #[test]
    fn parentheses_group_precedence() {
        let f = Filter::compile("(proto == 6 or proto == 17) and octets > 10").unwrap();
        assert!(f.matches(&record_with(17, 11)));
        assert!(!f.matches(&record_with(17, 10)));
    }

    #[test]
    fn invalid_syntax_is_bad_filter() {
        let err = Filter::compile("proto ===").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::BadFilter);
    }

    #[test]
    fn unknown_field_is_bad_filter() {
        let err = Filter::compile("bogus == 1").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::BadFilter);
    }
}
