use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::Regex;

use crate::compare::{compare_values, type_rank, values_equal};
use crate::path;

/// Parse error for filter documents.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParseError(pub String);

impl std::fmt::Display for FilterParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "filter parse error: {}", self.0)
    }
}

impl std::error::Error for FilterParseError {}

/// A compiled filter. Owns its field names and operands so a cursor can
/// carry it for as long as the cursor lives.
#[derive(Debug, Clone)]
pub enum Expression {
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Nor(Vec<Expression>),
    Eq(String, Bson),
    Ne(String, Bson),
    Gt(String, Bson),
    Gte(String, Bson),
    Lt(String, Bson),
    Lte(String, Bson),
    In(String, Vec<Bson>),
    Nin(String, Vec<Bson>),
    Exists(String, bool),
    Regex(String, Regex),
}

impl Expression {
    /// Whether `doc` satisfies this expression. An empty `And` matches all.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Expression::And(children) => children.iter().all(|c| c.matches(doc)),
            Expression::Or(children) => children.iter().any(|c| c.matches(doc)),
            Expression::Nor(children) => !children.iter().any(|c| c.matches(doc)),
            Expression::Eq(field, value) => eq_matches(doc, field, value),
            Expression::Ne(field, value) => !eq_matches(doc, field, value),
            Expression::Gt(field, value) => cmp_matches(doc, field, value, Ordering::is_gt),
            Expression::Gte(field, value) => cmp_matches(doc, field, value, Ordering::is_ge),
            Expression::Lt(field, value) => cmp_matches(doc, field, value, Ordering::is_lt),
            Expression::Lte(field, value) => cmp_matches(doc, field, value, Ordering::is_le),
            Expression::In(field, values) => values.iter().any(|v| eq_matches(doc, field, v)),
            Expression::Nin(field, values) => !values.iter().any(|v| eq_matches(doc, field, v)),
            Expression::Exists(field, expected) => {
                !path::resolve(doc, field).is_empty() == *expected
            }
            Expression::Regex(field, re) => candidates(doc, field)
                .any(|v| matches!(v, Bson::String(s) if re.is_match(s))),
        }
    }

    /// Field/value pairs the filter pins by equality, used to seed an upserted
    /// document. Only conjunctions are followed.
    pub fn equality_fields(&self) -> Vec<(&str, &Bson)> {
        let mut out = Vec::new();
        self.collect_equalities(&mut out);
        out
    }

    fn collect_equalities<'a>(&'a self, out: &mut Vec<(&'a str, &'a Bson)>) {
        match self {
            Expression::Eq(field, value) => out.push((field, value)),
            Expression::And(children) => {
                for child in children {
                    child.collect_equalities(out);
                }
            }
            _ => {}
        }
    }
}

/// Values a path reaches, with arrays also contributing their elements.
fn candidates<'a>(doc: &'a Document, field: &str) -> impl Iterator<Item = &'a Bson> {
    path::resolve(doc, field).into_iter().flat_map(|v| {
        let elements = match v {
            Bson::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        };
        std::iter::once(v).chain(elements)
    })
}

fn eq_matches(doc: &Document, field: &str, value: &Bson) -> bool {
    // null matches both a missing field and an explicit null.
    if matches!(value, Bson::Null) {
        let found = path::resolve(doc, field);
        return found.is_empty() || candidates(doc, field).any(|v| matches!(v, Bson::Null));
    }
    candidates(doc, field).any(|v| values_equal(v, value))
}

fn cmp_matches(doc: &Document, field: &str, value: &Bson, predicate: fn(Ordering) -> bool) -> bool {
    candidates(doc, field)
        .any(|v| type_rank(v) == type_rank(value) && predicate(compare_values(v, value)))
}

/// Parse a filter document into an [`Expression`].
///
/// - top-level entries are an implicit AND; an empty document matches everything
/// - `{ "field": value }` is implicit `$eq`
/// - `{ "field": { "$op": operand, ... } }` applies each operator
/// - `$and`, `$or` and `$nor` take arrays of filter documents
pub fn parse_filter(doc: &Document) -> Result<Expression, FilterParseError> {
    let mut children = Vec::with_capacity(doc.len());

    for (key, value) in doc {
        match key.as_str() {
            "$and" => children.push(Expression::And(parse_logical_array(key, value)?)),
            "$or" => children.push(Expression::Or(parse_logical_array(key, value)?)),
            "$nor" => children.push(Expression::Nor(parse_logical_array(key, value)?)),
            k if k.starts_with('$') => {
                return Err(FilterParseError(format!("unknown top-level operator: {k}")));
            }
            _ => children.push(parse_field_condition(key, value)?),
        }
    }

    if children.len() == 1 {
        if let Some(only) = children.pop() {
            return Ok(only);
        }
    }
    Ok(Expression::And(children))
}

fn parse_logical_array(op: &str, value: &Bson) -> Result<Vec<Expression>, FilterParseError> {
    let Bson::Array(items) = value else {
        return Err(FilterParseError(format!("{op} value must be an array")));
    };
    if items.is_empty() {
        return Err(FilterParseError(format!("{op} array must not be empty")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(sub) => parse_filter(sub),
            _ => Err(FilterParseError(format!("{op} array elements must be documents"))),
        })
        .collect()
}

fn parse_field_condition(field: &str, value: &Bson) -> Result<Expression, FilterParseError> {
    if let Bson::Document(sub) = value {
        if sub.keys().next().is_some_and(|k| k.starts_with('$')) {
            return parse_operator_doc(field, sub);
        }
    }
    Ok(Expression::Eq(field.to_string(), value.clone()))
}

/// Parse an operator sub-document like `{ "$gt": 21, "$lte": 100 }`.
fn parse_operator_doc(field: &str, doc: &Document) -> Result<Expression, FilterParseError> {
    let mut conditions = Vec::with_capacity(doc.len());
    let name = || field.to_string();

    for (op, operand) in doc {
        let expr = match op.as_str() {
            "$eq" => Expression::Eq(name(), operand.clone()),
            "$ne" => Expression::Ne(name(), operand.clone()),
            "$gt" => Expression::Gt(name(), operand.clone()),
            "$gte" => Expression::Gte(name(), operand.clone()),
            "$lt" => Expression::Lt(name(), operand.clone()),
            "$lte" => Expression::Lte(name(), operand.clone()),
            "$in" => Expression::In(name(), operand_list(op, operand)?),
            "$nin" => Expression::Nin(name(), operand_list(op, operand)?),
            "$exists" => match operand {
                Bson::Boolean(b) => Expression::Exists(name(), *b),
                _ => return Err(FilterParseError("$exists value must be a boolean".into())),
            },
            "$regex" => parse_regex(field, operand, doc.get("$options"))?,
            "$options" if doc.contains_key("$regex") => continue,
            "$options" => return Err(FilterParseError("$options without $regex".into())),
            k => return Err(FilterParseError(format!("unknown field operator: {k}"))),
        };
        conditions.push(expr);
    }

    match conditions.len() {
        0 => Err(FilterParseError("empty operator document".into())),
        1 => conditions
            .pop()
            .ok_or_else(|| FilterParseError("empty operator document".into())),
        _ => Ok(Expression::And(conditions)),
    }
}

fn operand_list(op: &str, operand: &Bson) -> Result<Vec<Bson>, FilterParseError> {
    match operand {
        Bson::Array(items) => Ok(items.clone()),
        _ => Err(FilterParseError(format!("{op} value must be an array"))),
    }
}

fn parse_regex(
    field: &str,
    pattern: &Bson,
    options: Option<&Bson>,
) -> Result<Expression, FilterParseError> {
    let Bson::String(pattern) = pattern else {
        return Err(FilterParseError("$regex value must be a string".into()));
    };

    let full_pattern = match options {
        None => pattern.clone(),
        Some(Bson::String(opts)) => {
            let mut prefixed = String::with_capacity(4 + opts.len() + pattern.len());
            prefixed.push_str("(?");
            for ch in opts.chars() {
                match ch {
                    'i' | 's' | 'm' | 'x' => prefixed.push(ch),
                    c => return Err(FilterParseError(format!("unknown regex option: {c}"))),
                }
            }
            prefixed.push(')');
            prefixed.push_str(pattern);
            prefixed
        }
        Some(_) => return Err(FilterParseError("$options value must be a string".into())),
    };

    let re = Regex::new(&full_pattern)
        .map_err(|e| FilterParseError(format!("invalid regex pattern: {e}")))?;
    Ok(Expression::Regex(field.to_string(), re))
}
