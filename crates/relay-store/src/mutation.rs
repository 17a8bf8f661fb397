use bson::{Bson, Document};

use crate::path;

/// A single field-level update operator.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Set a field, creating it and any missing parents.
    Set(Bson),
    /// Like `Set`, but only when the update inserts a new document.
    SetOnInsert(Bson),
    Unset,
    /// Add to a numeric field; a missing field starts from zero.
    Inc(Bson),
    /// Move a field to a new path.
    Rename(String),
    /// Append values to an array field, creating it if missing.
    Push(Vec<Bson>),
    /// Remove the first (`true`) or last element of an array field.
    Pop(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub field: String,
    pub op: UpdateOp,
}

/// A parsed, validated update document.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub ops: Vec<FieldUpdate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateError(pub String);

impl std::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "update error: {}", self.0)
    }
}

impl std::error::Error for UpdateError {}

impl Update {
    /// Apply every operator in order. Returns whether the document changed.
    pub fn apply(&self, doc: &mut Document, inserting: bool) -> Result<bool, UpdateError> {
        let before = doc.clone();
        for fu in &self.ops {
            apply_one(doc, &fu.field, &fu.op, inserting).map_err(UpdateError)?;
        }
        Ok(*doc != before)
    }
}

fn apply_one(doc: &mut Document, field: &str, op: &UpdateOp, inserting: bool) -> Result<(), String> {
    match op {
        UpdateOp::Set(value) => path::set(doc, field, value.clone()),
        UpdateOp::SetOnInsert(value) if inserting => path::set(doc, field, value.clone()),
        UpdateOp::SetOnInsert(_) => Ok(()),
        UpdateOp::Unset => {
            if let Some((parent, leaf)) = path::parent_mut(doc, field, false)? {
                parent.remove(leaf);
            }
            Ok(())
        }
        UpdateOp::Inc(amount) => {
            let current = path::get(doc, field).cloned();
            let next = match current {
                None => amount.clone(),
                Some(existing) => add_numbers(&existing, amount)
                    .ok_or_else(|| format!("cannot apply $inc to non-numeric field {field}"))?,
            };
            path::set(doc, field, next)
        }
        UpdateOp::Rename(target) => {
            let moved = match path::parent_mut(doc, field, false)? {
                Some((parent, leaf)) => parent.remove(leaf),
                None => None,
            };
            match moved {
                Some(value) => path::set(doc, target, value),
                None => Ok(()),
            }
        }
        UpdateOp::Push(values) => match path::get(doc, field).cloned() {
            None => path::set(doc, field, Bson::Array(values.clone())),
            Some(Bson::Array(mut items)) => {
                items.extend(values.iter().cloned());
                path::set(doc, field, Bson::Array(items))
            }
            Some(_) => Err(format!("cannot apply $push to non-array field {field}")),
        },
        UpdateOp::Pop(first) => match path::get(doc, field).cloned() {
            None => Ok(()),
            Some(Bson::Array(mut items)) => {
                if *first && !items.is_empty() {
                    items.remove(0);
                } else {
                    items.pop();
                }
                path::set(doc, field, Bson::Array(items))
            }
            Some(_) => Err(format!("cannot apply $pop to non-array field {field}")),
        },
    }
}

/// Sum of two numbers, widening to the larger type. `None` when either side
/// is not numeric.
fn add_numbers(a: &Bson, b: &Bson) -> Option<Bson> {
    Some(match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => match x.checked_add(*y) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*x) + i64::from(*y)),
        },
        (Bson::Int32(x), Bson::Int64(y)) => Bson::Int64(i64::from(*x).checked_add(*y)?),
        (Bson::Int64(x), Bson::Int32(y)) => Bson::Int64(x.checked_add(i64::from(*y))?),
        (Bson::Int64(x), Bson::Int64(y)) => Bson::Int64(x.checked_add(*y)?),
        (Bson::Double(x), Bson::Double(y)) => Bson::Double(x + y),
        (Bson::Double(x), Bson::Int32(y)) => Bson::Double(x + f64::from(*y)),
        (Bson::Double(x), Bson::Int64(y)) => Bson::Double(x + *y as f64),
        (Bson::Int32(x), Bson::Double(y)) => Bson::Double(f64::from(*x) + y),
        (Bson::Int64(x), Bson::Double(y)) => Bson::Double(*x as f64 + y),
        _ => return None,
    })
}

fn is_numeric(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

/// Parse an update document into a validated [`Update`].
///
/// Every top-level key must be an operator (`$set`, `$setOnInsert`, `$unset`,
/// `$inc`, `$rename`, `$push`, `$pop`) mapping field paths to operands.
/// Whole-document replacement goes through [`validate_replacement`] instead.
///
/// # Errors
///
/// Returns an error for bare fields, unknown operators, operators targeting
/// `_id`, operands of the wrong type, or an empty document.
pub fn parse_update(doc: &Document) -> Result<Update, UpdateError> {
    let mut ops = Vec::new();

    for (key, value) in doc {
        let Bson::Document(fields) = value else {
            if key.starts_with('$') {
                return Err(UpdateError(format!("{key} value must be a document")));
            }
            return Err(UpdateError(format!(
                "update document may only contain operators, found field {key}"
            )));
        };

        for (field, operand) in fields {
            let op = match key.as_str() {
                "$set" => UpdateOp::Set(operand.clone()),
                "$setOnInsert" => UpdateOp::SetOnInsert(operand.clone()),
                "$unset" => UpdateOp::Unset,
                "$inc" if is_numeric(operand) => UpdateOp::Inc(operand.clone()),
                "$inc" => return Err(UpdateError(format!("$inc value for {field} must be numeric"))),
                "$rename" => match operand {
                    Bson::String(target) => {
                        reject_id(target)?;
                        UpdateOp::Rename(target.clone())
                    }
                    _ => return Err(UpdateError(format!("$rename target for {field} must be a string"))),
                },
                "$push" => UpdateOp::Push(push_values(operand)),
                "$pop" => match operand {
                    Bson::Int32(-1) | Bson::Int64(-1) => UpdateOp::Pop(true),
                    Bson::Int32(1) | Bson::Int64(1) => UpdateOp::Pop(false),
                    _ => return Err(UpdateError(format!("$pop value for {field} must be 1 or -1"))),
                },
                k if k.starts_with('$') => {
                    return Err(UpdateError(format!("unknown update operator: {k}")));
                }
                k => {
                    return Err(UpdateError(format!(
                        "update document may only contain operators, found field {k}"
                    )));
                }
            };
            reject_id(field)?;
            ops.push(FieldUpdate {
                field: field.clone(),
                op,
            });
        }
    }

    if ops.is_empty() {
        return Err(UpdateError("empty update document".into()));
    }
    Ok(Update { ops })
}

/// `{ $each: [..] }` pushes several values, anything else pushes one.
fn push_values(operand: &Bson) -> Vec<Bson> {
    if let Bson::Document(d) = operand {
        if d.len() == 1 {
            if let Some(Bson::Array(each)) = d.get("$each") {
                return each.clone();
            }
        }
    }
    vec![operand.clone()]
}

fn reject_id(field: &str) -> Result<(), UpdateError> {
    let root = field.split('.').next().unwrap_or(field);
    if root == "_id" {
        return Err(UpdateError("cannot update the _id field".into()));
    }
    Ok(())
}

/// A replacement document must not contain update operators.
pub fn validate_replacement(doc: &Document) -> Result<(), UpdateError> {
    match doc.keys().find(|k| k.starts_with('$')) {
        Some(k) => Err(UpdateError(format!(
            "replacement document must not contain operators, found {k}"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn run(update: Document, mut doc: Document) -> Document {
        parse_update(&update).unwrap().apply(&mut doc, false).unwrap();
        doc
    }

    #[test]
    fn set_and_unset() {
        let out = run(doc! { "$set": { "b": 2, "c.d": 3 }, "$unset": { "a": "" } }, doc! { "a": 1 });
        assert_eq!(out, doc! { "b": 2, "c": { "d": 3 } });
    }

    #[test]
    fn inc_widens_on_overflow() {
        let out = run(doc! { "$inc": { "n": 1 } }, doc! { "n": i32::MAX });
        assert_eq!(out.get("n"), Some(&Bson::Int64(i64::from(i32::MAX) + 1)));
        let out = run(doc! { "$inc": { "n": 0.5 } }, doc! {});
        assert_eq!(out.get("n"), Some(&Bson::Double(0.5)));
    }

    #[test]
    fn inc_rejects_strings() {
        let update = parse_update(&doc! { "$inc": { "n": 1 } }).unwrap();
        let mut doc = doc! { "n": "one" };
        assert!(update.apply(&mut doc, false).is_err());
    }

    #[test]
    fn rename_moves_value() {
        let out = run(doc! { "$rename": { "a": "b.c" } }, doc! { "a": 1, "z": 0 });
        assert_eq!(out, doc! { "z": 0, "b": { "c": 1 } });
    }

    #[test]
    fn push_each_and_pop() {
        let out = run(doc! { "$push": { "xs": { "$each": [2, 3] } } }, doc! { "xs": [1] });
        assert_eq!(out, doc! { "xs": [1, 2, 3] });
        let out = run(doc! { "$pop": { "xs": -1 } }, out);
        assert_eq!(out, doc! { "xs": [2, 3] });
    }

    #[test]
    fn set_on_insert_only_when_inserting() {
        let update = parse_update(&doc! { "$setOnInsert": { "created": true } }).unwrap();
        let mut doc = doc! {};
        assert!(!update.apply(&mut doc, false).unwrap());
        assert!(update.apply(&mut doc, true).unwrap());
        assert_eq!(doc, doc! { "created": true });
    }

    #[test]
    fn unchanged_document_reports_no_change() {
        let update = parse_update(&doc! { "$set": { "a": 1 } }).unwrap();
        let mut doc = doc! { "a": 1 };
        assert!(!update.apply(&mut doc, false).unwrap());
    }

    #[test]
    fn rejects_bad_updates() {
        assert!(parse_update(&doc! { "a": 1 }).is_err());
        assert!(parse_update(&doc! { "$set": { "_id": 1 } }).is_err());
        assert!(parse_update(&doc! { "$rename": { "a": "_id" } }).is_err());
        assert!(parse_update(&doc! { "$mul": { "a": 2 } }).is_err());
        assert!(parse_update(&doc! {}).is_err());
        assert!(validate_replacement(&doc! { "$set": { "a": 1 } }).is_err());
        assert!(validate_replacement(&doc! { "a": 1 }).is_ok());
    }
}
