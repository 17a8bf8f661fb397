use std::cmp::Ordering;

use bson::Bson;

/// Position of a value's kind in the cross-type sort order. All numeric
/// widths share one rank so they compare by magnitude.
pub(crate) fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) | Bson::DbPointer(_) => 12,
        Bson::MaxKey => 13,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

/// Total order over values: first by kind, then within the kind.
pub(crate) fn compare_values(a: &Bson, b: &Bson) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x.cmp(y),
        (Bson::Int64(x), Bson::Int64(y)) => x.cmp(y),
        (Bson::Int32(x), Bson::Int64(y)) => i64::from(*x).cmp(y),
        (Bson::Int64(x), Bson::Int32(y)) => x.cmp(&i64::from(*y)),
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Array(x), Bson::Array(y)) => compare_sequences(x.iter(), y.iter()),
        (Bson::Document(x), Bson::Document(y)) => {
            for ((ka, va), (kb, vb)) in x.iter().zip(y.iter()) {
                let ord = ka.cmp(kb).then_with(|| compare_values(va, vb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => compare_f64(x, y),
            _ => Ordering::Equal,
        },
    }
}

/// NaN sorts below every other number.
fn compare_f64(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

fn compare_sequences<'a>(
    mut a: impl Iterator<Item = &'a Bson>,
    mut b: impl Iterator<Item = &'a Bson>,
) -> Ordering {
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Equality used by filters: numbers compare by value across widths.
pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    type_rank(a) == type_rank(b) && compare_values(a, b) == Ordering::Equal
}

/// Key identifying an `_id` value in the unique index. Numerically equal
/// ids of different widths map to the same key.
pub(crate) fn id_key(id: &Bson) -> String {
    match id {
        Bson::Int32(i) => format!("n:{i}"),
        Bson::Int64(i) => format!("n:{i}"),
        Bson::Double(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("n:{}", *f as i64),
        Bson::Double(f) => format!("n:{f}"),
        Bson::String(s) => format!("s:{s}"),
        Bson::ObjectId(oid) => format!("o:{}", oid.to_hex()),
        Bson::DateTime(dt) => format!("d:{}", dt.timestamp_millis()),
        Bson::Boolean(b) => format!("b:{b}"),
        Bson::Null => "z".to_string(),
        other => format!("x:{other}"),
    }
}

/// Render an `_id` for error messages.
pub(crate) fn display_id(id: &Bson) -> String {
    match id {
        Bson::String(s) => format!("{s:?}"),
        Bson::ObjectId(oid) => format!("ObjectId({})", oid.to_hex()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{DateTime, bson};

    #[test]
    fn numbers_compare_across_widths() {
        assert!(values_equal(&Bson::Int32(1), &Bson::Int64(1)));
        assert!(values_equal(&Bson::Int32(1), &Bson::Double(1.0)));
        assert_eq!(
            compare_values(&Bson::Int64(5), &Bson::Double(4.5)),
            Ordering::Greater
        );
    }

    #[test]
    fn kinds_order_before_values() {
        assert_eq!(
            compare_values(&Bson::Null, &Bson::Int32(-100)),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&Bson::from("a"), &Bson::Int32(100)),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(
                &Bson::DateTime(DateTime::from_millis(0)),
                &Bson::Boolean(true)
            ),
            Ordering::Greater
        );
    }

    #[test]
    fn arrays_compare_elementwise() {
        assert_eq!(
            compare_values(&bson!([1, 2]), &bson!([1, 2, 0])),
            Ordering::Less
        );
        assert!(values_equal(&bson!([1, "x"]), &bson!([1_i64, "x"])));
    }

    #[test]
    fn id_keys_unify_numeric_widths() {
        assert_eq!(id_key(&Bson::Int32(7)), id_key(&Bson::Int64(7)));
        assert_eq!(id_key(&Bson::Int32(7)), id_key(&Bson::Double(7.0)));
        assert_ne!(id_key(&Bson::Int32(7)), id_key(&Bson::from("7")));
    }
}
