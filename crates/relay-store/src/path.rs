//! Dotted field paths (`a.b.0.c`) over documents.

use bson::{Bson, Document};

/// Every value a path reaches. Arrays met part way fan out over their
/// elements, so `tags.name` reaches the `name` of each embedded document.
pub(crate) fn resolve<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut out = Vec::new();
    let parts: Vec<&str> = path.split('.').collect();
    if let Some((first, rest)) = parts.split_first() {
        if let Some(value) = doc.get(*first) {
            descend(value, rest, &mut out);
        }
    }
    out
}

fn descend<'a>(value: &'a Bson, rest: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((next, tail)) = rest.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Bson::Document(doc) => {
            if let Some(child) = doc.get(*next) {
                descend(child, tail, out);
            }
        }
        Bson::Array(items) => {
            if let Ok(index) = next.parse::<usize>() {
                if let Some(item) = items.get(index) {
                    descend(item, tail, out);
                }
                return;
            }
            for item in items {
                if let Bson::Document(doc) = item {
                    if let Some(child) = doc.get(*next) {
                        descend(child, tail, out);
                    }
                }
            }
        }
        _ => {}
    }
}

/// The single value at a path, without array fan-out.
pub(crate) fn get<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(d) => d.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable access to the document holding the last path segment, creating
/// intermediate documents when `create` is set.
pub(crate) fn parent_mut<'a, 'p>(
    doc: &'a mut Document,
    path: &'p str,
    create: bool,
) -> Result<Option<(&'a mut Document, &'p str)>, String> {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };
    let Some(parents) = parents else {
        return Ok(Some((doc, leaf)));
    };

    let mut current = doc;
    for part in parents.split('.') {
        let missing = match current.get(part) {
            Some(Bson::Document(_)) => false,
            None | Some(Bson::Null) => true,
            Some(_) if create => {
                return Err(format!("cannot traverse {path}: {part} is not a document"));
            }
            Some(_) => return Ok(None),
        };
        if missing {
            if !create {
                return Ok(None);
            }
            current.insert(part, Document::new());
        }
        current = match current.get_mut(part) {
            Some(Bson::Document(child)) => child,
            _ => return Err(format!("cannot traverse {path} at {part}")),
        };
    }
    Ok(Some((current, leaf)))
}

/// Set `value` at `path`, creating intermediate documents.
pub(crate) fn set(doc: &mut Document, path: &str, value: Bson) -> Result<(), String> {
    if let Some((parent, leaf)) = parent_mut(doc, path, true)? {
        parent.insert(leaf, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn resolve_fans_out_over_arrays() {
        let doc = doc! { "tags": [{ "name": "a" }, { "name": "b" }, 3] };
        let found = resolve(&doc, "tags.name");
        assert_eq!(found, vec![&Bson::from("a"), &Bson::from("b")]);
    }

    #[test]
    fn resolve_indexes_arrays() {
        let doc = doc! { "xs": [10, 20] };
        assert_eq!(resolve(&doc, "xs.1"), vec![&Bson::Int32(20)]);
        assert!(resolve(&doc, "xs.5").is_empty());
    }

    #[test]
    fn set_creates_intermediate_documents() {
        let mut doc = doc! { "a": 1 };
        set(&mut doc, "b.c.d", Bson::Int32(2)).unwrap();
        assert_eq!(doc, doc! { "a": 1, "b": { "c": { "d": 2 } } });
        assert_eq!(get(&doc, "b.c.d"), Some(&Bson::Int32(2)));
    }

    #[test]
    fn set_refuses_to_traverse_scalars() {
        let mut doc = doc! { "a": 1 };
        assert!(set(&mut doc, "a.b", Bson::Int32(2)).is_err());
    }
}
