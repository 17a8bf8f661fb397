use bson::{Bson, Document};

use crate::error::StoreError;
use crate::path;

/// A parsed projection document.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Keep only these paths (plus `_id` unless excluded).
    Include { fields: Vec<String>, id: bool },
    /// Drop these paths.
    Exclude(Vec<String>),
}

impl Projection {
    /// Parse `{ field: 1 | 0 | true | false }`. Inclusion and exclusion cannot
    /// be mixed, except that `_id` may always be excluded.
    pub fn parse(spec: &Document) -> Result<Option<Self>, StoreError> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        let mut id = true;

        for (field, flag) in spec {
            let keep = match flag {
                Bson::Boolean(b) => *b,
                Bson::Int32(n) => *n != 0,
                Bson::Int64(n) => *n != 0,
                Bson::Double(n) => *n != 0.0,
                _ => {
                    return Err(StoreError::InvalidOptions(format!(
                        "projection value for {field} must be a number or boolean"
                    )));
                }
            };
            if field.split('.').any(|part| part.parse::<usize>().is_ok()) {
                return Err(StoreError::InvalidOptions(format!(
                    "projection path {field} indexes into an array; project the whole array"
                )));
            }
            match (field.as_str(), keep) {
                ("_id", keep) => id = keep,
                (_, true) => include.push(field.clone()),
                (_, false) => exclude.push(field.clone()),
            }
        }

        match (include.is_empty(), exclude.is_empty()) {
            (false, false) => Err(StoreError::InvalidOptions(
                "projection cannot mix inclusion and exclusion".into(),
            )),
            (false, true) => Ok(Some(Projection::Include { fields: include, id })),
            (true, false) => {
                if !id {
                    exclude.insert(0, "_id".to_string());
                }
                Ok(Some(Projection::Exclude(exclude)))
            }
            (true, true) if !id => Ok(Some(Projection::Exclude(vec!["_id".to_string()]))),
            (true, true) => Ok(None),
        }
    }

    pub fn apply(&self, doc: Document) -> Document {
        match self {
            Projection::Include { fields, id } => {
                let mut out = Document::new();
                if *id {
                    if let Some(value) = doc.get("_id") {
                        out.insert("_id", value.clone());
                    }
                }
                for field in fields {
                    if let Some(value) = path::get(&doc, field) {
                        // Without index segments `get` only walks documents,
                        // so every parent it passed is rebuilt as a document.
                        if let Err(e) = path::set(&mut out, field, value.clone()) {
                            tracing::debug!(field = %field, error = %e, "projection path skipped");
                        }
                    }
                }
                out
            }
            Projection::Exclude(fields) => {
                let mut out = doc;
                for field in fields {
                    if let Ok(Some((parent, leaf))) = path::parent_mut(&mut out, field, false) {
                        parent.remove(leaf);
                    }
                }
                out
            }
        }
    }
}
