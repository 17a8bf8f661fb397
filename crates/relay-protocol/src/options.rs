use bson::{Bson, Document};

use crate::error::OptionsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_bson(self) -> Bson {
        match self {
            SortDirection::Asc => Bson::Int32(1),
            SortDirection::Desc => Bson::Int32(-1),
        }
    }

    /// Accepts `1`/`-1` in any numeric width and the usual spelled-out forms.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        match value {
            Bson::String(s) => match s.to_ascii_lowercase().as_str() {
                "asc" | "ascending" => Some(SortDirection::Asc),
                "desc" | "descending" => Some(SortDirection::Desc),
                _ => None,
            },
            other => match as_integer(other)? {
                1 => Some(SortDirection::Asc),
                -1 => Some(SortDirection::Desc),
                _ => None,
            },
        }
    }
}

/// Cursor modifiers for a find. A `limit` of zero means unbounded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Ordered `{ field: 1 | -1 }` document.
    pub sort: Option<Document>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub projection: Option<Document>,
}

impl FindOptions {
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        if let Some(sort) = &self.sort {
            doc.insert("sort", sort.clone());
        }
        if let Some(limit) = self.limit {
            doc.insert("limit", integer_bson(limit));
        }
        if let Some(skip) = self.skip {
            doc.insert("skip", integer_bson(skip));
        }
        if let Some(projection) = &self.projection {
            doc.insert("project", projection.clone());
        }
        doc
    }

    pub fn from_document(doc: &Document) -> Result<Self, OptionsError> {
        let mut options = FindOptions::default();
        for (key, value) in doc {
            match key.as_str() {
                "sort" => options.sort = Some(sort_document(value)?),
                "limit" => options.limit = non_negative(key, value)?.filter(|n| *n > 0),
                "skip" => options.skip = non_negative(key, value)?,
                "project" | "projection" => options.projection = optional_document(key, value)?,
                other => return Err(OptionsError(format!("unknown find option: {other}"))),
            }
        }
        Ok(options)
    }

    /// Parse the sort document into ordered `(field, direction)` pairs.
    pub fn sort_fields(&self) -> Result<Vec<(String, SortDirection)>, OptionsError> {
        let Some(sort) = &self.sort else {
            return Ok(Vec::new());
        };
        sort.iter()
            .map(|(field, dir)| {
                SortDirection::from_bson(dir)
                    .map(|d| (field.clone(), d))
                    .ok_or_else(|| OptionsError(format!("invalid sort direction for {field}")))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert a new document when nothing matches the filter.
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("upsert", self.upsert);
        doc
    }

    pub fn from_document(doc: &Document) -> Result<Self, OptionsError> {
        let mut options = UpdateOptions::default();
        for (key, value) in doc {
            match (key.as_str(), value) {
                ("upsert", Bson::Boolean(b)) => options.upsert = *b,
                ("upsert", _) => return Err(OptionsError("upsert must be a boolean".into())),
                (other, _) => return Err(OptionsError(format!("unknown update option: {other}"))),
            }
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountOptions {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

impl CountOptions {
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        if let Some(limit) = self.limit {
            doc.insert("limit", integer_bson(limit));
        }
        if let Some(skip) = self.skip {
            doc.insert("skip", integer_bson(skip));
        }
        doc
    }

    pub fn from_document(doc: &Document) -> Result<Self, OptionsError> {
        let mut options = CountOptions::default();
        for (key, value) in doc {
            match key.as_str() {
                "limit" => options.limit = non_negative(key, value)?.filter(|n| *n > 0),
                "skip" => options.skip = non_negative(key, value)?,
                other => return Err(OptionsError(format!("unknown count option: {other}"))),
            }
        }
        Ok(options)
    }
}

/// Body of the query-family operations: `{ filter, opts }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub filter: Document,
    pub options: FindOptions,
}

impl QueryRequest {
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("filter", self.filter.clone());
        doc.insert("opts", self.options.to_document());
        doc
    }

    /// Missing or null `filter` / `opts` fall back to their defaults.
    pub fn from_document(doc: &Document) -> Result<Self, OptionsError> {
        let mut request = QueryRequest::default();
        for (key, value) in doc {
            match key.as_str() {
                "filter" => request.filter = optional_document(key, value)?.unwrap_or_default(),
                "opts" => {
                    if let Some(opts) = optional_document(key, value)? {
                        request.options = FindOptions::from_document(&opts)?;
                    }
                }
                other => return Err(OptionsError(format!("unknown query field: {other}"))),
            }
        }
        Ok(request)
    }
}

/// Integral value of a numeric BSON, if it has one.
fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
        _ => None,
    }
}

fn integer_bson(n: u64) -> Bson {
    match i32::try_from(n) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(i64::try_from(n).unwrap_or(i64::MAX)),
    }
}

fn non_negative(key: &str, value: &Bson) -> Result<Option<u64>, OptionsError> {
    if matches!(value, Bson::Null) {
        return Ok(None);
    }
    as_integer(value)
        .and_then(|n| u64::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| OptionsError(format!("{key} must be a non-negative integer")))
}

fn optional_document(key: &str, value: &Bson) -> Result<Option<Document>, OptionsError> {
    match value {
        Bson::Null => Ok(None),
        Bson::Document(d) => Ok(Some(d.clone())),
        _ => Err(OptionsError(format!("{key} must be a document"))),
    }
}

fn sort_document(value: &Bson) -> Result<Document, OptionsError> {
    match value {
        Bson::Document(d) => Ok(d.clone()),
        // A bare field name sorts ascending on that field.
        Bson::String(field) => {
            let mut doc = Document::new();
            doc.insert(field.clone(), SortDirection::Asc.to_bson());
            Ok(doc)
        }
        _ => Err(OptionsError("sort must be a document or a field name".into())),
    }
}
