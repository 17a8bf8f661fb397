use std::fmt;
use std::str::FromStr;

/// The closed set of operations a gateway will run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationName {
    Find,
    FindOne,
    FindToArray,
    FindStream,
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    ReplaceOne,
    DeleteOne,
    DeleteMany,
    CountDocuments,
    EstimatedDocumentCount,
    Distinct,
}

/// How an operation's request body is shaped and how its result travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationFamily {
    /// Body is an array of positional arguments; result is an envelope.
    Positional,
    /// Body is `{ filter, opts }`; result is an envelope.
    Query,
    /// Body is `{ filter, opts }`; result is a record stream.
    Stream,
}

/// Accepted positional argument count, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: usize,
}

impl Arity {
    const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn accepts(self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{} to {}", self.min, self.max)
        }
    }
}

impl OperationName {
    pub const ALL: [OperationName; 14] = [
        OperationName::Find,
        OperationName::FindOne,
        OperationName::FindToArray,
        OperationName::FindStream,
        OperationName::InsertOne,
        OperationName::InsertMany,
        OperationName::UpdateOne,
        OperationName::UpdateMany,
        OperationName::ReplaceOne,
        OperationName::DeleteOne,
        OperationName::DeleteMany,
        OperationName::CountDocuments,
        OperationName::EstimatedDocumentCount,
        OperationName::Distinct,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationName::Find => "find",
            OperationName::FindOne => "findOne",
            OperationName::FindToArray => "findToArray",
            OperationName::FindStream => "findStream",
            OperationName::InsertOne => "insertOne",
            OperationName::InsertMany => "insertMany",
            OperationName::UpdateOne => "updateOne",
            OperationName::UpdateMany => "updateMany",
            OperationName::ReplaceOne => "replaceOne",
            OperationName::DeleteOne => "deleteOne",
            OperationName::DeleteMany => "deleteMany",
            OperationName::CountDocuments => "countDocuments",
            OperationName::EstimatedDocumentCount => "estimatedDocumentCount",
            OperationName::Distinct => "distinct",
        }
    }

    pub fn family(self) -> OperationFamily {
        match self {
            OperationName::FindToArray => OperationFamily::Query,
            OperationName::FindStream => OperationFamily::Stream,
            _ => OperationFamily::Positional,
        }
    }

    /// Positional argument contract. Query-family operations take none.
    pub fn arity(self) -> Arity {
        match self {
            OperationName::Find | OperationName::FindOne => Arity::new(0, 2),
            OperationName::FindToArray | OperationName::FindStream => Arity::new(0, 0),
            OperationName::InsertOne | OperationName::InsertMany => Arity::new(1, 1),
            OperationName::UpdateOne | OperationName::UpdateMany | OperationName::ReplaceOne => {
                Arity::new(2, 3)
            }
            OperationName::DeleteOne | OperationName::DeleteMany => Arity::new(1, 1),
            OperationName::CountDocuments => Arity::new(0, 2),
            OperationName::EstimatedDocumentCount => Arity::new(0, 1),
            OperationName::Distinct => Arity::new(1, 2),
        }
    }

    /// Reads can be cached by intermediaries; writes are sent `no-store`.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            OperationName::Find
                | OperationName::FindOne
                | OperationName::FindToArray
                | OperationName::FindStream
                | OperationName::CountDocuments
                | OperationName::EstimatedDocumentCount
                | OperationName::Distinct
        )
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation name outside [`OperationName::ALL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperation(pub String);

impl fmt::Display for UnknownOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown operation: {}", self.0)
    }
}

impl std::error::Error for UnknownOperation {}

impl FromStr for OperationName {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationName::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}
