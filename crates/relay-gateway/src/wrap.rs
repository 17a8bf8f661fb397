use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use bson::Bson;
use futures::FutureExt;
use relay_protocol::Envelope;

use crate::error::OperationError;

/// Run an operation and fold every outcome, panics included, into an
/// envelope. This is the only place operation failures become wire data.
pub async fn wrap<F>(operation: F) -> Envelope
where
    F: Future<Output = Result<Bson, OperationError>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(Ok(value)) => Envelope::Result(value),
        Ok(Err(e)) => Envelope::Error(e.to_remote()),
        Err(payload) => {
            let e = OperationError::Panic(panic_message(payload.as_ref()));
            tracing::error!(error = %e, "operation panicked");
            Envelope::Error(e.to_remote())
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_store::StoreError;

    #[tokio::test]
    async fn success_becomes_result() {
        let envelope = wrap(async { Ok(Bson::Int32(1)) }).await;
        assert_eq!(envelope, Envelope::Result(Bson::Int32(1)));
    }

    #[tokio::test]
    async fn failure_keeps_name_and_message() {
        let envelope = wrap(async {
            Err(OperationError::Store(StoreError::DuplicateKey("\"x\"".into())))
        })
        .await;
        let Envelope::Error(e) = envelope else {
            panic!("expected error envelope");
        };
        assert_eq!(e.name(), "DuplicateKeyError");
        assert_eq!(e.message, "duplicate key error: _id \"x\"");
    }

    #[tokio::test]
    async fn panic_is_caught() {
        let envelope = wrap(async {
            if true {
                panic!("boom");
            }
            Ok(Bson::Null)
        })
        .await;
        let Envelope::Error(e) = envelope else {
            panic!("expected error envelope");
        };
        assert_eq!(e.name(), "Panic");
        assert_eq!(e.message, "operation panicked: boom");
    }
}
