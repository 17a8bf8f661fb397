use std::future::ready;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use relay_protocol::Codec;
use relay_store::DocumentCursor;

use crate::error::StreamError;

/// Turn a cursor into a body of independently decodable records.
///
/// Each chunk is one encoded record, and the cursor is only polled when the
/// transport polls the body, so one record at a time is in flight. The first
/// failure is logged and yielded as the final item, which aborts the body
/// without a terminating chunk.
pub(crate) fn record_stream(
    cursor: DocumentCursor,
    codec: Codec,
    collection: String,
) -> BoxStream<'static, Result<Bytes, StreamError>> {
    let mut failed = false;
    cursor
        .map(move |item| {
            let doc = item.map_err(StreamError::Cursor)?;
            codec
                .encode_record(&doc)
                .map(Bytes::from)
                .map_err(StreamError::Encode)
        })
        .take_while(move |item| {
            let keep_going = !failed;
            if let Err(e) = item {
                if !failed {
                    tracing::error!(collection = %collection, error = %e, "record stream aborted");
                }
                failed = true;
            }
            ready(keep_going)
        })
        .boxed()
}
