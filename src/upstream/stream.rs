use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};

use super::error::UpstreamError;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

/// 先输出已收到的首个分块，再转发剩余分块
///
/// 首块之后的错误只会输出一次并结束流，不做重试。
pub fn relay<S, E>(first: Option<Bytes>, rest: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display + Send + 'static,
{
    Box::pin(stream::try_unfold(
        (first, rest),
        |(pending, mut rest)| async move {
            if let Some(chunk) = pending {
                return Ok(Some((chunk, (None, rest))));
            }
            match rest.next().await {
                Some(Ok(chunk)) => Ok(Some((chunk, (None, rest)))),
                Some(Err(e)) => Err(UpstreamError::Stream(e.to_string())),
                None => Ok(None),
            }
        },
    ))
}
