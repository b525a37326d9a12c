use crate::api::ApiError;
use futures::{Stream, StreamExt};

/// Re-chunks a byte stream into complete lines.
///
/// Network chunks split lines (and multi-byte chars) at arbitrary points, so
/// bytes are buffered until a newline arrives. The tail is flushed when the
/// body ends. Trailing `\r` is stripped.
pub(crate) fn lines<S, B>(body: S) -> impl Stream<Item = Result<String, ApiError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    body.map(|item| {
        item.map(|bytes| Some(bytes.as_ref().to_vec()))
            .map_err(ApiError::HttpClient)
    })
    .chain(futures::stream::once(futures::future::ready(Ok(None))))
    .scan(Vec::<u8>::new(), |pending, item| {
        let mut out: Vec<Result<String, ApiError>> = Vec::new();
        match item {
            Ok(Some(bytes)) => {
                pending.extend_from_slice(&bytes);
                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    out.push(Ok(decode_line(&line)));
                }
            }
            Ok(None) => {
                if !pending.is_empty() {
                    let line = std::mem::take(pending);
                    out.push(Ok(decode_line(&line)));
                }
            }
            Err(e) => out.push(Err(e)),
        }
        futures::future::ready(Some(futures::stream::iter(out)))
    })
    .flatten()
}

fn decode_line(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Payload of a server-sent-events `data:` line, if this is one.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}
