//! Websocket tail for operation logs.
//!
//! The portal upgrades `.../operations/common/{id}/logs` to a websocket and
//! pushes log output as text (or binary) frames until the operation's log
//! is closed. Frames are split into lines and yielded through a stream.

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use url::Url;

use crate::error::Error;

/// A stream of log lines.
pub type LineStream = BoxStream<'static, Result<String, Error>>;

/// Open the websocket and return a stream of lines.
///
/// The stream ends on a normal close frame or when the server hangs up.
/// A close frame carrying an error code is surfaced as
/// [`Error::WebSocketClosed`].
pub(crate) async fn connect(url: &Url, authorization: Option<String>) -> Result<LineStream, Error> {
    tracing::debug!(url = %url, "Connecting to log stream");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(value) = authorization {
        request = request.with_header("Authorization", value);
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (_write, mut read) = ws_stream.split();

    let stream = async_stream::try_stream! {
        let mut pending = String::new();
        while let Some(frame) = read.next().await {
            let chunk = match frame.map_err(|e| Error::WebSocketConnect(e.to_string()))? {
                tungstenite::Message::Text(text) => text.as_str().to_owned(),
                tungstenite::Message::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
                tungstenite::Message::Close(frame) => {
                    if let Some(cf) = frame {
                        let code = u16::from(cf.code);
                        if code != 1000 {
                            Err(Error::WebSocketClosed {
                                code,
                                reason: cf.reason.as_str().to_owned(),
                            })?;
                        }
                    }
                    break;
                }
                _ => continue,
            };
            pending.push_str(&chunk);
            for line in drain_lines(&mut pending) {
                yield line;
            }
        }
        if !pending.is_empty() {
            yield std::mem::take(&mut pending);
        }
    };

    Ok(stream.boxed())
}

/// Remove every complete line from `buf`, leaving any partial tail.
fn drain_lines(buf: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.find('\n') {
        let line: String = buf.drain(..=pos).collect();
        lines.push(line.trim_end_matches(['\n', '\r']).to_owned());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_lines_keeps_partial_tail() {
        let mut buf = String::from("first\nsecond\r\nthi");
        let lines = drain_lines(&mut buf);
        assert_eq!(lines, vec!["first".to_owned(), "second".to_owned()]);
        assert_eq!(buf, "thi");
    }

    #[test]
    fn drain_lines_empty_buffer() {
        let mut buf = String::new();
        assert!(drain_lines(&mut buf).is_empty());
    }
}
