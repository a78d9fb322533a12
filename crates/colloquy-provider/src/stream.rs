use tokio::sync::mpsc;

use crate::traits::ProviderError;

/// A finite, lazy sequence of text fragments from one completion call.
///
/// Backed by a channel fed by a reader task; dropping the stream closes the
/// channel and the reader task stops at its next send. There is no way to
/// restart a stream once consumption has begun.
pub struct CompletionStream {
    rx: mpsc::Receiver<Result<String, ProviderError>>,
}

impl CompletionStream {
    pub(crate) fn new(rx: mpsc::Receiver<Result<String, ProviderError>>) -> Self {
        Self { rx }
    }

    /// Build a stream from pre-baked fragments. Used by the mock client and
    /// in tests.
    pub fn from_fragments(fragments: Vec<String>) -> Self {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for fragment in fragments {
                if tx.send(Ok(fragment)).await.is_err() {
                    return;
                }
            }
        });
        Self { rx }
    }

    /// Next fragment, or `None` at provider end-of-stream.
    pub async fn next_fragment(&mut self) -> Option<Result<String, ProviderError>> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_fragments_in_order_then_ends() {
        let mut stream =
            CompletionStream::from_fragments(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "a");
        assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "b");
        assert!(stream.next_fragment().await.is_none());
    }

    #[tokio::test]
    async fn dropping_stream_stops_sender() {
        let fragments: Vec<String> = (0..1000).map(|i| i.to_string()).collect();
        let mut stream = CompletionStream::from_fragments(fragments);
        let _ = stream.next_fragment().await;
        drop(stream);
        // The sender task exits on the first failed send; nothing to assert
        // beyond not hanging.
    }
}
