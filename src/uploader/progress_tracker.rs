use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Integer percentage of `bytes_sent` over `bytes_total`, rounded to nearest.
///
/// Returns `None` for an empty transfer, where no ratio exists.
pub fn progress_percent(bytes_sent: u64, bytes_total: u64) -> Option<u8> {
    if bytes_total == 0 {
        return None;
    }

    let ratio = bytes_sent.min(bytes_total) as f64 / bytes_total as f64;
    Some((ratio * 100.0).round() as u8)
}

type ProgressCallback = Box<dyn FnMut(u8) + Send + Sync>;

/// Reader that reports how much of the body the transport has pulled so far.
///
/// The callback only fires when the rounded percentage changes.
pub struct ProgressReader<R> {
    inner: R,
    bytes_sent: u64,
    bytes_total: u64,
    last_percent: Option<u8>,
    on_progress: ProgressCallback,
}

impl<R> ProgressReader<R> {
    pub fn new<F>(inner: R, bytes_total: u64, on_progress: F) -> Self
    where
        F: FnMut(u8) + Send + Sync + 'static,
    {
        Self {
            inner,
            bytes_sent: 0,
            bytes_total,
            last_percent: None,
            on_progress: Box::new(on_progress),
        }
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn record(&mut self, read: u64) {
        self.bytes_sent += read;

        if let Some(percent) = progress_percent(self.bytes_sent, self.bytes_total) {
            if self.last_percent != Some(percent) {
                self.last_percent = Some(percent);
                log::debug!(
                    "Upload progress: {}% ({}/{} bytes)",
                    percent,
                    self.bytes_sent,
                    self.bytes_total
                );
                (self.on_progress)(percent);
            }
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();

        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);

        if let Poll::Ready(Ok(())) = &poll {
            let read = buf.filled().len() - before;
            if read > 0 {
                this.record(read as u64);
            }
        }

        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_progress_percent_rounding() {
        assert_eq!(progress_percent(0, 200), Some(0));
        assert_eq!(progress_percent(1, 200), Some(1)); // 0.5 rounds up
        assert_eq!(progress_percent(1, 3), Some(33));
        assert_eq!(progress_percent(2, 3), Some(67));
        assert_eq!(progress_percent(3, 3), Some(100));
    }

    #[test]
    fn test_progress_percent_edges() {
        assert_eq!(progress_percent(0, 0), None);
        assert_eq!(progress_percent(500, 100), Some(100));
    }

    #[tokio::test]
    async fn test_reader_reports_each_new_percentage() {
        let data = [7u8; 10];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut reader = ProgressReader::new(&data[..], data.len() as u64, move |percent| {
            sink.lock().unwrap().push(percent);
        });

        let mut chunk = [0u8; 4];
        let mut total = 0;
        loop {
            let read = reader.read(&mut chunk).await.unwrap();
            if read == 0 {
                break;
            }
            total += read;
        }

        assert_eq!(total, 10);
        assert_eq!(reader.bytes_sent(), 10);
        assert_eq!(*seen.lock().unwrap(), vec![40, 80, 100]);
    }

    #[tokio::test]
    async fn test_reader_skips_repeated_percentages() {
        let data = vec![1u8; 1000];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut reader = ProgressReader::new(&data[..], data.len() as u64, move |percent| {
            sink.lock().unwrap().push(percent);
        });

        let mut chunk = [0u8; 1];
        while reader.read(&mut chunk).await.unwrap() > 0 {}

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 101);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(seen.last(), Some(&100));
    }
}
