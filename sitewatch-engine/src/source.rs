//! The remote fetch boundary.

use async_trait::async_trait;
use sitewatch_types::RawRecord;

use crate::error::FetchError;

/// Something that can fetch the current list of raw records.
///
/// Implementations should be side-effect free from the engine's point of
/// view: the engine may call `fetch` again after a failure, and it wraps
/// every call in its own timeout.
#[async_trait]
pub trait RecordSource: Send + Sync + std::fmt::Debug {
    /// Fetch the current records.
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError>;

    /// Short description for logs (e.g. the endpoint URL).
    fn description(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    /// A source that replays scripted responses, repeating the last one.
    #[derive(Debug, Default)]
    pub struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<RawRecord>, FetchError>>>,
        last: Mutex<Option<Result<Vec<RawRecord>, FetchError>>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub fn new(script: Vec<Result<Vec<RawRecord>, FetchError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecordSource for ScriptedSource {
        async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().pop_front();
            match next {
                Some(response) => {
                    *self.last.lock() = Some(response.clone());
                    response
                }
                None => self.last.lock().clone().unwrap_or_else(|| Ok(Vec::new())),
            }
        }

        fn description(&self) -> &str {
            "scripted"
        }
    }
}
