use std::panic::{AssertUnwindSafe, catch_unwind};

use http::{HeaderMap, StatusCode};
use log::{debug, warn};

use crate::descriptor::RequestDescriptor;

/// Hooks run around every request sent through a proxy. Failures are logged
/// and never abort the request.
pub trait Observer: Send + Sync {
    fn on_request(&self, request: &RequestDescriptor) -> anyhow::Result<()> {
        let _ = request;
        Ok(())
    }

    fn on_response(&self, url: &str, status: StatusCode, headers: &HeaderMap) -> anyhow::Result<()> {
        let _ = (url, status, headers);
        Ok(())
    }
}

/// Logs each exchange at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_request(&self, request: &RequestDescriptor) -> anyhow::Result<()> {
        debug!("--> {} {}", request.method, request.url);
        for (name, value) in request.headers.iter() {
            debug!("    {name}: {value}");
        }
        Ok(())
    }

    fn on_response(&self, url: &str, status: StatusCode, _headers: &HeaderMap) -> anyhow::Result<()> {
        debug!("<-- {status} {url}");
        Ok(())
    }
}

/// Runs `hook` for every observer, swallowing errors and panics.
pub(crate) fn notify<O, F>(observers: &[O], hook: F)
where
    O: AsRef<dyn Observer>,
    F: Fn(&dyn Observer) -> anyhow::Result<()>,
{
    for observer in observers {
        match catch_unwind(AssertUnwindSafe(|| hook(observer.as_ref()))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("observer failed: {e:#}"),
            Err(_) => warn!("observer panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use anyhow::bail;
    use http::Method;
    use test_log::test;

    use super::*;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl Observer for Counting {
        fn on_request(&self, _: &RequestDescriptor) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl Observer for Failing {
        fn on_request(&self, _: &RequestDescriptor) -> anyhow::Result<()> {
            bail!("refused")
        }
    }

    struct Panicking;

    impl Observer for Panicking {
        fn on_request(&self, _: &RequestDescriptor) -> anyhow::Result<()> {
            panic!("boom")
        }
    }

    #[test]
    fn failures_do_not_stop_later_observers() {
        let counting = Arc::new(Counting::default());
        let observers: Vec<Arc<dyn Observer>> = vec![
            Arc::new(Failing),
            Arc::new(Panicking),
            counting.clone(),
            Arc::new(LogObserver),
        ];
        let request = RequestDescriptor::new(Method::GET, "/a");
        notify(&observers, |o| o.on_request(&request));
        notify(&observers, |o| o.on_response("/a", StatusCode::OK, &HeaderMap::new()));
        assert_eq!(1, counting.0.load(Ordering::SeqCst));
    }
}
