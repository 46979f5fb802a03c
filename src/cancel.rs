use crate::config::INTERRUPTED_EXIT_CODE;
use crate::error::ReadError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Shared flag telling readers and decode workers to stop.
#[derive(Clone, Default, Debug)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cancels `token` on the first Ctrl-C and exits the process on the second. Listens on
/// a dedicated thread so the counting pass itself stays synchronous.
pub fn cancel_on_interrupt(token: CancelToken) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("propsuggest-interrupt".to_string())
        .spawn(move || {
            if runtime.block_on(watch_interrupts(token, tokio::signal::ctrl_c)) {
                std::process::exit(i32::from(INTERRUPTED_EXIT_CODE));
            }
        })?;

    Ok(())
}

/// Cancels `token` on the first interrupt from `next_interrupt`. Returns true once a
/// second interrupt arrives, false if the listener fails first.
async fn watch_interrupts<F, Fut>(token: CancelToken, mut next_interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_interrupt().await {
        debug!(error = %e, "Interrupt listener unavailable");
        return false;
    }
    warn!("Interrupt received, stopping readers (press Ctrl-C again to exit now)");
    token.cancel();

    match next_interrupt().await {
        Ok(()) => {
            warn!("Second interrupt received, exiting");
            true
        }
        Err(e) => {
            debug!(error = %e, "Interrupt listener unavailable");
            false
        }
    }
}

/// Ends a serial entity stream with [`ReadError::Cancelled`] once the token is set.
pub struct Cancellable<I> {
    inner: I,
    token: CancelToken,
    done: bool,
}

impl<I> Cancellable<I> {
    pub fn new(inner: I, token: CancelToken) -> Self {
        Self {
            inner,
            token,
            done: false,
        }
    }
}

impl<I, T> Iterator for Cancellable<I>
where
    I: Iterator<Item = Result<T, ReadError>>,
{
    type Item = Result<T, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.token.is_cancelled() {
            self.done = true;
            return Some(Err(ReadError::Cancelled));
        }
        let item = self.inner.next();
        if matches!(item, None | Some(Err(_))) {
            self.done = true;
        }
        item
    }
}
