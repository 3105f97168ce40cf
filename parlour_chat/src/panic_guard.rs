//! Containing panics to the session that caused them.

use futures::FutureExt;

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Once;

const BACKTRACE_LINES: usize = 40;

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = RefCell::new(None);
}

static INSTALL_HOOK: Once = Once::new();

/// A panic caught by [`guard`].
#[derive(Debug, Clone)]
pub struct PanicReport {
    pub message: String,
    pub backtrace: Option<String>,
}

/// Install a panic hook that records a backtrace for the panicking thread
/// before deferring to the previously installed hook. Idempotent.
pub fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            let trace: Vec<&str> = trace.lines().take(BACKTRACE_LINES).collect();
            LAST_BACKTRACE.with(|last| *last.borrow_mut() = Some(trace.join("\n")));
            previous(info);
        }));
    });
}

fn take_backtrace() -> Option<String> {
    LAST_BACKTRACE.with(|last| last.borrow_mut().take())
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Poll `future` to completion, converting a panic inside it into a
/// [`PanicReport`].
pub async fn guard<F: Future>(future: F) -> Result<F::Output, PanicReport> {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(output) => Ok(output),
        Err(payload) => Err(PanicReport {
            message: payload_message(&*payload),
            backtrace: take_backtrace(),
        }),
    }
}
