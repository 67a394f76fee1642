//! Process-wide Tokio runtime backing the blocking API.

use crate::error::{Result, TuyaError};
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Runtime};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// The shared runtime, built on first use.
pub fn get() -> Result<&'static Runtime> {
    if let Some(rt) = RUNTIME.get() {
        return Ok(rt);
    }
    let rt = Builder::new_multi_thread()
        .enable_all()
        .thread_name("tuya-scale")
        .build()
        .map_err(TuyaError::from)?;
    // Another thread may have won the race; its runtime is kept and ours dropped.
    Ok(RUNTIME.get_or_init(|| rt))
}

/// Run `future` to completion on the shared runtime.
///
/// Must not be called from inside an async context.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    Ok(get()?.block_on(future))
}
