//! Bridge between the synchronous worker threads and the async object store.
//!
//! Workers are plain threads; `object_store` is async. When a tokio runtime
//! is already ambient the future is driven on it from a scoped helper thread
//! (block_on on a runtime thread panics); otherwise a shared current-thread
//! runtime owned by this module drives it.

use crate::error::{Result, StoreError};
use once_cell::sync::Lazy;
use std::future::Future;
use tokio::runtime::Runtime;

static FALLBACK_RUNTIME: Lazy<std::result::Result<Runtime, String>> = Lazy::new(|| {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to create runtime: {e}"))
});

/// Drive `fut` to completion from synchronous code.
pub(crate) fn block_on<F, T>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send,
    T: Send,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        std::thread::scope(|s| {
            s.spawn(|| handle.block_on(fut))
                .join()
                .map_err(|_| StoreError::Other("storage thread panicked".into()))?
        })
    } else {
        let rt = FALLBACK_RUNTIME
            .as_ref()
            .map_err(|e| StoreError::Other(e.clone()))?;
        rt.block_on(fut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_without_ambient_runtime() {
        let value = block_on(async { Ok(7) }).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_block_on_inside_runtime() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let value = rt
            .block_on(async { tokio::task::spawn_blocking(|| block_on(async { Ok(9) })).await })
            .unwrap()
            .unwrap();
        assert_eq!(value, 9);
    }
}
