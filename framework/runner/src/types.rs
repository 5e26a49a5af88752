/// Recommended error type for the harness and for code that plugs a new suite or runner into it.
/// Typed errors from `query_harness_core` convert into it, so `?` works throughout.
pub type HarnessResult<T> = anyhow::Result<T>;
