/// Classification for fallback policy.
///
/// Used to determine how the integrator should respond to errors from
/// source adapters.
///
/// # Behavior Summary
///
/// | Class | Continue Fallback Chain? | Surfaced To Caller? |
/// |-------|--------------------------|---------------------|
/// | `Degrade` | Yes (stale cache, then synthetic) | No |
/// | `InvalidInput` | No | Yes, immediately |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FallbackClass {
    /// Provider-side trouble: the request was fine, the source was not.
    ///
    /// The integrator steps down the fallback chain (stale cache entry,
    /// then synthetic offline data) and the caller still receives a
    /// response, tagged with its degraded freshness.
    Degrade,

    /// The request itself cannot be served by this source under any
    /// circumstances. Falling back would mask a caller bug, so the error
    /// is surfaced immediately without trying the chain.
    InvalidInput,
}
