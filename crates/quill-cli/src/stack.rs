//! Stack growth for the recursive evaluator.
//!
//! Program recursion maps onto native recursion, so deep (but legal) Quill
//! call chains would otherwise exhaust a default thread stack long before
//! `MAX_CALL_DEPTH` is reached.

/// Grow the stack when less than this remains (100KB).
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first moving to a fresh stack segment if the current one is
/// nearly exhausted.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
