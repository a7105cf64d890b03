use snip_core::{Result, ShortCode, StoreError};
use snip_generator::Generator;
use tracing::{debug, trace, warn};

/// Candidates drawn per insert before a store gives up.
///
/// Large enough that a nearly full 1-byte keyspace still finds its last free
/// code; a full keyspace or a generator that only yields unusable codes fails
/// with [`StoreError::CodeSpaceExhausted`] instead of spinning under the
/// store's guard.
pub const DEFAULT_MAX_CODE_ATTEMPTS: usize = 10_000;

/// Draws up to `max_attempts` candidates until one is path-safe and not taken.
///
/// Callers must hold their store's write guard across this call and the
/// subsequent insert, so that no other writer can claim the same code in
/// between.
pub(crate) fn next_free_code<G, F>(
    generator: &G,
    max_attempts: usize,
    is_taken: F,
) -> Result<ShortCode>
where
    G: Generator + ?Sized,
    F: Fn(&ShortCode) -> bool,
{
    for _ in 0..max_attempts {
        let candidate = generator.generate();
        if !candidate.is_path_safe() {
            trace!(code = %candidate, "discarding short code unsafe for url paths");
            continue;
        }
        if is_taken(&candidate) {
            debug!(code = %candidate, "short code collision, regenerating");
            continue;
        }
        return Ok(candidate);
    }

    warn!(attempts = max_attempts, "gave up looking for a free short code");
    Err(StoreError::CodeSpaceExhausted {
        attempts: max_attempts,
    })
}

/// Draws up to `max_attempts` candidates until one can be used as a URL path
/// segment. Uniqueness is left to the caller.
pub(crate) fn next_safe_code<G: Generator + ?Sized>(
    generator: &G,
    max_attempts: usize,
) -> Result<ShortCode> {
    next_free_code(generator, max_attempts, |_| false)
}
