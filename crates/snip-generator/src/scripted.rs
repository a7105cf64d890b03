use crate::Generator;
use parking_lot::Mutex;
use snip_core::ShortCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replays a fixed list of codes, then falls back to a counter.
///
/// Used to drive stores through known collisions and unsafe candidates.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<ShortCode>>,
    fallback: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new<I, C>(codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ShortCode>,
    {
        Self {
            script: Mutex::new(codes.into_iter().map(Into::into).collect()),
            fallback: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many candidates have been handed out so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self) -> ShortCode {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = self.script.lock().pop_front() {
            return code;
        }
        let n = self.fallback.fetch_add(1, Ordering::SeqCst);
        ShortCode::new(format!("seq{:06}", n))
    }
}
