pub mod random;
pub mod scripted;

pub use random::RandomHexGenerator;
pub use scripted::ScriptedGenerator;

use snip_core::ShortCode;

/// Trait for generating candidate short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Candidates are not required to be unique: stores check each one under
/// their own guard and ask for another on collision.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> ShortCode;
}

impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    fn generate(&self) -> ShortCode {
        (**self).generate()
    }
}
