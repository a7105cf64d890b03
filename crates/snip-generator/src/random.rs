use crate::Generator;
use rand::Rng;
use snip_core::ShortCode;
use typed_builder::TypedBuilder;

/// Generates short codes from random bytes, hex encoded.
///
/// The default of 8 bytes yields 16-character codes. Smaller widths shrink
/// the keyspace (1 byte gives 256 codes), which is how collision handling
/// gets exercised in tests. A width of zero would only ever yield the empty
/// code, so the builder raises it to one byte.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomHexGenerator {
    #[builder(default = 8, setter(transform = |bytes: usize| bytes.max(1)))]
    bytes: usize,
}

impl RandomHexGenerator {
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Number of random bytes per code.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Default for RandomHexGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomHexGenerator {
    fn generate(&self) -> ShortCode {
        let mut buf = vec![0_u8; self.bytes];
        rand::thread_rng().fill(buf.as_mut_slice());
        ShortCode::new(hex::encode(buf))
    }
}
