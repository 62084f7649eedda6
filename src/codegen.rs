use rand::Rng;

/// Case-sensitive alphanumeric alphabet used for short codes.
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Source of uniform random indices for code generation.
///
/// Injected into the engine so tests can use a seeded generator instead of
/// the thread-local one.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..upper`.
    fn index(&self, upper: usize) -> usize;
}

/// Thread-local OS-seeded generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn index(&self, upper: usize) -> usize {
        rand::rng().random_range(0..upper)
    }
}

/// Produces random candidate codes. Uniqueness is up to the caller.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    alphabet: Vec<u8>,
    length: usize,
}

impl CodeGenerator {
    pub fn new(length: usize) -> Self {
        Self::with_alphabet(ALPHABET, length)
    }

    /// `alphabet` must be non-empty ASCII and `length` non-zero.
    pub fn with_alphabet(alphabet: &[u8], length: usize) -> Self {
        assert!(!alphabet.is_empty() && alphabet.is_ascii(), "invalid alphabet");
        assert!(length > 0, "code length must be positive");

        Self {
            alphabet: alphabet.to_vec(),
            length,
        }
    }

    /// Number of distinct codes this generator can produce.
    pub fn space_size(&self) -> f64 {
        (self.alphabet.len() as f64).powi(self.length as i32)
    }

    pub fn generate(&self, random: &dyn RandomSource) -> String {
        (0..self.length)
            .map(|_| self.alphabet[random.index(self.alphabet.len())] as char)
            .collect()
    }
}

#[cfg(test)]
pub mod testing {
    use super::RandomSource;
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use std::sync::Mutex;

    /// Deterministic source for reproducible tests.
    pub struct SeededRandom(Mutex<StdRng>);

    impl SeededRandom {
        pub fn new(seed: u64) -> Self {
            Self(Mutex::new(StdRng::seed_from_u64(seed)))
        }
    }

    impl RandomSource for SeededRandom {
        fn index(&self, upper: usize) -> usize {
            self.0.lock().unwrap().random_range(0..upper)
        }
    }

    /// Replays a fixed sequence of indices, wrapping around at the end.
    pub struct ScriptedRandom {
        indices: Vec<usize>,
        pos: Mutex<usize>,
    }

    impl ScriptedRandom {
        pub fn new(indices: Vec<usize>) -> Self {
            Self {
                indices,
                pos: Mutex::new(0),
            }
        }
    }

    impl RandomSource for ScriptedRandom {
        fn index(&self, upper: usize) -> usize {
            let mut pos = self.pos.lock().unwrap();
            let idx = self.indices[*pos % self.indices.len()];
            *pos += 1;
            idx % upper
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ScriptedRandom, SeededRandom};
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_alphabet_is_62_unique_alphanumerics() {
        assert_eq!(ALPHABET.len(), 62);
        assert!(ALPHABET.iter().all(u8::is_ascii_alphanumeric));

        let unique: HashSet<_> = ALPHABET.iter().collect();
        assert_eq!(unique.len(), ALPHABET.len());
    }

    #[test]
    fn test_default_generator_shape() {
        let generator = CodeGenerator::new(DEFAULT_CODE_LENGTH);
        let code = generator.generate(&ThreadRandom);

        assert_eq!(code.len(), 6);
        assert!(code.bytes().all(|c| ALPHABET.contains(&c)));
        assert!(generator.space_size() > 5.6e10);
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let generator = CodeGenerator::new(8);

        let a: Vec<_> = {
            let random = SeededRandom::new(42);
            (0..5).map(|_| generator.generate(&random)).collect()
        };
        let b: Vec<_> = {
            let random = SeededRandom::new(42);
            (0..5).map(|_| generator.generate(&random)).collect()
        };

        assert_eq!(a, b);
    }

    #[test]
    fn test_scripted_indices_map_onto_alphabet() {
        let generator = CodeGenerator::new(3);
        let random = ScriptedRandom::new(vec![0, 26, 61]);

        assert_eq!(generator.generate(&random), "aA9");
    }

    #[test]
    fn test_tiny_space() {
        let generator = CodeGenerator::with_alphabet(b"ab", 1);
        let random = SeededRandom::new(7);

        let seen: HashSet<_> = (0..64).map(|_| generator.generate(&random)).collect();

        assert_eq!(generator.space_size(), 2.0);
        assert_eq!(seen, HashSet::from(["a".to_string(), "b".to_string()]));
    }
}
