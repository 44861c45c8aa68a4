use rand::Rng;
use serde::{Deserialize, Serialize};

const DIGITS: &[u8] = b"0123456789";
// No 0/O or 1/I/L, so codes survive being read aloud or retyped.
const ALPHANUMERIC: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeAlphabet {
    Numeric,
    Alphanumeric,
}

impl CodeAlphabet {
    fn symbols(&self) -> &'static [u8] {
        match self {
            CodeAlphabet::Numeric => DIGITS,
            CodeAlphabet::Alphanumeric => ALPHANUMERIC,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodeGenerator {
    alphabet: CodeAlphabet,
    length: usize,
}

impl CodeGenerator {
    pub fn new(alphabet: CodeAlphabet, length: usize) -> Self {
        Self {
            alphabet,
            length: length.max(1),
        }
    }

    pub fn generate(&self) -> String {
        let symbols = self.alphabet.symbols();
        let mut rng = rand::rng();

        (0..self.length)
            .map(|_| symbols[rng.random_range(0..symbols.len())] as char)
            .collect()
    }

    /// Number of distinct codes, saturating at `u64::MAX`.
    pub fn capacity(&self) -> u64 {
        let base = self.alphabet.symbols().len() as u64;
        u32::try_from(self.length)
            .ok()
            .and_then(|exp| base.checked_pow(exp))
            .unwrap_or(u64::MAX)
    }

    /// Cheap shape check so obviously malformed codes never touch the registry.
    pub fn is_well_formed(&self, code: &str) -> bool {
        let symbols = self.alphabet.symbols();
        code.len() == self.length && code.bytes().all(|b| symbols.contains(&b))
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(CodeAlphabet::Numeric, 6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_codes() {
        let generator = CodeGenerator::new(CodeAlphabet::Numeric, 6);
        for _ in 0..200 {
            let code = generator.generate();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert!(generator.is_well_formed(&code));
        }
    }

    #[test]
    fn test_alphanumeric_codes() {
        let generator = CodeGenerator::new(CodeAlphabet::Alphanumeric, 8);
        for _ in 0..200 {
            let code = generator.generate();
            assert_eq!(code.len(), 8);
            assert!(!code.contains('0'));
            assert!(!code.contains('O'));
            assert!(generator.is_well_formed(&code));
        }
    }

    #[test]
    fn test_capacity() {
        assert_eq!(CodeGenerator::new(CodeAlphabet::Numeric, 6).capacity(), 1_000_000);
        assert_eq!(CodeGenerator::new(CodeAlphabet::Numeric, 1).capacity(), 10);
        assert_eq!(CodeGenerator::new(CodeAlphabet::Alphanumeric, 2).capacity(), 31 * 31);
        assert_eq!(CodeGenerator::new(CodeAlphabet::Numeric, 40).capacity(), u64::MAX);
    }

    #[test]
    fn test_well_formed() {
        let generator = CodeGenerator::default();
        assert!(generator.is_well_formed("004217"));
        assert!(!generator.is_well_formed("12345"));
        assert!(!generator.is_well_formed("12345a"));
        assert!(!generator.is_well_formed("../etc"));
        assert!(!generator.is_well_formed(""));
    }
}
