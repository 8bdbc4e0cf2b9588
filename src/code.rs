// SPDX-License-Identifier: MIT OR Apache-2.0

//! Possession codes, the only credential needed to edit or delete a registration.
//!
//! Codes are short strings of uppercase letters and digits. They are meant to be read out and
//! typed in by people, they are not secret-grade tokens. Generators have no knowledge of the store,
//! checking a fresh code against live registrations is up to the caller.
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use rand_chacha::rand_core::{SeedableRng, TryRngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::DEFAULT_CODE_LENGTH;

/// Characters a possession code is drawn from.
pub const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Largest multiple of the alphabet size fitting into a byte, anything above is resampled to
/// avoid modulo bias.
const SAMPLE_LIMIT: u8 = (u8::MAX / CODE_ALPHABET.len() as u8) * CODE_ALPHABET.len() as u8;

/// Short credential proving the right to edit or delete one registration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PossessionCode(String);

impl PossessionCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PossessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PossessionCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parses user input, ignoring surrounding whitespace and letter case.
impl FromStr for PossessionCode {
    type Err = CodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let code = value.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(CodeError::Empty);
        }
        if !code.bytes().all(|byte| CODE_ALPHABET.contains(&byte)) {
            return Err(CodeError::InvalidCharacter(value.to_owned()));
        }
        Ok(Self(code))
    }
}

impl TryFrom<String> for PossessionCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PossessionCode> for String {
    fn from(value: PossessionCode) -> Self {
        value.0
    }
}

/// Source of fresh possession codes.
pub trait CodeGenerator {
    fn generate(&self) -> Result<PossessionCode, CodeError>;
}

/// Generates uniformly distributed codes with a ChaCha random number generator.
#[derive(Debug)]
pub struct RandomCodeGenerator {
    rng: Mutex<rand_chacha::ChaCha20Rng>,
    length: usize,
}

impl RandomCodeGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            rng: Mutex::new(rand_chacha::ChaCha20Rng::from_os_rng()),
            length,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl RandomCodeGenerator {
    pub fn from_seed(seed: [u8; 32], length: usize) -> Self {
        Self {
            rng: Mutex::new(rand_chacha::ChaCha20Rng::from_seed(seed)),
            length,
        }
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> Result<PossessionCode, CodeError> {
        if self.length == 0 {
            return Err(CodeError::ZeroLength);
        }

        let mut rng = self.rng.lock().map_err(|_| CodeError::LockPoisoned)?;
        let mut code = String::with_capacity(self.length);
        let mut buffer = [0u8; 32];

        while code.len() < self.length {
            rng.try_fill_bytes(&mut buffer)
                .map_err(|_| CodeError::NotEnoughRandomness)?;
            for byte in buffer {
                if byte >= SAMPLE_LIMIT {
                    continue;
                }
                code.push(CODE_ALPHABET[(byte as usize) % CODE_ALPHABET.len()] as char);
                if code.len() == self.length {
                    break;
                }
            }
        }

        Ok(PossessionCode(code))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeError {
    #[error("possession code is empty")]
    Empty,

    #[error("possession code \"{0}\" contains characters other than letters and digits")]
    InvalidCharacter(String),

    #[error("possession code length must be at least one character")]
    ZeroLength,

    #[error("could not find an unused possession code after {0} attempts")]
    Exhausted(usize),

    #[error("rng lock is poisoned")]
    LockPoisoned,

    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,
}

#[cfg(test)]
mod tests {
    use super::{CODE_ALPHABET, CodeError, CodeGenerator, PossessionCode, RandomCodeGenerator};

    #[test]
    fn generated_codes_use_alphabet() {
        let generator = RandomCodeGenerator::from_seed([7; 32], 6);
        for _ in 0..100 {
            let code = generator.generate().unwrap();
            assert_eq!(code.as_str().len(), 6);
            assert!(code.as_str().bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn deterministic_codes() {
        let code_1 = RandomCodeGenerator::from_seed([1; 32], 8).generate().unwrap();
        let code_2 = RandomCodeGenerator::from_seed([1; 32], 8).generate().unwrap();
        assert_eq!(code_1, code_2);
    }

    #[test]
    fn configurable_length() {
        let generator = RandomCodeGenerator::from_seed([2; 32], 10);
        assert_eq!(generator.generate().unwrap().as_str().len(), 10);

        let generator = RandomCodeGenerator::from_seed([2; 32], 0);
        assert_eq!(generator.generate(), Err(CodeError::ZeroLength));
    }

    #[test]
    fn parse_user_input() {
        let code: PossessionCode = " k3f9qz ".parse().unwrap();
        assert_eq!(code.as_str(), "K3F9QZ");

        assert_eq!("".parse::<PossessionCode>(), Err(CodeError::Empty));
        assert_eq!(
            "AB-12".parse::<PossessionCode>(),
            Err(CodeError::InvalidCharacter("AB-12".into()))
        );
    }

    #[test]
    fn serde_as_plain_string() {
        let code: PossessionCode = "ABC123".parse().unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"ABC123\"");
        let code_again: PossessionCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, code_again);
    }
}
