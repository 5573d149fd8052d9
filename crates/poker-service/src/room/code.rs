//! Room code generation.
//!
//! Codes are short uppercase base-36 strings drawn from a CSPRNG. The store
//! takes the source as a trait object so tests can force collisions.

use crate::errors::PokerError;
use common::types::RoomId;
use ring::rand::{SecureRandom, SystemRandom};

/// Uppercase alphanumeric alphabet for room codes.
const ROOM_CODE_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random bytes drawn per code. 128 bits covers 12 base-36 digits
/// (about 62 bits) with negligible modulo bias.
const ROOM_CODE_RANDOM_BYTES: usize = 16;

/// Supplier of candidate room codes.
pub trait RoomCodeSource: Send {
    /// Produce the next candidate. The store checks uniqueness.
    ///
    /// # Errors
    ///
    /// Returns `PokerError::Internal` if no code can be produced.
    fn next_code(&mut self) -> Result<RoomId, PokerError>;
}

/// CSPRNG-backed codes of a fixed length.
pub struct RandomRoomCodes {
    rng: SystemRandom,
    length: usize,
}

impl RandomRoomCodes {
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self {
            rng: SystemRandom::new(),
            length,
        }
    }
}

impl RoomCodeSource for RandomRoomCodes {
    fn next_code(&mut self) -> Result<RoomId, PokerError> {
        let mut bytes = [0u8; ROOM_CODE_RANDOM_BYTES];
        self.rng.fill(&mut bytes).map_err(|e| {
            tracing::error!(target: "poker.room.code", error = %e, "Failed to generate random bytes for room code");
            PokerError::Internal("RNG failure".to_string())
        })?;

        let mut value = u128::from_be_bytes(bytes);
        let base = ROOM_CODE_ALPHABET.len() as u128;

        let mut code = Vec::with_capacity(self.length);
        for _ in 0..self.length {
            #[allow(clippy::cast_possible_truncation)]
            let idx = (value % base) as usize;
            let ch = ROOM_CODE_ALPHABET
                .get(idx)
                .ok_or_else(|| PokerError::Internal("Room code index out of range".to_string()))?;
            code.push(*ch);
            value /= base;
        }
        code.reverse();

        let code = String::from_utf8(code)
            .map_err(|_| PokerError::Internal("Room code contained invalid UTF-8".to_string()))?;
        Ok(RoomId::new(code))
    }
}

/// Replays a fixed list of codes, then fails. Test-only.
#[cfg(test)]
pub(crate) struct ScriptedRoomCodes {
    codes: std::collections::VecDeque<String>,
}

#[cfg(test)]
impl ScriptedRoomCodes {
    pub(crate) fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
impl RoomCodeSource for ScriptedRoomCodes {
    fn next_code(&mut self) -> Result<RoomId, PokerError> {
        self.codes
            .pop_front()
            .map(RoomId::new)
            .ok_or_else(|| PokerError::Internal("scripted codes exhausted".to_string()))
    }
}
