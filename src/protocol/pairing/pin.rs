//! PIN handling

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::rngs::OsRng;
use zeroize::Zeroize;

/// Number of digits in a pairing PIN
pub const PIN_LENGTH: usize = 4;

/// Error returned for a malformed PIN
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("PIN must be exactly {PIN_LENGTH} decimal digits")]
pub struct InvalidPin;

/// A four-digit pairing PIN
///
/// The value is shown to the user on one device and typed on the other. It
/// never appears in `Debug` output and is wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    /// Validate a caller-supplied PIN
    ///
    /// # Errors
    ///
    /// Returns `InvalidPin` unless the input is exactly four ASCII digits.
    pub fn new(pin: impl Into<String>) -> Result<Self, InvalidPin> {
        let pin = pin.into();
        if pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(pin))
        } else {
            Err(InvalidPin)
        }
    }

    /// Generate a random PIN
    #[must_use]
    pub fn generate() -> Self {
        Self(generate_pin())
    }

    /// The digits, for display to the user
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digits as UTF-8 bytes, the form mixed into the session key
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for Pin {
    type Err = InvalidPin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(****)")
    }
}

impl Drop for Pin {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Generate a random four-digit PIN string, zero-padded
#[must_use]
pub fn generate_pin() -> String {
    let value: u16 = OsRng.gen_range(0..10_000);
    format!("{value:04}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_accepts_four_digits() {
        assert_eq!(Pin::new("0042").unwrap().as_str(), "0042");
        assert!("9999".parse::<Pin>().is_ok());
    }

    #[test]
    fn test_pin_rejects_malformed() {
        for bad in ["", "123", "12345", "12a4", " 123", "١٢٣٤"] {
            assert_eq!(Pin::new(bad), Err(InvalidPin), "{bad:?}");
        }
    }

    #[test]
    fn test_generated_pins_are_valid() {
        for _ in 0..200 {
            let pin = generate_pin();
            assert!(Pin::new(pin.clone()).is_ok(), "{pin}");
        }
    }

    #[test]
    fn test_pin_debug_is_redacted() {
        let pin = Pin::new("1234").unwrap();
        assert_eq!(format!("{pin:?}"), "Pin(****)");
    }
}
