//! Conversion of raw aggregator answers into decimal price strings.
//!
//! Answers are `int256` values scaled by `10^decimals`. Rendering works on the
//! integer's decimal digits directly so no precision is lost for any scale.

use web3::types::U256;

/// A single observed answer together with the scale needed to display it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceUpdate {
    pub negative: bool,
    pub magnitude: U256,
    pub decimals: u8,
}

impl PriceUpdate {
    /// Builds an update from the raw two's complement `int256` word of an event.
    pub fn from_int256(word: U256, decimals: u8) -> Self {
        if word.bit(255) {
            let (magnitude, _) = (!word).overflowing_add(U256::one());
            Self {
                negative: true,
                magnitude,
                decimals,
            }
        } else {
            Self {
                negative: false,
                magnitude: word,
                decimals,
            }
        }
    }

    pub fn render(&self) -> String {
        let unsigned = render(self.magnitude, self.decimals);
        if self.negative && !self.magnitude.is_zero() {
            format!("-{unsigned}")
        } else {
            unsigned
        }
    }
}

/// Renders `raw / 10^decimals` with exactly `decimals` fractional digits.
pub fn render(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let scale = usize::from(decimals);
    if scale == 0 {
        return digits;
    }

    let padded = if digits.len() <= scale {
        format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (whole, fraction) = padded.split_at(padded.len() - scale);
    format!("{whole}.{fraction}")
}
