//! Per-pair price and size quantization.
//!
//! Venues publish trading rules as a pair of bounds per dimension: a
//! significant-digit precision and a fractional-digit floor. The effective
//! quantum at a magnitude `x` is `max(10^(⌈log10 x⌉ − precision),
//! 10^(−decimals))`, and quantization always rounds toward zero so the
//! simulator never invents liquidity or funds.

use rust_decimal::Decimal;

/// Significant digits every raw input is rounded to before quantization,
/// taming float-derived inputs.
const PRE_ROUND_SIG_DIGITS: u32 = 8;

/// Sizes at or below this threshold quantize to zero.
const MIN_SIZE_THRESHOLD_EXP: i32 = -7;

/// Trading-rule bounds for one pair.
///
/// The [`Default`] instance is the fallback used for unknown pairs: a flat
/// `10⁻¹⁰` price quantum and `10⁻⁷` size quantum at any realistic magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuantizationParams {
    /// Significant digits allowed in a price
    pub price_precision: u32,
    /// Maximum fractional digits in a price (quantum floor `10^-decimals`)
    pub price_decimals: u32,
    /// Significant digits allowed in a size
    pub size_precision: u32,
    /// Maximum fractional digits in a size
    pub size_decimals: u32,
}

impl Default for QuantizationParams {
    fn default() -> Self {
        Self {
            price_precision: 18,
            price_decimals: 10,
            size_precision: 18,
            size_decimals: 7,
        }
    }
}

impl QuantizationParams {
    /// Create params with explicit bounds for both dimensions.
    pub fn new(
        price_precision: u32,
        price_decimals: u32,
        size_precision: u32,
        size_decimals: u32,
    ) -> Self {
        Self {
            price_precision,
            price_decimals,
            size_precision,
            size_decimals,
        }
    }

    /// The price quantum in effect at magnitude `price`.
    #[must_use]
    pub fn price_quantum(&self, price: Decimal) -> Decimal {
        quantum_at(price, self.price_precision, self.price_decimals)
    }

    /// The size quantum in effect at magnitude `size`.
    #[must_use]
    pub fn size_quantum(&self, size: Decimal) -> Decimal {
        quantum_at(size, self.size_precision, self.size_decimals)
    }

    /// Quantize a price: pre-round to 8 significant digits, then floor to
    /// the effective quantum. Non-positive inputs quantize to zero, which
    /// submission paths reject.
    #[must_use]
    pub fn quantize_price(&self, price: Decimal) -> Decimal {
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let rounded = round_sig_figs(price, PRE_ROUND_SIG_DIGITS);
        floor_to(rounded, self.price_quantum(rounded))
    }

    /// Quantize a size: zero at or below `10⁻⁷`, otherwise the floored
    /// multiple of the effective quantum.
    #[must_use]
    pub fn quantize_size(&self, size: Decimal) -> Decimal {
        if size <= pow10(MIN_SIZE_THRESHOLD_EXP) {
            return Decimal::ZERO;
        }
        let rounded = round_sig_figs(size, PRE_ROUND_SIG_DIGITS);
        floor_to(rounded, self.size_quantum(rounded))
    }
}

/// `10^exp` as a `Decimal`, with `exp` clamped to the representable range.
#[must_use]
pub fn pow10(exp: i32) -> Decimal {
    let exp = exp.clamp(-28, 28);
    if exp >= 0 {
        Decimal::from_i128_with_scale(10i128.pow(exp as u32), 0)
    } else {
        Decimal::from_i128_with_scale(1, (-exp) as u32)
    }
}

/// `⌈log10 x⌉` for `x > 0`, computed exactly from the decimal mantissa.
fn ceil_log10(x: Decimal) -> i32 {
    debug_assert!(x > Decimal::ZERO);
    let n = x.normalize();
    let mantissa = n.mantissa().unsigned_abs();
    let scale = n.scale() as i32;

    let mut digits = 0i32;
    let mut probe = mantissa;
    let mut leading = 1u128;
    while probe > 0 {
        digits += 1;
        probe /= 10;
        if probe > 0 {
            leading = leading.saturating_mul(10);
        }
    }
    // log10 is an exact integer only when the mantissa is a power of ten
    if mantissa == leading {
        digits - 1 - scale
    } else {
        digits - scale
    }
}

fn quantum_at(x: Decimal, precision: u32, decimals: u32) -> Decimal {
    let floor_quantum = pow10(-(decimals as i32));
    if x <= Decimal::ZERO {
        return floor_quantum;
    }
    let magnitude_quantum = pow10(ceil_log10(x) - precision as i32);
    magnitude_quantum.max(floor_quantum)
}

fn round_sig_figs(x: Decimal, sig: u32) -> Decimal {
    if x.is_zero() {
        return x;
    }
    let q = pow10(ceil_log10(x.abs()) - sig as i32);
    (x / q).round() * q
}

fn floor_to(x: Decimal, quantum: Decimal) -> Decimal {
    if quantum.is_zero() {
        return x;
    }
    (x / quantum).floor() * quantum
}

/// Ceiling counterpart of quantization, used when rounding an ask price away
/// from the spread would give up profitability.
#[must_use]
pub fn ceil_to(x: Decimal, quantum: Decimal) -> Decimal {
    if quantum.is_zero() {
        return x;
    }
    (x / quantum).ceil() * quantum
}
