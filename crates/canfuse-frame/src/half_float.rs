//! Vendor 16-bit float used by the IMU.
//!
//! Layout is sign(1):exponent(5):mantissa(10) with exponent bias 15, but it
//! is *not* IEEE binary16: there are no subnormals, infinities or NaNs. Every
//! non-zero pattern is rebiased straight into a binary32 exponent, so an
//! all-zero exponent field means 2^-15 rather than a subnormal, and an
//! all-ones field is an ordinary (large) number.

/// Exponent bias of the packed 5-bit exponent.
const HALF_BIAS: u32 = 15;

/// Exponent bias of an IEEE-754 binary32 exponent.
const SINGLE_BIAS: u32 = 127;

/// Decode one packed half-float into an `f32`.
///
/// `0x0000` decodes to exactly `0.0`. Everything else goes through the bit
/// rebias, including `0x8000`, which decodes to `-2^-15`.
pub fn decode(raw: u16) -> f32 {
    if raw == 0 {
        return 0.0;
    }
    let raw = u32::from(raw);
    let sign = (raw & 0x8000) << 16;
    let exponent = ((((raw >> 10) & 0x1F) + SINGLE_BIAS - HALF_BIAS) & 0xFF) << 23;
    let mantissa = (raw & 0x03FF) << 13;
    f32::from_bits(sign | exponent | mantissa)
}

/// Decode an 8-byte payload as four big-endian packed half-floats.
pub fn decode_payload(data: &[u8; 8]) -> [f32; 4] {
    let mut values = [0.0f32; 4];
    for (value, pair) in values.iter_mut().zip(data.chunks_exact(2)) {
        *value = decode(u16::from_be_bytes([pair[0], pair[1]]));
    }
    values
}

/// Encode an `f32` into the packed format, truncating the mantissa.
///
/// Exponents outside the representable range saturate at the nearest end of
/// the 5-bit field. `0.0` and `-0.0` both encode to `0x0000`.
pub fn encode(value: f32) -> u16 {
    if value == 0.0 {
        return 0;
    }
    let bits = value.to_bits();
    let sign = (bits >> 16) & 0x8000;
    let exponent = ((bits >> 23) & 0xFF) as i32 - SINGLE_BIAS as i32 + HALF_BIAS as i32;
    let exponent = exponent.clamp(0, 0x1F) as u32;
    let mantissa = (bits >> 13) & 0x03FF;
    (sign | (exponent << 10) | mantissa) as u16
}

/// Encode four values into an 8-byte big-endian payload.
pub fn encode_payload(values: [f32; 4]) -> [u8; 8] {
    let mut data = [0u8; 8];
    for (pair, value) in data.chunks_exact_mut(2).zip(values) {
        pair.copy_from_slice(&encode(value).to_be_bytes());
    }
    data
}
