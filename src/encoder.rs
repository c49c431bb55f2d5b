//! Fixed-divisor feature encoding shared by training and prediction.
//!
//! Every coercion from raw cell text to a number lives here. The min/max scaling in
//! [`crate::normalize`] is a separate display-only scheme and is never applied to network inputs.

use serde::{Deserialize, Serialize};

use crate::{error::EncodeError, record::RawRecord};

pub const TOTAL_SQFT: &str = "total_sqft";
pub const SIZE: &str = "size";
pub const BATH: &str = "bath";
pub const BALCONY: &str = "balcony";
pub const AGE: &str = "age";
pub const PRICE: &str = "price";

pub const INPUT_SIZE: usize = 5;
pub const OUTPUT_SIZE: usize = 1;

const SQFT_SCALE: f64 = 5000.0;
const BEDROOMS_SCALE: f64 = 5.0;
const BATH_SCALE: f64 = 5.0;
const BALCONY_SCALE: f64 = 5.0;
const AGE_SCALE: f64 = 50.0;
const PRICE_SCALE: f64 = 1_000_000.0;

/// The typed predictors of one record, before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HouseFeatures {
    pub total_sqft: f64,
    pub bedrooms: u32,
    pub bath: f64,
    pub balcony: f64,
    pub age: u32,
}

impl HouseFeatures {
    /// Reads the predictors out of `record`.
    ///
    /// # Arguments
    /// * `record` - A raw record, `price` isn't required.
    ///
    /// # Returns
    /// The features or the first field that couldn't be read.
    pub fn from_record(record: &RawRecord) -> Result<Self, EncodeError> {
        Ok(Self {
            total_sqft: number(record, TOTAL_SQFT)?,
            bedrooms: bedrooms(record)?,
            bath: number(record, BATH)?,
            balcony: number(record, BALCONY)?,
            age: age(record),
        })
    }

    /// Scales the features into the network's input vector.
    ///
    /// The order is `[total_sqft, bedrooms, bath, balcony, age]`.
    pub fn to_input(&self) -> [f32; INPUT_SIZE] {
        [
            (self.total_sqft / SQFT_SCALE) as f32,
            (self.bedrooms as f64 / BEDROOMS_SCALE) as f32,
            (self.bath / BATH_SCALE) as f32,
            (self.balcony / BALCONY_SCALE) as f32,
            (self.age as f64 / AGE_SCALE) as f32,
        ]
    }
}

/// Encodes the predictors of `record` into the network's input vector.
pub fn encode_input(record: &RawRecord) -> Result<[f32; INPUT_SIZE], EncodeError> {
    HouseFeatures::from_record(record).map(|features| features.to_input())
}

/// Encodes the target of `record` into the network's output vector.
pub fn encode_output(record: &RawRecord) -> Result<[f32; OUTPUT_SIZE], EncodeError> {
    price(record).map(scale_price)
}

/// Reads the raw `price` of `record`.
pub fn price(record: &RawRecord) -> Result<f64, EncodeError> {
    number(record, PRICE)
}

pub fn scale_price(price: f64) -> [f32; OUTPUT_SIZE] {
    [(price / PRICE_SCALE) as f32]
}

/// Inverse of `encode_output`'s scaling.
pub fn decode_output(output: [f32; OUTPUT_SIZE]) -> f64 {
    output[0] as f64 * PRICE_SCALE
}

fn number(record: &RawRecord, field: &'static str) -> Result<f64, EncodeError> {
    let raw = record.get(field).ok_or(EncodeError::MissingField(field))?;

    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(EncodeError::NotANumber {
            field,
            value: raw.to_string(),
        }),
    }
}

/// The bedroom count is the integer `size` starts with, as in "2 BHK" or "2BHK".
fn bedrooms(record: &RawRecord) -> Result<u32, EncodeError> {
    let raw = record.get(SIZE).ok_or(EncodeError::MissingField(SIZE))?;

    leading_int(raw)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| EncodeError::InvalidSize(raw.to_string()))
}

/// The integer `age` starts with, so "10.5" is 10. Missing, unreadable or negative ages are 0.
fn age(record: &RawRecord) -> u32 {
    record
        .get(AGE)
        .and_then(leading_int)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

/// Reads an optionally signed run of digits at the start of `text`, ignoring what follows.
fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let n: i64 = digits[..end].parse().ok()?;

    Some(if negative { -n } else { n })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn house() -> RawRecord {
        RawRecord::new()
            .with(TOTAL_SQFT, "1000")
            .with(BATH, "2")
            .with(BALCONY, "1")
            .with(PRICE, "50")
            .with(SIZE, "2 BHK")
            .with(AGE, "10")
    }

    #[test]
    fn encodes_with_the_fixed_divisors() {
        let record = house();

        assert_eq!(encode_input(&record).unwrap(), [0.2, 0.4, 0.4, 0.2, 0.2]);
        assert_eq!(encode_output(&record).unwrap(), [0.00005]);

        let price = decode_output(encode_output(&record).unwrap());
        assert!((price - 50.0).abs() < 1e-4, "{price}");
    }

    #[test]
    fn price_round_trips_within_f32_precision() {
        for price in [0.0, 8.0, 39.07, 120.5, 2_912.0, 750_000.0] {
            let decoded = decode_output(scale_price(price));
            assert!((decoded - price).abs() <= price * 1e-6 + 1e-9, "{price} -> {decoded}");
        }
    }

    #[test]
    fn age_defaults_to_zero() {
        let mut record = house();
        record.insert(AGE, "unknown");
        assert_eq!(encode_input(&record).unwrap()[4], 0.0);

        let record: RawRecord = house().iter().filter(|(k, _)| *k != AGE).collect();
        assert_eq!(encode_input(&record).unwrap()[4], 0.0);
    }

    #[test]
    fn bedrooms_come_from_the_leading_token() {
        let record = house().with(SIZE, "4 Bedroom");
        assert_eq!(encode_input(&record).unwrap()[1], 0.8);

        let record = house().with(SIZE, "BHK 2");
        assert_eq!(
            encode_input(&record),
            Err(EncodeError::InvalidSize("BHK 2".into()))
        );
    }

    #[test]
    fn only_the_leading_integer_counts() {
        let record = house().with(SIZE, "2BHK").with(AGE, "10.5");
        assert_eq!(encode_input(&record).unwrap(), [0.2, 0.4, 0.4, 0.2, 0.2]);

        let record = house().with(SIZE, " 3 BHK ").with(AGE, "25 years");
        assert_eq!(encode_input(&record).unwrap()[1], 0.6);
        assert_eq!(encode_input(&record).unwrap()[4], 0.5);
    }

    #[test]
    fn negative_counts_are_rejected() {
        let record = house().with(SIZE, "-2 BHK");
        assert_eq!(
            encode_input(&record),
            Err(EncodeError::InvalidSize("-2 BHK".into()))
        );

        let record = house().with(AGE, "-4");
        assert_eq!(encode_input(&record).unwrap()[4], 0.0);
    }

    #[test]
    fn leading_int_reads_the_prefix() {
        assert_eq!(leading_int("42abc"), Some(42));
        assert_eq!(leading_int("  -7.9"), Some(-7));
        assert_eq!(leading_int("+3"), Some(3));
        assert_eq!(leading_int("BHK"), None);
        assert_eq!(leading_int("-"), None);
        assert_eq!(leading_int(""), None);
    }

    #[test]
    fn mandatory_fields_must_be_numbers() {
        let record = house().with(TOTAL_SQFT, "abc");
        assert_eq!(
            encode_input(&record),
            Err(EncodeError::NotANumber {
                field: TOTAL_SQFT,
                value: "abc".into()
            })
        );

        let record = house().with(PRICE, "NaN");
        assert!(matches!(
            encode_output(&record),
            Err(EncodeError::NotANumber { field: PRICE, .. })
        ));
    }

    #[test]
    fn missing_fields_are_reported() {
        let record: RawRecord = house().iter().filter(|(k, _)| *k != BALCONY).collect();
        assert_eq!(
            encode_input(&record),
            Err(EncodeError::MissingField(BALCONY))
        );
    }

    #[test]
    fn price_isnt_needed_for_the_input() {
        let record: RawRecord = house().iter().filter(|(k, _)| *k != PRICE).collect();
        assert!(encode_input(&record).is_ok());
        assert_eq!(encode_output(&record), Err(EncodeError::MissingField(PRICE)));
    }
}
