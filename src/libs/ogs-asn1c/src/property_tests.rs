//! Property-Based Tests for the APER codec
//!
//! Integer encodings must decode to the value that was written for every
//! constraint shape the NGAP transfers use, and cause lookups must agree
//! with the CHOICE alternative they produce.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use crate::per::{AperDecoder, AperEncoder, Constraint, PerError};

    mod integers {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn prop_bit_rate_roundtrip(value in 0i64..=4_000_000_000_000) {
                let constraint = Constraint::extensible(0, 4_000_000_000_000);
                let mut encoder = AperEncoder::new();
                encoder.encode_integer(value, &constraint).unwrap();
                encoder.align();
                let bytes = encoder.into_bytes();
                // ext bit + 3-bit octet count fit in the first octet
                prop_assert!(bytes.len() >= 2 && bytes.len() <= 7);
                let mut decoder = AperDecoder::new(&bytes);
                prop_assert_eq!(decoder.decode_integer(&constraint).unwrap(), value);
            }

            #[test]
            fn prop_constrained_rejects_out_of_range(min in -1000i64..1000, span in 0i64..70000, past in 1i64..100) {
                let constraint = Constraint::new(min, min + span);
                let mut encoder = AperEncoder::new();
                let err = encoder
                    .encode_constrained_whole_number(min + span + past, &constraint)
                    .unwrap_err();
                let is_violation = matches!(err, PerError::ConstraintViolation { .. });
                prop_assert!(is_violation);
            }

            #[test]
            fn prop_constrained_roundtrip(min in -1000i64..1000, span in 0i64..70000, pick in 0.0f64..=1.0) {
                let constraint = Constraint::new(min, min + span);
                let value = min + (span as f64 * pick) as i64;
                let mut encoder = AperEncoder::new();
                encoder.encode_constrained_whole_number(value, &constraint).unwrap();
                encoder.align();
                let bytes = encoder.into_bytes();
                let mut decoder = AperDecoder::new(&bytes);
                prop_assert_eq!(decoder.decode_constrained_whole_number(&constraint).unwrap(), value);
            }
        }
    }

    mod causes {
        use super::*;
        use crate::ngap::cause::{Cause, CauseCategory, CauseLookupError};
        use crate::per::{decode_from_bytes, encode_to_bytes};

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn prop_cause_sets_exactly_its_category(category in 0u8..8, value in 0u8..50) {
                match Cause::from_parts(category, value) {
                    Ok(cause) => {
                        prop_assert_eq!(cause.category() as u8, category);
                        let bytes = encode_to_bytes(&cause).unwrap();
                        prop_assert_eq!(decode_from_bytes::<Cause>(&bytes).unwrap(), cause);
                    }
                    Err(CauseLookupError::UnknownCategory(c)) => {
                        prop_assert!(c >= 5);
                        prop_assert_eq!(c, category);
                    }
                    Err(CauseLookupError::InvalidValue { category: c, value: v }) => {
                        prop_assert_eq!(c as u8, category);
                        prop_assert_eq!(v, value);
                        prop_assert!(CauseCategory::try_from(category).is_ok());
                    }
                }
            }
        }
    }
}
