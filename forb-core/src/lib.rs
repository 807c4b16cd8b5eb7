//! forb Core - Fundamental types
//!
//! This crate provides the core types shared by the engine and plugins:
//! - `Number`: Arbitrary precision decimal numbers
//! - `CoreValue` / `TypeTag`: resolved values and their kinds
//! - `Interpretation`: one ranked candidate decoding of raw input
//! - `ForbError`: structured errors for expression evaluation

mod number;
mod value;
mod error;

pub use number::{Number, NumberError, DEFAULT_PRECISION};
pub use value::{CoreValue, TypeTag, Interpretation};
pub use error::{ForbError, Severity, codes};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{CoreValue, ForbError, Interpretation, Number, Severity, TypeTag};
    pub use crate::error::codes;
}

#[cfg(test)]
mod tests {
    use super::*;

    mod number_tests {
        use super::*;

        #[test]
        fn test_from_str_integer() {
            let n = Number::from_str("123").unwrap();
            assert_eq!(n.to_i64(), Some(123));
        }

        #[test]
        fn test_from_str_fraction() {
            let n = Number::from_str("1/4").unwrap();
            assert_eq!(n, Number::from_str("0.25").unwrap());
        }

        #[test]
        fn test_from_str_fraction_zero_denominator() {
            assert_eq!(Number::from_str("1/0"), Err(NumberError::DivisionByZero));
        }

        #[test]
        fn test_from_str_scientific_integer_mantissa() {
            let avogadro = Number::from_str("602214076e15").unwrap();
            let expected = Number::from_str("602214076000000000000000").unwrap();
            assert_eq!(avogadro, expected);
        }

        #[test]
        fn test_huge_exponent_is_overflow() {
            assert_eq!(Number::from_str("1e20000000"), Err(NumberError::Overflow));
            assert_eq!(Number::from_str("1.5e999999999999"), Err(NumberError::Overflow));
            assert_eq!(Number::from_str("1e-99999999999999999999999"), Err(NumberError::Overflow));
            assert!(Number::from_str("1e4096").is_ok());
        }

        #[test]
        fn test_extreme_magnitude_prints_scientific() {
            let big = Number::from_str("15e4000").unwrap();
            let product = big.mul(&big);
            assert_eq!(product.to_string(), "2.25e8002");
            assert_eq!(product.as_decimal(2), "2.25e8002");
            assert_eq!(product.to_i64(), None);

            let tiny = Number::from_str("1e-4000").unwrap();
            assert_eq!(tiny.mul(&tiny).to_string(), "1e-8000");
        }

        #[test]
        fn test_from_str_rejects_garbage() {
            assert!(matches!(Number::from_str("twelve"), Err(NumberError::ParseError(_))));
        }

        #[test]
        fn test_from_f64_keeps_short_decimals() {
            assert_eq!(Number::from_f64(0.1), Number::from_str("0.1").unwrap());
            assert_eq!(Number::from_f64(f64::NAN), Number::from_i64(0));
        }

        #[test]
        fn test_trunc_toward_zero() {
            assert_eq!(Number::from_str("2.7").unwrap().trunc().to_i64(), Some(2));
            assert_eq!(Number::from_str("-2.7").unwrap().trunc().to_i64(), Some(-2));
        }

        #[test]
        fn test_big_integer_round_trip() {
            let big = Number::from_str("123456789012345678901234567890123456789012345678901234567890").unwrap();
            assert_eq!(big.to_string(), "123456789012345678901234567890123456789012345678901234567890");
        }

        #[test]
        fn test_from_i128() {
            let n = Number::from_i128(i128::MAX);
            assert_eq!(n.to_string(), i128::MAX.to_string());
            assert_eq!(n.to_i64(), None);
        }

        #[test]
        fn test_checked_div() {
            let a = Number::from_i64(84);
            assert_eq!(a.checked_div(&Number::from_i64(2)).unwrap().to_i64(), Some(42));
            assert!(a.checked_div(&Number::from_i64(0)).is_err());
        }

        #[test]
        fn test_sqrt() {
            assert_eq!(Number::from_i64(4).sqrt(50).unwrap().to_i64(), Some(2));
            assert!(Number::from_i64(5).sqrt(50).unwrap().as_decimal(4).starts_with("2.236"));
            assert!(Number::from_i64(-4).sqrt(50).is_err());
        }

        #[test]
        fn test_ln_and_log10() {
            let ln_10 = Number::from_i64(10).ln(50).unwrap();
            assert!(ln_10.as_decimal(5).starts_with("2.3025"), "got {}", ln_10.as_decimal(5));
            let log = Number::from_i64(1000).log10(50).unwrap();
            assert_eq!(log.as_decimal(6), "3.000000");
            assert!(Number::from_i64(0).ln(50).is_err());
            assert!(Number::from_i64(-1).log10(50).is_err());
        }

        #[test]
        fn test_trig() {
            let zero = Number::from_i64(0);
            assert_eq!(zero.sin(50).as_decimal(6), "0.000000");
            assert_eq!(zero.cos(50).as_decimal(6), "1.000000");
            let half_pi = Number::pi(50).checked_div(&Number::from_i64(2)).unwrap();
            assert_eq!(half_pi.sin(50).as_decimal(6), "1.000000");
        }

        #[test]
        fn test_trig_large_angle() {
            // 100π + 1 reduces to 1
            let x = Number::pi(60).mul(&Number::from_i64(100)).add(&Number::from_i64(1));
            let expected = Number::from_i64(1).sin(50);
            assert_eq!(x.sin(50).as_decimal(6), expected.as_decimal(6));
        }

        #[test]
        fn test_constants() {
            assert!(Number::pi(50).as_decimal(5).starts_with("3.14159"));
            assert!(Number::tau(50).as_decimal(5).starts_with("6.28318"));
            assert!(Number::e(50).as_decimal(3).starts_with("2.718"));
            assert!(Number::phi(50).as_decimal(3).starts_with("1.618"));
        }

        #[test]
        fn test_display() {
            assert_eq!(Number::from_i64(42).to_string(), "42");
            assert_eq!(Number::from_str("2.50").unwrap().to_string(), "2.5");
            assert_eq!(Number::from_str("-0.125").unwrap().to_string(), "-0.125");
        }

        #[test]
        fn test_ordering() {
            let a = Number::from_str("1.5").unwrap();
            let b = Number::from_i64(2);
            assert!(a < b);
            assert_eq!(a.clone().max(b.clone()), b);
        }

        #[test]
        fn test_serde_accepts_strings_and_numbers() {
            let n: Number = serde_json::from_str("\"42000.5\"").unwrap();
            assert_eq!(n, Number::from_str("42000.5").unwrap());
            let n: Number = serde_json::from_str("7").unwrap();
            assert_eq!(n.to_i64(), Some(7));
            assert_eq!(serde_json::to_string(&Number::from_i64(7)).unwrap(), "\"7\"");
        }
    }

    mod value_tests {
        use super::*;

        #[test]
        fn test_tags() {
            assert_eq!(CoreValue::Bytes(vec![1]).tag(), TypeTag::Bytes);
            assert_eq!(CoreValue::from("hi").tag(), TypeTag::Text);
            assert_eq!(CoreValue::Integer(5).tag(), TypeTag::Integer);
            let money = CoreValue::Currency { amount: Number::from_i64(1), code: "BTC".into() };
            assert_eq!(money.tag(), TypeTag::Currency);
        }

        #[test]
        fn test_input_size() {
            assert_eq!(CoreValue::Bytes(vec![0; 1024]).input_size(), 1024);
            assert_eq!(CoreValue::from("héllo").input_size(), 6);
            assert_eq!(CoreValue::Integer(-123).input_size(), 4);
        }

        #[test]
        fn test_display() {
            assert_eq!(CoreValue::Bytes(vec![0xde, 0xad]).to_string(), "[de ad]");
            assert_eq!(CoreValue::Bytes(vec![0; 20]).to_string(), "[20 bytes]");
            let money = CoreValue::Currency { amount: Number::from_str("1.5").unwrap(), code: "ETH".into() };
            assert_eq!(money.to_string(), "1.5 ETH");
        }

        #[test]
        fn test_tag_serializes_lowercase() {
            assert_eq!(serde_json::to_string(&TypeTag::Bytes).unwrap(), "\"bytes\"");
            let tag: TypeTag = serde_json::from_str("\"integer\"").unwrap();
            assert_eq!(tag, TypeTag::Integer);
        }
    }

    mod interpretation_tests {
        use super::*;

        #[test]
        fn test_confidence_clamped() {
            let hi = Interpretation::new(CoreValue::from("x"), 1.7, "x");
            let lo = Interpretation::new(CoreValue::from("x"), -0.2, "x");
            let nan = Interpretation::new(CoreValue::from("x"), f64::NAN, "x");
            assert_eq!(hi.confidence(), 1.0);
            assert_eq!(lo.confidence(), 0.0);
            assert_eq!(nan.confidence(), 0.0);
        }

        #[test]
        fn test_with_source() {
            let interp = Interpretation::new(CoreValue::from("hi"), 0.9, "Example").with_source("example-format");
            assert_eq!(interp.source_decoder(), "example-format");
            assert_eq!(interp.description(), "Example");
            assert_eq!(interp.into_value(), CoreValue::from("hi"));
        }

        #[test]
        fn test_serializes_clamped_confidence() {
            let interp = Interpretation::new(CoreValue::Integer(7), 3.0, "Integer 7").with_source("integer");
            let json = serde_json::to_value(&interp).unwrap();
            assert_eq!(json["confidence"], 1.0);
            assert_eq!(json["source_decoder"], "integer");
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn test_arity_message() {
            let err = ForbError::arity_mismatch("factorial", 1, 2);
            assert_eq!(err.code, codes::ARITY_MISMATCH);
            assert_eq!(err.message, "factorial() expects 1 argument, got 2");
        }

        #[test]
        fn test_from_number_error() {
            let err: ForbError = NumberError::DomainError("log of zero".into()).into();
            assert!(err.is(codes::DOMAIN_ERROR));
            let err: ForbError = NumberError::DivisionByZero.into();
            assert!(err.is(codes::DIV_ZERO));
        }

        #[test]
        fn test_error_display() {
            let err = ForbError::undefined_func("facotrial").with_suggestion("Similar: factorial");
            assert_eq!(
                err.to_string(),
                "[UNDEFINED_FUNC] Unknown function: facotrial (suggestion: Similar: factorial)"
            );
        }

        #[test]
        fn test_plugin_fault_is_warning() {
            let err = ForbError::plugin_fault("sha256", "boom").with_note("isolated");
            assert_eq!(err.severity, Severity::Warning);
            assert_eq!(err.notes, vec!["isolated".to_string()]);
        }
    }
}
