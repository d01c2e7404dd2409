use rand::rngs::SmallRng;
use rand::SeedableRng;

use super::*;

#[test]
fn test_value_spec_parse() {
    assert_eq!(ValueSpec::parse("100").unwrap(), ValueSpec { min: 100, max: 100 });
    assert_eq!(ValueSpec::parse("10, 20").unwrap(), ValueSpec { min: 10, max: 20 });
    assert!(ValueSpec::parse("20,10").is_err());
    assert!(ValueSpec::parse("abc").is_err());
    assert!(ValueSpec::parse("1,2,3").is_err());
}

#[test]
fn test_digit_values_stay_within_bounds() {
    let gen = ValueGenerator::Digits(ValueSpec { min: 10, max: 50 });
    let mut rng = SmallRng::seed_from_u64(1);

    for _ in 0..200 {
        let v = gen.generate(&mut rng);
        assert!(v.len() >= 10 && v.len() < 50, "unexpected length {}", v.len());
        assert!(v.bytes().all(|b| b.is_ascii_digit()));
    }
}

#[test]
fn test_long_digit_values_are_built_from_runs() {
    let gen = ValueGenerator::Digits(ValueSpec { min: 1000, max: 1000 });
    let mut rng = SmallRng::seed_from_u64(3);
    let v = gen.generate(&mut rng).into_bytes();

    assert_eq!(v.len(), 1000);
    // A new digit is only drawn at every 100th character
    for chunk in v.chunks(100) {
        assert!(chunk.iter().all(|b| *b == chunk[0]));
    }
}

#[test]
fn test_zero_length_value() {
    let gen = ValueGenerator::Digits(ValueSpec { min: 0, max: 0 });
    assert_eq!(gen.generate(&mut SmallRng::seed_from_u64(0)), "");
}

#[test]
fn test_regex_generator_is_reproducible_with_seed() {
    let gen = RegexGenerator::compile("[a-z]{12}").unwrap();
    let a = gen.generate(&mut SmallRng::seed_from_u64(5));
    let b = gen.generate(&mut SmallRng::seed_from_u64(5));

    assert_eq!(a, b);
    assert_eq!(a.len(), 12);
    assert_eq!(gen.source(), "[a-z]{12}");
}
