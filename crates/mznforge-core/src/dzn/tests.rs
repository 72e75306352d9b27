//! Tests for the dzn codec.

use std::collections::BTreeSet;

use proptest::prelude::*;

use super::*;
use crate::value::{Array, IndexSet};

fn assignment(pairs: Vec<(&str, Value)>) -> Assignment {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

// ============================================================================
// Decoding
// ============================================================================

mod decoding {
    use super::*;

    #[test]
    fn test_scalars() {
        let data = decode("a = 5; b = -3; c = 2.5; d = true; e = \"hi\\n\"; f = Red; g = <>;").unwrap();
        assert_eq!(data["a"], Value::Int(5));
        assert_eq!(data["b"], Value::Int(-3));
        assert_eq!(data["c"], Value::Float(2.5));
        assert_eq!(data["d"], Value::Bool(true));
        assert_eq!(data["e"], Value::Str("hi\n".to_string()));
        assert_eq!(data["f"], Value::Enum("Red".to_string()));
        assert_eq!(data["g"], Value::Absent);
    }

    #[test]
    fn test_integer_and_float_stay_distinct() {
        assert_eq!(decode_value("1").unwrap(), Value::Int(1));
        assert_eq!(decode_value("1.0").unwrap(), Value::Float(1.0));
        assert_eq!(decode_value("1e3").unwrap(), Value::Float(1000.0));
        assert_eq!(decode_value("-2.5E-1").unwrap(), Value::Float(-0.25));
    }

    #[test]
    fn test_hex_and_octal() {
        assert_eq!(decode_value("0x1F").unwrap(), Value::Int(31));
        assert_eq!(decode_value("-0o17").unwrap(), Value::Int(-15));
    }

    #[test]
    fn test_extreme_integers() {
        assert_eq!(
            decode_value("-9223372036854775808").unwrap(),
            Value::Int(i64::MIN)
        );
        assert!(matches!(
            decode_value("9223372036854775808"),
            Err(MalformedDataError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_sets_and_ranges() {
        assert_eq!(decode_value("{3, 1, 3}").unwrap(), Value::int_set([1, 3]));
        assert_eq!(decode_value("1..4").unwrap(), Value::int_range(1, 4));
        assert_eq!(decode_value("1..4").unwrap(), Value::int_set([1, 2, 3, 4]));
        assert_eq!(decode_value("{}").unwrap(), Value::IntSet(BTreeSet::new()));
        assert_eq!(decode_value("5..1").unwrap(), Value::IntSet(BTreeSet::new()));
        assert_eq!(decode_value("{2.0, 1.5}").unwrap(), Value::float_set([1.5, 2.0]));
        assert_eq!(decode_value("0.5..1.5").unwrap(), Value::FloatRange(0.5, 1.5));
        assert_eq!(
            decode_value("{Red, Blue}").unwrap(),
            Value::EnumSet(vec!["Red".into(), "Blue".into()])
        );
    }

    #[test]
    fn test_one_dimensional_arrays() {
        assert_eq!(
            decode_value("[10, 3, 9]").unwrap(),
            Value::from(vec![10i64, 3, 9])
        );
        let value = decode_value("array1d(0..2, [1.5, 2.5, 3.5])").unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.index_sets(), &[IndexSet::range(0, 2)]);
        assert_eq!(array.get(&[2]), Some(&Value::Float(3.5)));
    }

    #[test]
    fn test_multi_dimensional_arrays() {
        let value = decode_value("array3d(1..2, 1..2, 0..1, [1, 2, 3, 4, 5, 6, 7, 8])").unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.dims(), 3);
        assert_eq!(array.get(&[2, 1, 1]), Some(&Value::Int(6)));
    }

    #[test]
    fn test_two_dimensional_literal() {
        let value = decode_value("[| 1, 2, 3 | 4, 5, 6 |]").unwrap();
        let expected = Array::new(
            vec![IndexSet::range(1, 2), IndexSet::range(1, 3)],
            (1..=6).map(Value::Int).collect(),
        )
        .unwrap();
        assert_eq!(value, Value::Array(expected));
    }

    #[test]
    fn test_enum_domain_declared_in_text() {
        let data = decode("Color = {Red, Green, Blue};\ncost = array1d(Color, [4, 5, 6]);").unwrap();
        let cost = data["cost"].as_array().unwrap();
        assert_eq!(
            cost.index_sets(),
            &[IndexSet::enumerated(
                "Color",
                vec!["Red".into(), "Green".into(), "Blue".into()]
            )]
        );
    }

    #[test]
    fn test_comments_and_optional_final_semicolon() {
        let data = decode("% header\nn = 5; /* block\ncomment */ m = 6").unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data["m"], Value::Int(6));
    }

    #[test]
    fn test_solver_output_block() {
        let data = decode("x = {3, 5};\n_objective = 17;\n").unwrap();
        assert_eq!(data["x"], Value::int_set([3, 5]));
        assert_eq!(data["_objective"], Value::Int(17));
    }
}

// ============================================================================
// Malformed input
// ============================================================================

mod malformed {
    use super::*;

    #[test]
    fn test_unterminated_set() {
        assert_eq!(
            decode("x = {1, 2"),
            Err(MalformedDataError::Unterminated { what: "set", pos: 4 })
        );
    }

    #[test]
    fn test_unterminated_array() {
        assert!(matches!(
            decode("x = [1, 2"),
            Err(MalformedDataError::Unterminated { what: "array", .. })
        ));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            decode_value("\"abc"),
            Err(MalformedDataError::Unterminated { what: "string", .. })
        ));
    }

    #[test]
    fn test_mixed_numeric_types() {
        assert!(matches!(
            decode_value("[1, 2.5]"),
            Err(MalformedDataError::TypeMismatch(_))
        ));
        assert!(matches!(
            decode_value("{1, 2.5}"),
            Err(MalformedDataError::TypeMismatch(_))
        ));
        assert!(matches!(
            decode_value("1..2.5"),
            Err(MalformedDataError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_index_set_element_count_mismatch() {
        assert_eq!(
            decode_value("array2d(1..2, 1..2, [1, 2, 3])"),
            Err(MalformedDataError::DimensionMismatch {
                expected: 4,
                found: 3
            })
        );
        assert!(matches!(
            decode_value("[| 1, 2 | 3 |]"),
            Err(MalformedDataError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_arity_mismatch() {
        assert_eq!(
            decode_value("array3d(1..2, 1..2, [1, 2, 3, 4])"),
            Err(MalformedDataError::ArityMismatch {
                declared: 3,
                found: 2
            })
        );
    }

    #[test]
    fn test_unknown_enum_index_set() {
        assert_eq!(
            decode_value("array1d(Color, [1, 2])"),
            Err(MalformedDataError::UnknownEnum("Color".to_string()))
        );
    }

    #[test]
    fn test_unknown_enum_literal_in_strict_mode() {
        let decoder = Decoder::new()
            .with_enum("Color", ["Red", "Green"])
            .strict_enums(true);
        assert!(decoder.decode("c = Red;").is_ok());
        assert_eq!(
            decoder.decode("c = Purple;"),
            Err(MalformedDataError::UnknownEnumLiteral {
                literal: "Purple".to_string()
            })
        );
        assert!(decoder.decode("cs = {Green, Purple};").is_err());
    }

    #[test]
    fn test_set_literal_index_sets_are_rejected() {
        assert!(matches!(
            decode_value("array1d({1, 2}, [1, 2])"),
            Err(MalformedDataError::UnsupportedIndexSet(_))
        ));
    }

    #[test]
    fn test_duplicate_identifier() {
        assert_eq!(
            decode("a = 1; a = 2;"),
            Err(MalformedDataError::DuplicateIdentifier("a".to_string()))
        );
    }

    #[test]
    fn test_missing_equals() {
        assert!(matches!(
            decode("a 1;"),
            Err(MalformedDataError::UnexpectedToken { expected: "'='", .. })
        ));
    }

    #[test]
    fn test_two_dimensional_literal_needs_separators() {
        assert!(matches!(
            decode_value("[| 1 2 |]"),
            Err(MalformedDataError::UnexpectedToken { expected: "',' or '|'", .. })
        ));
        assert!(decode_value("[| 1, 2 | 3 4 |]").is_err());
        assert!(decode_value("[| 1, 2, | 3, 4, |]").is_ok());
    }

    #[test]
    fn test_trailing_input_after_value() {
        assert!(decode_value("1 2").is_err());
        assert!(decode_value("1;").is_ok());
    }
}

// ============================================================================
// Encoding
// ============================================================================

mod encoding {
    use super::*;

    #[test]
    fn test_knapsack_data() {
        let data = assignment(vec![
            ("n", Value::Int(5)),
            ("profit", Value::from(vec![10i64, 3, 9, 4, 8])),
            ("size", Value::from(vec![14i64, 4, 10, 6, 9])),
            ("capacity", Value::Int(20)),
        ]);
        assert_eq!(
            encode(&data).unwrap(),
            "n = 5;\nprofit = [10, 3, 9, 4, 8];\nsize = [14, 4, 10, 6, 9];\ncapacity = 20;\n"
        );
    }

    #[test]
    fn test_floats_keep_their_type() {
        assert_eq!(encode_value(&Value::Float(1.0)).unwrap(), "1.0");
        assert_eq!(encode_value(&Value::Float(1e-7)).unwrap(), "1e-7");
        assert_eq!(encode_value(&Value::Int(1)).unwrap(), "1");
    }

    #[test]
    fn test_non_finite_float_is_unrepresentable() {
        assert!(matches!(
            encode_value(&Value::Float(f64::NAN)),
            Err(MalformedDataError::Unrepresentable(_))
        ));
    }

    #[test]
    fn test_sets() {
        assert_eq!(encode_value(&Value::int_set([1, 2, 3])).unwrap(), "1..3");
        assert_eq!(encode_value(&Value::int_set([1, 3])).unwrap(), "{1, 3}");
        assert_eq!(encode_value(&Value::int_set([4])).unwrap(), "{4}");
        assert_eq!(encode_value(&Value::IntSet(BTreeSet::new())).unwrap(), "{}");
        assert_eq!(
            encode_value(&Value::float_set([2.0, 0.5])).unwrap(),
            "{0.5, 2.0}"
        );
    }

    #[test]
    fn test_multi_dimensional_array() {
        let array = Array::new(
            vec![IndexSet::range(1, 2), IndexSet::range(0, 1)],
            (1..=4).map(Value::Int).collect(),
        )
        .unwrap();
        assert_eq!(
            encode_value(&Value::Array(array)).unwrap(),
            "array2d(1..2, 0..1, [1, 2, 3, 4])"
        );
    }

    #[test]
    fn test_enum_domain_written_before_use() {
        let colors = vec!["Red".to_string(), "Green".to_string()];
        let cost = Array::new(
            vec![IndexSet::enumerated("Color", colors.clone())],
            vec![Value::Int(1), Value::Int(2)],
        )
        .unwrap();
        let data = assignment(vec![
            ("cost", Value::Array(cost)),
            ("Color", Value::EnumSet(colors)),
        ]);
        let text = encode(&data).unwrap();
        assert_eq!(
            text,
            "Color = {Red, Green};\ncost = array1d(Color, [1, 2]);\n"
        );
        assert_eq!(decode(&text).unwrap(), data);
    }

    fn colors() -> Vec<String> {
        vec!["Red".to_string(), "Green".to_string()]
    }

    fn color_cost(literals: Vec<String>) -> Value {
        Value::Array(
            Array::new(
                vec![IndexSet::enumerated("Color", literals)],
                vec![Value::Int(1), Value::Int(2)],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_missing_enum_domain_is_declared() {
        let data = assignment(vec![("n", Value::Int(2)), ("cost", color_cost(colors()))]);
        let text = encode(&data).unwrap();
        assert_eq!(
            text,
            "Color = {Red, Green};\nn = 2;\ncost = array1d(Color, [1, 2]);\n"
        );

        let decoded = decode(&text).unwrap();
        assert_eq!(decoded["cost"], data["cost"]);
        assert_eq!(decoded["Color"], Value::EnumSet(colors()));
        assert_eq!(decoded.len(), 3);
    }

    #[test]
    fn test_enum_domain_literals_must_agree() {
        let data = assignment(vec![
            ("Color", Value::EnumSet(vec!["Red".to_string()])),
            ("cost", color_cost(colors())),
        ]);
        assert_eq!(
            encode(&data),
            Err(MalformedDataError::ConflictingDomain("Color".to_string()))
        );

        let data = assignment(vec![("Color", Value::Int(1)), ("cost", color_cost(colors()))]);
        assert!(matches!(encode(&data), Err(MalformedDataError::ConflictingDomain(_))));

        let swapped = vec!["Green".to_string(), "Red".to_string()];
        let data = assignment(vec![("cost", color_cost(colors())), ("price", color_cost(swapped))]);
        assert_eq!(
            encode(&data),
            Err(MalformedDataError::ConflictingDomain("Color".to_string()))
        );
    }

    #[test]
    fn test_registered_enum_domain_is_not_redeclared() {
        let data = assignment(vec![("cost", color_cost(colors()))]);
        let encoder = Encoder::new().with_enum("Color", ["Red", "Green"]);
        let text = encoder.encode(&data).unwrap();
        assert_eq!(text, "cost = array1d(Color, [1, 2]);\n");

        let decoder = Decoder::new().with_enum("Color", ["Red", "Green"]);
        assert_eq!(decoder.decode(&text).unwrap(), data);

        let other = Encoder::new().with_enum("Color", ["Red", "Blue"]);
        assert!(matches!(other.encode(&data), Err(MalformedDataError::ConflictingDomain(_))));
    }

    #[test]
    fn test_encode_value_with_registered_domains() {
        let cost = color_cost(colors());
        assert_eq!(
            Encoder::new().encode_value(&cost),
            Err(MalformedDataError::UnknownEnum("Color".to_string()))
        );

        let encoder = Encoder::new().with_enum("Color", ["Red", "Green"]);
        let text = encoder.encode_value(&cost).unwrap();
        assert_eq!(text, encode_value(&cost).unwrap());
        let decoder = Decoder::new().with_enum("Color", ["Red", "Green"]);
        assert_eq!(decoder.decode_value(&text).unwrap(), cost);
    }

    #[test]
    fn test_invalid_identifier() {
        let data = assignment(vec![("not valid", Value::Int(1))]);
        assert_eq!(
            encode(&data),
            Err(MalformedDataError::InvalidIdentifier("not valid".to_string()))
        );
        let data = assignment(vec![("true", Value::Int(1))]);
        assert!(encode(&data).is_err());
    }

    #[test]
    fn test_string_escapes() {
        let value = Value::Str("say \"hi\"\\\n".to_string());
        let text = encode_value(&value).unwrap();
        assert_eq!(text, r#""say \"hi\"\\\n""#);
        assert_eq!(decode_value(&text).unwrap(), value);
    }

    #[test]
    fn test_reencoding_decoded_text_is_idempotent() {
        let text = "x = [| 1, 2 | 3, 4 |];\ny = {1, 2, 3};\nz = array1d(0..1, [true, false]);\n";
        let once = decode(text).unwrap();
        let reencoded = encode(&once).unwrap();
        let twice = decode(&reencoded).unwrap();
        assert_eq!(once, twice);
        assert_eq!(encode(&twice).unwrap(), reencoded);
    }
}

// ============================================================================
// Round-trip properties
// ============================================================================

// Capitalized, so never `true`, `false` or `arrayNd`.
fn identifier() -> impl Strategy<Value = String> {
    "[A-Z][a-zA-Z0-9_]{0,6}"
}

fn finite_float() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("finite", |v| v.is_finite())
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        finite_float().prop_map(Value::Float),
        any::<bool>().prop_map(Value::Bool),
        "[ -~]{0,8}".prop_map(Value::Str),
        identifier().prop_map(Value::Enum),
        Just(Value::Absent),
    ]
}

fn set() -> impl Strategy<Value = Value> {
    prop_oneof![
        prop::collection::btree_set(-50i64..50, 0..6).prop_map(Value::IntSet),
        (-20i64..20, -20i64..20).prop_map(|(lo, hi)| Value::IntRange(lo, hi)),
        prop::collection::vec(finite_float(), 1..5).prop_map(Value::float_set),
        (finite_float(), finite_float()).prop_map(|(lo, hi)| Value::FloatRange(lo, hi)),
        prop::collection::vec(identifier(), 1..4).prop_map(|mut v| {
            let mut seen = BTreeSet::new();
            v.retain(|l| seen.insert(l.clone()));
            Value::EnumSet(v)
        }),
    ]
}

// Element strategies of one kind each, so arrays stay homogeneous.
fn element_of_kind(kind: usize) -> BoxedStrategy<Value> {
    match kind {
        0 => any::<i64>().prop_map(Value::Int).boxed(),
        1 => finite_float().prop_map(Value::Float).boxed(),
        2 => any::<bool>().prop_map(Value::Bool).boxed(),
        3 => prop::collection::btree_set(-10i64..10, 0..4)
            .prop_map(Value::IntSet)
            .boxed(),
        4 => "[ -~]{0,6}".prop_map(Value::Str).boxed(),
        5 => identifier().prop_map(Value::Enum).boxed(),
        6 => prop::collection::vec(finite_float(), 1..4)
            .prop_map(Value::float_set)
            .boxed(),
        7 => prop::collection::btree_set(identifier(), 1..4)
            .prop_map(|set| Value::EnumSet(set.into_iter().collect()))
            .boxed(),
        _ => prop_oneof![Just(Value::Absent), any::<i64>().prop_map(Value::Int)].boxed(),
    }
}

// Enum index sets come from a fixed family, so a domain name always has the
// same literals: `Dom2 = {Dom2_0, Dom2_1}`.
const DOMAIN_SIZES: [usize; 3] = [1, 2, 3];

fn domain_name(size: usize) -> String {
    format!("Dom{size}")
}

fn domain_literals(size: usize) -> Vec<String> {
    (0..size).map(|i| format!("Dom{size}_{i}")).collect()
}

fn domain_set(size: usize) -> IndexSet {
    IndexSet::enumerated(domain_name(size), domain_literals(size))
}

fn domain_encoder() -> Encoder {
    DOMAIN_SIZES.iter().fold(Encoder::new(), |encoder, &size| {
        encoder.with_enum(domain_name(size), domain_literals(size))
    })
}

fn domain_decoder() -> Decoder {
    DOMAIN_SIZES.iter().fold(Decoder::new(), |decoder, &size| {
        decoder.with_enum(domain_name(size), domain_literals(size))
    })
}

// A dimension is an integer range or one of the enum domains.
fn index_set() -> impl Strategy<Value = IndexSet> {
    prop_oneof![
        (-3i64..3, 0i64..3).prop_map(|(lo, len)| IndexSet::range(lo, lo + len - 1)),
        prop::sample::select(DOMAIN_SIZES.to_vec()).prop_map(domain_set),
    ]
}

fn array() -> impl Strategy<Value = Value> {
    let dims = prop::collection::vec(index_set(), 1..5);
    (dims, 0usize..9).prop_flat_map(|(index_sets, kind)| {
        let count: usize = index_sets.iter().map(IndexSet::len).product();
        prop::collection::vec(element_of_kind(kind), count).prop_map(move |elements| {
            Value::Array(Array::new(index_sets.clone(), elements).expect("valid shape"))
        })
    })
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![scalar(), set(), array()]
}

// The domain declarations `encode` adds for the enum index sets of `data`.
fn declared_domains(data: &Assignment) -> Assignment {
    data.values()
        .filter_map(Value::as_array)
        .flat_map(Array::index_sets)
        .filter_map(|set| match set {
            IndexSet::Enum { name, literals } => {
                Some((name.clone(), Value::EnumSet(literals.clone())))
            }
            IndexSet::Range { .. } => None,
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_value_round_trip(v in value()) {
        let text = domain_encoder().encode_value(&v).unwrap();
        prop_assert_eq!(domain_decoder().decode_value(&text).unwrap(), v);
    }

    #[test]
    fn prop_assignment_round_trip(
        entries in prop::collection::vec((identifier(), value()), 0..6)
    ) {
        let mut data = Assignment::new();
        for (name, v) in entries {
            // Top-level enum sets would declare domains of their own.
            if !matches!(v, Value::EnumSet(_)) {
                data.insert(format!("v_{name}"), v);
            }
        }
        let text = encode(&data).unwrap();
        let mut expected = declared_domains(&data);
        expected.extend(data);
        prop_assert_eq!(decode(&text).unwrap(), expected);
    }

    #[test]
    fn prop_assignment_round_trip_with_registered_domains(
        entries in prop::collection::vec((identifier(), array()), 0..4)
    ) {
        let data: Assignment = entries
            .into_iter()
            .map(|(name, v)| (format!("v_{name}"), v))
            .collect();
        let text = domain_encoder().encode(&data).unwrap();
        prop_assert!(!text.lines().any(|line| line.starts_with("Dom")));
        prop_assert_eq!(domain_decoder().decode(&text).unwrap(), data);
    }

    #[test]
    fn prop_reencoding_is_idempotent(v in value()) {
        let encoder = domain_encoder();
        let decoder = domain_decoder();
        let once = decoder.decode_value(&encoder.encode_value(&v).unwrap()).unwrap();
        let twice = decoder.decode_value(&encoder.encode_value(&once).unwrap()).unwrap();
        prop_assert_eq!(once, twice);
    }
}
