//! Key configuration and operation parsing
//!
//! A [`CipherConfig`] is the whole key: seed window, operation table,
//! transform coefficients and output bounds. Configs are persisted by the
//! key manager as JSON, historically with every field stored as text, so
//! numeric fields accept either numbers or numeric strings. The short legacy
//! field names (`d`, `starts`, `I`, `TC`) are accepted on input.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Key configuration driving the recurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherConfig {
    /// Display name in the key store
    #[serde(default)]
    pub name: String,
    /// Length of the seed window (`d`)
    #[serde(alias = "d", deserialize_with = "lenient::count")]
    pub degree: usize,
    /// Values of `f(0) .. f(d-1)`. Key records only carry finite seeds
    #[serde(alias = "starts", deserialize_with = "lenient::reals")]
    pub seeds: Vec<f64>,
    /// `(tag, code)` pairs such as `("a", "+3")`
    #[serde(alias = "I")]
    pub operations: Vec<OperationSpec>,
    /// Coefficients perturbing operation selection, used cyclically
    #[serde(alias = "TC", deserialize_with = "lenient::integers")]
    pub transform_coefficients: Vec<i64>,
    /// Inclusive lower output bound
    #[serde(deserialize_with = "lenient::integer")]
    pub min_bound: i64,
    /// Exclusive upper output bound
    #[serde(deserialize_with = "lenient::integer")]
    pub max_bound: i64,
}

impl CipherConfig {
    /// Decode and validate a JSON key record.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| ConfigError::Malformed { reason: err.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Encode as pretty-printed JSON with the canonical field names.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ConfigError::Malformed { reason: err.to_string() })
    }

    /// Check structural invariants and that every operation parses.
    ///
    /// Bounds are deliberately not checked: `max_bound <= min_bound` is a
    /// supported degenerate configuration (see [`Self::is_degenerate`]).
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compile_operations().map(|_| ())
    }

    /// Parse the operation table, validating the rest of the config first.
    pub fn compile_operations(&self) -> Result<Vec<Operation>, ConfigError> {
        if self.degree == 0 {
            return Err(ConfigError::ZeroDegree);
        }
        if self.seeds.len() != self.degree {
            return Err(ConfigError::SeedCountMismatch {
                degree: self.degree,
                seeds: self.seeds.len(),
            });
        }
        if self.operations.is_empty() {
            return Err(ConfigError::EmptyOperations);
        }
        if self.transform_coefficients.is_empty() {
            return Err(ConfigError::EmptyTransformCoefficients);
        }

        self.operations
            .iter()
            .enumerate()
            .map(|(index, spec)| Operation::parse(index, spec))
            .collect()
    }

    /// True when the output range `[min_bound, max_bound)` is empty.
    ///
    /// A degenerate config maps every evaluated index to `min_bound`.
    pub fn is_degenerate(&self) -> bool {
        self.max_bound <= self.min_bound
    }
}

/// Raw `(tag, code)` operation pair as stored in a key record.
///
/// The tag is carried along but plays no part in evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec(pub String, pub String);

impl OperationSpec {
    /// Build a pair from a tag and an operator code.
    pub fn new(tag: impl Into<String>, code: impl Into<String>) -> Self {
        Self(tag.into(), code.into())
    }

    /// Operator code, `<op><number>`.
    pub fn code(&self) -> &str {
        &self.1
    }
}

/// Arithmetic operator of a compiled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl Operator {
    /// Map an operator character, if supported.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Self::Add),
            '-' => Some(Self::Sub),
            '*' => Some(Self::Mul),
            '/' => Some(Self::Div),
            _ => None,
        }
    }

    /// Operator character.
    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Compiled unary transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    operator: Operator,
    operand: f64,
}

impl Operation {
    /// Parse an operation pair. `index` is only used in error reports.
    pub fn parse(index: usize, spec: &OperationSpec) -> Result<Self, ConfigError> {
        let code = spec.code();
        let mut chars = code.chars();

        let Some(symbol) = chars.next() else {
            return Err(ConfigError::MissingOperator { index });
        };
        let operator = Operator::from_symbol(symbol)
            .ok_or(ConfigError::UnsupportedOperator { index, operator: symbol })?;

        let operand = chars
            .as_str()
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| ConfigError::InvalidOperand { index, code: code.to_string() })?;

        Ok(Self { operator, operand })
    }

    /// Operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Numeric operand.
    pub fn operand(&self) -> f64 {
        self.operand
    }

    /// Apply to a value in floating point. Division may leave a fraction or,
    /// for a zero operand, an infinity.
    pub fn apply(&self, value: f64) -> f64 {
        match self.operator {
            Operator::Add => value + self.operand,
            Operator::Sub => value - self.operand,
            Operator::Mul => value * self.operand,
            Operator::Div => value / self.operand,
        }
    }
}

/// Deserializers accepting JSON numbers or numeric strings.
mod lenient {
    use serde::{Deserialize, Deserializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(i64),
        Real(f64),
        Text(String),
    }

    impl Number {
        fn as_f64(&self) -> Option<f64> {
            match self {
                Self::Int(value) => Some(*value as f64),
                Self::Real(value) => Some(*value),
                Self::Text(text) => text.trim().parse().ok(),
            }
        }

        fn as_i64(&self) -> Option<i64> {
            if let Self::Int(value) = self {
                return Some(*value);
            }
            if let Self::Text(text) = self
                && let Ok(value) = text.trim().parse::<i64>()
            {
                return Some(value);
            }

            let real = self.as_f64()?;
            let integral = real.is_finite()
                && real.fract() == 0.0
                && real >= i64::MIN as f64
                && real < i64::MAX as f64;
            integral.then_some(real as i64)
        }
    }

    fn integral<E: Error>(number: &Number) -> Result<i64, E> {
        number.as_i64().ok_or_else(|| E::custom("expected an integer"))
    }

    pub(super) fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        integral(&Number::deserialize(deserializer)?)
    }

    pub(super) fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
        let value = integer(deserializer)?;
        usize::try_from(value).map_err(|_| D::Error::custom("expected a non-negative integer"))
    }

    pub(super) fn integers<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<i64>, D::Error> {
        Vec::<Number>::deserialize(deserializer)?.iter().map(integral).collect()
    }

    pub(super) fn reals<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<Number>::deserialize(deserializer)?
            .iter()
            .map(|number| {
                number
                    .as_f64()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| D::Error::custom("expected a finite number"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CipherConfig {
        CipherConfig {
            name: "sample".to_string(),
            degree: 2,
            seeds: vec![5.0, 7.0],
            operations: vec![OperationSpec::new("a", "+3")],
            transform_coefficients: vec![1],
            min_bound: 0,
            max_bound: 10,
        }
    }

    #[test]
    fn parses_all_operators() {
        let cases = [("+2", 10.0, 12.0), ("-2", 10.0, 8.0), ("*2", 10.0, 20.0), ("/4", 10.0, 2.5)];
        for (index, (code, input, expected)) in cases.into_iter().enumerate() {
            let op = Operation::parse(index, &OperationSpec::new("t", code)).unwrap();
            assert_eq!(op.apply(input), expected, "{code}");
        }
    }

    #[test]
    fn operand_may_be_fractional_or_negative() {
        let op = Operation::parse(0, &OperationSpec::new("t", "*-0.5")).unwrap();
        assert_eq!(op.operator(), Operator::Mul);
        assert_eq!(op.operand(), -0.5);
        assert_eq!(op.apply(9.0), -4.5);
    }

    #[test]
    fn division_by_zero_compiles_to_infinity() {
        let op = Operation::parse(0, &OperationSpec::new("t", "/0")).unwrap();
        assert!(op.apply(1.0).is_infinite());
    }

    #[test]
    fn rejects_unknown_operator() {
        let err = Operation::parse(3, &OperationSpec::new("t", "%3")).unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedOperator { index: 3, operator: '%' });
    }

    #[test]
    fn rejects_non_numeric_operand() {
        let err = Operation::parse(1, &OperationSpec::new("t", "+abc")).unwrap_err();
        assert_eq!(err, ConfigError::InvalidOperand { index: 1, code: "+abc".to_string() });
    }

    #[test]
    fn rejects_non_finite_operand() {
        assert!(Operation::parse(0, &OperationSpec::new("t", "+inf")).is_err());
        assert!(Operation::parse(0, &OperationSpec::new("t", "+NaN")).is_err());
    }

    #[test]
    fn rejects_empty_code() {
        let err = Operation::parse(0, &OperationSpec::new("t", "")).unwrap_err();
        assert_eq!(err, ConfigError::MissingOperator { index: 0 });
    }

    #[test]
    fn validate_accepts_sample() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_structural_problems() {
        let mut config = sample();
        config.operations.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyOperations));

        let mut config = sample();
        config.transform_coefficients.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyTransformCoefficients));

        let mut config = sample();
        config.degree = 0;
        config.seeds.clear();
        assert_eq!(config.validate(), Err(ConfigError::ZeroDegree));

        let mut config = sample();
        config.seeds.push(1.0);
        assert_eq!(config.validate(), Err(ConfigError::SeedCountMismatch { degree: 2, seeds: 3 }));
    }

    #[test]
    fn validate_accepts_degenerate_bounds() {
        let mut config = sample();
        config.min_bound = 5;
        config.max_bound = 5;
        assert!(config.validate().is_ok());
        assert!(config.is_degenerate());
    }

    #[test]
    fn reads_legacy_field_names_and_string_numbers() {
        let json = r#"{
            "name": "legacy",
            "d": "2",
            "starts": ["5", "7.5"],
            "I": [["a", "+3"], ["b", "/2"]],
            "TC": ["1", 2],
            "minBound": "32",
            "maxBound": 126
        }"#;

        let config = CipherConfig::from_json(json).unwrap();
        assert_eq!(config.degree, 2);
        assert_eq!(config.seeds, vec![5.0, 7.5]);
        assert_eq!(config.operations[1], OperationSpec::new("b", "/2"));
        assert_eq!(config.transform_coefficients, vec![1, 2]);
        assert_eq!(config.min_bound, 32);
        assert_eq!(config.max_bound, 126);
    }

    #[test]
    fn rejects_non_finite_seed_text() {
        for seed in ["\"NaN\"", "\"inf\"", "\"-infinity\"", "null"] {
            let json = format!(
                r#"{{"degree":1,"seeds":[{seed}],"operations":[["a","+1"]],
                    "transformCoefficients":[1],"minBound":0,"maxBound":10}}"#
            );
            assert!(
                matches!(CipherConfig::from_json(&json), Err(ConfigError::Malformed { .. })),
                "{seed}"
            );
        }
    }

    #[test]
    fn canonical_json_reads_back() {
        let config = sample();
        let json = config.to_json_pretty().unwrap();
        assert!(json.contains("\"transformCoefficients\""));
        assert_eq!(CipherConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn from_json_rejects_fractional_bound() {
        let json = r#"{"degree":1,"seeds":[1],"operations":[["a","+1"]],
            "transformCoefficients":[1],"minBound":0.5,"maxBound":10}"#;
        assert!(matches!(CipherConfig::from_json(json), Err(ConfigError::Malformed { .. })));
    }

    #[test]
    fn from_json_validates() {
        let json = r#"{"degree":1,"seeds":[1],"operations":[["a","^1"]],
            "transformCoefficients":[1],"minBound":0,"maxBound":10}"#;
        assert_eq!(
            CipherConfig::from_json(json),
            Err(ConfigError::UnsupportedOperator { index: 0, operator: '^' })
        );
    }
}
