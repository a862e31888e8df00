//! Tolerance specifications and the statistics evaluated against them
//!
//! Everything here is a pure function over strings or numbers. Values that do
//! not parse as finite numbers are treated as absent: they are excluded from
//! averages and make a tolerance check "not applicable", so a half-filled row
//! never shows FAIL and no NaN ever reaches a stored cell.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison applied between a measured quantity and the tolerance value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "=")]
    Equal,
}

impl Operator {
    /// Compare `lhs <op> rhs`
    pub fn compare(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Less => lhs < rhs,
            Operator::LessOrEqual => lhs <= rhs + f64::EPSILON * rhs.abs().max(1.0),
            Operator::Greater => lhs > rhs,
            Operator::GreaterOrEqual => lhs + f64::EPSILON * rhs.abs().max(1.0) >= rhs,
            Operator::Equal => (lhs - rhs).abs() <= f64::EPSILON * rhs.abs().max(1.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Equal => "=",
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<" => Ok(Operator::Less),
            "<=" | "≤" | "=<" => Ok(Operator::LessOrEqual),
            ">" => Ok(Operator::Greater),
            ">=" | "≥" | "=>" => Ok(Operator::GreaterOrEqual),
            "=" | "==" => Ok(Operator::Equal),
            other => Err(format!("unknown operator '{}'", other)),
        }
    }
}

/// Direction in which a measurement may deviate from its reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "±")]
    PlusMinus,
}

impl Sign {
    pub fn as_str(self) -> &'static str {
        match self {
            Sign::Plus => "+",
            Sign::Minus => "-",
            Sign::PlusMinus => "±",
        }
    }
}

impl FromStr for Sign {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" => Ok(Sign::Plus),
            "-" | "−" => Ok(Sign::Minus),
            "±" | "+/-" | "+-" => Ok(Sign::PlusMinus),
            other => Err(format!("unknown sign '{}'", other)),
        }
    }
}

/// Whether the tolerance value is relative to the reference or absolute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceType {
    Percent,
    Absolute,
}

impl FromStr for ToleranceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percent" | "%" | "percentage" => Ok(ToleranceType::Percent),
            "absolute" | "abs" | "value" => Ok(ToleranceType::Absolute),
            other => Err(format!("unknown tolerance type '{}'", other)),
        }
    }
}

/// The configurable bundle defining a pass/fail boundary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceSpec {
    pub operator: Operator,
    pub sign: Sign,
    #[serde(rename = "type")]
    pub kind: ToleranceType,
    /// Absent until configured or imported
    pub value: Option<f64>,
}

impl Default for ToleranceSpec {
    fn default() -> Self {
        Self::new(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Absolute, None)
    }
}

impl ToleranceSpec {
    pub const fn new(operator: Operator, sign: Sign, kind: ToleranceType, value: Option<f64>) -> Self {
        Self {
            operator,
            sign,
            kind,
            value,
        }
    }

    /// Tolerance in the reference's units: percent values are scaled by `reference`
    pub fn absolute_for(&self, reference: f64) -> Option<f64> {
        let value = self.value?;
        match self.kind {
            ToleranceType::Absolute => Some(value),
            ToleranceType::Percent => Some(reference.abs() * value / 100.0),
        }
    }

    /// Operator-aware comparison of a derived quantity against the value
    pub fn verdict(&self, measured: Option<f64>) -> Verdict {
        match (measured.filter(|m| m.is_finite()), self.value.filter(|v| v.is_finite())) {
            (Some(m), Some(v)) => Verdict::from_pass(self.operator.compare(m, v)),
            _ => Verdict::NotApplicable,
        }
    }
}

/// Outcome of one tolerance check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    /// Inputs missing or non-positive
    NotApplicable,
}

impl Verdict {
    pub fn from_pass(pass: bool) -> Self {
        if pass {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// Checks that do not apply never flag a row
    pub fn is_pass(self) -> bool {
        self != Verdict::Fail
    }
}

/// Remark attached to a row or to a whole record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Remark {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[default]
    #[serde(rename = "-")]
    NotApplicable,
}

impl Remark {
    pub fn as_str(self) -> &'static str {
        match self {
            Remark::Pass => "PASS",
            Remark::Fail => "FAIL",
            Remark::NotApplicable => "-",
        }
    }

    /// Fold row remarks: any FAIL fails, otherwise any PASS passes
    pub fn combine<I: IntoIterator<Item = Remark>>(remarks: I) -> Remark {
        let mut overall = Remark::NotApplicable;
        for remark in remarks {
            match remark {
                Remark::Fail => return Remark::Fail,
                Remark::Pass => overall = Remark::Pass,
                Remark::NotApplicable => {}
            }
        }
        overall
    }

    pub fn parse(s: &str) -> Remark {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASS" => Remark::Pass,
            "FAIL" => Remark::Fail,
            _ => Remark::NotApplicable,
        }
    }
}

impl From<Verdict> for Remark {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => Remark::Pass,
            Verdict::Fail => Remark::Fail,
            Verdict::NotApplicable => Remark::NotApplicable,
        }
    }
}

impl fmt::Display for Remark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a cell as a finite number, `None` for anything else
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Positive, numeric entries of a measurement set
pub fn positive_values<S: AsRef<str>>(values: &[S]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| parse_number(v.as_ref()))
        .filter(|v| *v > 0.0)
        .collect()
}

/// Mean of the positive numeric entries; `None` for an empty set
pub fn average<S: AsRef<str>>(values: &[S]) -> Option<f64> {
    mean(&positive_values(values))
}

pub fn mean(sample: &[f64]) -> Option<f64> {
    if sample.is_empty() {
        return None;
    }
    Some(sample.iter().sum::<f64>() / sample.len() as f64)
}

/// Sample standard deviation (divisor n - 1), undefined below two values
pub fn sample_std_dev(sample: &[f64]) -> Option<f64> {
    if sample.len() < 2 {
        return None;
    }
    let m = mean(sample)?;
    let variance = sample.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (sample.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Coefficient of variation `stdev / mean` as a fraction
pub fn coefficient_of_variation(sample: &[f64]) -> Option<f64> {
    let m = mean(sample)?;
    if m <= 0.0 {
        return None;
    }
    Some(sample_std_dev(sample)? / m)
}

/// Coefficient of linearity `|max - min| / (max + min)` for a pair of outputs
pub fn coefficient_of_linearity(x1: f64, x2: f64) -> Option<f64> {
    if !x1.is_finite() || !x2.is_finite() {
        return None;
    }
    let (min, max) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
    let sum = max + min;
    if sum <= 0.0 {
        return None;
    }
    Some((max - min).abs() / sum)
}

/// Deviation check of a measurement against a reference
pub fn evaluate_tolerance(measured: f64, reference: f64, tolerance: f64, sign: Sign) -> Verdict {
    if !measured.is_finite() || !reference.is_finite() || !tolerance.is_finite() {
        return Verdict::NotApplicable;
    }
    if reference <= 0.0 || tolerance <= 0.0 {
        return Verdict::NotApplicable;
    }

    let pass = match sign {
        Sign::Plus => measured <= reference + tolerance,
        Sign::Minus => measured >= reference - tolerance,
        Sign::PlusMinus => (measured - reference).abs() <= tolerance,
    };
    Verdict::from_pass(pass)
}

/// `true` unless the measurement is known to be out of tolerance
pub fn check_tolerance(measured: f64, reference: f64, tolerance: f64, sign: Sign) -> bool {
    evaluate_tolerance(measured, reference, tolerance, sign).is_pass()
}

/// Weekly dose scaling `(workload * hourly) / (60 * current)`
pub fn weekly_dose(workload: f64, hourly: f64, current: f64) -> Option<f64> {
    if !workload.is_finite() || !hourly.is_finite() || !current.is_finite() || current <= 0.0 {
        return None;
    }
    Some(workload * hourly / (60.0 * current))
}

/// Render a derived value, `-` when absent
pub fn format_value(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.*}", decimals, v),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_excludes_blank_and_text() {
        assert_eq!(average(&["10", "", "abc", "20"]), Some(15.0));
        assert_eq!(average(&["-5", "0", "4"]), Some(4.0));
        assert_eq!(average::<&str>(&[]), None);
        assert_eq!(average(&["", "n/a"]), None);
    }

    #[test]
    fn test_check_tolerance_signs() {
        assert!(check_tolerance(82.0, 80.0, 2.0, Sign::PlusMinus));
        assert!(!check_tolerance(83.0, 80.0, 2.0, Sign::PlusMinus));
        assert!(check_tolerance(83.0, 80.0, 2.0, Sign::Plus));
        assert!(!check_tolerance(77.0, 80.0, 2.0, Sign::Minus));
        assert!(check_tolerance(79.0, 80.0, 2.0, Sign::Minus));
    }

    #[test]
    fn test_check_tolerance_not_applicable() {
        assert_eq!(evaluate_tolerance(f64::NAN, 80.0, 2.0, Sign::PlusMinus), Verdict::NotApplicable);
        assert_eq!(evaluate_tolerance(90.0, 0.0, 2.0, Sign::PlusMinus), Verdict::NotApplicable);
        assert_eq!(evaluate_tolerance(90.0, 80.0, -1.0, Sign::PlusMinus), Verdict::NotApplicable);
        assert!(check_tolerance(500.0, 80.0, 0.0, Sign::PlusMinus));
    }

    #[test]
    fn test_cov_of_consistent_outputs_passes() {
        let sample = [5.0, 5.1, 4.9, 5.05, 4.95];
        let cov = coefficient_of_variation(&sample).unwrap() * 100.0;
        assert!(cov <= 5.0, "cov was {}", cov);

        let spec = ToleranceSpec::new(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Percent, Some(5.0));
        assert_eq!(Remark::from(spec.verdict(Some(cov))), Remark::Pass);
    }

    #[test]
    fn test_cov_undefined_for_single_value() {
        assert_eq!(coefficient_of_variation(&[5.0]), None);
        assert_eq!(sample_std_dev(&[]), None);
    }

    #[test]
    fn test_sample_std_dev() {
        let sd = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138_089_935).abs() < 1e-6);
    }

    #[test]
    fn test_coefficient_of_linearity() {
        let col = coefficient_of_linearity(0.11, 0.09).unwrap();
        assert!((col - 0.1).abs() < 1e-9);
        assert_eq!(coefficient_of_linearity(0.09, 0.11), coefficient_of_linearity(0.11, 0.09));
        assert_eq!(coefficient_of_linearity(0.0, 0.0), None);
        assert_eq!(coefficient_of_linearity(f64::NAN, 1.0), None);
    }

    #[test]
    fn test_weekly_dose() {
        assert_eq!(weekly_dose(600.0, 2.0, 100.0), Some(0.2));
        assert_eq!(weekly_dose(600.0, 2.0, 0.0), None);
    }

    #[test]
    fn test_operator_parse_and_compare() {
        assert_eq!("<=".parse::<Operator>().unwrap(), Operator::LessOrEqual);
        assert_eq!(" >= ".parse::<Operator>().unwrap(), Operator::GreaterOrEqual);
        assert!("~".parse::<Operator>().is_err());
        assert!(Operator::LessOrEqual.compare(5.0, 5.0));
        assert!(!Operator::Less.compare(5.0, 5.0));
        assert!(Operator::GreaterOrEqual.compare(1.5, 1.5));
        assert!(Operator::Equal.compare(0.1 + 0.2, 0.3));
    }

    #[test]
    fn test_tolerance_spec_serde_shape() {
        let spec = ToleranceSpec::new(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Percent, Some(5.0));
        let json = serde_json::to_value(spec).unwrap();
        assert_eq!(json["operator"], "<=");
        assert_eq!(json["sign"], "±");
        assert_eq!(json["type"], "percent");
        assert_eq!(json["value"], 5.0);
    }

    #[test]
    fn test_verdict_missing_value() {
        let spec = ToleranceSpec::default();
        assert_eq!(spec.verdict(Some(3.0)), Verdict::NotApplicable);
        let spec = ToleranceSpec { value: Some(2.0), ..spec };
        assert_eq!(spec.verdict(None), Verdict::NotApplicable);
        assert_eq!(spec.verdict(Some(3.0)), Verdict::Fail);
    }

    #[test]
    fn test_absolute_for_percent() {
        let spec = ToleranceSpec::new(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Percent, Some(5.0));
        assert_eq!(spec.absolute_for(80.0), Some(4.0));
    }

    #[test]
    fn test_remark_combine() {
        assert_eq!(Remark::combine([Remark::Pass, Remark::NotApplicable]), Remark::Pass);
        assert_eq!(Remark::combine([Remark::Pass, Remark::Fail]), Remark::Fail);
        assert_eq!(Remark::combine(Vec::new()), Remark::NotApplicable);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(Some(79.85), 2), "79.85");
        assert_eq!(format_value(None, 2), "-");
        assert_eq!(format_value(Some(f64::NAN), 2), "-");
    }
}
