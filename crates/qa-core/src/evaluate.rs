//! Per-test evaluation: derived cells and PASS/FAIL remarks
//!
//! [`evaluate_record`] recomputes every derived value of a record from its
//! inputs and tolerance. It overwrites previous results, so calling it after
//! each edit, column change or import always leaves the same state.

use crate::catalog::TestKind;
use crate::table::{RecordSet, Row, TestRecord};
use crate::tolerance::{
    average, coefficient_of_linearity, coefficient_of_variation, evaluate_tolerance, format_value, mean,
    parse_number, positive_values, weekly_dose, Remark, ToleranceSpec, ToleranceType, Verdict,
};

/// Named mA-station readings of the kVp table
const KVP_READINGS: &[&str] = &["ma10", "ma50", "ma100", "ma200"];

/// Leakage readings around the tube housing
const LEAKAGE_READINGS: &[&str] = &["left", "right", "front", "back", "top"];

/// mR to mGy in air
const MR_PER_MGY: f64 = 114.0;

/// Weekly dose limits in mR/week
const WORKER_WEEKLY_LIMIT: f64 = 40.0;
const PUBLIC_WEEKLY_LIMIT: f64 = 2.0;

/// Re-evaluate every record of a set
pub fn evaluate_all(records: &mut RecordSet) {
    for record in records.iter_mut() {
        evaluate_record(record);
    }
}

/// Recompute derived cells and remarks of one record
pub fn evaluate_record(record: &mut TestRecord) {
    let spec = record.tolerance;
    record.remark = match record.test {
        TestKind::AccuracyOfOperatingPotential => evaluate_kvp(record, &spec),
        TestKind::AccuracyOfIrradiationTime => evaluate_irradiation_time(record, &spec),
        TestKind::TotalFiltration => evaluate_total_filtration(record),
        TestKind::LinearityOfMaLoading => evaluate_linearity(record, &spec, "maApplied"),
        TestKind::LinearityOfMasLoading => evaluate_linearity(record, &spec, "masApplied"),
        TestKind::ConsistencyOfRadiationOutput => evaluate_output_consistency(record, &spec),
        TestKind::RadiationLeakageLevel => evaluate_leakage(record, &spec),
        TestKind::RadiationProtectionSurvey => evaluate_protection_survey(record),
        TestKind::CongruenceOfRadiation => evaluate_congruence(record, &spec),
        TestKind::CentralBeamAlignment => evaluate_scalar(record, &spec, "observedTilt"),
        TestKind::EffectiveFocalSpot => evaluate_focal_spot(record),
        TestKind::LowContrastResolution => evaluate_scalar(record, &spec, "observedSize"),
        TestKind::HighContrastResolution => evaluate_scalar(record, &spec, "measuredLpMm"),
    };
}

fn cell_number(row: &Row, key: &str) -> Option<f64> {
    row.cell(key).and_then(parse_number)
}

fn field_number(record: &TestRecord, key: &str) -> Option<f64> {
    record.field(key).and_then(parse_number)
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

fn set_remark(row: &mut Row, verdict: Verdict) -> Remark {
    let remark = Remark::from(verdict);
    row.set_cell("remarks", remark.as_str());
    remark
}

/// Deviation check with percent tolerances scaled by the reference
fn deviation_verdict(spec: &ToleranceSpec, measured: Option<f64>, reference: Option<f64>) -> Verdict {
    match (measured, reference) {
        (Some(m), Some(r)) => match spec.absolute_for(r) {
            Some(tolerance) => evaluate_tolerance(m, r, tolerance, spec.sign),
            None => Verdict::NotApplicable,
        },
        _ => Verdict::NotApplicable,
    }
}

fn evaluate_kvp(record: &mut TestRecord, spec: &ToleranceSpec) -> Remark {
    let mut remarks = Vec::new();

    for row in record.table_mut("table2").rows_mut() {
        let readings: Vec<&str> = KVP_READINGS.iter().filter_map(|k| row.cell(k)).collect();
        let avg = average(&readings);
        let set_kv = cell_number(row, "setKV");

        row.set_cell("avgKvp", format_value(avg, 2));
        row.set_cell("deviation", format_value(avg.zip(set_kv).map(|(a, s)| a - s), 2));
        remarks.push(set_remark(row, deviation_verdict(spec, avg, set_kv)));
    }

    Remark::combine(remarks)
}

fn evaluate_irradiation_time(record: &mut TestRecord, spec: &ToleranceSpec) -> Remark {
    let mut remarks = Vec::new();

    for row in record.table_mut("table2").rows_mut() {
        let set = positive(cell_number(row, "setTime"));
        let measured = cell_number(row, "measuredTime");
        let deviation = set.zip(measured).map(|(s, m)| (m - s).abs());
        let error = deviation.zip(set).map(|(d, s)| d / s * 100.0);
        let metric = match spec.kind {
            ToleranceType::Percent => error,
            ToleranceType::Absolute => deviation,
        };

        row.set_cell("error", format_value(error, 2));
        remarks.push(set_remark(row, spec.verdict(metric)));
    }

    Remark::combine(remarks)
}

/// Minimum total filtration in mm Al for a tube potential in kV
pub fn required_filtration(kv: f64) -> Option<f64> {
    if !kv.is_finite() || kv <= 0.0 {
        return None;
    }
    Some(if kv < 70.0 {
        1.5
    } else if kv <= 100.0 {
        2.0
    } else {
        2.5
    })
}

fn evaluate_total_filtration(record: &mut TestRecord) -> Remark {
    let required = field_number(record, "appliedKV").and_then(required_filtration);
    let measured = field_number(record, "totalFiltration");

    let verdict = match (measured, required) {
        (Some(m), Some(r)) => Verdict::from_pass(m >= r),
        _ => Verdict::NotApplicable,
    };

    match required {
        Some(r) => record.set_field("requiredFiltration", format_value(Some(r), 1)),
        None => {
            record.remove_field("requiredFiltration");
        }
    }
    Remark::from(verdict)
}

/// Coefficient of linearity between adjacent setting rows
fn evaluate_linearity(record: &mut TestRecord, spec: &ToleranceSpec, setting_key: &str) -> Remark {
    let table = record.table_mut("measurements");

    let mut per_unit = Vec::with_capacity(table.row_count());
    for row in table.rows_mut() {
        let avg = average(row.measured());
        let setting = positive(cell_number(row, setting_key));
        let x = avg.zip(setting).map(|(a, s)| a / s);

        row.set_cell("average", format_value(avg, 3));
        row.set_cell("outputPerUnit", format_value(x, 4));
        per_unit.push(x);
    }

    let mut remarks = Vec::new();
    for (i, row) in table.rows_mut().enumerate() {
        let col = match i.checked_sub(1).map(|prev| (per_unit[prev], per_unit[i])) {
            Some((Some(x1), Some(x2))) => coefficient_of_linearity(x1, x2),
            _ => None,
        };

        row.set_cell("col", format_value(col, 3));
        remarks.push(set_remark(row, spec.verdict(col)));
    }

    Remark::combine(remarks)
}

fn evaluate_output_consistency(record: &mut TestRecord, spec: &ToleranceSpec) -> Remark {
    let mut remarks = Vec::new();

    for row in record.table_mut("outputRows").rows_mut() {
        let sample = positive_values(row.measured());
        let avg = mean(&sample);
        let cov_percent = coefficient_of_variation(&sample).map(|c| c * 100.0);

        row.set_cell("average", format_value(avg, 3));
        row.set_cell("cov", format_value(cov_percent, 2));
        remarks.push(set_remark(row, spec.verdict(cov_percent)));
    }

    Remark::combine(remarks)
}

fn evaluate_leakage(record: &mut TestRecord, spec: &ToleranceSpec) -> Remark {
    let workload = field_number(record, "workload");
    let current = positive(field_number(record, "ma"));
    let mut remarks = Vec::new();

    for row in record.table_mut("leakageMeasurements").rows_mut() {
        let readings: Vec<&str> = LEAKAGE_READINGS.iter().filter_map(|k| row.cell(k)).collect();
        let max = positive_values(&readings).into_iter().reduce(f64::max);
        // Highest reading scaled to one hour of the stated workload
        let leakage_mr = match (max, workload, current) {
            (Some(m), Some(w), Some(c)) => weekly_dose(w, m, c),
            _ => None,
        };
        let leakage_mgy = leakage_mr.map(|mr| mr / MR_PER_MGY);

        row.set_cell("max", format_value(max, 2));
        row.set_cell("leakageMR", format_value(leakage_mr, 3));
        row.set_cell("leakageMGy", format_value(leakage_mgy, 4));
        remarks.push(set_remark(row, spec.verdict(leakage_mgy)));
    }

    Remark::combine(remarks)
}

/// Weekly limit for a survey location category
pub fn weekly_limit(category: &str) -> Option<f64> {
    let category = category.to_ascii_lowercase();
    if category.contains("worker") || category.contains("occupational") || category.contains("controlled") {
        Some(WORKER_WEEKLY_LIMIT)
    } else if category.contains("public") {
        Some(PUBLIC_WEEKLY_LIMIT)
    } else {
        None
    }
}

fn evaluate_protection_survey(record: &mut TestRecord) -> Remark {
    let workload = field_number(record, "workload");
    let current = positive(field_number(record, "ma"));
    let mut remarks = Vec::new();

    for row in record.table_mut("locations").rows_mut() {
        let reading = cell_number(row, "reading");
        let limit = row.cell("category").and_then(weekly_limit);
        let dose = match (workload, reading, current) {
            (Some(w), Some(h), Some(c)) => weekly_dose(w, h, c),
            _ => None,
        };
        let verdict = match (dose, limit) {
            (Some(d), Some(l)) => Verdict::from_pass(d <= l),
            _ => Verdict::NotApplicable,
        };

        row.set_cell("weeklyDose", format_value(dose, 3));
        row.set_cell("limit", format_value(limit, 0));
        remarks.push(set_remark(row, verdict));
    }

    Remark::combine(remarks)
}

fn evaluate_congruence(record: &mut TestRecord, spec: &ToleranceSpec) -> Remark {
    let fcd = positive(field_number(record, "fcd"));
    let mut remarks = Vec::new();

    for row in record.table_mut("table2").rows_mut() {
        let shift = cell_number(row, "observedShift").map(f64::abs);
        let percent = shift.zip(fcd).map(|(s, f)| s / f * 100.0);
        let metric = match spec.kind {
            ToleranceType::Percent => percent,
            ToleranceType::Absolute => shift,
        };

        row.set_cell("percentFcd", format_value(percent, 2));
        remarks.push(set_remark(row, spec.verdict(metric)));
    }

    Remark::combine(remarks)
}

/// Single observed value against the tolerance
fn evaluate_scalar(record: &mut TestRecord, spec: &ToleranceSpec, key: &str) -> Remark {
    let observed = field_number(record, key).map(f64::abs);
    Remark::from(spec.verdict(observed))
}

/// Largest acceptable measured focal spot for a stated size in mm
pub fn allowed_focal_spot(stated: f64) -> Option<f64> {
    if !stated.is_finite() || stated <= 0.0 {
        return None;
    }
    let factor = if stated < 0.8 {
        1.5
    } else if stated <= 1.5 {
        1.4
    } else {
        1.3
    };
    Some(stated * factor)
}

fn evaluate_focal_spot(record: &mut TestRecord) -> Remark {
    let mut remarks = Vec::new();

    for row in record.table_mut("focalSpots").rows_mut() {
        let allowed_w = cell_number(row, "statedWidth").and_then(allowed_focal_spot);
        let allowed_h = cell_number(row, "statedHeight").and_then(allowed_focal_spot);

        let checks: Vec<bool> = [
            (cell_number(row, "measuredWidth"), allowed_w),
            (cell_number(row, "measuredHeight"), allowed_h),
        ]
        .into_iter()
        .filter_map(|(m, a)| Some(m? <= a?))
        .collect();

        let verdict = if checks.is_empty() {
            Verdict::NotApplicable
        } else {
            Verdict::from_pass(checks.iter().all(|ok| *ok))
        };

        row.set_cell("allowedWidth", format_value(allowed_w, 2));
        row.set_cell("allowedHeight", format_value(allowed_h, 2));
        remarks.push(set_remark(row, verdict));
    }

    Remark::combine(remarks)
}
