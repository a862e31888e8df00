//! End-to-end tests: upload text to routed, evaluated and stored records

use qa_core::{
    import_bytes, import_bytes_into, parse_csv_str, route_fields, IngestConfig, JsonFileStore, ParseOptions,
    RecordSet, RecordStore, Remark, TestKind,
};

const KVP_UPLOAD: &str = "\
Field Name,Value,Row Index
========== ACCURACY OF OPERATING POTENTIAL (KVP) ==========,,
Table2_SetKV,80,
Table2_ma10,79.5,
Table2_ma100,80.2,
";

const MIXED_UPLOAD: &str = "\
QA export for X-ray unit 7,,
Generated by the field app,,
Field Name,Value,Row Index
--- linearity ---,,
========== LINEARITY OF MA LOADING ==========,,
Table1_FCD,100,
Table1_KV,80,
Measurement_MaApplied,100,
Measurement_Meas1,1.00,
Measurement_Meas2,1.02,
Measurement_MaApplied,200,
Measurement_Meas1,2.04,
Measurement_Meas2,2.00,
Measurement_Meas3,2.02,
Tolerance_Operator,<=,
Tolerance_Value,0.1,
========== CONSISTENCY OF RADIATION OUTPUT ==========,,
Settings_FCD,100,
OutputRow_kV,80,
OutputRow_mAs,20,
OutputRow_Meas1,5.0,
OutputRow_Meas2,5.1,
OutputRow_Meas3,4.9,
OutputRow_Meas4,5.05,
OutputRow_Meas5,4.95,
========== BOGUS TEST ==========,,
Table2_SetKV,99,
========== TOTAL FILTRATION ==========,,
Settings_AppliedKV,80,
Settings_TotalFiltration,2.5,
Unknown_Field,1,
";

#[test]
fn test_kvp_upload_routes_exact_cells() {
    let parsed = parse_csv_str(KVP_UPLOAD, "kvp.csv", &ParseOptions::default()).unwrap();
    let mut records = RecordSet::new();
    let summary = route_fields(&mut records, &parsed.fields);

    assert_eq!(summary.routed, 3);
    assert_eq!(records.tests(), vec![TestKind::AccuracyOfOperatingPotential]);

    let record = records.get(TestKind::AccuracyOfOperatingPotential).unwrap();
    let table2 = record.table("table2").unwrap();
    assert_eq!(table2.row_count(), 1);

    let row = table2.row(0).unwrap();
    assert_eq!(row.cells.len(), 3);
    assert_eq!(row.cell("setKV"), Some("80"));
    assert_eq!(row.cell("ma10"), Some("79.5"));
    assert_eq!(row.cell("ma100"), Some("80.2"));

    assert_eq!(record.table("table1").unwrap().row_count(), 0);
    assert!(record.fields.is_empty());
}

#[test]
fn test_bogus_section_only() {
    let upload = "Field Name,Value,Row Index\n========== BOGUS TEST ==========,,\nTable2_SetKV,80,\n";
    let outcome = import_bytes("bogus.csv", upload.as_bytes(), &IngestConfig::default()).unwrap();

    assert!(outcome.records.is_empty());
    assert!(outcome.stats.is_empty());
    assert_eq!(outcome.stats.unresolved_sections, vec!["BOGUS TEST"]);
}

#[test]
fn test_mixed_upload() {
    let outcome = import_bytes("unit7.csv", MIXED_UPLOAD.as_bytes(), &IngestConfig::default()).unwrap();
    let stats = &outcome.stats;

    assert_eq!(
        outcome.records.tests(),
        vec![
            TestKind::TotalFiltration,
            TestKind::LinearityOfMaLoading,
            TestKind::ConsistencyOfRadiationOutput,
        ]
    );
    assert_eq!(stats.sections, 3);
    assert_eq!(stats.unresolved_sections, vec!["BOGUS TEST"]);
    assert_eq!(stats.dropped_without_test, 1);
    // Comment row plus the unknown prefix
    assert_eq!(stats.skipped_rows, 2);
    assert_eq!(stats.fields_ignored, 0);

    let linearity = outcome.records.get(TestKind::LinearityOfMaLoading).unwrap();
    let table = linearity.table("measurements").unwrap();
    assert!(table.is_consistent());
    assert_eq!(table.headers(), &["Meas 1", "Meas 2", "Meas 3"]);
    assert_eq!(table.row(0).unwrap().measured(), &["1.00", "1.02", ""]);
    assert_eq!(table.row(1).unwrap().cell("maApplied"), Some("200"));
    assert_eq!(table.row(1).unwrap().cell("average"), Some("2.020"));
    // 0.0101 vs 0.0101 per mA
    assert_eq!(table.row(1).unwrap().cell("remarks"), Some("PASS"));
    assert_eq!(linearity.field("fcd"), None);
    assert_eq!(linearity.table("table1").unwrap().row(0).unwrap().cell("fcd"), Some("100"));
    assert_eq!(linearity.remark, Remark::Pass);

    let consistency = outcome.records.get(TestKind::ConsistencyOfRadiationOutput).unwrap();
    let row = consistency.table("outputRows").unwrap().row(0).unwrap();
    assert_eq!(row.cell("cov"), Some("1.58"));
    assert_eq!(consistency.remark, Remark::Pass);

    let filtration = outcome.records.get(TestKind::TotalFiltration).unwrap();
    assert_eq!(filtration.field("appliedKV"), Some("80"));
    assert_eq!(filtration.remark, Remark::Pass);
}

#[test]
fn test_editor_json_shape() {
    let outcome = import_bytes("unit7.csv", MIXED_UPLOAD.as_bytes(), &IngestConfig::default()).unwrap();
    let json = outcome.records.get(TestKind::LinearityOfMaLoading).unwrap().to_editor_json();

    assert_eq!(json["testName"], "Linearity of mA Loading");
    assert_eq!(json["measurementsHeaders"].as_array().unwrap().len(), 3);
    assert_eq!(json["measurements"][1]["measuredValues"][2], "2.02");
    assert_eq!(json["measurements"][0]["maApplied"], "100");
    assert_eq!(json["tolerance"]["operator"], "<=");
    assert_eq!(json["remark"], "PASS");
}

#[test]
fn test_store_roundtrip_and_reimport() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");

    let outcome = import_bytes("unit7.csv", MIXED_UPLOAD.as_bytes(), &IngestConfig::default()).unwrap();
    let mut store = JsonFileStore::open(&path).unwrap();
    let receipts = store.save_all("svc-7", &outcome.records).unwrap();
    assert_eq!(receipts.len(), 3);

    let reopened = JsonFileStore::open(&path).unwrap();
    let mut records = reopened.load_service("svc-7").unwrap();
    assert_eq!(records, outcome.records);
    assert!(reopened.load("svc-8", TestKind::TotalFiltration).unwrap().is_none());

    // A later upload lands on top of the saved records
    let upload = "Field Name,Value\n========== TOTAL FILTRATION ==========,\nSettings_TotalFiltration,1.2\n";
    import_bytes_into(&mut records, "retest.csv", upload.as_bytes(), &IngestConfig::default()).unwrap();

    let filtration = records.get(TestKind::TotalFiltration).unwrap();
    assert_eq!(filtration.field("appliedKV"), Some("80"));
    assert_eq!(filtration.remark, Remark::Fail);
    assert_eq!(records.get(TestKind::LinearityOfMaLoading), outcome.records.get(TestKind::LinearityOfMaLoading));
}

#[test]
fn test_semicolon_upload() {
    let upload = "Field Name;Value;Row Index\n========== CENTRAL BEAM ALIGNMENT ==========;;\nSettings_ObservedTilt;0,5;\nSettings_FCD;100;\n";
    let outcome = import_bytes("beam.csv", upload.as_bytes(), &IngestConfig::default()).unwrap();

    let record = outcome.records.get(TestKind::CentralBeamAlignment).unwrap();
    assert_eq!(record.field("fcd"), Some("100"));
    // Decimal commas are not numbers
    assert_eq!(record.field("observedTilt"), Some("0,5"));
    assert_eq!(record.remark, Remark::NotApplicable);
}
