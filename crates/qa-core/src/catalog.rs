//! Canonical test table and per-test import layouts
//!
//! Every QA test the importer understands is one [`TestKind`] plus one
//! [`TestLayout`] entry below. The layout lists which field-name prefixes the
//! test accepts, what each prefix addresses (scalar fields or a row
//! collection), which suffixes are valid cells, and which field starts a new
//! logical row. Adding a test kind means adding a variant and a layout; the
//! parser and router do not change.

use crate::tolerance::{Operator, Sign, ToleranceSpec, ToleranceType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field-name prefixes accepted by the parser, independent of the test
pub const KNOWN_PREFIXES: &[&str] = &[
    "Table1",
    "Table2",
    "Table3",
    "Tolerance",
    "Measurement",
    "OutputRow",
    "LeakageMeasurement",
    "Location",
    "FocalSpot",
    "Settings",
    "Workload",
    "Exposure",
    "Alignment",
    "Congruence",
    "Contrast",
    "Resolution",
    "Filtration",
    "Timer",
    "Survey",
    "Remarks",
];

/// Is `prefix` one of [`KNOWN_PREFIXES`] (case-insensitive)
pub fn is_known_prefix(prefix: &str) -> bool {
    KNOWN_PREFIXES.iter().any(|p| p.eq_ignore_ascii_case(prefix))
}

/// Canonical QA test identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    AccuracyOfOperatingPotential,
    AccuracyOfIrradiationTime,
    TotalFiltration,
    LinearityOfMaLoading,
    LinearityOfMasLoading,
    ConsistencyOfRadiationOutput,
    RadiationLeakageLevel,
    RadiationProtectionSurvey,
    CongruenceOfRadiation,
    CentralBeamAlignment,
    EffectiveFocalSpot,
    LowContrastResolution,
    HighContrastResolution,
}

impl TestKind {
    /// All test kinds, in report order
    pub const ALL: [TestKind; 13] = [
        TestKind::AccuracyOfOperatingPotential,
        TestKind::AccuracyOfIrradiationTime,
        TestKind::TotalFiltration,
        TestKind::LinearityOfMaLoading,
        TestKind::LinearityOfMasLoading,
        TestKind::ConsistencyOfRadiationOutput,
        TestKind::RadiationLeakageLevel,
        TestKind::RadiationProtectionSurvey,
        TestKind::CongruenceOfRadiation,
        TestKind::CentralBeamAlignment,
        TestKind::EffectiveFocalSpot,
        TestKind::LowContrastResolution,
        TestKind::HighContrastResolution,
    ];

    /// Human-readable canonical name shared with the editors
    pub fn canonical_name(self) -> &'static str {
        self.layout().canonical_name
    }

    /// Stable snake_case identifier (matches the serde form)
    pub fn slug(self) -> &'static str {
        self.layout().slug
    }

    pub fn from_slug(slug: &str) -> Option<TestKind> {
        TestKind::ALL
            .into_iter()
            .find(|k| k.slug().eq_ignore_ascii_case(slug.trim()))
    }

    pub fn layout(self) -> &'static TestLayout {
        // LAYOUTS is declared in the same order as ALL
        &LAYOUTS[self as usize]
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Import layout of one test
#[derive(Debug)]
pub struct TestLayout {
    pub kind: TestKind,
    pub slug: &'static str,
    pub canonical_name: &'static str,
    /// Label written between the `==========` decorations on export
    pub section_label: &'static str,
    /// Extra labels matched exactly before any fuzzy matching
    pub aliases: &'static [&'static str],
    /// Full field names that begin a new logical row
    pub row_start: &'static [&'static str],
    pub routes: &'static [PrefixRoute],
    pub default_tolerance: ToleranceSpec,
}

impl TestLayout {
    /// Route for a field-name prefix (case-insensitive)
    pub fn route(&self, prefix: &str) -> Option<&PrefixRoute> {
        self.routes
            .iter()
            .find(|r| r.prefix.eq_ignore_ascii_case(prefix))
    }

    /// Does `field_name` begin a new logical row of this test
    pub fn is_row_start(&self, field_name: &str) -> bool {
        self.row_start
            .iter()
            .any(|f| f.eq_ignore_ascii_case(field_name))
    }

    /// Row collections this test owns
    pub fn collections(&self) -> impl Iterator<Item = &CollectionLayout> {
        self.routes.iter().filter_map(|r| match &r.target {
            RouteTarget::Collection(c) => Some(c),
            RouteTarget::Scalars(_) => None,
        })
    }
}

/// What a prefix addresses within a test
#[derive(Debug)]
pub struct PrefixRoute {
    pub prefix: &'static str,
    pub target: RouteTarget,
}

#[derive(Debug)]
pub enum RouteTarget {
    /// Record-level scalar fields with the listed suffixes
    Scalars(&'static [&'static str]),
    /// A row collection
    Collection(CollectionLayout),
}

/// Shape of one row collection
#[derive(Debug)]
pub struct CollectionLayout {
    /// Key of the collection in the record (e.g. `table2`)
    pub name: &'static str,
    /// Suffixes accepted as named cells
    pub cells: &'static [&'static str],
    /// Variable-width measurement columns, if the collection has them
    pub family: Option<ColumnFamily>,
}

impl CollectionLayout {
    /// Canonical spelling of a cell suffix (case-insensitive lookup)
    pub fn cell(&self, suffix: &str) -> Option<&'static str> {
        self.cells
            .iter()
            .copied()
            .find(|c| c.eq_ignore_ascii_case(suffix))
    }
}

/// A repeating column token such as `Meas1..MeasN`
#[derive(Debug, Clone, Copy)]
pub struct ColumnFamily {
    /// Token in field names (`Meas` in `Table2_Meas3`)
    pub token: &'static str,
    /// Default header text, suffixed with the 1-based column number
    pub label: &'static str,
}

impl ColumnFamily {
    pub fn default_header(&self, column: usize) -> String {
        format!("{} {}", self.label, column + 1)
    }
}

const MEAS: Option<ColumnFamily> = Some(ColumnFamily {
    token: "Meas",
    label: "Meas",
});

const fn tolerance(operator: Operator, sign: Sign, kind: ToleranceType, value: f64) -> ToleranceSpec {
    ToleranceSpec::new(operator, sign, kind, Some(value))
}

const NO_TOLERANCE: ToleranceSpec =
    ToleranceSpec::new(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Absolute, None);

static LAYOUTS: [TestLayout; 13] = [
    TestLayout {
        kind: TestKind::AccuracyOfOperatingPotential,
        slug: "accuracy_of_operating_potential",
        canonical_name: "Accuracy of Operating Potential",
        section_label: "ACCURACY OF OPERATING POTENTIAL (KVP)",
        aliases: &["kVp Accuracy", "Accuracy of kVp", "Operating Potential"],
        row_start: &["Table2_SetKV"],
        routes: &[
            PrefixRoute {
                prefix: "Table1",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "table1",
                    cells: &["FCD", "Time", "Ma"],
                    family: None,
                }),
            },
            PrefixRoute {
                prefix: "Table2",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "table2",
                    cells: &["SetKV", "ma10", "ma50", "ma100", "ma200", "AvgKvp", "Deviation", "Remarks"],
                    family: None,
                }),
            },
        ],
        default_tolerance: tolerance(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Absolute, 5.0),
    },
    TestLayout {
        kind: TestKind::AccuracyOfIrradiationTime,
        slug: "accuracy_of_irradiation_time",
        canonical_name: "Accuracy of Irradiation Time",
        section_label: "ACCURACY OF IRRADIATION TIME",
        aliases: &["Timer Accuracy", "Exposure Time Accuracy"],
        row_start: &["Table2_SetTime"],
        routes: &[
            PrefixRoute {
                prefix: "Table1",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "table1",
                    cells: &["FCD", "KV", "Ma"],
                    family: None,
                }),
            },
            PrefixRoute {
                prefix: "Table2",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "table2",
                    cells: &["SetTime", "MeasuredTime", "Error", "Remarks"],
                    family: None,
                }),
            },
        ],
        default_tolerance: tolerance(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Percent, 10.0),
    },
    TestLayout {
        kind: TestKind::TotalFiltration,
        slug: "total_filtration",
        canonical_name: "Total Filtration",
        section_label: "TOTAL FILTRATION",
        aliases: &["Half Value Layer", "HVL"],
        row_start: &[],
        routes: &[PrefixRoute {
            prefix: "Settings",
            target: RouteTarget::Scalars(&["AppliedKV", "AppliedMas", "MeasuredHVL", "TotalFiltration"]),
        }],
        default_tolerance: NO_TOLERANCE,
    },
    TestLayout {
        kind: TestKind::LinearityOfMaLoading,
        slug: "linearity_of_ma_loading",
        canonical_name: "Linearity of mA Loading",
        section_label: "LINEARITY OF MA LOADING",
        aliases: &["mA Linearity", "Linearity of mA"],
        row_start: &["Measurement_MaApplied"],
        routes: &[
            PrefixRoute {
                prefix: "Table1",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "table1",
                    cells: &["FCD", "KV", "Time"],
                    family: None,
                }),
            },
            PrefixRoute {
                prefix: "Measurement",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "measurements",
                    cells: &["MaApplied", "Average", "OutputPerUnit", "Col", "Remarks"],
                    family: MEAS,
                }),
            },
        ],
        default_tolerance: tolerance(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Absolute, 0.1),
    },
    TestLayout {
        kind: TestKind::LinearityOfMasLoading,
        slug: "linearity_of_mas_loading",
        canonical_name: "Linearity of mAs Loading",
        section_label: "LINEARITY OF MAS LOADING",
        aliases: &["mAs Linearity", "Linearity of mAs"],
        row_start: &["Measurement_MasApplied"],
        routes: &[
            PrefixRoute {
                prefix: "Table1",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "table1",
                    cells: &["FCD", "KV"],
                    family: None,
                }),
            },
            PrefixRoute {
                prefix: "Measurement",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "measurements",
                    cells: &["MasApplied", "Average", "OutputPerUnit", "Col", "Remarks"],
                    family: MEAS,
                }),
            },
        ],
        default_tolerance: tolerance(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Absolute, 0.1),
    },
    TestLayout {
        kind: TestKind::ConsistencyOfRadiationOutput,
        slug: "consistency_of_radiation_output",
        canonical_name: "Consistency of Radiation Output",
        section_label: "CONSISTENCY OF RADIATION OUTPUT",
        aliases: &["Output Consistency", "Reproducibility of Radiation Output"],
        row_start: &["OutputRow_kV"],
        routes: &[
            PrefixRoute {
                prefix: "Settings",
                target: RouteTarget::Scalars(&["FCD"]),
            },
            PrefixRoute {
                prefix: "OutputRow",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "outputRows",
                    cells: &["kV", "mAs", "Average", "Cov", "Remarks"],
                    family: MEAS,
                }),
            },
        ],
        default_tolerance: tolerance(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Percent, 5.0),
    },
    TestLayout {
        kind: TestKind::RadiationLeakageLevel,
        slug: "radiation_leakage_level",
        canonical_name: "Radiation Leakage Level",
        section_label: "RADIATION LEAKAGE LEVEL",
        aliases: &["Tube Housing Leakage", "Leakage Radiation"],
        row_start: &["LeakageMeasurement_Location"],
        routes: &[
            PrefixRoute {
                prefix: "Settings",
                target: RouteTarget::Scalars(&["FCD", "KV", "Ma", "Time", "Workload"]),
            },
            PrefixRoute {
                prefix: "LeakageMeasurement",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "leakageMeasurements",
                    cells: &[
                        "Location",
                        "Left",
                        "Right",
                        "Front",
                        "Back",
                        "Top",
                        "Max",
                        "LeakageMR",
                        "LeakageMGy",
                        "Remarks",
                    ],
                    family: None,
                }),
            },
        ],
        default_tolerance: tolerance(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Absolute, 1.0),
    },
    TestLayout {
        kind: TestKind::RadiationProtectionSurvey,
        slug: "radiation_protection_survey",
        canonical_name: "Radiation Protection Survey",
        section_label: "RADIATION PROTECTION SURVEY",
        aliases: &["Protection Survey", "Area Survey"],
        row_start: &["Location_Name"],
        routes: &[
            PrefixRoute {
                prefix: "Settings",
                target: RouteTarget::Scalars(&["KV", "Ma", "Workload"]),
            },
            PrefixRoute {
                prefix: "Location",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "locations",
                    cells: &["Name", "Category", "Reading", "WeeklyDose", "Limit", "Remarks"],
                    family: None,
                }),
            },
        ],
        default_tolerance: NO_TOLERANCE,
    },
    TestLayout {
        kind: TestKind::CongruenceOfRadiation,
        slug: "congruence_of_radiation",
        canonical_name: "Congruence of Radiation and Optical Field",
        section_label: "CONGRUENCE OF RADIATION & OPTICAL FIELD",
        aliases: &["Congruence of Radiation & Optical Field", "Light Field Congruence"],
        row_start: &["Table2_Dimension"],
        routes: &[
            PrefixRoute {
                prefix: "Settings",
                target: RouteTarget::Scalars(&["FCD"]),
            },
            PrefixRoute {
                prefix: "Table2",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "table2",
                    cells: &["Dimension", "ObservedShift", "PercentFcd", "Remarks"],
                    family: None,
                }),
            },
        ],
        default_tolerance: tolerance(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Percent, 2.0),
    },
    TestLayout {
        kind: TestKind::CentralBeamAlignment,
        slug: "central_beam_alignment",
        canonical_name: "Central Beam Alignment",
        section_label: "CENTRAL BEAM ALIGNMENT",
        aliases: &["Beam Alignment"],
        row_start: &[],
        routes: &[PrefixRoute {
            prefix: "Settings",
            target: RouteTarget::Scalars(&["FCD", "ObservedTilt"]),
        }],
        default_tolerance: tolerance(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Absolute, 1.5),
    },
    TestLayout {
        kind: TestKind::EffectiveFocalSpot,
        slug: "effective_focal_spot",
        canonical_name: "Effective Focal Spot Size",
        section_label: "EFFECTIVE FOCAL SPOT SIZE",
        aliases: &["Focal Spot Size", "Focal Spot"],
        row_start: &["FocalSpot_FocusType"],
        routes: &[
            PrefixRoute {
                prefix: "Settings",
                target: RouteTarget::Scalars(&["FCD"]),
            },
            PrefixRoute {
                prefix: "FocalSpot",
                target: RouteTarget::Collection(CollectionLayout {
                    name: "focalSpots",
                    cells: &[
                        "FocusType",
                        "StatedWidth",
                        "StatedHeight",
                        "MeasuredWidth",
                        "MeasuredHeight",
                        "AllowedWidth",
                        "AllowedHeight",
                        "Remarks",
                    ],
                    family: None,
                }),
            },
        ],
        default_tolerance: NO_TOLERANCE,
    },
    TestLayout {
        kind: TestKind::LowContrastResolution,
        slug: "low_contrast_resolution",
        canonical_name: "Low Contrast Resolution",
        section_label: "LOW CONTRAST RESOLUTION",
        aliases: &["Low Contrast Sensitivity"],
        row_start: &[],
        routes: &[PrefixRoute {
            prefix: "Settings",
            target: RouteTarget::Scalars(&["KV", "Mas", "ObservedSize"]),
        }],
        default_tolerance: tolerance(Operator::LessOrEqual, Sign::PlusMinus, ToleranceType::Absolute, 3.0),
    },
    TestLayout {
        kind: TestKind::HighContrastResolution,
        slug: "high_contrast_resolution",
        canonical_name: "High Contrast Resolution",
        section_label: "HIGH CONTRAST RESOLUTION",
        aliases: &["Spatial Resolution"],
        row_start: &[],
        routes: &[PrefixRoute {
            prefix: "Settings",
            target: RouteTarget::Scalars(&["KV", "Mas", "MeasuredLpMm"]),
        }],
        default_tolerance: tolerance(Operator::GreaterOrEqual, Sign::PlusMinus, ToleranceType::Absolute, 1.5),
    },
];
