//! Test name normalization for section labels and free-text test names

use crate::catalog::TestKind;

/// Lowercase, trim and collapse inner whitespace
fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Strip the `==========` decoration from a section marker cell
///
/// Returns the inner label for cells matching `^==========.*==========$`
/// after trimming, `None` for everything else.
pub fn section_label(cell: &str) -> Option<&str> {
    const FENCE: &str = "==========";

    let trimmed = cell.trim();
    let inner = trimmed.strip_prefix(FENCE)?.strip_suffix(FENCE)?;
    Some(inner.trim_matches('=').trim())
}

/// Resolve a raw label to a canonical test
///
/// Exact matches against the slug, canonical name, section label and aliases
/// win outright. Only then is containment tried in either direction, in
/// [`TestKind::ALL`] order, so the first listed test wins an ambiguous label.
pub fn normalize_test_name(raw: &str) -> Option<TestKind> {
    let needle = fold(raw);
    if needle.is_empty() {
        return None;
    }

    let exact = TestKind::ALL.into_iter().find(|kind| {
        let layout = kind.layout();
        fold(layout.slug) == needle
            || fold(layout.canonical_name) == needle
            || fold(layout.section_label) == needle
            || layout.aliases.iter().any(|a| fold(a) == needle)
    });
    if exact.is_some() {
        return exact;
    }

    TestKind::ALL.into_iter().find(|kind| {
        let canonical = fold(kind.canonical_name());
        canonical.contains(&needle) || needle.contains(&canonical)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_label() {
        assert_eq!(
            section_label("========== ACCURACY OF OPERATING POTENTIAL (KVP) =========="),
            Some("ACCURACY OF OPERATING POTENTIAL (KVP)")
        );
        assert_eq!(section_label("  ===============TOTAL FILTRATION===============  "), Some("TOTAL FILTRATION"));
        assert_eq!(section_label("===================="), Some(""));
        assert_eq!(section_label("=========="), None);
        assert_eq!(section_label("== SHORT =="), None);
        assert_eq!(section_label("Table2_SetKV"), None);
    }

    #[test]
    fn test_exact_section_label() {
        assert_eq!(
            normalize_test_name("ACCURACY OF OPERATING POTENTIAL (KVP)"),
            Some(TestKind::AccuracyOfOperatingPotential)
        );
        assert_eq!(normalize_test_name("total filtration"), Some(TestKind::TotalFiltration));
        assert_eq!(
            normalize_test_name("radiation_protection_survey"),
            Some(TestKind::RadiationProtectionSurvey)
        );
    }

    #[test]
    fn test_alias_beats_containment() {
        assert_eq!(normalize_test_name("kVp accuracy"), Some(TestKind::AccuracyOfOperatingPotential));
        assert_eq!(normalize_test_name("Timer Accuracy"), Some(TestKind::AccuracyOfIrradiationTime));
    }

    #[test]
    fn test_containment_either_direction() {
        // Raw contains the canonical name
        assert_eq!(
            normalize_test_name("Test 7: Radiation Leakage Level (tube housing)"),
            Some(TestKind::RadiationLeakageLevel)
        );
        // Canonical name contains the raw label
        assert_eq!(normalize_test_name("mAs Loading"), Some(TestKind::LinearityOfMasLoading));
        assert_eq!(normalize_test_name("Central Beam"), Some(TestKind::CentralBeamAlignment));
    }

    #[test]
    fn test_ambiguous_containment_takes_first_listed() {
        // "accuracy of" is contained in two canonical names
        assert_eq!(normalize_test_name("Accuracy of"), Some(TestKind::AccuracyOfOperatingPotential));
    }

    #[test]
    fn test_unresolved() {
        assert_eq!(normalize_test_name("BOGUS TEST"), None);
        assert_eq!(normalize_test_name(""), None);
        assert_eq!(normalize_test_name("   "), None);
    }
}
