//! Alias resolution between simplified "schema" activity codes and the
//! canonical codes values are stored under, plus the legacy name-pattern
//! VAT-category matcher kept as a migration backfill.

use crate::schema::VatCategory;

/// Fixed alias table, ordered longest suffix first. Legacy per-utility VAT
/// codes collapse onto the four current categories; subcategory-qualified
/// adjustment codes collapse onto their flat forms.
const CODE_ALIASES: &[(&str, &str)] = &[
    // Per-utility VAT receivables, renamed when the categories were merged.
    ("D-VAT-TELEPHONE", "D-VAT-COMMUNICATION"),
    ("D-VAT-INTERNET", "D-VAT-COMMUNICATION"),
    ("D-VAT-AIRTIME", "D-VAT-COMMUNICATION"),
    ("D-VAT-REPAIRS", "D-VAT-MAINTENANCE"),
    ("D-VAT-PETROL", "D-VAT-FUEL"),
    ("D-VAT-STATIONERY", "D-VAT-OFFICE-SUPPLIES"),
    // Subcategory-qualified prior-year adjustment lines, flattened.
    ("G-01-PYA", "G-PYA"),
    ("G-02-PYA", "G-PYA"),
];

/// Resolves a possibly legacy code onto its canonical storage code.
///
/// Matching is longest-suffix: the first (longest) alias suffix found in
/// the table is replaced; unmapped codes pass through unchanged. There is
/// no error condition, unknown input is valid output.
pub fn resolve(code: &str) -> String {
    let mut best: Option<(&str, &str)> = None;
    for (legacy, canonical) in CODE_ALIASES {
        if code.ends_with(legacy) {
            match best {
                Some((current, _)) if current.len() >= legacy.len() => {}
                _ => best = Some((legacy, canonical)),
            }
        }
    }

    match best {
        Some((legacy, canonical)) => {
            let prefix = &code[..code.len() - legacy.len()];
            format!("{}{}", prefix, canonical)
        }
        None => code.to_string(),
    }
}

/// Legacy substring patterns per category, most specific first so that
/// overlapping names ("office maintenance supplies") land on a single
/// category deterministically.
const VAT_NAME_PATTERNS: &[(VatCategory, &[&str])] = &[
    (
        VatCategory::OfficeSupplies,
        &["office suppl", "office consumable", "stationery", "stationary"],
    ),
    (
        VatCategory::Fuel,
        &["fuel", "petrol", "diesel", "lubricant"],
    ),
    (
        VatCategory::Maintenance,
        &["maintenance", "repair", "spare part"],
    ),
    (
        VatCategory::Communication,
        &["communication", "telephone", "internet", "airtime"],
    ),
];

/// Infers the VAT category of an expense from its name.
///
/// Migration backfill only: catalogs now attach an explicit
/// `vat_category` to each activity, and this matcher exists to fill the
/// field for catalogs that predate it. Matching is case-insensitive
/// substring, checked in the declared order.
pub fn infer_vat_category(activity_name: &str) -> Option<VatCategory> {
    let lowered = activity_name.to_lowercase();
    for (category, patterns) in VAT_NAME_PATTERNS {
        if patterns.iter().any(|p| lowered.contains(p)) {
            return Some(*category);
        }
    }
    None
}

/// Recognizes a Section-D code as a VAT-receivable entry of an older
/// snapshot that predates the dedicated VAT closing map.
pub fn vat_category_from_code(code: &str) -> Option<VatCategory> {
    let upper = code.to_uppercase();
    if !upper.contains("VAT") {
        return None;
    }
    if upper.contains("COMMUNICATION") {
        Some(VatCategory::Communication)
    } else if upper.contains("MAINTENANCE") {
        Some(VatCategory::Maintenance)
    } else if upper.contains("FUEL") {
        Some(VatCategory::Fuel)
    } else if upper.contains("OFFICE-SUPPLIES") || upper.contains("OFFICE_SUPPLIES") {
        Some(VatCategory::OfficeSupplies)
    } else {
        None
    }
}
