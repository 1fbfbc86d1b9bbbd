//! The static activity catalog: line items grouped into sections and
//! subcategories, plus the mapping tables derived from it once per
//! session. The tree is delivered by a collaborator per (program,
//! facility-type) pair and treated as immutable.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::codes;
use crate::error::{EngineError, Result};
use crate::schema::{Activity, ActivityType, Section, VatCategory};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ActivityTree {
    pub sections: BTreeMap<Section, SectionNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SectionNode {
    pub label: String,
    pub display_order: u32,
    #[serde(default)]
    pub is_computed: bool,
    #[serde(default)]
    pub items: Vec<Activity>,
    #[serde(default)]
    pub sub_categories: BTreeMap<String, SubCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubCategory {
    pub label: String,
    pub display_order: u32,
    #[serde(default)]
    pub items: Vec<Activity>,
}

impl ActivityTree {
    pub fn section(&self, section: Section) -> Option<&SectionNode> {
        self.sections.get(&section)
    }

    /// All aggregation-relevant leaves of a section, direct items first,
    /// then subcategory items. `TotalRow` entries are display anchors and
    /// never aggregation input.
    pub fn leaves(&self, section: Section) -> impl Iterator<Item = &Activity> {
        self.sections
            .get(&section)
            .into_iter()
            .flat_map(|node| {
                node.items.iter().chain(
                    node.sub_categories
                        .values()
                        .flat_map(|sub| sub.items.iter()),
                )
            })
            .filter(|a| a.activity_type != ActivityType::TotalRow)
    }

    pub fn all_leaves(&self) -> impl Iterator<Item = &Activity> {
        self.sections.keys().flat_map(|s| self.leaves(*s))
    }

    pub fn find(&self, code: &str) -> Option<&Activity> {
        self.all_leaves().find(|a| a.code == code)
    }

    pub fn total_activities(&self) -> usize {
        self.all_leaves().count()
    }

    /// Fills missing `vat_category` fields on catalogs that predate the
    /// explicit field, so legacy catalogs keep their VAT tracking.
    /// Current catalogs assign the field directly and are untouched.
    pub fn backfill_vat_categories(&mut self) {
        for node in self.sections.values_mut() {
            let items = node.items.iter_mut().chain(
                node.sub_categories
                    .values_mut()
                    .flat_map(|sub| sub.items.iter_mut()),
            );
            for activity in items {
                if activity.vat_category.is_some() {
                    continue;
                }
                activity.vat_category = match activity.activity_type {
                    ActivityType::Regular if activity.section == Section::B => {
                        codes::infer_vat_category(&activity.name)
                    }
                    ActivityType::VatReceivable => codes::vat_category_from_code(&activity.code)
                        .or_else(|| codes::infer_vat_category(&activity.name)),
                    _ => None,
                };
            }
        }
    }
}

/// Mapping tables derived once from the tree: where each expense's unpaid
/// portion accrues, which Section-D line carries each VAT category, and
/// the handful of named lines the Balance Calculator writes to.
#[derive(Debug, Clone)]
pub struct Mappings {
    /// Expense code to payable code. `None` marks transfers: always paid
    /// on receipt, never a payable.
    pub expense_to_payable: BTreeMap<String, Option<String>>,
    /// Section-D line per VAT category. Categories the catalog does not
    /// carry are simply absent.
    pub vat_receivable_codes: BTreeMap<VatCategory, String>,
    pub cash_code: String,
    pub other_receivables_code: String,
    pub accumulated_surplus_code: String,
    pub prior_year_adjustments_code: String,
}

impl Mappings {
    pub fn from_tree(tree: &ActivityTree) -> Result<Self> {
        let cash_code = find_line(tree, Section::D, ActivityType::ComputedAsset, &["cash"])
            .ok_or(EngineError::MissingCatalogLine("cash at bank"))?;

        let other_receivables_code = find_line(
            tree,
            Section::D,
            ActivityType::ComputedAsset,
            &["other receivable"],
        )
        .ok_or(EngineError::MissingCatalogLine("other receivables"))?;

        let accumulated_surplus_code =
            find_line(tree, Section::G, ActivityType::ComputedAsset, &["accumulated"])
                .ok_or(EngineError::MissingCatalogLine("accumulated surplus"))?;

        let prior_year_adjustments_code =
            find_line(tree, Section::G, ActivityType::ComputedAsset, &["adjustment"])
                .ok_or(EngineError::MissingCatalogLine("prior year adjustments"))?;

        let mut vat_receivable_codes = BTreeMap::new();
        for activity in tree.leaves(Section::D) {
            if activity.activity_type != ActivityType::VatReceivable {
                continue;
            }
            let category = activity
                .vat_category
                .or_else(|| codes::vat_category_from_code(&activity.code))
                .or_else(|| codes::infer_vat_category(&activity.name));
            if let Some(category) = category {
                vat_receivable_codes.insert(category, activity.code.clone());
            }
        }

        let payable_codes: Vec<&str> = tree
            .leaves(Section::E)
            .map(|a| a.code.as_str())
            .collect();

        let mut expense_to_payable = BTreeMap::new();
        for expense in tree.leaves(Section::B) {
            let payable = payable_code_for(&expense.code, &payable_codes);
            expense_to_payable.insert(expense.code.clone(), payable);
        }

        Ok(Self {
            expense_to_payable,
            vat_receivable_codes,
            cash_code,
            other_receivables_code,
            accumulated_surplus_code,
            prior_year_adjustments_code,
        })
    }

    pub fn payable_for_expense(&self, expense_code: &str) -> Option<&str> {
        self.expense_to_payable
            .get(expense_code)
            .and_then(|p| p.as_deref())
    }

    pub fn vat_code(&self, category: VatCategory) -> Option<&str> {
        self.vat_receivable_codes.get(&category).map(|s| s.as_str())
    }
}

/// Tiered lookup of a named catalog line: first the activity whose name
/// contains one of the hints, then any line of the wanted type.
fn find_line(
    tree: &ActivityTree,
    section: Section,
    activity_type: ActivityType,
    name_hints: &[&str],
) -> Option<String> {
    let candidates: Vec<&Activity> = tree
        .leaves(section)
        .filter(|a| a.activity_type == activity_type)
        .collect();

    for hint in name_hints {
        if let Some(found) = candidates
            .iter()
            .find(|a| a.name.to_lowercase().contains(hint))
        {
            return Some(found.code.clone());
        }
    }

    if candidates.len() == 1 {
        return Some(candidates[0].code.clone());
    }

    None
}

/// Expense codes encode their section segment; the matching payable is the
/// same code with the section swapped to E, when the catalog carries it.
/// Expenses without an E counterpart are transfers.
fn payable_code_for(expense_code: &str, payable_codes: &[&str]) -> Option<String> {
    let candidate = codes::resolve(&expense_code.replacen("-B-", "-E-", 1));
    payable_codes
        .iter()
        .find(|p| **p == candidate)
        .map(|p| p.to_string())
}
