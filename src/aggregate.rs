//! Bottom-up aggregation of the activity tree into category and grand
//! totals, the derived sections (Surplus/Deficit, Net Financial Assets,
//! Closing Balance), and the read-only table projection handed to the
//! presentation layer.

use serde::Serialize;

use crate::activity_tree::{ActivityTree, Mappings, SectionNode};
use crate::balance::BalanceSet;
use crate::schema::{
    AccountNature, Activity, CategoryTotal, ComputedValues, Quarter, Quarterly, Section, ValueMap,
};

/// Which quarters carry any reported value at all, derived from the
/// user-entered state before derived lines are merged in. Derived stock
/// rows inherit this: their "latest reported quarter" is the latest
/// quarter anything was reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportedQuarters([bool; 4]);

impl ReportedQuarters {
    pub fn from_values(values: &ValueMap) -> Self {
        let mut reported = [false; 4];
        for value in values.values() {
            for quarter in Quarter::ALL {
                if value.amounts.get(quarter).is_some() {
                    reported[quarter.index()] = true;
                }
            }
        }
        Self(reported)
    }

    pub fn contains(&self, quarter: Quarter) -> bool {
        self.0[quarter.index()]
    }

    pub fn latest(&self) -> Option<Quarter> {
        Quarter::ALL.iter().rev().copied().find(|q| self.contains(*q))
    }
}

/// Merges the derived balances into a working copy of the value map, so
/// aggregation reads every line the same way. Derived lines report only
/// the quarters the draft itself reports.
pub fn merge_balances(
    values: &ValueMap,
    balances: &BalanceSet,
    mappings: &Mappings,
    reported: ReportedQuarters,
) -> ValueMap {
    let mut merged = values.clone();

    let mut write = |code: &str, series: &Quarterly<f64>| {
        let entry = merged.entry(code.to_string()).or_default();
        entry.amounts = Quarterly::from_fn(|q| {
            if reported.contains(q) {
                Some(*series.get(q))
            } else {
                None
            }
        });
    };

    write(&mappings.cash_code, &balances.cash);
    write(&mappings.other_receivables_code, &balances.other_receivables);
    for (code, series) in &balances.payables {
        write(code, series);
    }
    for (category, series) in &balances.vat {
        if let Some(code) = mappings.vat_code(*category) {
            write(code, series);
        }
    }

    merged
}

fn leaf_quarters(values: &ValueMap, activity: &Activity) -> Quarterly<f64> {
    values
        .get(&activity.code)
        .map(|v| v.amounts.map(|slot| slot.unwrap_or(0.0)))
        .unwrap_or_default()
}

fn cumulative(quarters: &Quarterly<f64>, nature: AccountNature, reported: ReportedQuarters) -> f64 {
    match nature {
        AccountNature::Flow => quarters.total(),
        AccountNature::Stock => reported
            .latest()
            .map(|q| *quarters.get(q))
            .unwrap_or(0.0),
    }
}

/// Sums a section's leaves per quarter and applies the section's own
/// flow/stock rule to the cumulative. D and E leaves aggregate as flows
/// across the quarter axis; only the category cumulative is a stock.
pub fn section_total(
    tree: &ActivityTree,
    values: &ValueMap,
    section: Section,
    reported: ReportedQuarters,
) -> CategoryTotal {
    let mut quarters = Quarterly::<f64>::default();
    for activity in tree.leaves(section) {
        let leaf = leaf_quarters(values, activity);
        for quarter in Quarter::ALL {
            *quarters.get_mut(quarter) += *leaf.get(quarter);
        }
    }
    let cumulative_balance = cumulative(&quarters, section.nature(), reported);
    CategoryTotal {
        quarters,
        cumulative_balance,
    }
}

fn derived_total(
    quarters: Quarterly<f64>,
    nature: AccountNature,
    reported: ReportedQuarters,
) -> CategoryTotal {
    let cumulative_balance = cumulative(&quarters, nature, reported);
    CategoryTotal {
        quarters,
        cumulative_balance,
    }
}

/// Computes every category total and the derived sections from the merged
/// value map plus the balance detail.
pub fn compute_totals(
    tree: &ActivityTree,
    mappings: &Mappings,
    merged: &ValueMap,
    balances: &BalanceSet,
    reported: ReportedQuarters,
) -> ComputedValues {
    let receipts = section_total(tree, merged, Section::A, reported);
    let expenditures = section_total(tree, merged, Section::B, reported);
    let financial_assets = section_total(tree, merged, Section::D, reported);
    let financial_liabilities = section_total(tree, merged, Section::E, reported);

    // C = A - B, flow-aggregated.
    let surplus = derived_total(
        Quarterly::from_fn(|q| receipts.quarters.get(q) - expenditures.quarters.get(q)),
        AccountNature::Flow,
        reported,
    );

    // F = D - E; its cumulative is a point-in-time residual.
    let net_financial_assets = derived_total(
        Quarterly::from_fn(|q| {
            financial_assets.quarters.get(q) - financial_liabilities.quarters.get(q)
        }),
        AccountNature::Stock,
        reported,
    );

    // G = accumulated surplus (constant, contributes once) + prior-year
    // adjustments (flow) + surplus of the period (flow).
    let accumulated = merged
        .get(&mappings.accumulated_surplus_code)
        .map(|v| v.amounts.reported_or_zero(Quarter::Q1))
        .unwrap_or(0.0);
    let adjustments = &balances.prior_year_adjustments;
    let closing_quarters =
        Quarterly::from_fn(|q| accumulated + adjustments.get(q) + surplus.quarters.get(q));
    let closing_balance = CategoryTotal {
        cumulative_balance: accumulated + adjustments.total() + surplus.quarters.total(),
        quarters: closing_quarters,
    };

    ComputedValues {
        receipts,
        expenditures,
        surplus,
        financial_assets,
        financial_liabilities,
        net_financial_assets,
        closing_balance,
        cash_at_bank: balances.cash.clone(),
        payables: balances.payables.clone(),
        vat_receivables: balances.vat.clone(),
        other_receivables: balances.other_receivables.clone(),
        prior_year_adjustments: balances.prior_year_adjustments.clone(),
    }
}

/// A read-only nested rendering of the statement: category, subcategory,
/// and leaf rows with per-row computed totals.
#[derive(Debug, Clone, Serialize)]
pub struct TableProjection {
    pub categories: Vec<CategoryRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRow {
    pub section: Section,
    pub label: String,
    pub total: CategoryTotal,
    pub rows: Vec<LeafRow>,
    pub sub_categories: Vec<SubCategoryRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubCategoryRow {
    pub code: String,
    pub label: String,
    pub total: CategoryTotal,
    pub rows: Vec<LeafRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeafRow {
    pub code: String,
    pub name: String,
    pub total: CategoryTotal,
    pub comment: Option<String>,
}

impl TableProjection {
    pub fn build(
        tree: &ActivityTree,
        mappings: &Mappings,
        merged: &ValueMap,
        computed: &ComputedValues,
        reported: ReportedQuarters,
    ) -> Self {
        let mut categories = Vec::new();

        let mut sections: Vec<(&Section, &SectionNode)> = tree.sections.iter().collect();
        sections.sort_by_key(|(_, node)| node.display_order);

        for (section, node) in sections {
            let total = match section {
                Section::C => computed.surplus.clone(),
                Section::F => computed.net_financial_assets.clone(),
                Section::G => computed.closing_balance.clone(),
                _ => section_total(tree, merged, *section, reported),
            };

            let rows = leaf_rows(&node.items, mappings, merged, *section, reported);

            let mut sub_categories: Vec<SubCategoryRow> = node
                .sub_categories
                .iter()
                .map(|(code, sub)| {
                    let rows = leaf_rows(&sub.items, mappings, merged, *section, reported);
                    let mut quarters = Quarterly::<f64>::default();
                    for row in &rows {
                        for quarter in Quarter::ALL {
                            *quarters.get_mut(quarter) += *row.total.quarters.get(quarter);
                        }
                    }
                    let cumulative_balance = cumulative(&quarters, section.nature(), reported);
                    SubCategoryRow {
                        code: code.clone(),
                        label: sub.label.clone(),
                        total: CategoryTotal {
                            quarters,
                            cumulative_balance,
                        },
                        rows,
                    }
                })
                .collect();
            sub_categories.sort_by_key(|sub| {
                node.sub_categories
                    .get(&sub.code)
                    .map(|s| s.display_order)
                    .unwrap_or(u32::MAX)
            });

            categories.push(CategoryRow {
                section: *section,
                label: node.label.clone(),
                total,
                rows,
                sub_categories,
            });
        }

        Self { categories }
    }

    pub fn category(&self, section: Section) -> Option<&CategoryRow> {
        self.categories.iter().find(|c| c.section == section)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Section,Code,Name,Q1,Q2,Q3,Q4,Cumulative\n");
        for category in &self.categories {
            push_csv_row(
                &mut output,
                category.section,
                "",
                &category.label,
                &category.total,
            );
            for row in &category.rows {
                push_csv_row(&mut output, category.section, &row.code, &row.name, &row.total);
            }
            for sub in &category.sub_categories {
                push_csv_row(&mut output, category.section, &sub.code, &sub.label, &sub.total);
                for row in &sub.rows {
                    push_csv_row(&mut output, category.section, &row.code, &row.name, &row.total);
                }
            }
        }
        output
    }
}

fn push_csv_row(output: &mut String, section: Section, code: &str, name: &str, total: &CategoryTotal) {
    output.push_str(&format!(
        "{:?},{},{},{:.2},{:.2},{:.2},{:.2},{:.2}\n",
        section,
        code,
        name,
        total.quarters.q1,
        total.quarters.q2,
        total.quarters.q3,
        total.quarters.q4,
        total.cumulative_balance
    ));
}

fn leaf_rows(
    items: &[Activity],
    mappings: &Mappings,
    merged: &ValueMap,
    section: Section,
    reported: ReportedQuarters,
) -> Vec<LeafRow> {
    let mut sorted: Vec<&Activity> = items
        .iter()
        .filter(|a| a.activity_type != crate::schema::ActivityType::TotalRow)
        .collect();
    sorted.sort_by_key(|a| a.display_order);

    sorted
        .into_iter()
        .map(|activity| {
            let quarters = leaf_quarters(merged, activity);
            // Accumulated surplus is constant by construction: its
            // cumulative equals its Q1 value no matter the quarter.
            let cumulative_balance = if activity.code == mappings.accumulated_surplus_code {
                quarters.q1
            } else {
                cumulative(&quarters, section.nature(), reported)
            };
            LeafRow {
                code: activity.code.clone(),
                name: activity.name.clone(),
                total: CategoryTotal {
                    quarters,
                    cumulative_balance,
                },
                comment: merged.get(&activity.code).and_then(|v| v.comment.clone()),
            }
        })
        .collect()
}
