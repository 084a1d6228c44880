//! Statement text for assembled plans.

use crate::catalog::Alias;

use super::plan::QueryPlan;
use super::profile::{profile_timer, record_profile_timer, ProfileKind};

/// Knobs for rendering a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Appends the identity columns to `ORDER BY`, so rows sharing an
    /// identity arrive contiguously.
    pub order_identity: bool,
    /// Sorts rows with null identity parts after the others.
    pub identity_nulls_last: bool,
}

/// A rendered statement and the shape of its result rows.
///
/// Each row holds `output_len` output values followed by `identity_len`
/// identity values named `_rowid_N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQuery {
    /// Statement text.
    pub sql: String,
    /// Number of output columns.
    pub output_len: usize,
    /// Number of trailing identity columns.
    pub identity_len: usize,
    /// Output column names.
    pub columns: Vec<String>,
}

fn qualified(alias: Alias) -> String {
    let (db, table) = alias.location();
    format!("`{}`.`{}` AS {}", db.schema(), table.name(), alias)
}

/// Renders a plan into statement text.
pub fn render(plan: &QueryPlan, options: RenderOptions) -> RenderedQuery {
    let start = profile_timer();
    let mut outputs: Vec<String> = plan
        .columns
        .iter()
        .zip(&plan.select)
        .map(|(col, expr)| format!("{expr} AS {col}"))
        .collect();
    outputs.extend(
        plan.identity
            .iter()
            .enumerate()
            .map(|(n, (alias, field))| format!("{alias}.{field} AS _rowid_{n}")),
    );
    if outputs.is_empty() {
        outputs.push("1".to_string());
    }
    let mut sql = format!("SELECT {}\n", outputs.join(",\n  "));

    let mut anchors: Vec<Alias> = plan.from.iter().collect();
    anchors.sort_by_key(|a| a.name());
    if !anchors.is_empty() {
        let tables: Vec<String> = anchors.into_iter().map(qualified).collect();
        sql.push_str(&format!("FROM {}\n", tables.join(",\n  ")));
    }
    for join in &plan.joins {
        sql.push_str(&format!("LEFT JOIN {}\n", qualified(join.alias)));
        if join.conditions.is_empty() {
            sql.push_str("  ON 1\n");
        } else {
            let conds: Vec<&str> = join.conditions.iter().map(String::as_str).collect();
            sql.push_str(&format!("  ON {}\n", conds.join("\n  AND ")));
        }
    }
    if !plan.conditions.is_empty() {
        let conds: Vec<&str> = plan.conditions.iter().map(String::as_str).collect();
        sql.push_str(&format!("WHERE {}\n", conds.join("\n  AND ")));
    }
    if !plan.group_by.is_empty() {
        sql.push_str(&format!("GROUP BY {}\n", plan.group_by.join(", ")));
    }
    if !plan.having.is_empty() {
        let conds: Vec<&str> = plan.having.iter().map(String::as_str).collect();
        sql.push_str(&format!("HAVING {}\n", conds.join("\n  AND ")));
    }
    let mut order = plan.order_by.clone();
    if options.identity_nulls_last {
        order.extend(
            plan.identity
                .iter()
                .map(|(alias, field)| format!("({alias}.{field} IS NULL)")),
        );
    }
    if options.order_identity {
        order.extend(
            plan.identity
                .iter()
                .map(|(alias, field)| format!("{alias}.{field}")),
        );
    }
    if !order.is_empty() {
        sql.push_str(&format!("ORDER BY {}\n", order.join(", ")));
    }
    if let Some(limit) = plan.limit {
        sql.push_str(&format!("LIMIT {limit}\n"));
    }
    record_profile_timer(ProfileKind::Render, start);
    RenderedQuery {
        sql,
        output_len: plan.columns.len(),
        identity_len: plan.identity.len(),
        columns: plan.columns.iter().map(|c| c.name().to_string()).collect(),
    }
}
