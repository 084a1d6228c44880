//! Plan requests and the structured plans the assembler produces.

use std::collections::BTreeSet;
use std::fmt;

use crate::catalog::{Alias, AliasSet, Column, Db};

use super::filters::FilterState;

/// Query mode, which decides how anchors are chosen and how missing columns are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// Inner-join everything needed; rows must satisfy every filter.
    Filter,
    /// Outer-join each column's preferred source onto the anchors.
    Annotate,
    /// Candidate biopolymer pass: group and source tables never anchor.
    ModelLeft,
    /// Candidate group pass: only group and source tables anchor.
    ModelRight,
    /// Candidate pair baseline over the `cand` workspace.
    Model,
}

/// Workspace whose populated filters anchor a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Focus {
    /// Primary workspace.
    Main,
    /// Alternate workspace.
    Alt,
    /// Candidate model workspace.
    Cand,
}

impl Focus {
    /// Logical database of the focus.
    pub fn db(self) -> Db {
        match self {
            Focus::Main => Db::Main,
            Focus::Alt => Db::Alt,
            Focus::Cand => Db::Cand,
        }
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Positional statement parameter (1-based).
    Param(usize),
    /// Integer literal.
    Int(i64),
}

/// Typed comparison appended to a column or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    /// Operator.
    pub op: CompareOp,
    /// Right-hand side.
    pub rhs: Operand,
}

impl Comparison {
    /// `= ?n`
    pub fn eq_param(n: usize) -> Self {
        Self {
            op: CompareOp::Eq,
            rhs: Operand::Param(n),
        }
    }

    /// `= value`
    pub fn eq(value: i64) -> Self {
        Self {
            op: CompareOp::Eq,
            rhs: Operand::Int(value),
        }
    }

    /// `!= value`
    pub fn ne(value: i64) -> Self {
        Self {
            op: CompareOp::Ne,
            rhs: Operand::Int(value),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
        };
        match self.rhs {
            Operand::Param(n) => write!(f, "{op} ?{n}"),
            Operand::Int(v) => write!(f, "{op} {v}"),
        }
    }
}

/// Condition on a raw field of a specific alias. The alias always anchors the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCondition {
    /// Alias the field belongs to.
    pub alias: Alias,
    /// Field name.
    pub field: &'static str,
    /// Comparison applied to the field.
    pub cmp: Comparison,
}

/// Everything the assembler needs to build one plan.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Query mode.
    pub mode: QueryMode,
    /// Focus workspace.
    pub focus: Focus,
    /// Output columns, in order.
    pub select: Vec<Column>,
    /// Conditions on resolved columns.
    pub having: Vec<(Column, Comparison)>,
    /// Conditions on raw alias fields.
    pub conditions: Vec<RowCondition>,
    /// Whether coordinates are shifted into the output convention.
    pub apply_offsets: bool,
    /// Filter counts overriding the session's.
    pub filters: Option<FilterState>,
    /// Whether user knowledge replaces the knowledge group tables.
    pub user_knowledge: bool,
}

impl QueryRequest {
    /// Starts a request for the given columns.
    pub fn new(mode: QueryMode, focus: Focus, select: impl Into<Vec<Column>>) -> Self {
        Self {
            mode,
            focus,
            select: select.into(),
            having: Vec::new(),
            conditions: Vec::new(),
            apply_offsets: false,
            filters: None,
            user_knowledge: false,
        }
    }

    /// Adds a condition on a resolved column.
    pub fn having(mut self, column: Column, cmp: Comparison) -> Self {
        self.having.push((column, cmp));
        self
    }

    /// Adds a condition on a raw alias field.
    pub fn condition(mut self, alias: Alias, field: &'static str, cmp: Comparison) -> Self {
        self.conditions.push(RowCondition { alias, field, cmp });
        self
    }

    /// Shifts coordinates into the output convention.
    pub fn with_offsets(mut self) -> Self {
        self.apply_offsets = true;
        self
    }

    /// Plans against the given filter counts instead of the session's.
    pub fn with_filters(mut self, filters: FilterState) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Reads user knowledge in place of the knowledge group tables.
    pub fn with_user_knowledge(mut self) -> Self {
        self.user_knowledge = true;
        self
    }
}

/// Outer-joined alias with its `ON` conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterJoin {
    /// Joined alias.
    pub alias: Alias,
    /// Conditions of the join.
    pub conditions: BTreeSet<String>,
}

/// Structured plan: rendered expressions, anchors, outer-join chain and clauses.
///
/// Every alias referenced by an outer join's conditions is an anchor or an
/// earlier outer join, so the chain resolves left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Requested columns, in output order.
    pub columns: Vec<Column>,
    /// Rendered expression for each column.
    pub select: Vec<String>,
    /// Row identity parts, `(alias, field)`, in first-use order.
    pub identity: Vec<(Alias, &'static str)>,
    /// Anchor aliases, inner-joined.
    pub from: AliasSet,
    /// Outer-joined aliases, in insertion order.
    pub joins: Vec<OuterJoin>,
    /// `WHERE` conditions.
    pub conditions: BTreeSet<String>,
    /// `GROUP BY` expressions.
    pub group_by: Vec<String>,
    /// `HAVING` conditions.
    pub having: BTreeSet<String>,
    /// `ORDER BY` expressions.
    pub order_by: Vec<String>,
    /// Row limit.
    pub limit: Option<u64>,
}

/// Where a condition lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Where,
    Join(usize),
}

impl QueryPlan {
    pub(crate) fn new(columns: Vec<Column>, from: AliasSet, joins: Vec<Alias>) -> Self {
        Self {
            select: vec![String::from("NULL"); columns.len()],
            columns,
            identity: Vec::new(),
            from,
            joins: joins
                .into_iter()
                .map(|alias| OuterJoin {
                    alias,
                    conditions: BTreeSet::new(),
                })
                .collect(),
            conditions: BTreeSet::new(),
            group_by: Vec::new(),
            having: BTreeSet::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Position of an alias in the outer-join chain.
    pub fn join_position(&self, alias: Alias) -> Option<usize> {
        self.joins.iter().position(|j| j.alias == alias)
    }

    /// Whether the alias is an anchor or an outer join.
    pub fn contains(&self, alias: Alias) -> bool {
        self.from.contains(alias) || self.join_position(alias).is_some()
    }

    /// All aliases of the plan.
    pub fn aliases(&self) -> AliasSet {
        self.joins
            .iter()
            .fold(self.from, |mut set, j| {
                set.insert(j.alias);
                set
            })
    }

    /// Rendered expression of the first occurrence of a column.
    pub fn expression(&self, column: Column) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| *c == column)
            .map(|i| self.select[i].as_str())
    }

    pub(crate) fn push_identity(&mut self, alias: Alias, field: &'static str) {
        if !self.identity.contains(&(alias, field)) {
            self.identity.push((alias, field));
        }
    }

    pub(crate) fn placement_of(&self, alias: Alias) -> Option<Placement> {
        if self.from.contains(alias) {
            Some(Placement::Where)
        } else {
            self.join_position(alias).map(Placement::Join)
        }
    }

    /// Where a condition between two aliases belongs: `WHERE` when both are
    /// anchors, otherwise the later of the two in the outer-join chain.
    pub(crate) fn pair_placement(&self, left: Alias, right: Alias) -> Option<Placement> {
        match (self.placement_of(left)?, self.placement_of(right)?) {
            (Placement::Where, Placement::Where) => Some(Placement::Where),
            (Placement::Where, join) | (join, Placement::Where) => Some(join),
            (Placement::Join(l), Placement::Join(r)) => Some(Placement::Join(l.max(r))),
        }
    }

    pub(crate) fn attach(&mut self, placement: Placement, condition: String) {
        match placement {
            Placement::Where => {
                self.conditions.insert(condition);
            }
            Placement::Join(idx) => {
                self.joins[idx].conditions.insert(condition);
            }
        }
    }

    /// Explain tree describing the plan.
    pub fn explain(&self) -> PlanExplain {
        let mut root = ExplainNode::new("Select");
        for (col, expr) in self.columns.iter().zip(&self.select) {
            root.props.push(ExplainProp::new(col.name(), expr.clone()));
        }
        if !self.identity.is_empty() {
            let parts: Vec<_> = self
                .identity
                .iter()
                .map(|(a, f)| format!("{a}.{f}"))
                .collect();
            root.props.push(ExplainProp::new("identity", parts.join(", ")));
        }
        let mut from = ExplainNode::new("From");
        for alias in self.from.iter() {
            let (db, table) = alias.location();
            from.props.push(ExplainProp::new(
                alias.name(),
                format!("{}.{}", db.schema(), table.name()),
            ));
        }
        for cond in &self.conditions {
            from.props.push(ExplainProp::new("where", cond.clone()));
        }
        let mut input = from;
        for join in &self.joins {
            let (db, table) = join.alias.location();
            let mut node = ExplainNode::new(format!(
                "LeftJoin {} ({}.{})",
                join.alias,
                db.schema(),
                table.name()
            ));
            for cond in &join.conditions {
                node.props.push(ExplainProp::new("on", cond.clone()));
            }
            node.inputs.push(input);
            input = node;
        }
        root.inputs.push(input);
        PlanExplain { root }
    }
}

/// Human-readable explain tree.
#[derive(Clone, Debug)]
pub struct PlanExplain {
    /// Root node of the explain tree.
    pub root: ExplainNode,
}

/// Explain node representing an operator with its properties.
#[derive(Clone, Debug)]
pub struct ExplainNode {
    /// Operator name.
    pub op: String,
    /// Additional properties describing the operator.
    pub props: Vec<ExplainProp>,
    /// Input operators.
    pub inputs: Vec<ExplainNode>,
}

impl ExplainNode {
    /// Creates a new explain node with the given operator name.
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            props: Vec::new(),
            inputs: Vec::new(),
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.op, indent = depth * 2)?;
        for prop in &self.props {
            writeln!(
                f,
                "{:indent$}{}: {}",
                "",
                prop.key,
                prop.value,
                indent = depth * 2 + 4
            )?;
        }
        for input in &self.inputs {
            input.write(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Single property associated with an [`ExplainNode`].
#[derive(Clone, Debug)]
pub struct ExplainProp {
    /// Property key.
    pub key: String,
    /// Property value serialized for display.
    pub value: String,
}

impl ExplainProp {
    fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for PlanExplain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.write(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparisons_render() {
        assert_eq!(Comparison::eq_param(2).to_string(), "= ?2");
        assert_eq!(Comparison::ne(0).to_string(), "!= 0");
    }

    #[test]
    fn later_join_wins_pair_placement() {
        let plan = QueryPlan::new(
            vec![Column::GeneLabel],
            AliasSet::of(&[Alias::MainSnp]),
            vec![Alias::SnpLocus, Alias::BiopolymerZone],
        );
        assert_eq!(
            plan.pair_placement(Alias::MainSnp, Alias::SnpLocus),
            Some(Placement::Join(0))
        );
        assert_eq!(
            plan.pair_placement(Alias::BiopolymerZone, Alias::SnpLocus),
            Some(Placement::Join(1))
        );
        assert_eq!(plan.pair_placement(Alias::MainSnp, Alias::Gwas), None);
        assert_eq!(
            plan.pair_placement(Alias::MainSnp, Alias::MainSnp),
            Some(Placement::Where)
        );
    }
}
