//! Workspace session.
//!
//! A [`Biofilter`] owns the single connection every plan runs on, the filter
//! counters of the workspace tables, and the set of tables whose indexes were
//! dropped for loading. Plans are executed through the session so those
//! tables are re-indexed (and region zones rebuilt) before they are read.

mod input;
mod schema;

pub use input::{
    chromosome_name, parse_chromosome, parse_locus_line, parse_name_line, parse_region_line,
    parse_snp_line, read_input_lines, read_user_knowledge, InputError, InputSet, InputSummary,
    LocusInput, RegionInput, SnpInput, UserGroup, UserKnowledge,
};
pub use schema::{create_workspace_schema, filter_indexes};

use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use crate::catalog::{Db, PredicateOptions, Table};
use crate::config::Options;
use crate::error::{BiofilterError, Result};
use crate::knowledge::{create_knowledge_schema, KnowledgeProvider, LokiKnowledge, NameQuery, NameTally};
use crate::query::{DedupPolicy, Executor, FilterState, Planner, QueryPlan, QueryRequest, Value};

use self::schema::{create_filter_indexes, drop_filter_indexes};

/// Where the session keeps its workspace and which knowledge file it reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions<'p> {
    /// Workspace file for `main`; in memory when absent.
    pub workspace: Option<&'p Path>,
    /// Knowledge database; an empty in-memory knowledge schema when absent.
    pub knowledge: Option<&'p Path>,
}

/// A filtering session over one connection.
pub struct Biofilter {
    conn: Connection,
    options: Options,
    knowledge: LokiKnowledge,
    predicates: PredicateOptions,
    filters: FilterState,
    deindexed: BTreeSet<(Db, Table)>,
}

impl std::fmt::Debug for Biofilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Biofilter")
            .field("filters", &self.filters)
            .field("deindexed", &self.deindexed)
            .finish_non_exhaustive()
    }
}

impl Biofilter {
    /// Opens a session, attaching the workspace schemas and the knowledge base.
    pub fn open(open: OpenOptions<'_>, options: Options) -> Result<Self> {
        let conn = match open.workspace {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        for schema in ["alt", "cand", "user"] {
            conn.execute_batch(&format!("ATTACH DATABASE ':memory:' AS `{schema}`"))?;
        }
        match open.knowledge {
            Some(path) => {
                let path = path.to_string_lossy();
                conn.execute("ATTACH DATABASE ?1 AS `db`", [path.as_ref()])?;
            }
            None => {
                conn.execute_batch("ATTACH DATABASE ':memory:' AS `db`")?;
                create_knowledge_schema(&conn, "db")?;
            }
        }
        create_workspace_schema(&conn)?;
        let knowledge = LokiKnowledge::default();
        let predicates = predicate_options(&conn, &knowledge, &options)?;
        info!(
            workspace = ?open.workspace,
            knowledge = ?open.knowledge,
            zone_size = predicates.zone_size,
            "session.opened"
        );
        Ok(Self {
            conn,
            options,
            knowledge,
            predicates,
            filters: FilterState::new(),
            deindexed: BTreeSet::new(),
        })
    }

    /// An in-memory session over an empty knowledge schema.
    pub fn open_in_memory(options: Options) -> Result<Self> {
        Self::open(OpenOptions::default(), options)
    }

    /// The session connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Knowledge lookups.
    pub fn knowledge(&self) -> &LokiKnowledge {
        &self.knowledge
    }

    /// Predicate parameters derived from the options and the knowledge base.
    pub fn predicate_options(&self) -> &PredicateOptions {
        &self.predicates
    }

    /// Current filter counters.
    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub(crate) fn filters_mut(&mut self) -> &mut FilterState {
        &mut self.filters
    }

    /// Re-reads knowledge metadata, for knowledge loaded after the session opened.
    pub fn refresh_knowledge(&mut self) -> Result<()> {
        self.predicates = predicate_options(&self.conn, &self.knowledge, &self.options)?;
        Ok(())
    }

    /// Planner over the session's filters.
    pub fn planner(&self) -> Planner<'_> {
        Planner::new(&self.predicates, &self.filters)
            .with_alternate_model_filtering(self.options.alternate_model_filtering)
    }

    /// Assembles a plan for a request.
    pub fn assemble(&self, request: &QueryRequest) -> Result<QueryPlan> {
        self.planner().assemble(request)
    }

    /// Whether user-defined knowledge is loaded.
    pub fn has_user_knowledge(&self) -> bool {
        self.filters.is_populated(Db::User, Table::Source)
    }

    /// Executor over the session connection.
    pub fn executor(&self) -> Executor<'_> {
        Executor::new(&self.conn)
    }

    /// Re-indexes every loaded table a plan reads.
    pub fn prepare_plan(&mut self, plan: &QueryPlan) -> Result<()> {
        for alias in plan.aliases().iter() {
            let (db, table) = alias.location();
            if matches!(db, Db::Main | Db::Alt) {
                self.prepare_table_for_query(db, table)?;
            }
        }
        Ok(())
    }

    /// Prepares the tables of both plans, then executes them under `policy`.
    pub fn execute<F>(
        &mut self,
        plan: &QueryPlan,
        query2: Option<&QueryPlan>,
        bindings: &[Value],
        policy: DedupPolicy,
        on_row: F,
    ) -> Result<u64>
    where
        F: FnMut(Vec<Value>) -> Result<ControlFlow<()>>,
    {
        self.prepare_plan(plan)?;
        if let Some(second) = query2 {
            self.prepare_plan(second)?;
        }
        self.executor().execute(plan, query2, bindings, policy, on_row)
    }

    /// Collects every row of a plan.
    pub fn collect(&mut self, plan: &QueryPlan, policy: DedupPolicy) -> Result<Vec<Vec<Value>>> {
        let mut rows = Vec::new();
        self.execute(plan, None, &[], policy, |row| {
            rows.push(row);
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(rows)
    }

    /// Drops a filter table's indexes ahead of a bulk load.
    pub fn prepare_table_for_update(&mut self, db: Db, table: Table) -> Result<()> {
        let table = canonical(table);
        if self.deindexed.insert((db, table)) {
            drop_filter_indexes(&self.conn, db, table)?;
            if table == Table::Region {
                drop_filter_indexes(&self.conn, db, Table::RegionZone)?;
            }
            debug!(db = db.schema(), table = table.name(), "workspace.table.deindexed");
        }
        Ok(())
    }

    /// Rebuilds a filter table's indexes after a bulk load.
    ///
    /// For regions this also swaps inverted bounds and regenerates the zone table.
    pub fn prepare_table_for_query(&mut self, db: Db, table: Table) -> Result<()> {
        let table = canonical(table);
        if !self.deindexed.remove(&(db, table)) {
            return Ok(());
        }
        if table == Table::Region {
            self.rebuild_region_zones(db)?;
            create_filter_indexes(&self.conn, db, Table::RegionZone)?;
        }
        create_filter_indexes(&self.conn, db, table)?;
        debug!(db = db.schema(), table = table.name(), "workspace.table.indexed");
        Ok(())
    }

    fn rebuild_region_zones(&self, db: Db) -> Result<()> {
        let schema = db.schema();
        let size = self.predicates.zone_size;
        let swapped = self.conn.execute(
            &format!(
                "UPDATE `{schema}`.`region` SET posMin = posMax, posMax = posMin WHERE posMin > posMax"
            ),
            [],
        )?;
        if swapped > 0 {
            warn!(db = schema, regions = swapped, "workspace.region.bounds_swapped");
        }
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&format!("DELETE FROM `{schema}`.`region_zone`"), [])?;
        {
            let mut select = tx.prepare(&format!(
                "SELECT rowid, chr, posMin, posMax FROM `{schema}`.`region`"
            ))?;
            let mut insert = tx.prepare(&format!(
                "INSERT OR IGNORE INTO `{schema}`.`region_zone` (region_rowid, chr, zone) VALUES (?1, ?2, ?3)"
            ))?;
            let mut rows = select.query([])?;
            while let Some(row) = rows.next()? {
                let (rowid, chr, min, max): (i64, i64, i64, i64) =
                    (row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?);
                for zone in min.div_euclid(size)..=max.div_euclid(size) {
                    insert.execute(params![rowid, chr, zone])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Adds a user-defined knowledge source and returns its (negative) id.
    pub fn add_user_source(&mut self, label: &str, description: Option<&str>) -> Result<i64> {
        let id = -i64::from(self.filters.bump(Db::User, Table::Source));
        self.conn.execute(
            "INSERT INTO `user`.`source` (source_id, source, description) VALUES (?1, ?2, ?3)",
            params![id, label, description],
        )?;
        info!(source_id = id, label, "user.source.added");
        Ok(id)
    }

    /// Adds a user-defined group under a user source and returns its (negative) id.
    pub fn add_user_group(&mut self, source_id: i64, label: &str, description: Option<&str>) -> Result<i64> {
        let id = -i64::from(self.filters.bump(Db::User, Table::Group));
        self.conn.execute(
            "INSERT INTO `user`.`group` (group_id, label, description, source_id) VALUES (?1, ?2, ?3, ?4)",
            params![id, label, description, source_id],
        )?;
        info!(group_id = id, label, "user.group.added");
        Ok(id)
    }

    /// Adds genes to a user-defined group. Ambiguous identifiers add every match.
    pub fn add_user_group_biopolymers(&mut self, group_id: i64, names: &[NameQuery]) -> Result<NameTally> {
        let gene_type = self.gene_type_id()?;
        let (resolved, tally) =
            self.knowledge
                .biopolymer_ids_by_name(&self.conn, names, Some(gene_type), true)?;
        {
            let mut insert = self.conn.prepare_cached(
                "INSERT OR IGNORE INTO `user`.`group_biopolymer` (group_id, biopolymer_id) VALUES (?1, ?2)",
            )?;
            for record in &resolved {
                insert.execute(params![group_id, record.id])?;
            }
        }
        warn_tally("gene", &tally);
        self.filters.bump(Db::User, Table::GroupBiopolymer);
        info!(group_id, genes = resolved.len(), "user.group.genes_added");
        Ok(tally)
    }

    /// Adds a parsed user knowledge source with all of its groups and genes.
    pub fn load_user_knowledge(&mut self, knowledge: &UserKnowledge) -> Result<NameTally> {
        let source_id = self.add_user_source(&knowledge.label, knowledge.description.as_deref())?;
        let mut tally = NameTally::default();
        for group in &knowledge.groups {
            let group_id = self.add_user_group(source_id, &group.label, group.description.as_deref())?;
            if group.genes.is_empty() {
                continue;
            }
            let found = self.add_user_group_biopolymers(group_id, &group.genes)?;
            tally.unrecognized += found.unrecognized;
            tally.matched += found.matched;
            tally.ambiguous += found.ambiguous;
        }
        info!(
            source = %knowledge.label,
            groups = knowledge.groups.len(),
            matched = tally.matched,
            "user.knowledge.loaded"
        );
        Ok(tally)
    }

    /// Loads the genes (or, at group level, the groups) of the user knowledge
    /// into the main filter.
    pub fn apply_user_knowledge_filter(&mut self, group_level: bool) -> Result<u64> {
        let (table, sql) = if group_level {
            (
                Table::Group,
                "INSERT INTO `main`.`group` (label, group_id, extra) \
                 SELECT DISTINCT u_g.label, u_g.group_id, u_g.extra FROM `user`.`group` AS u_g \
                 UNION \
                 SELECT DISTINCT d_g.label, d_g.group_id, NULL AS extra \
                 FROM `user`.`group_biopolymer` AS u_gb \
                 JOIN `db`.`group_biopolymer` AS d_gb ON d_gb.biopolymer_id = u_gb.biopolymer_id \
                 JOIN `db`.`group` AS d_g ON d_g.group_id = d_gb.group_id",
            )
        } else {
            (
                Table::Gene,
                "INSERT INTO `main`.`gene` (label, biopolymer_id, extra) \
                 SELECT DISTINCT d_b.label, d_b.biopolymer_id, NULL AS extra \
                 FROM `user`.`group_biopolymer` AS u_gb \
                 JOIN `db`.`biopolymer` AS d_b ON d_b.biopolymer_id = u_gb.biopolymer_id",
            )
        };
        if self.filters.is_populated(Db::Main, table) {
            return Err(BiofilterError::Config(format!(
                "user knowledge can only seed an empty main {} filter",
                table.name()
            )));
        }
        self.prepare_table_for_update(Db::Main, table)?;
        let added = self.conn.execute(sql, [])? as u64;
        self.filters.bump(Db::Main, table);
        info!(table = table.name(), added, "user.knowledge.applied");
        Ok(added)
    }

    pub(crate) fn gene_type_id(&self) -> Result<i64> {
        self.predicates
            .gene_type_id
            .ok_or_else(|| BiofilterError::knowledge("type", "gene"))
    }

    /// Knowledge or user source id for a source name.
    pub(crate) fn source_id(&self, name: &str) -> Result<Option<i64>> {
        if let Some(id) = self.knowledge.source_id(&self.conn, name)? {
            return Ok(Some(id));
        }
        let mut stmt = self
            .conn
            .prepare_cached("SELECT source_id FROM `user`.`source` WHERE LOWER(source) = LOWER(?1)")?;
        let mut rows = stmt.query([name])?;
        Ok(match rows.next()? {
            Some(row) => Some(row.get(0)?),
            None => None,
        })
    }
}

fn canonical(table: Table) -> Table {
    if table == Table::RegionZone {
        Table::Region
    } else {
        table
    }
}

pub(crate) fn warn_tally(what: &str, tally: &NameTally) {
    if tally.unrecognized > 0 {
        warn!(what, count = tally.unrecognized, "input.identifiers.unrecognized");
    }
    if tally.ambiguous > 0 {
        warn!(what, count = tally.ambiguous, "input.identifiers.ambiguous");
    }
}

fn predicate_options(conn: &Connection, knowledge: &LokiKnowledge, options: &Options) -> Result<PredicateOptions> {
    let mut predicates = PredicateOptions::new(
        knowledge.zone_size(conn)?,
        knowledge.ld_profile_id(conn, &options.ld_profile)?,
    );
    predicates.gene_type_id = knowledge.type_id(conn, "gene")?;
    predicates.symbol_namespace_id = knowledge.namespace_id(conn, "symbol")?;
    predicates.position_margin = options.region_position_margin;
    predicates.match_percent = options.region_match_percent;
    predicates.match_bases = options.region_match_bases;
    predicates.allow_ambiguous_knowledge = options.allow_ambiguous_knowledge;
    predicates.ambiguity_reduction = options.reduce_ambiguous_knowledge;
    predicates.allow_unvalidated_snp_positions = options.allow_unvalidated_snp_positions;
    predicates.coordinate_base = options.coordinate_base;
    predicates.regions_half_open = options.regions_half_open;
    Ok(predicates)
}
