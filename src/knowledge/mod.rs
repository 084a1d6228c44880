//! Knowledge base lookups.
//!
//! The query engine only needs a handful of services from the knowledge base:
//! metadata ids to substitute into expressions, coordinate liftover between
//! genome builds, and identifier resolution with an ambiguity tally. They are
//! gathered behind [`KnowledgeProvider`]; [`LokiKnowledge`] implements them over
//! the attached `db` schema.

/// Knowledge table definitions.
pub mod schema;

pub use schema::create_knowledge_schema;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::trace;

use crate::error::{BiofilterError, Result};
use crate::query::Value;

/// Outcome of resolving one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// No record carries the identifier.
    Unrecognized,
    /// Exactly one record carries it.
    Matched,
    /// Several records carry it; they are kept only when ambiguity is allowed.
    Ambiguous,
}

/// Counts of identifier resolution outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameTally {
    /// Identifiers matching nothing.
    pub unrecognized: u64,
    /// Identifiers matching one record.
    pub matched: u64,
    /// Identifiers matching several records.
    pub ambiguous: u64,
}

impl NameTally {
    /// Records one outcome.
    pub fn record(&mut self, outcome: Match) {
        match outcome {
            Match::Unrecognized => self.unrecognized += 1,
            Match::Matched => self.matched += 1,
            Match::Ambiguous => self.ambiguous += 1,
        }
    }
}

/// An identifier to resolve.
///
/// The namespace selects how `name` is read: `=` means a numeric record id,
/// `-` means the record's own label, `""` or `*` means any name in any
/// namespace, anything else names a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameQuery {
    /// Namespace selector.
    pub namespace: String,
    /// Identifier.
    pub name: String,
    /// Caller data carried to the resolved record.
    pub extra: Option<String>,
}

impl NameQuery {
    /// A name to look up in any namespace.
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            name: name.into(),
            extra: None,
        }
    }

    /// A name to look up in one namespace.
    pub fn in_namespace(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            extra: None,
        }
    }

    /// Attaches caller data.
    pub fn with_extra(mut self, extra: Option<String>) -> Self {
        self.extra = extra;
        self
    }
}

/// A resolved identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Identifier as given.
    pub name: String,
    /// Caller data from the query.
    pub extra: Option<String>,
    /// Record id.
    pub id: i64,
}

/// Services the engine consumes from the knowledge base.
pub trait KnowledgeProvider {
    /// Width of a chromosome zone.
    fn zone_size(&self, conn: &Connection) -> Result<i64>;

    /// Id of an LD profile; fails when the profile is unknown.
    fn ld_profile_id(&self, conn: &Connection, name: &str) -> Result<i64>;

    /// Id of a record type such as `gene`.
    fn type_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>>;

    /// Id of a name namespace such as `symbol`.
    fn namespace_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>>;

    /// Id of a knowledge source, matched case-insensitively.
    fn source_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>>;

    /// UCSC build of the knowledge coordinates.
    fn database_build(&self, conn: &Connection) -> Result<Option<u32>>;

    /// UCSC build matching a GRCh build number.
    fn ucschg_for_grch(&self, conn: &Connection, grch: u32) -> Result<Option<u32>>;

    /// Whether chains exist from `old` to `new`.
    fn has_liftover(&self, conn: &Connection, old: u32, new: u32) -> Result<bool>;

    /// Maps a position from `old` to `new`, or `None` when no chain covers it.
    fn lift_locus(&self, conn: &Connection, old: u32, new: u32, chr: i64, pos: i64) -> Result<Option<(i64, i64)>>;

    /// Current rs number of a possibly merged SNP.
    fn current_rs(&self, conn: &Connection, rs: i64) -> Result<i64>;

    /// Positions of a SNP, ordered by chromosome and position.
    fn snp_loci(&self, conn: &Connection, rs: i64, validated_only: bool) -> Result<Vec<(i64, i64)>>;

    /// Resolves biopolymer identifiers, optionally restricted to one type.
    fn biopolymer_ids_by_name(
        &self,
        conn: &Connection,
        names: &[NameQuery],
        type_id: Option<i64>,
        allow_ambiguous: bool,
    ) -> Result<(Vec<Resolved>, NameTally)>;

    /// Resolves group identifiers, optionally restricted to one type.
    fn group_ids_by_name(
        &self,
        conn: &Connection,
        names: &[NameQuery],
        type_id: Option<i64>,
        allow_ambiguous: bool,
    ) -> Result<(Vec<Resolved>, NameTally)>;

    /// Biopolymers whose label, description or any name contains a search
    /// text. Each hit is named by its label; a text without hits counts as
    /// unrecognized.
    fn biopolymer_ids_by_search(
        &self,
        conn: &Connection,
        searches: &[NameQuery],
        type_id: Option<i64>,
    ) -> Result<(Vec<Resolved>, NameTally)>;

    /// Groups matched the way [`KnowledgeProvider::biopolymer_ids_by_search`]
    /// matches biopolymers.
    fn group_ids_by_search(
        &self,
        conn: &Connection,
        searches: &[NameQuery],
        type_id: Option<i64>,
    ) -> Result<(Vec<Resolved>, NameTally)>;
}

/// [`KnowledgeProvider`] over a LOKI-layout knowledge schema.
#[derive(Debug, Clone, Copy)]
pub struct LokiKnowledge {
    schema: &'static str,
}

impl Default for LokiKnowledge {
    fn default() -> Self {
        Self { schema: "db" }
    }
}

/// Tables read by a name lookup.
struct NameTables {
    record: &'static str,
    names: &'static str,
    id: &'static str,
}

const BIOPOLYMER_NAMES: NameTables = NameTables {
    record: "biopolymer",
    names: "biopolymer_name",
    id: "biopolymer_id",
};

const GROUP_NAMES: NameTables = NameTables {
    record: "group",
    names: "group_name",
    id: "group_id",
};

impl LokiKnowledge {
    /// Provider reading the given attached schema.
    pub fn new(schema: &'static str) -> Self {
        Self { schema }
    }

    fn setting(&self, conn: &Connection, name: &str) -> Result<Option<String>> {
        let sql = format!("SELECT value FROM `{}`.`setting` WHERE setting = ?1", self.schema);
        Ok(conn
            .prepare_cached(&sql)?
            .query_row([name], |row| row.get::<_, Option<String>>(0))
            .optional()?
            .flatten())
    }

    fn lookup_id(&self, conn: &Connection, table: &str, column: &str, name: &str) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT {column}_id FROM `{}`.`{table}` WHERE {column} = ?1",
            self.schema
        );
        Ok(conn
            .prepare_cached(&sql)?
            .query_row([name], |row| row.get(0))
            .optional()?)
    }

    fn ids_by_name(
        &self,
        conn: &Connection,
        tables: &NameTables,
        names: &[NameQuery],
        type_id: Option<i64>,
        allow_ambiguous: bool,
    ) -> Result<(Vec<Resolved>, NameTally)> {
        let db = self.schema;
        let NameTables { record, names: name_table, id } = tables;
        let type_filter = if type_id.is_some() { " AND r.type_id = ?2" } else { "" };
        let by_id = format!("SELECT r.{id} FROM `{db}`.`{record}` AS r WHERE r.{id} = ?1{type_filter}");
        let by_label = format!("SELECT r.{id} FROM `{db}`.`{record}` AS r WHERE r.label = ?1{type_filter}");
        let by_any = format!(
            "SELECT DISTINCT r.{id} FROM `{db}`.`{name_table}` AS n \
             JOIN `{db}`.`{record}` AS r USING ({id}) WHERE n.name = ?1{type_filter}"
        );
        let ns_param = if type_id.is_some() { 3 } else { 2 };
        let by_namespace = format!(
            "SELECT DISTINCT r.{id} FROM `{db}`.`{name_table}` AS n \
             JOIN `{db}`.`namespace` AS ns USING (namespace_id) \
             JOIN `{db}`.`{record}` AS r USING ({id}) \
             WHERE n.name = ?1{type_filter} AND ns.namespace = ?{ns_param}"
        );

        let mut tally = NameTally::default();
        let mut resolved = Vec::new();
        for query in names {
            let (sql, namespace) = match query.namespace.as_str() {
                "=" => (&by_id, None),
                "-" => (&by_label, None),
                "" | "*" => (&by_any, None),
                other => (&by_namespace, Some(other.to_ascii_lowercase())),
            };
            let mut bindings: Vec<Value> = vec![match query.namespace.as_str() {
                "=" => query
                    .name
                    .trim()
                    .parse::<i64>()
                    .map_or(Value::Null, Value::Int),
                _ => Value::from(query.name.as_str()),
            }];
            bindings.extend(type_id.map(Value::Int));
            bindings.extend(namespace.map(Value::Text));
            let mut stmt = conn.prepare_cached(sql)?;
            let ids = stmt
                .query_map(params_from_iter(bindings.iter()), |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let outcome = match ids.len() {
                0 => Match::Unrecognized,
                1 => Match::Matched,
                _ => Match::Ambiguous,
            };
            tally.record(outcome);
            if outcome == Match::Matched || (outcome == Match::Ambiguous && allow_ambiguous) {
                resolved.extend(ids.into_iter().map(|id| Resolved {
                    name: query.name.clone(),
                    extra: query.extra.clone(),
                    id,
                }));
            }
        }
        trace!(record = *record, names = names.len(), matched = tally.matched, "knowledge.names.resolved");
        Ok((resolved, tally))
    }

    fn ids_by_search(
        &self,
        conn: &Connection,
        tables: &NameTables,
        searches: &[NameQuery],
        type_id: Option<i64>,
    ) -> Result<(Vec<Resolved>, NameTally)> {
        let db = self.schema;
        let NameTables { record, names: name_table, id } = tables;
        let type_filter = if type_id.is_some() { " AND r.type_id = ?2" } else { "" };
        let sql = format!(
            "SELECT r.{id}, r.label FROM `{db}`.`{record}` AS r \
             LEFT JOIN `{db}`.`{name_table}` AS n USING ({id}) \
             WHERE (r.label LIKE '%' || ?1 || '%' \
                OR r.description LIKE '%' || ?1 || '%' \
                OR n.name LIKE '%' || ?1 || '%'){type_filter} \
             GROUP BY r.{id} ORDER BY r.{id}"
        );
        let mut tally = NameTally::default();
        let mut resolved = Vec::new();
        let mut stmt = conn.prepare_cached(&sql)?;
        for query in searches {
            let mut bindings = vec![Value::from(query.name.as_str())];
            bindings.extend(type_id.map(Value::Int));
            let hits = stmt
                .query_map(params_from_iter(bindings.iter()), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            tally.record(if hits.is_empty() { Match::Unrecognized } else { Match::Matched });
            resolved.extend(hits.into_iter().map(|(id, label)| Resolved {
                name: label,
                extra: query.extra.clone(),
                id,
            }));
        }
        trace!(record = *record, searches = searches.len(), hits = resolved.len(), "knowledge.search.resolved");
        Ok((resolved, tally))
    }
}

impl KnowledgeProvider for LokiKnowledge {
    fn zone_size(&self, conn: &Connection) -> Result<i64> {
        self.setting(conn, "zone_size")?
            .and_then(|v| v.trim().parse().ok())
            .filter(|size: &i64| *size > 0)
            .ok_or_else(|| BiofilterError::knowledge("setting", "zone_size"))
    }

    fn ld_profile_id(&self, conn: &Connection, name: &str) -> Result<i64> {
        self.lookup_id(conn, "ldprofile", "ldprofile", name)?
            .ok_or_else(|| BiofilterError::knowledge("LD profile", name))
    }

    fn type_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>> {
        self.lookup_id(conn, "type", "type", name)
    }

    fn namespace_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>> {
        self.lookup_id(conn, "namespace", "namespace", name)
    }

    fn source_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT source_id FROM `{}`.`source` WHERE LOWER(source) = LOWER(?1)",
            self.schema
        );
        Ok(conn
            .prepare_cached(&sql)?
            .query_row([name], |row| row.get(0))
            .optional()?)
    }

    fn database_build(&self, conn: &Connection) -> Result<Option<u32>> {
        Ok(self
            .setting(conn, "ucschg")?
            .and_then(|v| v.trim().parse().ok()))
    }

    fn ucschg_for_grch(&self, conn: &Connection, grch: u32) -> Result<Option<u32>> {
        let sql = format!("SELECT ucschg FROM `{}`.`grch_ucschg` WHERE grch = ?1", self.schema);
        Ok(conn
            .prepare_cached(&sql)?
            .query_row([grch], |row| row.get(0))
            .optional()?)
    }

    fn has_liftover(&self, conn: &Connection, old: u32, new: u32) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT() FROM `{}`.`chain` WHERE old_ucschg = ?1 AND new_ucschg = ?2",
            self.schema
        );
        let count: i64 = conn.prepare_cached(&sql)?.query_row([old, new], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn lift_locus(&self, conn: &Connection, old: u32, new: u32, chr: i64, pos: i64) -> Result<Option<(i64, i64)>> {
        let db = self.schema;
        let sql = format!(
            "SELECT c.new_chr, c.is_fwd, d.old_start, d.new_start \
             FROM `{db}`.`chain` AS c JOIN `{db}`.`chain_data` AS d USING (chain_id) \
             WHERE c.old_ucschg = ?1 AND c.new_ucschg = ?2 AND c.old_chr = ?3 \
               AND c.old_start <= ?4 AND c.old_end >= ?4 \
               AND d.old_start <= ?4 AND d.old_end >= ?4 \
             ORDER BY c.score DESC, c.chain_id LIMIT 1"
        );
        let hit = conn
            .prepare_cached(&sql)?
            .query_row(params![old, new, chr, pos], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .optional()?;
        Ok(hit.map(|(new_chr, forward, old_start, new_start)| {
            let delta = pos - old_start;
            let lifted = if forward { new_start + delta } else { new_start - delta };
            (new_chr, lifted)
        }))
    }

    fn current_rs(&self, conn: &Connection, rs: i64) -> Result<i64> {
        let sql = format!(
            "SELECT COALESCE((SELECT rsCurrent FROM `{}`.`snp_merge` WHERE rsMerged = ?1 LIMIT 1), ?1)",
            self.schema
        );
        Ok(conn.prepare_cached(&sql)?.query_row([rs], |row| row.get(0))?)
    }

    fn snp_loci(&self, conn: &Connection, rs: i64, validated_only: bool) -> Result<Vec<(i64, i64)>> {
        let sql = format!(
            "SELECT chr, pos FROM `{}`.`snp_locus` WHERE rs = ?1 AND (?2 = 0 OR validated > 0) ORDER BY chr, pos",
            self.schema
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let loci = stmt
            .query_map(params![rs, validated_only], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(loci)
    }

    fn biopolymer_ids_by_name(
        &self,
        conn: &Connection,
        names: &[NameQuery],
        type_id: Option<i64>,
        allow_ambiguous: bool,
    ) -> Result<(Vec<Resolved>, NameTally)> {
        self.ids_by_name(conn, &BIOPOLYMER_NAMES, names, type_id, allow_ambiguous)
    }

    fn group_ids_by_name(
        &self,
        conn: &Connection,
        names: &[NameQuery],
        type_id: Option<i64>,
        allow_ambiguous: bool,
    ) -> Result<(Vec<Resolved>, NameTally)> {
        self.ids_by_name(conn, &GROUP_NAMES, names, type_id, allow_ambiguous)
    }

    fn biopolymer_ids_by_search(
        &self,
        conn: &Connection,
        searches: &[NameQuery],
        type_id: Option<i64>,
    ) -> Result<(Vec<Resolved>, NameTally)> {
        self.ids_by_search(conn, &BIOPOLYMER_NAMES, searches, type_id)
    }

    fn group_ids_by_search(
        &self,
        conn: &Connection,
        searches: &[NameQuery],
        type_id: Option<i64>,
    ) -> Result<(Vec<Resolved>, NameTally)> {
        self.ids_by_search(conn, &GROUP_NAMES, searches, type_id)
    }
}
