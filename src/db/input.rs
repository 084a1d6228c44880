//! Input records and the union/intersect loaders of the filter tables.
//!
//! Line parsers accept whitespace-separated columns. Blank lines and lines
//! starting with `#` are skipped; a malformed first line is taken as a header.

use std::io::BufRead;

use tracing::{debug, info, warn};

use crate::catalog::{Db, Table};
use crate::error::{BiofilterError, Result};
use crate::knowledge::{KnowledgeProvider, NameQuery, NameTally};
use crate::query::Focus;

use super::{warn_tally, Biofilter};

/// One SNP by `rs` number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnpInput {
    /// `rs` number.
    pub rs: i64,
    /// Trailing columns.
    pub extra: Option<String>,
}

/// One position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocusInput {
    /// Label; generated from the coordinates when absent.
    pub label: String,
    /// Chromosome number.
    pub chr: i64,
    /// Position in the input coordinate convention.
    pub pos: i64,
    /// Trailing columns.
    pub extra: Option<String>,
}

/// One region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInput {
    /// Label; generated from the coordinates when absent.
    pub label: String,
    /// Chromosome number.
    pub chr: i64,
    /// Start, in the input coordinate convention.
    pub pos_min: i64,
    /// End, in the input coordinate convention.
    pub pos_max: i64,
    /// Trailing columns.
    pub extra: Option<String>,
}

/// A batch of input for one filter table.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSet {
    /// SNPs by `rs` number.
    Snps(Vec<SnpInput>),
    /// Positions.
    Loci(Vec<LocusInput>),
    /// Regions.
    Regions(Vec<RegionInput>),
    /// Gene identifiers.
    Genes(Vec<NameQuery>),
    /// Group identifiers.
    Groups(Vec<NameQuery>),
    /// Texts found in gene labels, descriptions or names.
    GeneSearch(Vec<NameQuery>),
    /// Texts found in group labels, descriptions or names.
    GroupSearch(Vec<NameQuery>),
    /// Source names.
    Sources(Vec<String>),
}

impl InputSet {
    /// Filter table the batch loads into.
    pub fn table(&self) -> Table {
        match self {
            InputSet::Snps(_) => Table::Snp,
            InputSet::Loci(_) => Table::Locus,
            InputSet::Regions(_) => Table::Region,
            InputSet::Genes(_) | InputSet::GeneSearch(_) => Table::Gene,
            InputSet::Groups(_) | InputSet::GroupSearch(_) => Table::Group,
            InputSet::Sources(_) => Table::Source,
        }
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        match self {
            InputSet::Snps(v) => v.len(),
            InputSet::Loci(v) => v.len(),
            InputSet::Regions(v) => v.len(),
            InputSet::Genes(v)
            | InputSet::Groups(v)
            | InputSet::GeneSearch(v)
            | InputSet::GroupSearch(v) => v.len(),
            InputSet::Sources(v) => v.len(),
        }
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a union or intersect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSummary {
    /// Rows inserted.
    pub added: u64,
    /// Rows matched by an intersect.
    pub kept: u64,
    /// Rows removed by an intersect.
    pub dropped: u64,
    /// Identifier resolution outcomes, for named inputs.
    pub tally: NameTally,
}

/// A malformed input line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {reason}: {text}")]
pub struct InputError {
    /// 1-based line number.
    pub line: usize,
    /// Line contents.
    pub text: String,
    /// What was wrong.
    pub reason: String,
}

/// Parses a chromosome name: `1`-`22`, `X`, `Y`, `XY`, `M`/`MT`, with an optional `chr` prefix.
pub fn parse_chromosome(token: &str) -> Option<i64> {
    let upper = token.trim().to_ascii_uppercase();
    let name = upper.strip_prefix("CHR").unwrap_or(&upper);
    match name {
        "X" => Some(23),
        "Y" => Some(24),
        "XY" => Some(25),
        "M" | "MT" => Some(26),
        _ => name.parse::<i64>().ok().filter(|n| (1..=22).contains(n)),
    }
}

/// Conventional name of a chromosome number.
pub fn chromosome_name(chr: i64) -> String {
    match chr {
        23 => "X".to_string(),
        24 => "Y".to_string(),
        25 => "XY".to_string(),
        26 => "M".to_string(),
        n => n.to_string(),
    }
}

fn parse_position(token: &str) -> std::result::Result<i64, String> {
    match token {
        "" | "-" | "NA" | "na" => Err(format!("position '{token}' is not available")),
        _ => token
            .parse::<i64>()
            .map_err(|_| format!("invalid position '{token}'")),
    }
}

fn chromosome(token: &str) -> std::result::Result<i64, String> {
    parse_chromosome(token).ok_or_else(|| format!("invalid chromosome '{token}'"))
}

fn extra(cols: &[&str]) -> Option<String> {
    if cols.is_empty() {
        None
    } else {
        Some(cols.join("\t"))
    }
}

fn label_or(token: &str, fallback: impl FnOnce() -> String) -> String {
    match token {
        "" | "-" => fallback(),
        label => label.to_string(),
    }
}

/// Parses `rs#  [extra...]`.
pub fn parse_snp_line(line: &str) -> std::result::Result<SnpInput, String> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    let first = *cols.first().ok_or("empty line")?;
    let digits = if first.len() > 2 && first[..2].eq_ignore_ascii_case("rs") {
        &first[2..]
    } else {
        first
    };
    let rs = digits
        .parse::<i64>()
        .map_err(|_| format!("invalid rs number '{first}'"))?;
    Ok(SnpInput {
        rs,
        extra: extra(&cols[1..]),
    })
}

/// Parses `chr pos`, `chr label pos` or `chr label cM pos [extra...]`.
pub fn parse_locus_line(line: &str) -> std::result::Result<LocusInput, String> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    let (chr_tok, label_tok, pos_tok, rest) = match cols.len() {
        0 | 1 => return Err("expected at least chromosome and position".to_string()),
        2 => (cols[0], "", cols[1], &cols[2..]),
        3 => (cols[0], cols[1], cols[2], &cols[3..]),
        _ => (cols[0], cols[1], cols[3], &cols[4..]),
    };
    let chr = chromosome(chr_tok)?;
    let pos = parse_position(pos_tok)?;
    Ok(LocusInput {
        label: label_or(label_tok, || format!("chr{}:{pos}", chromosome_name(chr))),
        chr,
        pos,
        extra: extra(rest),
    })
}

/// Parses `chr min max` or `chr label min max [extra...]`.
pub fn parse_region_line(line: &str) -> std::result::Result<RegionInput, String> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    let (chr_tok, label_tok, min_tok, max_tok, rest) = match cols.len() {
        0..=2 => return Err("expected chromosome, start and end".to_string()),
        3 => (cols[0], "", cols[1], cols[2], &cols[3..]),
        _ => (cols[0], cols[1], cols[2], cols[3], &cols[4..]),
    };
    let chr = chromosome(chr_tok)?;
    let pos_min = parse_position(min_tok)?;
    let pos_max = parse_position(max_tok)?;
    Ok(RegionInput {
        label: label_or(label_tok, || {
            format!("chr{}:{pos_min}-{pos_max}", chromosome_name(chr))
        }),
        chr,
        pos_min,
        pos_max,
        extra: extra(rest),
    })
}

/// Parses `name` (in `default_namespace`) or `namespace name [extra...]`.
pub fn parse_name_line(line: &str, default_namespace: &str) -> std::result::Result<NameQuery, String> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    match cols.as_slice() {
        [] => Err("empty line".to_string()),
        [name] => Ok(NameQuery::in_namespace(default_namespace, *name)),
        [namespace, name, rest @ ..] => {
            Ok(NameQuery::in_namespace(*namespace, *name).with_extra(extra(rest)))
        }
    }
}

/// A user-defined knowledge source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserKnowledge {
    /// Source name.
    pub label: String,
    /// Source description.
    pub description: Option<String>,
    /// Groups in file order.
    pub groups: Vec<UserGroup>,
}

/// One group of a [`UserKnowledge`] source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserGroup {
    /// Group label.
    pub label: String,
    /// Group description.
    pub description: Option<String>,
    /// Member gene identifiers.
    pub genes: Vec<NameQuery>,
}

/// Reads a user knowledge file.
///
/// The first line names the source, optionally followed by a description.
/// `GROUP label [description...]` opens a group and every identifier on the
/// lines after it, read in `default_namespace`, is a member gene. `CHILDREN`
/// lines and identifiers before the first group are ignored.
pub fn read_user_knowledge<R: BufRead>(reader: R, default_namespace: &str) -> Result<UserKnowledge> {
    let mut knowledge: Option<UserKnowledge> = None;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        if knowledge.is_none() {
            let (label, description) = match text.split_once(char::is_whitespace) {
                Some((label, rest)) => (label, Some(rest.trim().to_string())),
                None => (text, None),
            };
            knowledge = Some(UserKnowledge {
                label: label.to_string(),
                description,
                groups: Vec::new(),
            });
            continue;
        }
        let Some(source) = knowledge.as_mut() else {
            continue;
        };
        let words: Vec<&str> = text.split_whitespace().collect();
        match words.as_slice() {
            ["GROUP"] => {
                return Err(BiofilterError::UserKnowledge(format!(
                    "line {}: group without a label",
                    idx + 1
                )))
            }
            ["GROUP", label, rest @ ..] => source.groups.push(UserGroup {
                label: label.to_string(),
                description: (!rest.is_empty()).then(|| rest.join(" ")),
                genes: Vec::new(),
            }),
            ["CHILDREN", ..] => {}
            names => match source.groups.last_mut() {
                Some(group) => group
                    .genes
                    .extend(names.iter().map(|name| NameQuery::in_namespace(default_namespace, *name))),
                None => debug!(line = idx + 1, "user.knowledge.ungrouped"),
            },
        }
    }
    knowledge.ok_or_else(|| BiofilterError::UserKnowledge("missing source line".to_string()))
}

/// Reads parsed records from a line source.
///
/// A malformed first line is skipped as a header; later malformed lines are
/// collected as errors without stopping the read.
pub fn read_input_lines<R, T, P>(reader: R, mut parse: P) -> Result<(Vec<T>, Vec<InputError>)>
where
    R: BufRead,
    P: FnMut(&str) -> std::result::Result<T, String>,
{
    let mut records = Vec::new();
    let mut errors = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        match parse(text) {
            Ok(record) => records.push(record),
            Err(_) if idx == 0 => debug!(line = text, "input.header.skipped"),
            Err(reason) => errors.push(InputError {
                line: idx + 1,
                text: text.to_string(),
                reason,
            }),
        }
    }
    for err in errors.iter().take(5) {
        warn!(line = err.line, reason = %err.reason, "input.line.invalid");
    }
    Ok((records, errors))
}

impl Biofilter {
    /// Offsets converting input coordinates to the stored 1-based closed convention.
    pub(crate) fn input_offsets(&self) -> (i64, i64) {
        let start = 1 - self.options.coordinate_base;
        let end = start - i64::from(self.options.regions_half_open);
        (start, end)
    }

    /// Adds input rows to a filter table.
    pub fn union_input(&mut self, focus: Focus, input: &InputSet) -> Result<InputSummary> {
        let db = filter_db(focus)?;
        let table = input.table();
        self.prepare_table_for_update(db, table)?;
        let summary = self.insert_input(db, input)?;
        let count = self.filters.bump(db, table);
        info!(
            db = db.schema(),
            table = table.name(),
            added = summary.added,
            filter = count,
            "input.union"
        );
        Ok(summary)
    }

    /// Keeps only the filter rows also present in the input.
    ///
    /// An unconstrained table is loaded as a union instead.
    pub fn intersect_input(&mut self, focus: Focus, input: &InputSet) -> Result<InputSummary> {
        let db = filter_db(focus)?;
        let table = input.table();
        if !self.filters.is_populated(db, table) {
            return self.union_input(focus, input);
        }
        self.prepare_table_for_query(db, table)?;
        let schema = db.schema();
        let name = table.name();
        let mut summary = InputSummary::default();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&format!("UPDATE `{schema}`.`{name}` SET flag = 0"), [])?;
        let sql = match table {
            Table::Snp => "UPDATE `{s}`.`snp` SET flag = 1 WHERE rs = ?1",
            Table::Locus => "UPDATE `{s}`.`locus` SET flag = 1 WHERE chr = ?1 AND pos = ?2",
            Table::Region => {
                "UPDATE `{s}`.`region` SET flag = 1 WHERE chr = ?1 AND posMin = ?2 AND posMax = ?3"
            }
            Table::Gene => "UPDATE `{s}`.`gene` SET flag = 1 WHERE biopolymer_id = ?1",
            Table::Group => "UPDATE `{s}`.`group` SET flag = 1 WHERE group_id = ?1",
            _ => "UPDATE `{s}`.`source` SET flag = 1 WHERE source_id = ?1",
        }
        .replace("{s}", schema);
        for row in self.resolve_input(&tx, input, &mut summary.tally)? {
            let mut stmt = tx.prepare_cached(&sql)?;
            let args: Vec<&dyn rusqlite::ToSql> = row.keys.iter().map(|k| k as &dyn rusqlite::ToSql).collect();
            summary.kept += stmt.execute(args.as_slice())? as u64;
        }
        summary.dropped = tx.execute(&format!("DELETE FROM `{schema}`.`{name}` WHERE flag = 0"), [])? as u64;
        tx.commit()?;
        if table == Table::Region {
            self.prepare_table_for_update(db, table)?;
        }
        if let Some(kind) = named_kind(input) {
            warn_tally(kind, &summary.tally);
        }
        let count = self.filters.bump(db, table);
        info!(
            db = schema,
            table = name,
            kept = summary.kept,
            dropped = summary.dropped,
            filter = count,
            "input.intersect"
        );
        Ok(summary)
    }

    fn insert_input(&self, db: Db, input: &InputSet) -> Result<InputSummary> {
        let schema = db.schema();
        let mut summary = InputSummary::default();
        let sql = match input.table() {
            Table::Snp => "INSERT INTO `{s}`.`snp` (rs, label, extra) VALUES (?1, ?2, ?3)",
            Table::Locus => {
                "INSERT OR IGNORE INTO `{s}`.`locus` (chr, pos, label, extra) VALUES (?1, ?2, ?3, ?4)"
            }
            Table::Region => {
                "INSERT OR IGNORE INTO `{s}`.`region` (chr, posMin, posMax, label, extra) \
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            }
            Table::Gene => "INSERT INTO `{s}`.`gene` (biopolymer_id, label, extra) VALUES (?1, ?2, ?3)",
            Table::Group => "INSERT INTO `{s}`.`group` (group_id, label, extra) VALUES (?1, ?2, ?3)",
            _ => "INSERT INTO `{s}`.`source` (source_id, label) VALUES (?1, ?2)",
        }
        .replace("{s}", schema);
        let tx = self.conn.unchecked_transaction()?;
        for row in self.resolve_input(&tx, input, &mut summary.tally)? {
            let mut stmt = tx.prepare_cached(&sql)?;
            let mut args: Vec<&dyn rusqlite::ToSql> =
                row.keys.iter().map(|k| k as &dyn rusqlite::ToSql).collect();
            args.push(&row.label);
            if input.table() != Table::Source {
                args.push(&row.extra);
            }
            summary.added += stmt.execute(args.as_slice())? as u64;
        }
        tx.commit()?;
        if let Some(kind) = named_kind(input) {
            warn_tally(kind, &summary.tally);
        }
        Ok(summary)
    }

    /// Resolves input records to the key values stored in the filter table.
    fn resolve_input(
        &self,
        conn: &rusqlite::Connection,
        input: &InputSet,
        tally: &mut NameTally,
    ) -> Result<Vec<KeyedRow>> {
        let (start, end) = self.input_offsets();
        let allow_ambiguous = self.options.allow_ambiguous_knowledge;
        let rows = match input {
            InputSet::Snps(rows) => rows
                .iter()
                .map(|row| {
                    Ok(KeyedRow {
                        keys: vec![self.knowledge.current_rs(conn, row.rs)?],
                        label: format!("rs{}", row.rs),
                        extra: row.extra.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            InputSet::Loci(rows) => rows
                .iter()
                .map(|row| KeyedRow {
                    keys: vec![row.chr, row.pos + start],
                    label: row.label.clone(),
                    extra: row.extra.clone(),
                })
                .collect(),
            InputSet::Regions(rows) => rows
                .iter()
                .map(|row| KeyedRow {
                    keys: vec![row.chr, row.pos_min + start, row.pos_max + end],
                    label: row.label.clone(),
                    extra: row.extra.clone(),
                })
                .collect(),
            InputSet::Genes(names) => {
                let gene_type = self.gene_type_id()?;
                let (resolved, found) =
                    self.knowledge
                        .biopolymer_ids_by_name(conn, names, Some(gene_type), allow_ambiguous)?;
                *tally = found;
                resolved.into_iter().map(KeyedRow::from).collect()
            }
            InputSet::Groups(names) => {
                let (resolved, found) =
                    self.knowledge
                        .group_ids_by_name(conn, names, None, allow_ambiguous)?;
                *tally = found;
                resolved.into_iter().map(KeyedRow::from).collect()
            }
            InputSet::GeneSearch(texts) => {
                let gene_type = self.gene_type_id()?;
                let (resolved, found) = self
                    .knowledge
                    .biopolymer_ids_by_search(conn, texts, Some(gene_type))?;
                *tally = found;
                resolved.into_iter().map(KeyedRow::from).collect()
            }
            InputSet::GroupSearch(texts) => {
                let (resolved, found) = self.knowledge.group_ids_by_search(conn, texts, None)?;
                *tally = found;
                resolved.into_iter().map(KeyedRow::from).collect()
            }
            InputSet::Sources(names) => {
                let mut rows = Vec::with_capacity(names.len());
                for name in names {
                    match self.source_id(name)? {
                        Some(id) => {
                            tally.matched += 1;
                            rows.push(KeyedRow {
                                keys: vec![id],
                                label: name.clone(),
                                extra: None,
                            });
                        }
                        None => tally.unrecognized += 1,
                    }
                }
                rows
            }
        };
        debug!(table = input.table().name(), rows = rows.len(), "input.resolved");
        Ok(rows)
    }
}

/// A filter row reduced to its key columns, label and extra text.
struct KeyedRow {
    keys: Vec<i64>,
    label: String,
    extra: Option<String>,
}

impl From<crate::knowledge::Resolved> for KeyedRow {
    fn from(record: crate::knowledge::Resolved) -> Self {
        Self {
            keys: vec![record.id],
            label: record.name,
            extra: record.extra,
        }
    }
}

fn named_kind(input: &InputSet) -> Option<&'static str> {
    match input {
        InputSet::Genes(_) | InputSet::GeneSearch(_) => Some("gene"),
        InputSet::Groups(_) | InputSet::GroupSearch(_) => Some("group"),
        InputSet::Sources(_) => Some("source"),
        _ => None,
    }
}

fn filter_db(focus: Focus) -> Result<Db> {
    match focus {
        Focus::Main => Ok(Db::Main),
        Focus::Alt => Ok(Db::Alt),
        Focus::Cand => Err(BiofilterError::Config(
            "input can only be loaded into the main or alt filters".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;

    #[test]
    fn chromosomes_parse_with_prefix() {
        assert_eq!(parse_chromosome("chr7"), Some(7));
        assert_eq!(parse_chromosome("X"), Some(23));
        assert_eq!(parse_chromosome("chrMT"), Some(26));
        assert_eq!(parse_chromosome("23"), None);
        assert_eq!(chromosome_name(25), "XY");
    }

    #[test]
    fn locus_lines_by_width() {
        let two = parse_locus_line("1 1000").unwrap();
        assert_eq!((two.label.as_str(), two.chr, two.pos), ("chr1:1000", 1, 1000));
        let three = parse_locus_line("X mine 55").unwrap();
        assert_eq!((three.label.as_str(), three.chr), ("mine", 23));
        let four = parse_locus_line("2 snp9 0.5 77 p=0.01 note").unwrap();
        assert_eq!(four.pos, 77);
        assert_eq!(four.extra.as_deref(), Some("p=0.01\tnote"));
        assert!(parse_locus_line("1 NA").is_err());
    }

    #[test]
    fn region_and_name_lines() {
        let r = parse_region_line("chr3 100 200").unwrap();
        assert_eq!(r.label, "chr3:100-200");
        let g = parse_name_line("entrez 1234 extra", "symbol").unwrap();
        assert_eq!((g.namespace.as_str(), g.name.as_str()), ("entrez", "1234"));
        assert_eq!(parse_name_line("A1", "symbol").unwrap().namespace, "symbol");
        assert_eq!(parse_snp_line("RS42 x").unwrap().rs, 42);
    }

    #[test]
    fn reader_skips_header_and_comments() {
        let text = "chr pos\n# note\n1 10\n\nbogus\n2 20\n";
        let (rows, errors) = read_input_lines(text.as_bytes(), parse_locus_line).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 5);
    }

    fn loci(points: &[(i64, i64)]) -> InputSet {
        InputSet::Loci(
            points
                .iter()
                .map(|&(chr, pos)| LocusInput {
                    label: format!("chr{chr}:{pos}"),
                    chr,
                    pos,
                    extra: None,
                })
                .collect(),
        )
    }

    #[test]
    fn intersect_keeps_common_rows() {
        let mut bf = Biofilter::open_in_memory(Options::default()).unwrap();
        let first = bf.union_input(Focus::Main, &loci(&[(1, 10), (1, 20), (2, 5)])).unwrap();
        assert_eq!(first.added, 3);
        let second = bf.intersect_input(Focus::Main, &loci(&[(1, 20), (2, 5), (3, 1)])).unwrap();
        assert_eq!((second.kept, second.dropped), (2, 1));
        assert_eq!(bf.filters().count(Db::Main, Table::Locus), 2);
        let left: i64 = bf
            .connection()
            .query_row("SELECT COUNT() FROM main.locus", [], |r| r.get(0))
            .unwrap();
        assert_eq!(left, 2);
    }

    #[test]
    fn zero_based_half_open_regions_are_normalized() {
        let mut options = Options::default();
        options.coordinate_base = 0;
        options.regions_half_open = true;
        let mut bf = Biofilter::open_in_memory(options).unwrap();
        let region = parse_region_line("1 99 200").unwrap();
        bf.union_input(Focus::Alt, &InputSet::Regions(vec![region])).unwrap();
        let bounds: (i64, i64) = bf
            .connection()
            .query_row("SELECT posMin, posMax FROM alt.region", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!(bounds, (100, 200));
    }

    #[test]
    fn candidate_focus_rejects_input() {
        let mut bf = Biofilter::open_in_memory(Options::default()).unwrap();
        let err = bf.union_input(Focus::Cand, &InputSet::Sources(vec!["x".into()])).unwrap_err();
        assert_eq!(err.code(), "Config");
    }

    #[test]
    fn user_knowledge_groups_collect_following_names() {
        let text = "mine my own pathways\n\
                    stray\n\
                    GROUP first two genes\n\
                    GENEA GENEB\n\
                    CHILDREN second\n\
                    GENEC\n\
                    GROUP second\n";
        let knowledge = read_user_knowledge(text.as_bytes(), "symbol").unwrap();
        assert_eq!(knowledge.label, "mine");
        assert_eq!(knowledge.description.as_deref(), Some("my own pathways"));
        assert_eq!(knowledge.groups.len(), 2);
        let first = &knowledge.groups[0];
        assert_eq!(first.description.as_deref(), Some("two genes"));
        assert_eq!(
            first.genes,
            vec![
                NameQuery::in_namespace("symbol", "GENEA"),
                NameQuery::in_namespace("symbol", "GENEB"),
                NameQuery::in_namespace("symbol", "GENEC"),
            ]
        );
        assert!(knowledge.groups[1].genes.is_empty());
        assert_eq!(knowledge.groups[1].description, None);
    }

    #[test]
    fn user_knowledge_needs_a_source_and_group_labels() {
        let err = read_user_knowledge("# only a comment\n".as_bytes(), "").unwrap_err();
        assert_eq!(err.code(), "UserKnowledge");
        let err = read_user_knowledge("mine\nGROUP\n".as_bytes(), "").unwrap_err();
        assert_eq!(err.code(), "UserKnowledge");
    }
}
