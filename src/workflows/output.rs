//! Output types, row sinks and their text encodings.

use std::io::Write;
use std::ops::ControlFlow;

use csv::{QuoteStyle, WriterBuilder};

use crate::catalog::Column;
use crate::error::Result;
use crate::query::{PlanError, Value};

/// Header labels and catalog columns of a list of output types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputColumns {
    /// One label per column.
    pub header: Vec<String>,
    /// Catalog columns, in output order.
    pub columns: Vec<Column>,
}

impl OutputColumns {
    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether no column was requested.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn push(&mut self, label: &str, column: Column) {
        self.header.push(label.to_string());
        self.columns.push(column);
    }
}

const NAMED_TYPES: &[(&str, &[(&str, Column)])] = &[
    ("snp", &[("snp", Column::SnpLabel)]),
    (
        "position",
        &[
            ("chr", Column::PositionChr),
            ("position", Column::PositionLabel),
            ("pos", Column::PositionPos),
        ],
    ),
    ("gene", &[("gene", Column::GeneLabel)]),
    (
        "generegion",
        &[
            ("chr", Column::BiopolymerChr),
            ("gene", Column::GeneLabel),
            ("start", Column::BiopolymerStart),
            ("stop", Column::BiopolymerStop),
        ],
    ),
    (
        "upstream",
        &[("upstream", Column::UpstreamLabel), ("distance", Column::UpstreamDistance)],
    ),
    (
        "downstream",
        &[("downstream", Column::DownstreamLabel), ("distance", Column::DownstreamDistance)],
    ),
    (
        "region",
        &[
            ("chr", Column::RegionChr),
            ("region", Column::RegionLabel),
            ("start", Column::RegionStart),
            ("stop", Column::RegionStop),
        ],
    ),
    ("group", &[("group", Column::GroupLabel)]),
    ("source", &[("source", Column::SourceLabel)]),
    (
        "gwas",
        &[
            ("trait", Column::GwasTrait),
            ("snps", Column::GwasSnps),
            ("OR/beta", Column::GwasOrBeta),
            ("allele95%CI", Column::GwasAllele95Ci),
            ("riskAfreq", Column::GwasRiskAfreq),
            ("pubmed", Column::GwasPubmed),
        ],
    ),
    ("snpinput", &[("user_input", Column::SnpLabel)]),
    ("positioninput", &[("user_input", Column::PositionLabel)]),
    ("geneinput", &[("user_input", Column::GeneLabel)]),
    ("regioninput", &[("user_input", Column::RegionLabel)]),
    ("groupinput", &[("user_input", Column::GroupLabel)]),
    ("sourceinput", &[("user_input", Column::SourceLabel)]),
];

/// Expands output type names into header labels and columns.
///
/// Raw catalog column names are accepted as well and head their own column.
pub fn expand_output_types<S: AsRef<str>>(types: &[S]) -> Result<OutputColumns> {
    let mut out = OutputColumns::default();
    for name in types {
        let name = name.as_ref().trim();
        let lower = name.to_ascii_lowercase();
        if let Some((_, parts)) = NAMED_TYPES.iter().find(|(ty, _)| *ty == lower) {
            for (label, column) in parts.iter() {
                out.push(label, *column);
            }
            continue;
        }
        match name.parse::<Column>() {
            Ok(column) => out.push(name, column),
            Err(_) => {
                return Err(PlanError::UnsupportedOutputType {
                    name: name.to_string(),
                }
                .into())
            }
        }
    }
    Ok(out)
}

/// Marks the first label of a header row as a comment.
pub fn comment_header(header: &mut [String]) {
    if let Some(first) = header.first_mut() {
        first.insert(0, '#');
    }
}

/// Receives a header row followed by data rows.
pub trait RowSink {
    /// Called once, before any row.
    fn header(&mut self, header: &[String]) -> Result<()>;

    /// Called per row; `Break` stops the producer.
    fn row(&mut self, row: &[Value]) -> Result<ControlFlow<()>>;

    /// Called after the last row.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keeps every row in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
    /// Header row.
    pub header: Vec<String>,
    /// Data rows.
    pub rows: Vec<Vec<Value>>,
    limit: Option<usize>,
}

impl CollectSink {
    /// An unbounded sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that stops the producer after `limit` rows.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Rows rendered as text, nulls as empty strings.
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect()
    }
}

impl RowSink for CollectSink {
    fn header(&mut self, header: &[String]) -> Result<()> {
        self.header = header.to_vec();
        Ok(())
    }

    fn row(&mut self, row: &[Value]) -> Result<ControlFlow<()>> {
        self.rows.push(row.to_vec());
        Ok(match self.limit {
            Some(limit) if self.rows.len() >= limit => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        })
    }
}

/// Tab-separated text.
pub struct TsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> TsvSink<W> {
    /// Writes to `out`.
    pub fn new(out: W) -> Self {
        let writer = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(QuoteStyle::Never)
            .has_headers(false)
            .flexible(true)
            .from_writer(out);
        Self { writer }
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| std::io::Error::new(err.error().kind(), err.error().to_string()).into())
    }
}

impl<W: Write> RowSink for TsvSink<W> {
    fn header(&mut self, header: &[String]) -> Result<()> {
        self.writer.write_record(header)?;
        Ok(())
    }

    fn row(&mut self, row: &[Value]) -> Result<ControlFlow<()>> {
        self.writer
            .write_record(row.iter().map(|v| v.to_string()))?;
        Ok(ControlFlow::Continue(()))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// One JSON array per line; the header is the first line.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Writes to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RowSink for JsonLinesSink<W> {
    fn header(&mut self, header: &[String]) -> Result<()> {
        serde_json::to_writer(&mut self.out, header).map_err(std::io::Error::from)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn row(&mut self, row: &[Value]) -> Result<ControlFlow<()>> {
        serde_json::to_writer(&mut self.out, row).map_err(std::io::Error::from)?;
        self.out.write_all(b"\n")?;
        Ok(ControlFlow::Continue(()))
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
