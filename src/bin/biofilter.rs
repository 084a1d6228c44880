//! Binary entry point for the biofilter CLI.

use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use biofilter::config::default_config_path;
use biofilter::db::{
    parse_locus_line, parse_region_line, parse_snp_line, read_input_lines, read_user_knowledge,
    InputSet,
};
use biofilter::knowledge::NameQuery;
use biofilter::query::Focus;
use biofilter::workflows::{JsonLinesSink, RowSink, TsvSink};
use biofilter::{logging, Biofilter, OpenOptions, Options, ParisInputs};

#[derive(Parser, Debug)]
#[command(
    name = "biofilter",
    version,
    about = "Filter, annotate and model genomic data against a knowledge base",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    open: OpenArgs,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Tsv,
        help = "Output format for result rows"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        env = "BIOFILTER_LOG",
        default_value = "warn",
        help = "Log filter directive (e.g. info, biofilter=debug)"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OpenArgs {
    #[arg(long, global = true, value_name = "FILE", help = "Knowledge database file")]
    knowledge: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Workspace file (in memory when omitted)"
    )]
    workspace: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Options file (defaults to the per-user options.toml)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long = "set",
        global = true,
        value_name = "KEY=VALUE",
        help = "Override one option; may be repeated"
    )]
    overrides: Vec<String>,
}

#[derive(Args, Debug, Default)]
struct InputArgs {
    #[arg(long, value_name = "FILE", help = "Main SNP file (rs numbers)")]
    snp_file: Vec<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Main position file")]
    position_file: Vec<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Main region file")]
    region_file: Vec<PathBuf>,

    #[arg(long, value_name = "NAME", value_delimiter = ',', help = "Main gene identifiers")]
    gene: Vec<String>,

    #[arg(long, value_name = "NAME", value_delimiter = ',', help = "Main group identifiers")]
    group: Vec<String>,

    #[arg(long, value_name = "NAME", value_delimiter = ',', help = "Main source names")]
    source: Vec<String>,

    #[arg(long, value_name = "TEXT", help = "Main genes whose names or description contain TEXT")]
    gene_search: Vec<String>,

    #[arg(long, value_name = "TEXT", help = "Main groups whose names or description contain TEXT")]
    group_search: Vec<String>,

    #[arg(long, value_name = "FILE", help = "Alternate SNP file")]
    alt_snp_file: Vec<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Alternate position file")]
    alt_position_file: Vec<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Alternate region file")]
    alt_region_file: Vec<PathBuf>,

    #[arg(long, value_name = "NAME", value_delimiter = ',', help = "Alternate gene identifiers")]
    alt_gene: Vec<String>,

    #[arg(long, value_name = "NAME", value_delimiter = ',', help = "Alternate group identifiers")]
    alt_group: Vec<String>,

    #[arg(long, value_name = "NAME", value_delimiter = ',', help = "Alternate source names")]
    alt_source: Vec<String>,

    #[arg(long, value_name = "TEXT", help = "Alternate genes whose names or description contain TEXT")]
    alt_gene_search: Vec<String>,

    #[arg(long, value_name = "TEXT", help = "Alternate groups whose names or description contain TEXT")]
    alt_group_search: Vec<String>,

    #[arg(long, value_name = "FILE", help = "User-defined knowledge file; may be repeated")]
    user_knowledge: Vec<PathBuf>,

    #[arg(
        long,
        value_enum,
        default_value_t = UserFilter::No,
        help = "Seed the main filter from user knowledge"
    )]
    user_defined_filter: UserFilter,

    #[arg(
        long,
        value_name = "NAMESPACE",
        default_value = "",
        help = "Namespace of gene identifiers in user knowledge files (any when empty)"
    )]
    gene_identifier_type: String,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
enum UserFilter {
    #[default]
    No,
    Group,
    Gene,
}

#[derive(Args, Debug)]
struct OutputArgs {
    #[arg(
        long,
        short = 'o',
        value_name = "TYPE",
        value_delimiter = ',',
        required = true,
        help = "Output types or column names"
    )]
    output: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints rows satisfying every populated main filter.
    Filter {
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        inputs: InputArgs,
    },
    /// Prints filtered rows, each followed by its annotations.
    Annotate {
        #[command(flatten)]
        output: OutputArgs,
        #[arg(long, value_name = "TYPE", value_delimiter = ',', required = true)]
        annotate: Vec<String>,
        #[command(flatten)]
        inputs: InputArgs,
    },
    /// Prints gene-gene models.
    Model {
        #[arg(long, value_name = "TYPE", value_delimiter = ',', default_value = "gene")]
        left: Vec<String>,
        #[arg(long, value_name = "TYPE", value_delimiter = ',', default_value = "gene")]
        right: Vec<String>,
        #[command(flatten)]
        inputs: InputArgs,
    },
    /// Runs PARIS over the main region filter.
    Paris {
        #[arg(long, value_name = "FILE", help = "SNP results (rs, chromosome, p-value)")]
        snp_results: Vec<PathBuf>,
        #[arg(long, value_name = "FILE", help = "Position results (chr, pos, chromosome, p-value)")]
        position_results: Vec<PathBuf>,
        #[arg(long, value_name = "BUILD", help = "UCSC build of the position results")]
        user_build: Option<u32>,
        #[arg(long, value_name = "FILE", help = "Write per-gene details to this file")]
        details_file: Option<PathBuf>,
        #[command(flatten)]
        inputs: InputArgs,
    },
    /// Prints the plan and statement of a filter output.
    Explain {
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        inputs: InputArgs,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Tsv,
    Json,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level)?;
    let mut options = load_options(&cli.open)?;
    if let Command::Paris {
        details_file: Some(_),
        ..
    } = &cli.command
    {
        options.paris_details = true;
    }
    let mut bf = Biofilter::open(
        OpenOptions {
            workspace: cli.open.workspace.as_deref(),
            knowledge: cli.open.knowledge.as_deref(),
        },
        options,
    )?;

    let stdout = io::stdout();
    let mut sink = make_sink(cli.format, Box::new(BufWriter::new(stdout.lock())));
    match &cli.command {
        Command::Filter { output, inputs } => {
            load_inputs(&mut bf, inputs)?;
            bf.generate_filter_output(&output.output, sink.as_mut())?;
        }
        Command::Annotate {
            output,
            annotate,
            inputs,
        } => {
            load_inputs(&mut bf, inputs)?;
            bf.generate_annotation_output(&output.output, annotate, sink.as_mut())?;
        }
        Command::Model {
            left,
            right,
            inputs,
        } => {
            load_inputs(&mut bf, inputs)?;
            bf.generate_model_output(left, right, sink.as_mut())?;
        }
        Command::Paris {
            snp_results,
            position_results,
            user_build,
            details_file,
            inputs,
        } => {
            load_inputs(&mut bf, inputs)?;
            let mut paris = ParisInputs {
                user_build: *user_build,
                ..ParisInputs::default()
            };
            for path in snp_results {
                paris.snps.extend(read_file(path, parse_snp_line)?);
            }
            for path in position_results {
                paris.loci.extend(read_file(path, parse_locus_line)?);
            }
            let report = bf.generate_paris_results(&paris)?;
            let mut details = match details_file {
                Some(path) => Some(make_sink(cli.format, Box::new(BufWriter::new(File::create(path)?)))),
                None => None,
            };
            report.write(sink.as_mut(), details.as_mut().map(|d| d.as_mut() as &mut dyn RowSink))?;
        }
        Command::Explain { output, inputs } => {
            load_inputs(&mut bf, inputs)?;
            let text = bf.explain_filter_output(&output.output)?;
            let mut out = io::stdout().lock();
            writeln!(out, "{text}")?;
        }
    }
    Ok(())
}

fn load_options(args: &OpenArgs) -> Result<Options, Box<dyn Error>> {
    let path = args
        .config
        .clone()
        .or_else(|| default_config_path().filter(|p| p.exists()));
    let mut options = match path {
        Some(path) => Options::load(&path)?,
        None => Options::default(),
    };
    for raw in &args.overrides {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("invalid --set '{raw}', expected KEY=VALUE"))?;
        options.set(key, value)?;
    }
    Ok(options)
}

fn make_sink(format: OutputFormat, out: Box<dyn Write>) -> Box<dyn RowSink> {
    match format {
        OutputFormat::Tsv => Box::new(TsvSink::new(out)),
        OutputFormat::Json => Box::new(JsonLinesSink::new(out)),
    }
}

fn read_file<T>(
    path: &Path,
    parse: fn(&str) -> Result<T, String>,
) -> Result<Vec<T>, Box<dyn Error>> {
    let reader = BufReader::new(File::open(path)?);
    let (records, errors) = read_input_lines(reader, parse)?;
    info!(
        path = %path.display(),
        records = records.len(),
        invalid = errors.len(),
        "input.file.read"
    );
    Ok(records)
}

fn names(list: &[String]) -> Vec<NameQuery> {
    list.iter().map(NameQuery::any).collect()
}

fn searches(list: &[String]) -> Vec<NameQuery> {
    list.iter()
        .map(|text| NameQuery::any(text).with_extra(Some(text.clone())))
        .collect()
}

fn load_user_knowledge(bf: &mut Biofilter, args: &InputArgs) -> Result<(), Box<dyn Error>> {
    for path in &args.user_knowledge {
        let knowledge = read_user_knowledge(BufReader::new(File::open(path)?), &args.gene_identifier_type)?;
        bf.load_user_knowledge(&knowledge)?;
    }
    match args.user_defined_filter {
        UserFilter::No => {}
        UserFilter::Group => {
            bf.apply_user_knowledge_filter(true)?;
        }
        UserFilter::Gene => {
            bf.apply_user_knowledge_filter(false)?;
        }
    }
    Ok(())
}

fn load_inputs(bf: &mut Biofilter, args: &InputArgs) -> Result<(), Box<dyn Error>> {
    load_user_knowledge(bf, args)?;
    let sides = [
        (
            Focus::Main,
            &args.snp_file,
            &args.position_file,
            &args.region_file,
            &args.gene,
            &args.group,
            &args.source,
            &args.gene_search,
            &args.group_search,
        ),
        (
            Focus::Alt,
            &args.alt_snp_file,
            &args.alt_position_file,
            &args.alt_region_file,
            &args.alt_gene,
            &args.alt_group,
            &args.alt_source,
            &args.alt_gene_search,
            &args.alt_group_search,
        ),
    ];
    for (focus, snps, positions, regions, genes, groups, sources, gene_search, group_search) in sides {
        let mut sets = Vec::new();
        for path in snps {
            sets.push(InputSet::Snps(read_file(path, parse_snp_line)?));
        }
        for path in positions {
            sets.push(InputSet::Loci(read_file(path, parse_locus_line)?));
        }
        for path in regions {
            sets.push(InputSet::Regions(read_file(path, parse_region_line)?));
        }
        if !genes.is_empty() {
            sets.push(InputSet::Genes(names(genes)));
        }
        if !groups.is_empty() {
            sets.push(InputSet::Groups(names(groups)));
        }
        if !sources.is_empty() {
            sets.push(InputSet::Sources(sources.clone()));
        }
        if !gene_search.is_empty() {
            sets.push(InputSet::GeneSearch(searches(gene_search)));
        }
        if !group_search.is_empty() {
            sets.push(InputSet::GroupSearch(searches(group_search)));
        }
        // each input narrows the filters before it; the first one of a table seeds it
        for set in &sets {
            bf.intersect_input(focus, set)?;
        }
    }
    Ok(())
}
