//! Run options and their TOML representation.
//!
//! Option values follow the command-line conventions: yes/no flags and choice
//! lists accept any unambiguous prefix of a valid choice.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BiofilterError, Result};

/// How PARIS treats an input p-value of zero (or below).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroPValuePolicy {
    /// Count the locus as significant.
    Significant,
    /// Count the locus but never as significant.
    Insignificant,
    /// Leave the locus out of every tally.
    Ignore,
}

/// Which group-membership scores may rescue an ambiguous gene assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityReduction {
    /// Only the specificity score is consulted.
    No,
    /// Use the implication score.
    Implication,
    /// Use the quality score.
    Quality,
    /// Accept either implication or quality.
    Any,
}

impl AmbiguityReduction {
    /// The two `group_biopolymer` columns tested against the ambiguity threshold.
    pub fn score_columns(self) -> (&'static str, &'static str) {
        match self {
            AmbiguityReduction::No => ("specificity", "specificity"),
            AmbiguityReduction::Implication => ("implication", "implication"),
            AmbiguityReduction::Quality => ("quality", "quality"),
            AmbiguityReduction::Any => ("implication", "quality"),
        }
    }
}

/// Options controlling plan assembly, output and PARIS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Options {
    /// Name of the LD profile used for gene boundaries (empty string is the default profile).
    pub ld_profile: String,
    /// Coordinate base of input and output positions (0 or 1).
    pub coordinate_base: i64,
    /// Whether region end coordinates are exclusive.
    pub regions_half_open: bool,
    /// Margin, in bases, added around regions when matching positions.
    pub region_position_margin: i64,
    /// Minimum overlap between regions, as a percent of the shorter region.
    pub region_match_percent: Option<f64>,
    /// Minimum overlap between regions, in bases.
    pub region_match_bases: i64,
    /// Whether SNP positions flagged unvalidated may be used.
    pub allow_unvalidated_snp_positions: bool,
    /// Whether SNPs mapping to several positions are kept.
    pub allow_ambiguous_snps: bool,
    /// Whether ambiguous gene/group memberships are kept.
    pub allow_ambiguous_knowledge: bool,
    /// Which secondary scores may rescue an ambiguous membership.
    pub reduce_ambiguous_knowledge: AmbiguityReduction,
    /// Whether duplicate output rows are allowed through.
    pub allow_duplicate_output: bool,
    /// Whether the alt dataset filters the right-hand side of models independently.
    pub alternate_model_filtering: bool,
    /// Whether every left row is paired with every right row.
    pub all_pairwise_models: bool,
    /// Maximum number of models to emit (0 means unbounded).
    pub maximum_model_count: u64,
    /// Largest group that may support a model (0 means unbounded).
    pub maximum_model_group_size: u64,
    /// Minimum number of distinct sources supporting a model.
    pub minimum_model_score: u64,
    /// Whether baseline models are sorted by score.
    pub sort_models: bool,
    /// Whether model candidates are restricted to genes.
    pub only_gene_models: bool,
    /// Significance threshold for PARIS input p-values.
    pub paris_p_value: f64,
    /// Handling of zero p-values.
    pub paris_zero_p_values: ZeroPValuePolicy,
    /// Early-exit p-value for permutation trials.
    pub paris_max_p_value: Option<f64>,
    /// Whether the chromosome token in the extra column must match.
    pub paris_enforce_input_chromosome: bool,
    /// Number of permutation trials.
    pub paris_permutation_count: u32,
    /// Target number of features per bin.
    pub paris_bin_size: usize,
    /// Whether per-gene detail rows are reported.
    pub paris_details: bool,
    /// Seed for the permutation generator.
    pub random_seed: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ld_profile: String::new(),
            coordinate_base: 1,
            regions_half_open: false,
            region_position_margin: 0,
            region_match_percent: Some(100.0),
            region_match_bases: 0,
            allow_unvalidated_snp_positions: true,
            allow_ambiguous_snps: false,
            allow_ambiguous_knowledge: false,
            reduce_ambiguous_knowledge: AmbiguityReduction::No,
            allow_duplicate_output: false,
            alternate_model_filtering: false,
            all_pairwise_models: false,
            maximum_model_count: 0,
            maximum_model_group_size: 30,
            minimum_model_score: 2,
            sort_models: true,
            only_gene_models: true,
            paris_p_value: 0.05,
            paris_zero_p_values: ZeroPValuePolicy::Ignore,
            paris_max_p_value: None,
            paris_enforce_input_chromosome: true,
            paris_permutation_count: 1000,
            paris_bin_size: 10000,
            paris_details: false,
            random_seed: None,
        }
    }
}

const FLAG_CHOICES: &[(&str, bool)] = &[
    ("yes", true),
    ("no", false),
    ("on", true),
    ("off", false),
    ("true", true),
    ("false", false),
    ("1", true),
    ("0", false),
];

const ZERO_P_CHOICES: &[(&str, ZeroPValuePolicy)] = &[
    ("significant", ZeroPValuePolicy::Significant),
    ("insignificant", ZeroPValuePolicy::Insignificant),
    ("ignore", ZeroPValuePolicy::Ignore),
];

const REDUCTION_CHOICES: &[(&str, AmbiguityReduction)] = &[
    ("no", AmbiguityReduction::No),
    ("implication", AmbiguityReduction::Implication),
    ("quality", AmbiguityReduction::Quality),
    ("any", AmbiguityReduction::Any),
];

impl Options {
    /// Reads options from a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|err| match err {
                BiofilterError::Config(msg) => {
                    BiofilterError::Config(format!("{}: {msg}", path.display()))
                }
                other => other,
            })
    }

    /// Parses options from TOML text.
    ///
    /// Values go through [`Options::set`], so string values get the same prefix
    /// matching as command-line overrides.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let table: toml::Table = contents
            .parse()
            .map_err(|e: toml::de::Error| BiofilterError::Config(e.to_string()))?;
        let mut options = Options::default();
        for (key, value) in &table {
            let text = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Boolean(b) => if *b { "yes" } else { "no" }.to_string(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                other => {
                    return Err(BiofilterError::Config(format!(
                        "option '{key}' has unsupported value {other}"
                    )))
                }
            };
            options.set(key, &text)?;
        }
        Ok(options)
    }

    /// Applies a single `key = value` override.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.trim().replace('_', "-");
        let value = value.trim();
        match key.as_str() {
            "ld-profile" => self.ld_profile = value.to_string(),
            "coordinate-base" => self.coordinate_base = parse_number(&key, value)?,
            "regions-half-open" => self.regions_half_open = parse_flag(&key, value)?,
            "region-position-margin" => self.region_position_margin = parse_number(&key, value)?,
            "region-match-percent" => self.region_match_percent = parse_optional(&key, value)?,
            "region-match-bases" => self.region_match_bases = parse_number(&key, value)?,
            "allow-unvalidated-snp-positions" => {
                self.allow_unvalidated_snp_positions = parse_flag(&key, value)?
            }
            "allow-ambiguous-snps" => self.allow_ambiguous_snps = parse_flag(&key, value)?,
            "allow-ambiguous-knowledge" => {
                self.allow_ambiguous_knowledge = parse_flag(&key, value)?
            }
            "reduce-ambiguous-knowledge" => {
                self.reduce_ambiguous_knowledge = parse_choice(&key, value, REDUCTION_CHOICES)?
            }
            "allow-duplicate-output" => self.allow_duplicate_output = parse_flag(&key, value)?,
            "alternate-model-filtering" => {
                self.alternate_model_filtering = parse_flag(&key, value)?
            }
            "all-pairwise-models" => self.all_pairwise_models = parse_flag(&key, value)?,
            "maximum-model-count" => self.maximum_model_count = parse_number(&key, value)?,
            "maximum-model-group-size" => {
                self.maximum_model_group_size = parse_number(&key, value)?
            }
            "minimum-model-score" => self.minimum_model_score = parse_number(&key, value)?,
            "sort-models" => self.sort_models = parse_flag(&key, value)?,
            "only-gene-models" => self.only_gene_models = parse_flag(&key, value)?,
            "paris-p-value" => self.paris_p_value = parse_number(&key, value)?,
            "paris-zero-p-values" => {
                self.paris_zero_p_values = parse_choice(&key, value, ZERO_P_CHOICES)?
            }
            "paris-max-p-value" => self.paris_max_p_value = parse_optional(&key, value)?,
            "paris-enforce-input-chromosome" => {
                self.paris_enforce_input_chromosome = parse_flag(&key, value)?
            }
            "paris-permutation-count" => {
                self.paris_permutation_count = parse_number(&key, value)?
            }
            "paris-bin-size" => self.paris_bin_size = parse_number(&key, value)?,
            "paris-details" => self.paris_details = parse_flag(&key, value)?,
            "random-seed" => self.random_seed = parse_optional(&key, value)?,
            _ => return Err(BiofilterError::Config(format!("unknown option '{key}'"))),
        }
        Ok(())
    }

    /// Serializes the effective options for reporting.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BiofilterError::Config(e.to_string()))
    }
}

/// Location of the per-user options file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("biofilter").join("options.toml"))
}

/// Resolves `value` to one of `choices`: an exact match wins, otherwise the
/// value must be a prefix of exactly one choice.
pub fn parse_choice<T: Copy>(option: &str, value: &str, choices: &[(&str, T)]) -> Result<T> {
    let lowered = value.to_ascii_lowercase();
    if let Some((_, v)) = choices.iter().find(|(name, _)| *name == lowered) {
        return Ok(*v);
    }
    let mut matched = choices
        .iter()
        .filter(|(name, _)| !lowered.is_empty() && name.starts_with(&lowered));
    match (matched.next(), matched.next()) {
        (Some((_, v)), None) => Ok(*v),
        _ => Err(BiofilterError::AmbiguousOption {
            option: option.to_string(),
            value: value.to_string(),
            choices: choices
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn parse_flag(option: &str, value: &str) -> Result<bool> {
    parse_choice(option, value, FLAG_CHOICES)
}

fn parse_number<T: std::str::FromStr>(option: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| BiofilterError::Config(format!("option '{option}' expects a number, got '{value}'")))
}

fn parse_optional<T: std::str::FromStr>(option: &str, value: &str) -> Result<Option<T>> {
    match value.to_ascii_lowercase().as_str() {
        "" | "none" | "null" => Ok(None),
        _ => parse_number(option, value).map(Some),
    }
}
