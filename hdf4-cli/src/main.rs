//! h4 - Command-line inspector for HDF4 files
//!
//! Subcommands:
//! - ls: groups, dimensions, variables and attributes
//! - tags: the raw tag directory, optionally only unowned tags
//! - layout: resolved storage layout of one variable
//! - cat: values of a variable or a section of it

use clap::{Args, Parser, Subcommand, ValueEnum};
use hdf4_io::construct::Claimant;
use hdf4_io::{
    DecodeOptions, Dataset, GroupId, Hdf4File, LayoutInfo, LayoutKind, Limits, Section, VarId,
    Values,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::json;
use std::error::Error;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "h4")]
#[command(about = "Inspect and extract data from HDF4 files")]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(flatten)]
    decode: DecodeArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Options applied while opening a file
#[derive(Args)]
struct DecodeArgs {
    /// Fail on the first object that cannot be built
    #[arg(long, global = true)]
    strict: bool,
    /// Highest offset searched for the magic number
    #[arg(long, global = true)]
    max_header_search: Option<u64>,
    /// Largest decompressed element in bytes
    #[arg(long, global = true)]
    max_decompressed_bytes: Option<usize>,
    /// Largest number of directory entries
    #[arg(long, global = true)]
    max_tags: Option<usize>,
}

impl DecodeArgs {
    fn options(&self) -> DecodeOptions {
        let defaults = DecodeOptions::default();
        let limits = Limits {
            max_decompressed_bytes: self
                .max_decompressed_bytes
                .unwrap_or(defaults.limits.max_decompressed_bytes),
            max_tags: self.max_tags.unwrap_or(defaults.limits.max_tags),
            ..defaults.limits
        };
        DecodeOptions {
            max_header_search: self.max_header_search.unwrap_or(defaults.max_header_search),
            limits,
            strict: self.strict,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List groups, dimensions and variables
    ///
    /// Examples:
    ///   h4 ls data.hdf
    ///   h4 ls data.hdf --attributes
    ///   h4 ls data.hdf --format json
    Ls {
        /// Input file
        input: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Show attributes under each group and variable
        #[arg(long, short = 'a')]
        attributes: bool,
    },
    /// List directory entries
    Tags {
        /// Input file
        input: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Only tags no group, variable or attribute took
        #[arg(long)]
        orphans: bool,
    },
    /// Show where a variable's bytes live
    Layout {
        /// Input file
        input: PathBuf,
        /// Variable path, e.g. /Geophysical/temperature
        variable: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Print the values of a variable
    ///
    /// Examples:
    ///   h4 cat data.hdf SDS-2
    ///   h4 cat data.hdf SDS-2 --section 0:1,2:3
    ///   h4 cat data.hdf stations --member name --format json
    Cat {
        /// Input file
        input: PathBuf,
        /// Variable path
        variable: String,
        /// Hyperslab as start:end[:stride] per dimension, end inclusive
        #[arg(long)]
        section: Option<String>,
        /// Member of a compound variable
        #[arg(long)]
        member: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t = CatFormat::Text)]
        format: CatFormat,
        /// Show a spinner while reading
        #[arg(long)]
        progress: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CatFormat {
    Text,
    Json,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let opts = cli.decode.options();

    match cli.command {
        Commands::Ls {
            input,
            format,
            attributes,
        } => handle_ls(open(&input, opts)?, format, attributes),
        Commands::Tags {
            input,
            format,
            orphans,
        } => handle_tags(open(&input, opts)?, format, orphans),
        Commands::Layout {
            input,
            variable,
            format,
        } => handle_layout(open(&input, opts)?, &variable, format),
        Commands::Cat {
            input,
            variable,
            section,
            member,
            format,
            progress,
        } => handle_cat(
            open(&input, opts)?,
            &variable,
            section.as_deref(),
            member.as_deref(),
            format,
            progress,
        ),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open(path: &Path, opts: DecodeOptions) -> Result<Hdf4File, Box<dyn Error>> {
    let start = Instant::now();
    let file = Hdf4File::open(path, opts)
        .map_err(|err| format!("cannot open {}: {err}", path.display()))?;
    debug!(
        path = %path.display(),
        tags = file.tags().len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "opened"
    );
    Ok(file)
}

fn find_variable(file: &Hdf4File, path: &str) -> Result<VarId, Box<dyn Error>> {
    if let Some(var) = file.variable(path) {
        return Ok(var);
    }
    let ds = file.dataset();
    let mut available: Vec<String> = ds.variables().map(|(id, _)| ds.variable_path(id)).collect();
    available.sort();
    if available.is_empty() {
        return Err(format!("Variable '{path}' not found (file has no variables)").into());
    }
    Err(format!(
        "Variable '{path}' not found. Available variables: {}",
        available.join(", ")
    )
    .into())
}

// ---- ls ----

fn shape_string(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(usize::to_string).collect();
    format!("[{}]", dims.join(", "))
}

fn dimension_names(ds: &Dataset, var: VarId) -> String {
    let variable = ds.variable(var);
    if variable.dims.iter().all(Option::is_none) {
        return "-".to_string();
    }
    variable
        .dims
        .iter()
        .map(|d| d.map_or_else(|| "?".to_string(), |d| ds.dimension(d).name.clone()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn attribute_string(value: &Values) -> String {
    match value {
        Values::Text(text) => format!("{text:?}"),
        other => value_strings(other).join(", "),
    }
}

fn print_group(
    writer: &mut dyn Write,
    ds: &Dataset,
    group: GroupId,
    attributes: bool,
) -> Result<(), Box<dyn Error>> {
    let g = ds.group(group);
    writeln!(writer, "{}", ds.group_path(group))?;
    if attributes {
        for attr in &g.attributes {
            writeln!(writer, "  :{} = {}", attr.name, attribute_string(&attr.value))?;
        }
    }
    for &dim in &g.dimensions {
        let d = ds.dimension(dim);
        let unlimited = if d.unlimited { " (unlimited)" } else { "" };
        writeln!(writer, "  dim {} = {}{}", d.name, d.length, unlimited)?;
    }
    for &var in &g.variables {
        let v = ds.variable(var);
        writeln!(
            writer,
            "  {}\t{}\t{}\t{}",
            v.name,
            v.data_type.name(),
            shape_string(&v.shape),
            dimension_names(ds, var)
        )?;
        for member in &v.members {
            writeln!(
                writer,
                "    .{}\t{}\t{}",
                member.name,
                member.data_type.name(),
                shape_string(&member.shape)
            )?;
        }
        if attributes {
            for attr in &v.attributes {
                writeln!(writer, "    :{} = {}", attr.name, attribute_string(&attr.value))?;
            }
        }
    }
    for &child in &g.children {
        print_group(writer, ds, child, attributes)?;
    }
    Ok(())
}

fn handle_ls(file: Hdf4File, format: OutputFormat, attributes: bool) -> Result<(), Box<dyn Error>> {
    let stdout = std::io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    let ds = file.dataset();

    match format {
        OutputFormat::Table => {
            print_group(&mut writer, ds, ds.root(), attributes)?;
            if !file.diagnostics().is_empty() {
                writeln!(writer)?;
                for diagnostic in file.diagnostics() {
                    writeln!(writer, "{diagnostic}")?;
                }
            }
        }
        OutputFormat::Json => {
            let variables: Vec<_> = ds
                .variables()
                .map(|(id, v)| {
                    json!({
                        "path": ds.variable_path(id),
                        "type": v.data_type.name(),
                        "shape": v.shape,
                        "dimensions": dimension_names(ds, id),
                        "members": v.members,
                        "attributes": v.attributes,
                    })
                })
                .collect();
            let groups: Vec<_> = ds
                .groups()
                .map(|(id, g)| {
                    json!({
                        "path": ds.group_path(id),
                        "dimensions": g.dimensions.iter().map(|&d| ds.dimension(d)).collect::<Vec<_>>(),
                        "attributes": g.attributes,
                    })
                })
                .collect();
            let root = json!({
                "groups": groups,
                "variables": variables,
                "diagnostics": file.diagnostics(),
            });
            serde_json::to_writer_pretty(&mut writer, &root)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

// ---- tags ----

#[derive(Serialize)]
struct TagSummary {
    code: u16,
    name: &'static str,
    reference: u16,
    offset: i32,
    length: i32,
    extended: bool,
    payload: &'static str,
    owner: Option<Claimant>,
}

fn handle_tags(file: Hdf4File, format: OutputFormat, orphans: bool) -> Result<(), Box<dyn Error>> {
    let records: Vec<_> = if orphans {
        file.orphan_tags().collect()
    } else {
        file.tags().iter().collect()
    };
    let summaries: Vec<TagSummary> = records
        .into_iter()
        .map(|record| TagSummary {
            code: record.code(),
            name: hdf4_format::constants::tag_name(record.code()),
            reference: record.reference(),
            offset: record.entry.offset,
            length: record.entry.length,
            extended: record.entry.extended,
            payload: record.payload.kind(),
            owner: file.claimant(record.key()),
        })
        .collect();

    let stdout = std::io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    match format {
        OutputFormat::Table => {
            writeln!(writer, "Code\tName\tRef\tOffset\tLength\tPayload\tOwner")?;
            for tag in &summaries {
                let owner = match tag.owner {
                    Some(Claimant::Variable(v)) => file.dataset().variable_path(v),
                    Some(Claimant::Dimension(d)) => format!("dim {}", file.dataset().dimension(d).name),
                    Some(Claimant::Group(g)) => file.dataset().group_path(g),
                    Some(Claimant::Attribute(_)) => "attribute".to_string(),
                    Some(Claimant::Metadata) => "metadata".to_string(),
                    None => "-".to_string(),
                };
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    tag.code, tag.name, tag.reference, tag.offset, tag.length, tag.payload, owner
                )?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &summaries)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

// ---- layout ----

fn print_layout(writer: &mut dyn Write, path: &str, layout: &LayoutInfo) -> Result<(), Box<dyn Error>> {
    writeln!(writer, "variable\t{path}")?;
    writeln!(writer, "kind\t{}", layout.kind.name())?;
    writeln!(writer, "element size\t{}", layout.element_size)?;
    if let Some(compression) = &layout.compression {
        writeln!(
            writer,
            "compression\t{} ({} bytes uncompressed)",
            compression.codec.name(),
            compression.uncompressed_length
        )?;
    }
    if let Some(fill) = &layout.fill_value {
        writeln!(writer, "fill value\t{fill:02x?}")?;
    }
    match &layout.kind {
        LayoutKind::NoData => {}
        LayoutKind::Contiguous { offset, length } => {
            writeln!(writer, "offset\t{offset}")?;
            writeln!(writer, "length\t{length}")?;
        }
        LayoutKind::Linked { segments } => {
            writeln!(writer, "segments\t{}", segments.len())?;
            for segment in segments {
                writeln!(writer, "  {}\t{}", segment.offset, segment.length)?;
            }
        }
        LayoutKind::Chunked {
            chunk_shape,
            chunks,
        } => {
            writeln!(writer, "chunk shape\t{}", shape_string(chunk_shape))?;
            writeln!(writer, "chunks\t{}", chunks.len())?;
            for chunk in chunks {
                let codec = chunk.compression.map_or("none", |c| c.codec.name());
                writeln!(
                    writer,
                    "  {}\t{}\t{}\t{} bytes\t{}",
                    shape_string(&chunk.origin),
                    chunk.tag,
                    chunk.placement.name(),
                    chunk.placement.stored_length(),
                    codec
                )?;
            }
        }
    }
    Ok(())
}

fn handle_layout(file: Hdf4File, variable: &str, format: OutputFormat) -> Result<(), Box<dyn Error>> {
    let var = find_variable(&file, variable)?;
    let layout = file.resolve_layout(var)?;
    let path = file.dataset().variable_path(var);

    let stdout = std::io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    match format {
        OutputFormat::Table => print_layout(&mut writer, &path, &layout)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &json!({ "variable": path, "layout": layout.as_ref() }))?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

// ---- cat ----

fn value_strings(values: &Values) -> Vec<String> {
    fn all<T: ToString>(v: &[T]) -> Vec<String> {
        v.iter().map(T::to_string).collect()
    }
    match values {
        Values::Text(text) => vec![text.clone()],
        Values::Strings(v) => v.clone(),
        Values::Int8(v) => all(v),
        Values::UInt8(v) => all(v),
        Values::Int16(v) => all(v),
        Values::UInt16(v) => all(v),
        Values::Int32(v) => all(v),
        Values::UInt32(v) => all(v),
        Values::Int64(v) => all(v),
        Values::UInt64(v) => all(v),
        Values::Float32(v) => all(v),
        Values::Float64(v) => all(v),
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn handle_cat(
    file: Hdf4File,
    variable: &str,
    section: Option<&str>,
    member: Option<&str>,
    format: CatFormat,
    progress: bool,
) -> Result<(), Box<dyn Error>> {
    let var = find_variable(&file, variable)?;
    let v = file.dataset().variable(var);
    let section = section.map(|spec| Section::parse(spec, &v.shape)).transpose()?;
    let shape = section.as_ref().map_or_else(|| v.shape.clone(), Section::shape);

    let spinner = progress.then(|| create_spinner(&format!("Reading {variable}")));
    let start = Instant::now();
    let values = match member {
        Some(member) => file.read_member(var, member, section.as_ref())?,
        None => file.read_values(var, section.as_ref())?,
    };
    let elapsed = start.elapsed();
    if let Some(pb) = spinner {
        pb.finish_with_message(format!("Read {} values in {:.2?}", values.len(), elapsed));
    }

    let stdout = std::io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    match format {
        CatFormat::Text => {
            for value in value_strings(&values) {
                writeln!(writer, "{value}")?;
            }
        }
        CatFormat::Json => {
            let output = json!({
                "variable": file.dataset().variable_path(var),
                "member": member,
                "section": section.as_ref().map(ToString::to_string),
                "shape": shape,
                "data": values,
            });
            serde_json::to_writer_pretty(&mut writer, &output)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_args_override_defaults() {
        let cli = Cli::parse_from(["h4", "--strict", "--max-tags", "10", "ls", "f.hdf"]);
        let opts = cli.decode.options();
        assert!(opts.strict);
        assert_eq!(opts.limits.max_tags, 10);
        assert_eq!(
            opts.limits.max_decompressed_bytes,
            Limits::default().max_decompressed_bytes
        );
        assert_eq!(opts.max_header_search, DecodeOptions::default().max_header_search);
    }

    #[test]
    fn test_value_strings() {
        assert_eq!(value_strings(&Values::Int16(vec![-1, 2])), vec!["-1", "2"]);
        assert_eq!(value_strings(&Values::Text("abc".into())), vec!["abc"]);
        assert_eq!(shape_string(&[3, 4]), "[3, 4]");
    }
}
