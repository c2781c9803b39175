//! `quill`: parse, query and reformat XML files.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quillxml::serial::node_to_string;
use quillxml::xpath::{NodeRef, Value};
use quillxml::{Context, Document, ParseOptions, WriteOptions, XPath, XmlVersion};

/// Parse XML files, evaluate an XPath expression against them or write
/// them back out.
#[derive(Parser, Debug)]
#[command(name = "quill", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// XML files to process (use `-` for stdin).
    #[arg(required = true)]
    files: Vec<String>,

    /// Evaluate an `XPath` expression and print the result.
    #[arg(long, value_name = "EXPR")]
    xpath: Option<String>,

    /// Bind an XPath variable, as NAME=VALUE. Repeatable.
    #[arg(long = "var", value_name = "NAME=VALUE")]
    vars: Vec<String>,

    /// Bind a namespace prefix for XPath name tests, as PREFIX=URI.
    #[arg(long = "ns", value_name = "PREFIX=URI")]
    namespaces: Vec<String>,

    /// Pretty-print element-only content.
    #[arg(long)]
    format: bool,

    /// Spaces per level with --format.
    #[arg(long, value_name = "N", default_value_t = 2)]
    indent: usize,

    /// Parse only; do not write the document.
    #[arg(long)]
    noout: bool,

    /// Write XML 1.1.
    #[arg(long = "version-1-1")]
    version_1_1: bool,

    /// Keep CDATA sections instead of merging them into text.
    #[arg(long)]
    cdata: bool,

    /// Validate against the document's DTD.
    #[arg(long)]
    valid: bool,

    /// Resolve external entities and DTDs from the local filesystem.
    #[arg(long)]
    load_external: bool,

    /// More logging on stderr. `RUST_LOG` takes precedence.
    #[arg(short, long)]
    verbose: bool,
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_PARSE_ERROR: u8 = 1;
const EXIT_XPATH_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut worst_exit = EXIT_SUCCESS;
    for file in &cli.files {
        worst_exit = worst_exit.max(process_file(&cli, file));
    }
    ExitCode::from(worst_exit)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn process_file(cli: &Cli, filename: &str) -> u8 {
    let input = match read_input(filename) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{filename}: failed to read: {e}");
            return EXIT_PARSE_ERROR;
        }
    };

    let doc = match quillxml::parser::parse_bytes(&input, &parse_options(cli, filename)) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("{filename}: {e}");
            return EXIT_PARSE_ERROR;
        }
    };

    if let Some(expr) = &cli.xpath {
        return match evaluate_xpath(cli, &doc, expr) {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                eprintln!("{filename}: XPath error: {e}");
                EXIT_XPATH_ERROR
            }
        };
    }

    if !cli.noout {
        let mut stdout = io::stdout().lock();
        let written = doc
            .write_with(&mut stdout, &write_options(cli))
            .and_then(|()| writeln!(stdout).map_err(Into::into));
        if let Err(e) = written {
            eprintln!("{filename}: {e}");
            return EXIT_PARSE_ERROR;
        }
    }
    EXIT_SUCCESS
}

/// Reads input from a file or stdin (when filename is `-`).
fn read_input(filename: &str) -> io::Result<Vec<u8>> {
    if filename == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(filename)
    }
}

fn parse_options(cli: &Cli, filename: &str) -> ParseOptions {
    let base = Path::new(filename)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let options = ParseOptions::default()
        .preserve_cdata(cli.cdata)
        .validate(cli.valid)
        .base_dir(base);
    if !cli.load_external {
        return options;
    }
    options.entity_loader(|base, _public_id, system_id| {
        let path = Path::new(base).join(system_id);
        tracing::debug!(path = %path.display(), "loading external entity");
        fs::read(path)
    })
}

fn write_options(cli: &Cli) -> WriteOptions {
    let options = WriteOptions::default()
        .indent(cli.format)
        .indent_width(cli.indent);
    if cli.version_1_1 {
        options.version(XmlVersion::V1_1)
    } else {
        options
    }
}

fn split_binding(binding: &str) -> Result<(&str, &str), String> {
    binding
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{binding}'"))
}

/// Evaluates an `XPath` expression and prints the result to stdout.
fn evaluate_xpath(cli: &Cli, doc: &Document, expr: &str) -> Result<(), String> {
    let mut context = Context::new();
    for binding in &cli.vars {
        let (name, value) = split_binding(binding)?;
        context.set(name, value);
    }
    for binding in &cli.namespaces {
        let (prefix, uri) = split_binding(binding)?;
        context.set_namespace(prefix, uri);
    }

    let path = XPath::new(expr).map_err(|e| e.to_string())?;
    let value = path
        .evaluate_with(doc, doc.root(), &context)
        .map_err(|e| e.to_string())?;

    let mut stdout = io::stdout().lock();
    match value {
        Value::NodeSet(nodes) => {
            let options = write_options(cli);
            for node in nodes {
                let text = render_node(doc, node, &options).map_err(|e| e.to_string())?;
                writeln!(stdout, "{text}").map_err(|e| e.to_string())?;
            }
        }
        scalar => writeln!(stdout, "{scalar}").map_err(|e| e.to_string())?,
    }
    Ok(())
}

fn render_node(
    doc: &Document,
    node: NodeRef,
    options: &WriteOptions,
) -> Result<String, quillxml::error::WriteError> {
    match node {
        NodeRef::Node(id) => node_to_string(doc, id, options),
        NodeRef::Attribute { element, index } => Ok(doc
            .attributes(element)
            .get(index)
            .map(|a| format!("{}=\"{}\"", a.qualified_name(), a.value))
            .unwrap_or_default()),
        NodeRef::Namespace { element, index } => Ok(doc
            .in_scope_namespaces(element)
            .into_iter()
            .nth(index)
            .map(|(prefix, uri)| match prefix {
                Some(p) => format!("xmlns:{p}=\"{uri}\""),
                None => format!("xmlns=\"{uri}\""),
            })
            .unwrap_or_default()),
    }
}
