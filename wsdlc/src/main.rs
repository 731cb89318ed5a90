use std::{fs, path::PathBuf, str::FromStr};

use structopt::StructOpt;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wsdlc_codegen as codegen;
use wsdlc_wsdl as wsdl;

use codegen::{NamespaceAliases, Options};
use wsdl::{ImportFailure, LoadOptions};

#[derive(Debug, Error)]
enum Error {
    #[error("Error generating code")]
    Codegen(#[from] codegen::Error),

    #[error("Error loading WSDL")]
    Wsdl(#[from] wsdl::error::Error),

    #[error("Error writing output")]
    Io(#[from] std::io::Error),

    #[error("Output path {0} is the same as the input")]
    OutputIsInput(String),
}

#[derive(Debug, Error)]
#[error("Expected URI=Alias, got {0:?}")]
struct AliasParseError(String);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Alias {
    namespace: String,
    alias: String,
}

#[derive(StructOpt)]
#[structopt(about = "Generate Rust client code from a WSDL service description")]
struct Args {
    #[structopt(short, long, default_value = "./output.rs")]
    output: String,

    /// Skip TLS certificate verification when fetching over HTTPS
    #[structopt(short, long)]
    insecure: bool,

    /// Emit crate-private items instead of public ones
    #[structopt(long)]
    private: bool,

    /// Prefix types from a namespace with a short identifier, as URI=Alias
    #[structopt(long = "alias", number_of_values = 1)]
    aliases: Vec<Alias>,

    /// Start from an empty alias table
    #[structopt(long)]
    no_default_aliases: bool,

    /// Warn and continue when a nested import cannot be fetched
    #[structopt(long)]
    lenient_imports: bool,

    /// WSDL URL or file path
    input: String,
}

impl FromStr for Alias {
    type Err = AliasParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('=') {
            Some((namespace, alias)) if !namespace.is_empty() && !alias.is_empty() => Ok(Alias {
                namespace: namespace.to_owned(),
                alias: alias.to_owned(),
            }),
            _ => Err(AliasParseError(s.to_owned())),
        }
    }
}

impl Args {
    fn options(&self) -> Options {
        let mut aliases = if self.no_default_aliases {
            NamespaceAliases::default()
        } else {
            NamespaceAliases::well_known()
        };

        for alias in &self.aliases {
            aliases.insert(alias.namespace.clone(), alias.alias.clone());
        }

        Options {
            load: LoadOptions {
                insecure: self.insecure,
                import_failure: if self.lenient_imports {
                    ImportFailure::Warn
                } else {
                    ImportFailure::Abort
                },
            },
            exported: !self.private,
            aliases,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn same_path(input: &str, output: &str) -> bool {
    let canonical = |path: &str| fs::canonicalize(path).ok();

    input == output || matches!((canonical(input), canonical(output)), (Some(a), Some(b)) if a == b)
}

#[paw::main]
fn main(args: Args) -> Result<(), Error> {
    init_tracing();

    if same_path(&args.input, &args.output) {
        return Err(Error::OutputIsInput(args.output));
    }

    let source = codegen::from_url(&args.input, &args.options())?;

    let output = PathBuf::from(&args.output);
    let mut staging = output.clone().into_os_string();
    staging.push(".tmp");

    fs::write(&staging, source)?;
    fs::rename(&staging, &output)?;

    info!(output = %output.display(), "wrote generated code");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["wsdlc"];
        argv.extend_from_slice(extra);
        argv.push("service.wsdl");
        Args::from_iter(argv)
    }

    #[test]
    fn alias_splits_on_last_equals() {
        let alias: Alias = "http://example.com/a=b=Thing".parse().unwrap();
        assert_eq!(alias.namespace, "http://example.com/a=b");
        assert_eq!(alias.alias, "Thing");

        assert!("no-separator".parse::<Alias>().is_err());
        assert!("urn:x=".parse::<Alias>().is_err());
    }

    #[test]
    fn defaults() {
        let args = args(&[]);
        assert_eq!(args.output, "./output.rs");

        let options = args.options();
        assert!(options.exported);
        assert!(!options.load.insecure);
        assert_eq!(options.load.import_failure, ImportFailure::Abort);
        assert_eq!(options.aliases, NamespaceAliases::well_known());
    }

    #[test]
    fn flags_feed_options() {
        let args = args(&[
            "--private",
            "-i",
            "--lenient-imports",
            "--no-default-aliases",
            "--alias",
            "urn:example=Ex",
        ]);
        let options = args.options();

        assert!(!options.exported);
        assert!(options.load.insecure);
        assert_eq!(options.load.import_failure, ImportFailure::Warn);
        assert_eq!(options.aliases.get("urn:example"), Some("Ex"));
        assert_eq!(options.aliases.get("http://www.onvif.org/ver10/schema"), None);
    }

    #[test]
    fn output_may_not_be_input() {
        assert!(same_path("service.wsdl", "service.wsdl"));
        assert!(!same_path("service.wsdl", "output.rs"));
    }
}
