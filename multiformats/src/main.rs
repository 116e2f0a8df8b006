use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use multiformats_core::{
    Cid, DagLink, DagNode, MultiAddress, MultiHash, ProtocolValue, Registries, Version, multibase,
};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod output;

use config::{Flags, Settings};
use output::{
    AddrOutput, AlgorithmInfo, AlgorithmsOutput, BaseDecodeOutput, BaseEncodeOutput, CidOutput,
    ComponentInfo, DagOutput, HashOutput, LinkInfo, OutputWriter,
};

/// Multiformats - self-describing hashes, CIDs and addresses
#[derive(Parser)]
#[command(name = "mf")]
#[command(about = "Inspect and produce multihashes, CIDs, multibase strings and multiaddrs", long_about = None)]
#[command(version)]
struct Cli {
    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Hashing algorithm (defaults to MULTIFORMATS_HASH env var or sha2-256)
    #[arg(long, global = true)]
    hash: Option<String>,

    /// Multibase for encoded output (defaults to MULTIFORMATS_BASE env var or base58btc)
    #[arg(long, global = true)]
    base: Option<String>,

    /// Log filter (defaults to MULTIFORMATS_LOG env var or warn)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a file or stdin
    Hash {
        /// File to hash (reads stdin if omitted or "-")
        file: Option<PathBuf>,

        /// Check the content against this base58 multihash instead
        #[arg(long)]
        verify: Option<String>,
    },

    /// Work with content identifiers
    #[command(subcommand)]
    Cid(CidCommands),

    /// Multibase encode or decode
    #[command(subcommand)]
    Base(BaseCommands),

    /// Parse a multiaddress and show its components
    Addr {
        /// Address, e.g. /ip4/127.0.0.1/tcp/4001
        address: String,
    },

    /// Build or inspect Merkle DAG nodes
    #[command(subcommand)]
    Dag(DagCommands),

    /// List registered algorithms, codecs and protocols
    Algorithms {
        /// Only list one registry
        #[arg(long, value_enum)]
        kind: Option<RegistryKind>,
    },
}

#[derive(Subcommand)]
enum CidCommands {
    /// Show the fields of a CID
    Inspect {
        /// CID string
        cid: String,
    },

    /// Re-render a CID as v1 and/or in another base
    Convert {
        /// CID string
        cid: String,

        /// Upgrade a v0 CID to v1
        #[arg(long)]
        to_v1: bool,
    },
}

#[derive(Subcommand)]
enum BaseCommands {
    /// Encode a file or stdin with the selected base
    Encode {
        /// File to encode (reads stdin if omitted or "-")
        file: Option<PathBuf>,
    },

    /// Decode a multibase string and print the bytes as hex
    Decode {
        /// Multibase string
        text: String,
    },
}

#[derive(Subcommand)]
enum DagCommands {
    /// Build a node from data and links, print its id and size
    Build {
        /// File holding the node data
        #[arg(long)]
        data: Option<PathBuf>,

        /// Link as [NAME=]CID[:SIZE]; repeatable
        #[arg(long = "link")]
        links: Vec<String>,

        /// Write the serialized node to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Parse a serialized node
    Inspect {
        /// File holding the serialized node (reads stdin if omitted or "-")
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RegistryKind {
    Hashing,
    Base,
    Codec,
    Protocol,
}

fn main() {
    let cli = Cli::parse();

    // flag > env var > default
    let settings = Settings::resolve(Flags {
        hash: cli.hash,
        base: cli.base,
        log_level: cli.log_level,
    });
    init_tracing(&settings.log_level);

    let output = OutputWriter::new(cli.json);
    if let Err(err) = run(cli.command, &settings, &output) {
        output.write_error(&err, 1);
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run(command: Commands, settings: &Settings, output: &OutputWriter) -> Result<()> {
    debug!(hash = %settings.hash, base = %settings.base, "resolved settings");
    match command {
        Commands::Hash { file, verify } => cmd_hash(file.as_deref(), verify, settings, output),
        Commands::Cid(cid_cmd) => match cid_cmd {
            CidCommands::Inspect { cid } => cmd_cid_inspect(&cid, output),
            CidCommands::Convert { cid, to_v1 } => cmd_cid_convert(&cid, to_v1, settings, output),
        },
        Commands::Base(base_cmd) => match base_cmd {
            BaseCommands::Encode { file } => cmd_base_encode(file.as_deref(), settings, output),
            BaseCommands::Decode { text } => cmd_base_decode(&text, output),
        },
        Commands::Addr { address } => cmd_addr(&address, output),
        Commands::Dag(dag_cmd) => match dag_cmd {
            DagCommands::Build { data, links, out } => {
                cmd_dag_build(data.as_deref(), &links, out.as_deref(), settings, output)
            }
            DagCommands::Inspect { file } => cmd_dag_inspect(file.as_deref(), output),
        },
        Commands::Algorithms { kind } => cmd_algorithms(kind, output),
    }
}

/// Open a file, or stdin for `None` / `-`. Refuses an interactive stdin.
fn open_input(file: Option<&Path>) -> Result<Box<dyn Read>> {
    match file {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => {
            if atty::is(atty::Stream::Stdin) {
                anyhow::bail!("No input: pass a file or pipe data on stdin");
            }
            Ok(Box::new(io::stdin().lock()))
        }
    }
}

fn read_input(file: Option<&Path>) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    open_input(file)?
        .read_to_end(&mut bytes)
        .with_context(|| "Failed to read input")?;
    Ok(bytes)
}

fn hex(bytes: &[u8]) -> Result<String> {
    let base16 = Registries::global()
        .bases()
        .lookup("base16")
        .with_context(|| "base16 is not registered")?;
    Ok(base16.encode(bytes)?)
}

fn cmd_hash(
    file: Option<&Path>,
    verify: Option<String>,
    settings: &Settings,
    output: &OutputWriter,
) -> Result<()> {
    let input = open_input(file)?;

    let (hash, verified) = match verify {
        Some(expected) => {
            let hash = MultiHash::from_base58(&expected)
                .with_context(|| format!("Invalid multihash: {}", expected))?;
            let matches = hash
                .matches_reader(input)
                .with_context(|| format!("Failed to verify against {}", hash))?;
            if !matches {
                anyhow::bail!("Content does not match {}", hash);
            }
            (hash, Some(true))
        }
        None => {
            let hash = MultiHash::compute_reader(input, &settings.hash)
                .with_context(|| format!("Failed to hash with {}", settings.hash))?;
            (hash, None)
        }
    };

    let mut cid = Cid::from_multihash(hash.clone()).with_context(|| "Failed to build CID")?;
    if cid.version() == Version::V1 {
        cid = cid
            .with_encoding(&settings.base)
            .with_context(|| format!("Failed to encode CID with {}", settings.base))?;
    }

    let data = HashOutput {
        success: true,
        result_code: 0,
        algorithm: hash.algorithm().name().to_string(),
        digest: hex(hash.digest())?,
        multihash: hash,
        cid,
        verified,
    };
    output.write(&data, || match data.verified {
        Some(_) => format!("OK {}\n", data.multihash),
        None => format!("{} {}\n", data.multihash, data.cid),
    })
}

fn cid_output(cid: Cid) -> Result<CidOutput> {
    Ok(CidOutput {
        success: true,
        result_code: 0,
        version: cid.version().as_u64(),
        content_type: cid.content_type().to_string(),
        encoding: cid.encoding().to_string(),
        multihash: cid.hash().clone(),
        hash_algorithm: cid.hash().algorithm().name().to_string(),
        digest: hex(cid.hash().digest())?,
        bytes: hex(&cid.to_bytes())?,
        cid,
    })
}

fn cmd_cid_inspect(text: &str, output: &OutputWriter) -> Result<()> {
    let cid = Cid::decode(text).with_context(|| format!("Invalid CID: {}", text))?;
    let data = cid_output(cid)?;
    output.write(&data, || {
        format!(
            "CID: {}\nVersion: {}\nContent type: {}\nEncoding: {}\nHash: {} {}\n",
            data.cid, data.version, data.content_type, data.encoding, data.hash_algorithm, data.digest
        )
    })
}

fn cmd_cid_convert(text: &str, to_v1: bool, settings: &Settings, output: &OutputWriter) -> Result<()> {
    let mut cid = Cid::decode(text).with_context(|| format!("Invalid CID: {}", text))?;
    if to_v1 {
        cid = cid
            .to_version1()
            .with_context(|| format!("Failed to convert {} to v1", cid))?;
    }
    if cid.version() == Version::V1 {
        cid = cid
            .with_encoding(&settings.base)
            .with_context(|| format!("Failed to encode CID with {}", settings.base))?;
    }
    let data = cid_output(cid)?;
    output.write(&data, || format!("{}\n", data.cid))
}

fn cmd_base_encode(file: Option<&Path>, settings: &Settings, output: &OutputWriter) -> Result<()> {
    let bytes = read_input(file)?;
    let text = multibase::encode(&bytes, &settings.base)
        .with_context(|| format!("Failed to encode with {}", settings.base))?;
    let data = BaseEncodeOutput {
        success: true,
        result_code: 0,
        encoding: settings.base.clone(),
        text,
    };
    output.write(&data, || format!("{}\n", data.text))
}

fn cmd_base_decode(text: &str, output: &OutputWriter) -> Result<()> {
    let bytes = multibase::decode(text).with_context(|| "Invalid multibase string")?;
    let encoding = text
        .chars()
        .next()
        .and_then(|code| Registries::global().bases().get_by_code(code))
        .map(|base| base.name().to_string())
        .unwrap_or_default();
    let data = BaseDecodeOutput {
        success: true,
        result_code: 0,
        encoding,
        length: bytes.len(),
        bytes: hex(&bytes)?,
    };
    output.write(&data, || format!("{}\n", data.bytes))
}

fn cmd_addr(text: &str, output: &OutputWriter) -> Result<()> {
    let address = MultiAddress::parse(text).with_context(|| format!("Invalid multiaddress: {}", text))?;

    let components = address
        .components()
        .iter()
        .map(|c| ComponentInfo {
            protocol: c.name().to_string(),
            code: c.code(),
            value: match c.value() {
                ProtocolValue::None => None,
                value => Some(value.to_string()),
            },
        })
        .collect();

    let data = AddrOutput {
        success: true,
        result_code: 0,
        bytes: hex(&address.to_bytes())?,
        peer_id: address.peer_id().cloned(),
        address,
        components,
    };
    output.write(&data, || {
        let mut text = format!("{}\n", data.address);
        for component in &data.components {
            match &component.value {
                Some(value) => {
                    text.push_str(&format!("  {} ({}) {}\n", component.protocol, component.code, value))
                }
                None => text.push_str(&format!("  {} ({})\n", component.protocol, component.code)),
            }
        }
        text.push_str(&format!("Bytes: {}\n", data.bytes));
        text
    })
}

/// Parse `[NAME=]CID[:SIZE]`.
fn parse_link(arg: &str) -> Result<DagLink> {
    let (name, rest) = match arg.split_once('=') {
        Some((name, rest)) => (Some(name.to_string()), rest),
        None => (None, arg),
    };
    let (cid, size) = match rest.split_once(':') {
        Some((cid, size)) => {
            let size = size
                .parse::<u64>()
                .with_context(|| format!("Invalid link size in {:?}", arg))?;
            (cid, size)
        }
        None => (rest, 0),
    };
    let cid = Cid::decode(cid).with_context(|| format!("Invalid link CID in {:?}", arg))?;
    Ok(DagLink::new(name, cid, size))
}

fn dag_output(node: &DagNode, written_to: Option<String>) -> Result<DagOutput> {
    let id = node.id().with_context(|| "Failed to compute node id")?.clone();
    Ok(DagOutput {
        success: true,
        result_code: 0,
        id,
        size: node.size(),
        hashing_algorithm: node.hashing_algorithm().to_string(),
        data_length: node.data().len(),
        links: node
            .links()
            .iter()
            .map(|link| LinkInfo {
                name: link.name().map(str::to_string),
                id: link.id().clone(),
                size: link.size(),
            })
            .collect(),
        written_to,
    })
}

fn write_dag_text(data: &DagOutput) -> String {
    let mut text = format!("{} {}\n", data.id, data.size);
    for link in &data.links {
        text.push_str(&format!(
            "  {} {} {}\n",
            link.name.as_deref().unwrap_or("-"),
            link.id,
            link.size
        ));
    }
    text
}

fn cmd_dag_build(
    data_file: Option<&Path>,
    link_args: &[String],
    out: Option<&Path>,
    settings: &Settings,
    output: &OutputWriter,
) -> Result<()> {
    let data = match data_file {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => Vec::new(),
    };
    let links = link_args
        .iter()
        .map(|arg| parse_link(arg))
        .collect::<Result<Vec<_>>>()?;

    let node = DagNode::with_algorithm(data, links, &settings.hash);

    let written_to = match out {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            node.write_to(&mut file)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Some(path.display().to_string())
        }
        None => None,
    };

    let data = dag_output(&node, written_to)?;
    output.write(&data, || write_dag_text(&data))
}

fn cmd_dag_inspect(file: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let mut input = open_input(file)?;
    let node = DagNode::read_from(&mut input).with_context(|| "Invalid DAG node")?;
    let data = dag_output(&node, None)?;
    output.write(&data, || write_dag_text(&data))
}

fn cmd_algorithms(kind: Option<RegistryKind>, output: &OutputWriter) -> Result<()> {
    let registries = Registries::global();
    let wants = |k: RegistryKind| kind.is_none_or(|wanted| wanted == k);
    let mut algorithms = Vec::new();

    if wants(RegistryKind::Hashing) {
        let mut entries = registries.hashing().all();
        entries.sort_by(|a, b| (a.code(), a.name()).cmp(&(b.code(), b.name())));
        algorithms.extend(entries.iter().map(|a| AlgorithmInfo {
            kind: "hashing".into(),
            name: a.name().to_string(),
            code: format!("{:#x}", a.code()),
            detail: Some(match (a.is_implemented(), a.digest_size()) {
                (false, _) => "not implemented".to_string(),
                (true, 0) => "variable size".to_string(),
                (true, size) => format!("{} bytes", size),
            }),
        }));
    }
    if wants(RegistryKind::Base) {
        let mut entries = registries.bases().all();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        algorithms.extend(entries.iter().map(|b| AlgorithmInfo {
            kind: "base".into(),
            name: b.name().to_string(),
            code: b.code().to_string(),
            detail: None,
        }));
    }
    if wants(RegistryKind::Codec) {
        let mut entries = registries.codecs().all();
        entries.sort_by_key(|c| c.code());
        algorithms.extend(entries.iter().map(|c| AlgorithmInfo {
            kind: "codec".into(),
            name: c.name().to_string(),
            code: format!("{:#x}", c.code()),
            detail: None,
        }));
    }
    if wants(RegistryKind::Protocol) {
        let mut entries = registries.protocols().all();
        entries.sort_by(|a, b| (a.code(), a.name()).cmp(&(b.code(), b.name())));
        algorithms.extend(entries.iter().map(|p| AlgorithmInfo {
            kind: "protocol".into(),
            name: p.name().to_string(),
            code: p.code().to_string(),
            detail: None,
        }));
    }

    let data = AlgorithmsOutput {
        success: true,
        result_code: 0,
        algorithms,
    };
    output.write(&data, || {
        data.algorithms
            .iter()
            .map(|a| match &a.detail {
                Some(detail) => format!("{:<9} {:<18} {:<8} {}\n", a.kind, a.name, a.code, detail),
                None => format!("{:<9} {:<18} {}\n", a.kind, a.name, a.code),
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_NODE: &str = "QmdfTbBqBPQ7VNxZEYEj14VmRuZBkqFbiwReogJgS1zR1n";

    #[test]
    fn test_parse_link_full() {
        let link = parse_link(&format!("child={}:42", EMPTY_NODE)).unwrap();
        assert_eq!(link.name(), Some("child"));
        assert_eq!(link.id().encode(), EMPTY_NODE);
        assert_eq!(link.size(), 42);
    }

    #[test]
    fn test_parse_link_bare() {
        let link = parse_link(EMPTY_NODE).unwrap();
        assert_eq!(link.name(), None);
        assert_eq!(link.size(), 0);
    }

    #[test]
    fn test_parse_link_errors() {
        assert!(parse_link("x=notacid").is_err());
        assert!(parse_link(&format!("{}:big", EMPTY_NODE)).is_err());
    }

    #[test]
    fn test_hex_helper() {
        assert_eq!(hex(&[0x12, 0x20]).unwrap(), "1220");
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "mf", "--json", "dag", "build", "--link", "a=x", "--link", "b=y", "--hash", "blake3",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.hash.as_deref(), Some("blake3"));
        match cli.command {
            Commands::Dag(DagCommands::Build { links, .. }) => assert_eq!(links, ["a=x", "b=y"]),
            _ => panic!("expected dag build"),
        }
    }
}
