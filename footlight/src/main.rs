use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use footlight::error::AnalyzeError;
use footlight::findings::FindingsConfig;
use footlight::model::AnalyzeParams;
use footlight::query::{list_symbol_facets, list_symbols, lookup_pc, SymbolQuery};
use footlight::session::AnalysisSession;
use footlight::toolchain::{detect_toolchain, ToolchainConfig};

#[derive(Parser)]
#[command(name = "footlight", version, about = "ELF/MAP firmware footprint analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover binutils toolchain candidates, best first.
    DetectToolchain {
        #[command(flatten)]
        toolchain: ToolchainArgs,
    },
    /// Run the full analysis pipeline and print the result.
    Analyze {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        toolchain: ToolchainArgs,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Analyze (cache-aware) and page through the symbol list.
    Symbols {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        toolchain: ToolchainArgs,
        #[command(flatten)]
        thresholds: ThresholdArgs,
        /// Name filter: substring, or a regex when it uses regex syntax.
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        page_size: usize,
        /// Sort key: size, name, kind, or section.
        #[arg(long)]
        sort: Option<String>,
        /// Sort order: asc or desc.
        #[arg(long)]
        order: Option<String>,
        /// Exact section_guess filter.
        #[arg(long)]
        section: Option<String>,
        /// Exact kind-letter filter.
        #[arg(long)]
        kind: Option<String>,
    },
    /// Analyze (cache-aware) and print section/kind facet counts.
    Facets {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        toolchain: ToolchainArgs,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Analyze (cache-aware) and resolve a program-counter address.
    Lookup {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        toolchain: ToolchainArgs,
        #[command(flatten)]
        thresholds: ThresholdArgs,
        /// Address: 0x-prefixed hex, bare hex, or decimal.
        address: String,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Path to the firmware ELF image.
    #[arg(long)]
    elf: String,
    /// Optional linker MAP file.
    #[arg(long)]
    map: Option<String>,
}

#[derive(Args)]
struct ToolchainArgs {
    /// Toolchain installation root (its bin/ is probed).
    #[arg(long)]
    toolchain_root: Option<String>,
    /// Explicit nm path.
    #[arg(long)]
    nm: Option<String>,
    /// Explicit objdump path.
    #[arg(long)]
    objdump: Option<String>,
    /// Explicit strings path.
    #[arg(long)]
    strings: Option<String>,
    /// Use only the explicit paths; skip probing.
    #[arg(long)]
    no_auto_detect: bool,
}

#[derive(Args)]
struct ThresholdArgs {
    /// SIZE warning threshold in bytes.
    #[arg(long)]
    size_warn_bytes: Option<u64>,
    /// RAM_PRESSURE warning threshold in bytes.
    #[arg(long)]
    ram_warn_bytes: Option<u64>,
    /// FLOAT_BLOAT warning threshold in bytes.
    #[arg(long)]
    float_warn_bytes: Option<u64>,
    /// STRING_COUNT info threshold.
    #[arg(long)]
    string_info_count: Option<u64>,
}

impl ToolchainArgs {
    fn to_config(&self) -> Option<ToolchainConfig> {
        let any_explicit = self.toolchain_root.is_some()
            || self.nm.is_some()
            || self.objdump.is_some()
            || self.strings.is_some();
        if !any_explicit && !self.no_auto_detect {
            return None;
        }
        Some(ToolchainConfig {
            auto_detect: !self.no_auto_detect,
            toolchain_root: self.toolchain_root.clone(),
            nm_path: self.nm.clone(),
            objdump_path: self.objdump.clone(),
            strings_path: self.strings.clone(),
        })
    }
}

impl ThresholdArgs {
    fn to_config(&self) -> FindingsConfig {
        let defaults = FindingsConfig::default();
        FindingsConfig {
            size_warn_bytes: self.size_warn_bytes.unwrap_or(defaults.size_warn_bytes),
            ram_warn_bytes: self.ram_warn_bytes.unwrap_or(defaults.ram_warn_bytes),
            float_warn_bytes: self.float_warn_bytes.unwrap_or(defaults.float_warn_bytes),
            string_info_count: self.string_info_count.unwrap_or(defaults.string_info_count),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AnalyzeError> {
    match cli.command {
        Command::DetectToolchain { toolchain } => {
            let config = toolchain.to_config().unwrap_or(ToolchainConfig {
                auto_detect: true,
                ..ToolchainConfig::default()
            });
            print_json(&detect_toolchain(&config))
        }
        Command::Analyze {
            input,
            toolchain,
            thresholds,
        } => {
            let session = AnalysisSession::new(thresholds.to_config());
            let result = session.analyze(&analyze_params(&input, &toolchain))?;
            print_json(result.as_ref())
        }
        Command::Symbols {
            input,
            toolchain,
            thresholds,
            query,
            page,
            page_size,
            sort,
            order,
            section,
            kind,
        } => {
            let session = AnalysisSession::new(thresholds.to_config());
            session.analyze(&analyze_params(&input, &toolchain))?;
            let paged = list_symbols(
                &session,
                &SymbolQuery {
                    query,
                    page,
                    page_size,
                    sort,
                    order,
                    section,
                    kind,
                },
            )?;
            print_json(&paged)
        }
        Command::Facets {
            input,
            toolchain,
            thresholds,
        } => {
            let session = AnalysisSession::new(thresholds.to_config());
            session.analyze(&analyze_params(&input, &toolchain))?;
            print_json(&list_symbol_facets(&session)?)
        }
        Command::Lookup {
            input,
            toolchain,
            thresholds,
            address,
        } => {
            let session = AnalysisSession::new(thresholds.to_config());
            session.analyze(&analyze_params(&input, &toolchain))?;
            print_json(&lookup_pc(&session, &address)?)
        }
    }
}

fn analyze_params(input: &InputArgs, toolchain: &ToolchainArgs) -> AnalyzeParams {
    AnalyzeParams {
        elf_path: input.elf.clone(),
        map_path: input.map.clone(),
        toolchain: toolchain.to_config(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AnalyzeError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AnalyzeError::input(format!("failed to serialize result: {e}")))?;
    println!("{text}");
    Ok(())
}
