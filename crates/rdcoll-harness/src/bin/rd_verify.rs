//! Recursive-doubling verifier: drives randomized test sets against the
//! in-process reference device and reports a single pass/fail verdict.
//!
//! Exit codes: 0 pass, 1 verification failure, 2 usage or config error.

use std::ffi::OsString;
use std::path::PathBuf;

use rdcoll_harness::HarnessConfig;
use rdcoll_harness::device::{CompletionOrder, PacketModifierDevice, RecursiveDoublingDevice};
use rdcoll_harness::journal::RunJournal;
use rdcoll_harness::loopback;
use rdcoll_harness::nic::{CompletionStatus, TohostRegister};
use rdcoll_harness::orchestrator::{Orchestrator, SEED_SCOPE, signal_completion};
use rdcoll_harness::report::failure_triage_line;
use rdcoll_harness::seed::{SeedTaxonomy, wall_clock_seed};
use tracing_subscriber::EnvFilter;

const JOURNAL_SUITE: &str = "rd-verify";

fn main() {
    let exit_code = run_cli(std::env::args_os());
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

#[derive(Debug, Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
    seed: Option<u64>,
    test_sets: Option<usize>,
    levels: Option<usize>,
    elements: Option<usize>,
    journal_dir: Option<PathBuf>,
    json_logs: bool,
    dump_packets: bool,
    loopback: bool,
}

fn run_cli<I>(os_args: I) -> i32
where
    I: IntoIterator<Item = OsString>,
{
    let raw: Vec<String> = os_args
        .into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    let tail = if raw.len() > 1 { &raw[1..] } else { &[] };

    if tail.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return 0;
    }

    let args = match parse_args(tail) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("error: {msg}");
            return 2;
        }
    };

    init_logging(args.json_logs);

    if args.loopback {
        return run_loopback();
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("error: {msg}");
            return 2;
        }
    };
    run_verification(&args, config)
}

fn parse_args(tail: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut i = 0;
    while i < tail.len() {
        let flag = tail[i].as_str();
        let mut value = || {
            i += 1;
            tail.get(i)
                .cloned()
                .ok_or_else(|| format!("{flag} requires an argument"))
        };
        match flag {
            "--config" => args.config_path = Some(PathBuf::from(value()?)),
            "--seed" => args.seed = Some(parse_u64(flag, &value()?)?),
            "--test-sets" => args.test_sets = Some(parse_usize(flag, &value()?)?),
            "--levels" => args.levels = Some(parse_usize(flag, &value()?)?),
            "--elements" => args.elements = Some(parse_usize(flag, &value()?)?),
            "--journal" => args.journal_dir = Some(PathBuf::from(value()?)),
            "--json" => args.json_logs = true,
            "--dump-packets" => args.dump_packets = true,
            "--loopback" => args.loopback = true,
            other => return Err(format!("unknown option `{other}`")),
        }
        i += 1;
    }
    Ok(args)
}

fn parse_u64(flag: &str, text: &str) -> Result<u64, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| format!("{flag} expects an unsigned integer, got `{text}`"))
}

fn parse_usize(flag: &str, text: &str) -> Result<usize, String> {
    let value = parse_u64(flag, text)?;
    usize::try_from(value).map_err(|_| format!("{flag} value {value} is too large"))
}

fn build_config(args: &CliArgs) -> Result<HarnessConfig, String> {
    let mut config = match &args.config_path {
        Some(path) => HarnessConfig::load(path).map_err(|e| format!("{}: {e}", path.display()))?,
        None => HarnessConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(test_sets) = args.test_sets {
        config.num_test_sets = test_sets;
    }
    if let Some(levels) = args.levels {
        config.max_level = levels
            .checked_sub(1)
            .and_then(|max| u8::try_from(max).ok())
            .ok_or_else(|| format!("--levels must be in 1..=255, got {levels}"))?;
    }
    if let Some(elements) = args.elements {
        config.num_elements = elements;
    }
    if args.dump_packets {
        config.debug_dump_packets = true;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(err) = result {
        eprintln!("warning: logging already initialized: {err}");
    }
}

fn run_verification(args: &CliArgs, config: HarnessConfig) -> i32 {
    let seed = config.seed.unwrap_or_else(wall_clock_seed);
    let seeds = SeedTaxonomy::derive(seed, SEED_SCOPE);
    tracing::info!(
        seed,
        harness_seed = seeds.harness,
        device_seed = seeds.device,
        "seed taxonomy derived"
    );

    let geometry = match config.geometry() {
        Ok(geometry) => geometry,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };
    let device = RecursiveDoublingDevice::new(geometry, CompletionOrder::Seeded(seeds.device));

    let journal = match &args.journal_dir {
        Some(dir) => match RunJournal::create(dir, JOURNAL_SUITE, seed, &config) {
            Ok(journal) => Some(journal),
            Err(err) => {
                eprintln!("error: cannot create run journal in {}: {err}", dir.display());
                return 2;
            }
        },
        None => None,
    };

    let mut orchestrator = Orchestrator::seeded(config, device, seed);
    if let Some(journal) = journal {
        orchestrator = orchestrator.with_journal(journal);
    }
    let result = orchestrator.run();

    match &result {
        Ok(report) => println!("{}", report.triage_line()),
        Err(failure) => println!("{}", failure_triage_line(failure, seed)),
    }
    let mut host = TohostRegister::new();
    let status = signal_completion(&result, &mut host);
    println!("tohost={:#x}", status.tohost_value());
    exit_code(status)
}

fn run_loopback() -> i32 {
    let mut device = PacketModifierDevice::new();
    let mut host = TohostRegister::new();
    let status = loopback::run_and_signal(&mut device, rdcoll_types::DEFAULT_BUFFER_LEN, &mut host);
    match status {
        CompletionStatus::Pass => println!("PASS: loopback"),
        CompletionStatus::Fail { code } => println!("FAIL: loopback (code={code})"),
    }
    println!("tohost={:#x}", status.tohost_value());
    exit_code(status)
}

const fn exit_code(status: CompletionStatus) -> i32 {
    if status.is_pass() { 0 } else { 1 }
}

fn print_help() {
    let text = "\
rd-verify: recursive-doubling collective verifier

USAGE:
    rd-verify [OPTIONS]

OPTIONS:
    --config PATH       TOML harness config (defaults: 4 levels x 256 elements, 8 sets)
    --seed N            Root seed, decimal or 0x-hex (default: wall clock)
    --test-sets N       Number of randomized test sets
    --levels N          Packets per test set (max_level + 1)
    --elements N        Payload width in 32-bit words
    --journal DIR       Write a reproduction bundle under DIR
    --json              Emit logs as JSON lines
    --dump-packets      Hex-dump every packet (needs RUST_LOG=debug)
    --loopback          Run the single-packet loopback check instead
    -h, --help          Show this help message

EXIT CODES:
    0 pass, 1 verification failure, 2 usage or config error
";
    print!("{text}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_parse_args_overrides() {
        let parsed = parse_args(&args(&[
            "--seed",
            "0x2a",
            "--levels",
            "3",
            "--elements",
            "16",
            "--dump-packets",
        ]))
        .unwrap();
        assert_eq!(parsed.seed, Some(42));
        let config = build_config(&parsed).unwrap();
        assert_eq!(config.max_level, 2);
        assert_eq!(config.num_elements, 16);
        assert!(config.debug_dump_packets);
    }

    #[test]
    fn test_parse_args_rejects_bad_input() {
        assert!(parse_args(&args(&["--seed"])).is_err());
        assert!(parse_args(&args(&["--seed", "abc"])).is_err());
        assert!(parse_args(&args(&["--frobnicate"])).is_err());
        let zero_levels = parse_args(&args(&["--levels", "0"])).unwrap();
        assert!(build_config(&zero_levels).is_err());
    }

    #[test]
    fn test_cli_exit_codes() {
        let cli = |list: &[&str]| {
            let mut all = vec![OsString::from("rd-verify")];
            all.extend(list.iter().map(OsString::from));
            run_cli(all)
        };
        assert_eq!(cli(&["--seed", "7", "--test-sets", "2", "--elements", "8"]), 0);
        assert_eq!(cli(&["--loopback"]), 0);
        assert_eq!(cli(&["--elements", "0"]), 2);
        assert_eq!(cli(&["--bogus"]), 2);
    }
}
