//! Command-line interface for minectl.
//!
//! Loads the miner list from the configuration file, connects to the
//! selected miners, and runs one command against them.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand};

use minectl::config::{CONFIG_ENV, Config, DEFAULT_CONFIG_PATH, EXAMPLE_CONFIG};
use minectl::display;
use minectl::miner::MinerControl;
use minectl::session::{ALL, Selection, Session};
use minectl::tracing::{self, prelude::*};
use minectl::types::DeviceSelection;

/// Query and control mining processes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, env = CONFIG_ENV, default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print an example configuration
    Confighelp,

    /// Print miner status
    #[command(visible_aliases = ["statistics", "stats"])]
    Status(MinerArg),

    /// Pause mining on a GPU
    Pause(GpuArgs),

    /// Resume mining on a GPU
    Resume(GpuArgs),

    /// List pools
    Pools(MinerArg),

    /// Set the active pool: [MINER] INDEX
    Pool {
        #[arg(required = true, num_args = 1..=2, value_name = "ARGS")]
        args: Vec<String>,
    },

    /// Set the LHR tune value: [MINER] [GPU] TUNE
    Lhr {
        #[arg(required = true, num_args = 1..=3, value_name = "ARGS", allow_negative_numbers = true)]
        args: Vec<String>,
    },

    /// Check that miners answer
    Ping(MinerArg),

    /// Restart mining
    Restart(MinerArg),

    /// Pick a new random scramble nonce
    Shuffle(MinerArg),

    /// Show or set the nonce scrambler: [MINER] [NONCE SEGMENT_WIDTH]
    Scrambler {
        #[arg(num_args = 0..=3, value_name = "ARGS")]
        args: Vec<String>,
    },

    /// Set miner log verbosity: [MINER] LEVEL
    Verbosity {
        #[arg(required = true, num_args = 1..=2, value_name = "ARGS")]
        args: Vec<String>,
    },

    /// Print detailed statistics
    Detail(MinerArg),
}

#[derive(Args, Debug)]
struct MinerArg {
    /// Miner name
    #[arg(default_value = ALL)]
    miner: String,
}

#[derive(Args, Debug)]
struct GpuArgs {
    /// Miner name
    #[arg(default_value = ALL)]
    miner: String,

    /// GPU index, or `all` / -1
    #[arg(default_value = "all", allow_negative_numbers = true)]
    gpu: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    tracing::init_stderr(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    if !run(cli).await? {
        std::process::exit(1);
    }
    Ok(())
}

/// Run one command. Returns false if any miner failed.
async fn run(cli: Cli) -> Result<bool> {
    let Some((miner, job)) = Job::from_command(cli.command)? else {
        println!("Example config ({})", cli.config.display());
        println!("--------------");
        print!("{}", EXAMPLE_CONFIG);
        return Ok(true);
    };

    let config = Config::load(&cli.config).context("Failed to load configuration")?;
    debug!(path = %cli.config.display(), miners = config.miners.len(), "Loaded configuration");
    let mut session = Session::from_config(&config);

    let selection = session.select(&miner)?;
    let failed = session.connect(&selection).await;

    let ok = match job {
        Job::Status => cmd_status(&mut session, &selection).await,
        Job::Control(action) => {
            report_connect_errors(&session);
            action.run(&mut session, &selection).await && failed == 0
        }
    };

    session.disconnect_all();
    Ok(ok)
}

/// What to do with the selected miners.
#[derive(Debug, PartialEq)]
enum Job {
    Status,
    Control(Action),
}

impl Job {
    /// Parse arguments and split off the miner name. `None` for commands
    /// that need no miners.
    fn from_command(command: Command) -> Result<Option<(String, Job)>> {
        let control = |miner: String, action: Action| -> Result<Option<(String, Job)>> {
            Ok(Some((miner, Job::Control(action))))
        };

        match command {
            Command::Confighelp => Ok(None),
            Command::Status(arg) => Ok(Some((arg.miner, Job::Status))),
            Command::Pause(args) => control(args.miner, Action::Pause(parse_gpu(&args.gpu)?, true)),
            Command::Resume(args) => {
                control(args.miner, Action::Pause(parse_gpu(&args.gpu)?, false))
            }
            Command::Pools(arg) => control(arg.miner, Action::Pools),
            Command::Pool { args } => {
                let (miner, rest) = split_miner(&args, 1);
                control(miner, Action::Pool(parse_arg(&rest[0], "pool index")?))
            }
            Command::Lhr { args } => {
                let (miner, rest) = split_miner(&args, 1);
                let (gpu, tune) = match rest {
                    [gpu, tune] => (parse_gpu(gpu)?, tune),
                    [tune] => (DeviceSelection::All, tune),
                    _ => bail!("Usage: lhr [MINER] [GPU] TUNE"),
                };
                control(miner, Action::Lhr(gpu, parse_arg(tune, "LHR tune")?))
            }
            Command::Ping(arg) => control(arg.miner, Action::Ping),
            Command::Restart(arg) => control(arg.miner, Action::Restart),
            Command::Shuffle(arg) => control(arg.miner, Action::Shuffle),
            Command::Scrambler { args } => {
                let (miner, rest) = split_miner(&args, args.len() / 2 * 2);
                let action = match rest {
                    [] => Action::GetScrambler,
                    [nonce, width] => Action::SetScrambler(
                        parse_arg(nonce, "scramble nonce")?,
                        parse_arg(width, "segment width")?,
                    ),
                    _ => bail!("Usage: scrambler [MINER] [NONCE SEGMENT_WIDTH]"),
                };
                control(miner, action)
            }
            Command::Verbosity { args } => {
                let (miner, rest) = split_miner(&args, 1);
                control(miner, Action::Verbosity(parse_arg(&rest[0], "verbosity")?))
            }
            Command::Detail(arg) => control(arg.miner, Action::Detail),
        }
    }
}

/// A control command with its arguments parsed.
#[derive(Debug, PartialEq)]
enum Action {
    Pause(DeviceSelection, bool),
    Pools,
    Pool(u32),
    Lhr(DeviceSelection, i64),
    Ping,
    Restart,
    Shuffle,
    GetScrambler,
    SetScrambler(u64, u32),
    Verbosity(u32),
    Detail,
}

impl Action {
    /// Run a control command on every selected miner that supports it.
    /// Miners are handled one at a time, in configuration order.
    async fn run(self, session: &mut Session, selection: &Selection) -> bool {
        let mut ok = true;
        for (name, control) in session.controls(selection) {
            if let Err(e) = self.run_one(name, control).await {
                eprintln!("Miner {}: {:#}", name, e);
                ok = false;
            }
        }
        ok
    }

    async fn run_one(&self, name: &str, control: &mut dyn MinerControl) -> Result<()> {
        match *self {
            Action::Pause(devices, pause) => {
                control.pause_gpu(devices, pause).await?;
                let verb = if pause { "Paused" } else { "Resumed" };
                println!("{} {} on miner {}", verb, devices, name);
            }
            Action::Pools => {
                let pools = control.get_pools().await?;
                println!("{}", display::pool_list(name, &pools));
            }
            Action::Pool(index) => {
                let pools = control.get_pools().await?;
                let Some(pool) = pools.get(index as usize) else {
                    if pools.is_empty() {
                        println!("Miner {} has no pools, skipping", name);
                    } else {
                        println!(
                            "Pool index {} out of range 0-{} for miner {}, skipping",
                            index,
                            pools.len() - 1,
                            name
                        );
                    }
                    return Ok(());
                };
                control.set_active_pool(index).await?;
                println!("Selected pool {} on miner {}", pool.uri(), name);
            }
            Action::Lhr(devices, tune) => {
                control.set_lhr_tune(devices, tune).await?;
                println!("LHR tune set to {} for {} on miner {}", tune, devices, name);
            }
            Action::Ping => {
                control.ping().await?;
                println!("Miner {}: pong", name);
            }
            Action::Restart => {
                control.restart().await?;
                println!("Restarted miner {}", name);
            }
            Action::Shuffle => {
                control.shuffle_scrambler().await?;
                println!("Shuffled scramble nonce on miner {}", name);
            }
            Action::GetScrambler => {
                let info = control.get_scrambler_info().await?;
                print_json(name, &info)?;
            }
            Action::SetScrambler(nonce, width) => {
                let info = control.set_scrambler_info(nonce, width).await?;
                print_json(name, &info)?;
            }
            Action::Verbosity(level) => {
                control.set_verbosity(level).await?;
                println!("Verbosity set to {} on miner {}", level, name);
            }
            Action::Detail => {
                let detail = control.get_detailed_stats().await?;
                print_json(name, &detail)?;
            }
        }
        Ok(())
    }
}

async fn cmd_status(session: &mut Session, selection: &Selection) -> bool {
    let stats = session.stats(selection).await;
    println!("{}", display::status_report(&stats));
    stats.iter().all(|miner| miner.stats.is_some())
}

fn report_connect_errors(session: &Session) {
    for name in session.names() {
        if let Some(e) = session.connect_error(name) {
            eprintln!("Miner {}: {}", name, e);
        }
    }
}

fn print_json(name: &str, value: &serde_json::Value) -> Result<()> {
    println!("-- Miner {} --", name);
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Split a leading miner name off `args` when more than `required`
/// arguments were given.
fn split_miner(args: &[String], required: usize) -> (String, &[String]) {
    if args.len() > required {
        (args[0].clone(), &args[1..])
    } else {
        (ALL.to_string(), args)
    }
}

fn parse_gpu(value: &str) -> Result<DeviceSelection> {
    DeviceSelection::parse(value).with_context(|| format!("Invalid GPU index: {}", value))
}

fn parse_arg<T>(value: &str, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid {}: {}", what, value))
}
