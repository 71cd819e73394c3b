use std::path::PathBuf;

use flamefeed::app::{self, RunOptions};

enum Action {
    Run(RunOptions),
    DumpSeed(RunOptions),
    Exit,
}

fn main() {
    let action = match parse_args(std::env::args().skip(1)) {
        Ok(action) => action,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let result = match action {
        Action::Exit => return,
        Action::Run(options) => flamefeed::run(options),
        Action::DumpSeed(options) => app::dump_seed(&options).map(|json| println!("{json}")),
    };

    if let Err(err) = result {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Action> {
    let mut options = RunOptions::default();
    let mut dump = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("flamefeed {}", flamefeed::VERSION);
                return Ok(Action::Exit);
            }
            "--help" | "-h" => {
                println!(
                    "flamefeed - a music artist feed in the terminal.\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n  --config PATH        Read configuration from PATH\n  --seed PATH          Start the feed from the posts in PATH\n  --dump-seed          Print the starting posts as JSON and exit"
                );
                return Ok(Action::Exit);
            }
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a path"))?;
                options.config_file = Some(PathBuf::from(path));
            }
            "--seed" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--seed needs a path"))?;
                options.seed_file = Some(PathBuf::from(path));
            }
            "--dump-seed" => dump = true,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(if dump {
        Action::DumpSeed(options)
    } else {
        Action::Run(options)
    })
}
