//
// main.rs
//
// fioricheck developer binary
//

use std::env;

use fioricheck::cli::analysis_stats;

fn print_usage() {
    println!("fioricheck {}, a static analyzer for UI5 applications.", env!("CARGO_PKG_VERSION"));
    print!(
        r#"
Usage: fioricheck [OPTIONS]
       fioricheck analysis-stats <path> [--csv] [--only <phase>]

Available options:

--version                    Print the version
--help                       Print this help message

Subcommands:

analysis-stats               Time the scan, parse, index and link phases on a directory

"#
    );
}

fn main() -> anyhow::Result<()> {
    let mut argv = env::args();
    argv.next(); // skip executable name

    let Some(first) = argv.next() else {
        print_usage();
        return Ok(());
    };

    match first.as_str() {
        "--version" => {
            println!("fioricheck {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "--help" => {
            print_usage();
            Ok(())
        }
        "analysis-stats" => {
            env_logger::init();
            let args = analysis_stats::parse_args(&mut argv).map_err(|e| anyhow::anyhow!(e))?;
            let results = analysis_stats::run_analysis_stats(&args)?;
            if args.csv {
                analysis_stats::print_results_csv(&results);
            } else {
                analysis_stats::print_results(&results);
            }
            Ok(())
        }
        other => Err(anyhow::anyhow!("Unknown argument: '{other}'")),
    }
}
