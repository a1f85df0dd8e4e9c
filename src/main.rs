use anyhow::Result;
use std::env;

use ofxdb::cfg::Config;
use ofxdb::{extract, risk};

fn main() -> Result<()> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    let cfg = Config::from_env();

    match args.get(1).map(|s| s.as_str()) {
        Some("extract") => {
            println!("Fetching statements for all configured servers...");
            extract::extract(&cfg)?;
            println!("Done. Run `ofxdb risk` to view the portfolio summary.");
        }
        Some("risk") | None => {
            let rest: &[String] = if args.len() > 2 { &args[2..] } else { &[] };
            let acctids = parse_acctids(rest);
            let summary = risk::risk(&cfg, acctids.as_deref())?;
            print!("{}", summary.render());
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            eprintln!("Usage:");
            eprintln!("  ofxdb risk [-acctid ID ...]   Show aggregate portfolio risk");
            eprintln!("  ofxdb extract                 Fetch statements via ofxget");
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Collect the values following a `-acctid` flag; `None` means no filter.
fn parse_acctids(args: &[String]) -> Option<Vec<String>> {
    let mut ids = Vec::new();
    let mut collecting = false;
    for arg in args {
        if arg == "-acctid" {
            collecting = true;
        } else if arg.starts_with('-') {
            collecting = false;
        } else if collecting {
            ids.push(arg.clone());
        }
    }
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}
