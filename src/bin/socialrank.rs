use std::process;

use getopts::Options;
use log::{Level, LevelFilter, Metadata, Record};
use time::OffsetDateTime;

use socialrank::{compare, Config, Ranking, Source};

/// Prints records to stderr behind a wall-clock stamp, keeping stdout for
/// results and rank listings.
struct StampedLogger;

impl log::Log for StampedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = OffsetDateTime::now_utc();
            eprintln!(
                "{}:{}:{}.{} {}",
                now.hour(),
                now.minute(),
                now.second(),
                now.nanosecond(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: StampedLogger = StampedLogger;

fn usage(opts: &Options) -> String {
    opts.usage("usage:\tsocialrank [options] <source> [dmax] [imax] [debug]")
}

fn main() {

    let args: Vec<String> = std::env::args().collect();

    let mut opts = Options::new();
    opts.optopt("w", "workers", "number of worker threads (default 1)", "NUM");
    opts.optopt("p", "partitions", "number of data partitions (default: workers)", "NUM");
    opts.optflag("d", "debug", "print every rank after each iteration");
    opts.optflag("", "no-backlinks", "do not add back-edges to sink nodes");
    opts.optflag("", "binary", "read <source>.offsets and <source>.targets");
    opts.optflag("", "compare", "rank with and without backlinks and compare the results");
    opts.optflag("h", "help", "print this message");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(e) => {
            eprintln!("error parsing arguments: {}", e);
            eprintln!("{}", usage(&opts));
            process::exit(2);
        }
    };
    if matches.opt_present("h") || matches.free.is_empty() {
        println!("{}", usage(&opts));
        return;
    }

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }

    let config = match build_config(&matches) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error parsing arguments: {}", message);
            eprintln!("{}", usage(&opts));
            process::exit(2);
        }
    };

    let result = if matches.opt_present("compare") {
        run_compare(config)
    } else {
        run_once(config).map(|_| ())
    };
    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn build_config(matches: &getopts::Matches) -> Result<Config, String> {
    let source = &matches.free[0];
    let source = if matches.opt_present("binary") {
        Source::Binary(source.clone())
    } else {
        Source::Text(source.into())
    };

    let mut config = Config::new(source);
    if let Some(dmax) = matches.free.get(1) {
        config.params.dmax = dmax.parse().map_err(|_| format!("malformed dmax: {}", dmax))?;
    }
    if let Some(imax) = matches.free.get(2) {
        config.params.imax = imax.parse().map_err(|_| format!("malformed imax: {}", imax))?;
    }
    // any further argument turns on debug output
    config.debug = matches.opt_present("d") || matches.free.len() > 3;
    config.use_backlinks = !matches.opt_present("no-backlinks");

    config.workers = match matches.opt_str("w") {
        Some(w) => w.parse().map_err(|_| format!("malformed worker count: {}", w))?,
        None => 1,
    };
    config.partitions = match matches.opt_str("p") {
        Some(p) => p.parse().map_err(|_| format!("malformed partition count: {}", p))?,
        None => config.workers,
    };
    Ok(config)
}

fn run_once(config: Config) -> socialrank::Result<Ranking> {
    let label = if config.use_backlinks { "With backlinks" } else { "Without backlinks" };
    let ranking = socialrank::run(config)?;
    log::info!("{} iteration(s), converged: {}", ranking.iterations, ranking.converged);
    println!("{}: {}", label, format_top(&ranking));
    Ok(ranking)
}

fn run_compare(config: Config) -> socialrank::Result<()> {
    let mut with = config.clone();
    with.use_backlinks = true;
    let mut without = config;
    without.use_backlinks = false;

    let with = run_once(with)?;
    let without = run_once(without)?;

    let comparison = compare(&with.top, &without.top);
    println!("Common nodes: {}", join(&comparison.common));
    println!("Only with backlinks: {}", join(&comparison.only_first));
    println!("Only without backlinks: {}", join(&comparison.only_second));
    Ok(())
}

fn format_top(ranking: &Ranking) -> String {
    let pairs: Vec<String> = ranking
        .top
        .iter()
        .map(|(node, rank)| format!("({}, {})", node, rank))
        .collect();
    format!("[{}]", pairs.join(", "))
}

fn join(nodes: &[socialrank::Node]) -> String {
    nodes.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(",")
}
