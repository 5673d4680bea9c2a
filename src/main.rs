use std::process;

use clap::Parser;

use imatch::cli::SubCommandExtend;
use imatch::config::{EXIT_EMPTY_CORPUS, EXIT_INVALID_INPUT, Opts, SubCommand};
use imatch::index::EmptyCorpus;

fn main() {
    env_logger::init();

    let opts = Opts::parse();
    let result = match &opts.subcmd {
        SubCommand::FdGenerate(config) => config.run(&opts),
        SubCommand::FdMatch(config) => config.run(&opts),
        SubCommand::BowGenerate(config) => config.run(&opts),
        SubCommand::BowMatch(config) => config.run(&opts),
    };

    if let Err(err) = result {
        eprintln!("{err:#}");
        if err.downcast_ref::<EmptyCorpus>().is_some() {
            process::exit(EXIT_EMPTY_CORPUS);
        }
        process::exit(EXIT_INVALID_INPUT);
    }
}
