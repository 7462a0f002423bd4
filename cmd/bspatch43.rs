#![forbid(unsafe_code)]
use std::process;

use bspatch43::{patch_file, Options, Transport};
use clap::Parser;

#[derive(Parser, Debug)]
#[clap(
    name = "bspatch43",
    version,
    about = "bounds-checked ENDSLEY/BSDIFF43 patcher",
    long_about = None,
)]
struct BspatchArgs {
    /// old file
    #[clap(value_name = "OLD")]
    old_path: String,

    /// new file, overwritten if it exists
    #[clap(value_name = "NEW")]
    new_path: String,

    /// patch file
    #[clap(value_name = "PATCH")]
    patch_path: String,

    /// payload after the header is bzip2 compressed
    #[clap(long)]
    bzip2: bool,

    /// more logging, repeat for more
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// only log errors
    #[clap(short, long)]
    quiet: bool,
}

fn main() {
    let args = BspatchArgs::parse();

    let level = match (args.verbose, args.quiet) {
        (0, true) => "error",
        (0, false) => "warn",
        (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let transport = if args.bzip2 {
        Transport::Bzip2
    } else {
        Transport::Raw
    };
    let opts = Options::new().transport(transport);

    if let Err(e) = patch_file(&args.old_path, &args.new_path, &args.patch_path, &opts) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
