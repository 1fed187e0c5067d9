use std::ffi::{CStr, OsString};
use std::io::{self, Write};

use cdefer::ffi::cdefer_free_memory;
use cdefer::{Block, Defer};
use clap::{arg, Arg, ArgAction, ArgMatches, Command};
use log::*;
use utils::str::osstr_to_c_text;

include!(concat!(env!("OUT_DIR"), "/version_const_gen.rs"));

const DEFAULT_GREETING: &str = "Hello world from the C heap!!!\n";

struct MainError {
    inner: Box<dyn std::error::Error + 'static>
}

impl<E: std::error::Error + 'static> From<E> for MainError {
    fn from(value: E) -> Self {
        Self { inner: Box::new(value) }
    }
}

impl std::fmt::Debug for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&console::style(format!("{}", self.inner.as_ref())).red().to_string())
    }
}

fn main() -> Result<(), MainError> {
    let matches = Command::new("cdefer")
        .author("Jonas Everaert")
        .version(VERSION)
        .long_version(LONG_VERSION)
        .about("Allocate C strings and watch deferred calls release them")

        .arg(arg!(-g --greeting <TEXT> "The first text to allocate and print [default: a hello world line]")
            .default_value(DEFAULT_GREETING)
            .hide_default_value(true))
        .arg(arg!(-q --quiet "Only print the release diagnostics"))
        .arg(arg!(--color "Enable color output (default: automatic)"))
        .arg(Arg::new("no-color")
            .long("no-color")
            .action(ArgAction::SetTrue)
            .conflicts_with("color")
            .hide(true))
        .arg(arg!(--debug "Print debug information")
            .hide_short_help(true))
        .arg(Arg::new("verbosity")
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .help("Sets the level of verbosity"))
        .arg(arg!([args]... "Arguments to allocate and echo back"))

        .get_matches();

    run_cli(&matches)
}

fn init_log(matches: &ArgMatches) {
    let debug = matches.get_flag("debug");

    let mut clog = colog::default_builder();
    #[cfg(debug_assertions)] { clog.filter(None, log::LevelFilter::Trace); }
    #[cfg(not(debug_assertions))] { clog.filter(None, log::LevelFilter::Warn); }

    let verbosity = if debug { 3 } else { matches.get_count("verbosity") };
    #[cfg(not(debug_assertions))] {
        match verbosity {
            0 => {},
            1 => { clog.filter(None, log::LevelFilter::Info); },
            2 => { clog.filter(None, log::LevelFilter::Debug); },
            3.. => { clog.filter(None, log::LevelFilter::Trace); },
        }
    }

    // CDEFER_LOG overrides everything above
    clog.parse_env(env_logger::Env::new().filter("CDEFER_LOG"));
    clog.init();
    debug!("Verbosity level {}", verbosity);
}

fn run_cli(matches: &ArgMatches) -> Result<(), MainError> {
    init_log(matches);

    let flag_color = matches.get_flag("color");
    let flag_no_color = matches.get_flag("no-color");
    if flag_color && flag_no_color { warn!("Both --color and --no-color are specified. --color will get priority") };
    if flag_color || flag_no_color {
        let color = flag_color || !flag_no_color;
        console::set_colors_enabled(color);
        console::set_colors_enabled_stderr(color);
    }

    let greeting = matches.get_one::<String>("greeting").map(String::as_str).unwrap_or(DEFAULT_GREETING);
    let quiet = matches.get_flag("quiet");

    // Echo the raw process arguments, program path included
    let args: Vec<OsString> = std::env::args_os().collect();
    debug!("Echoing {} argument(s)", args.len());

    play(greeting, &args, quiet)?;
    Ok(())
}

/// Allocate every text on the C heap and print it. All blocks stay alive until this function returns,
/// then they are released newest first.
fn play(greeting: &str, args: &[OsString], quiet: bool) -> cdefer::Result<()> {
    let stdout = io::stdout();
    let mut defers = Defer::new();

    if !quiet {
        let mut out = stdout.lock();
        writeln!(out, "Look at me, I'm printing text from a Rust function,")?;
        writeln!(out, "but not for long! ;)")?;
        writeln!(out)?;
    }

    // Owned block, released when the defer list drops it
    let block = Block::new(greeting)?;
    if !quiet { block.write_line(&mut stdout.lock())?; }
    defers.defer_drop(block);

    // Raw pointer, released by deferring the exported C function itself
    let (header, _) = Block::new("Here are the command line arguments:")?.into_raw();
    defers.defer(move || unsafe { cdefer_free_memory(header) });
    if !quiet {
        // SAFETY: `header` holds terminated text and is only freed when `defers` runs
        let text = unsafe { CStr::from_ptr(header.cast()) };
        let mut out = stdout.lock();
        out.write_all(text.to_bytes())?;
        out.write_all(b"\n")?;
    }

    for (index, value) in args.iter().enumerate() {
        let mut text = format!("args[{}] = ", index).into_bytes();
        text.extend_from_slice(&osstr_to_c_text(value)?);
        let block = Block::new(text)?;
        if !quiet { block.write_line(&mut stdout.lock())?; }
        defers.defer_drop(block);
    }

    if !quiet {
        let mut out = stdout.lock();
        writeln!(out)?;
        writeln!(out, "Okay, I'm done playing with C memory.")?;
        writeln!(out, "You can leave, but before you go, watch")?;
        writeln!(out, "the magic of defer call the functions written")?;
        writeln!(out, "to free the memory for the strings!")?;
        writeln!(out)?;
    }

    trace!("{:?}", defers);
    Ok(())
}
