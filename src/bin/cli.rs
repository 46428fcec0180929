//! Mddump command line interface.

use std::{
    fs::{self, File},
    io::Write,
    process,
    time::Duration,
};

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_t, App, AppSettings::*, Arg,
    ArgMatches,
};
use console::style;
use log::{debug, trace, LevelFilter};
use simplelog::*;

use mddump::{self as md, DiscardPolicy, DumpSession, OutputMode, SerialLink};

fn main() {
    println!("[MD] mddump v{}", crate_version!());

    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C! Resume later with --previous-log <resume log>");
        process::exit(1);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about(crate_description!())
        .long_about(
            "\n\
            Mddump reads a memory region of a device sitting at its bootloader \
            prompt by sending `md` commands over the serial port and parsing \
            the printed lines back into bytes.\n\
            \n\
            Every line is checked before being accepted: \n\
               \t* its layout must match the `md` output exactly \n\
               \t* its hex data must match its ASCII text \n\
               \t* its address must follow the previous line \n\
            \n\
            Accepted lines are appended to a resume log. If the dump is \
            interrupted, run mddump again with `--previous-log` pointing at \
            that log to skip what was already read.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("START")
                .help("start address, decimal or hex with 0x, multiple of 16")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("END")
                .help("end address (inclusive), decimal or hex with 0x, multiple of 16")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::with_name("DEVICE_TTY")
                .help("the tty device connected to the bootloader")
                .long_help(
                    "the tty device connected to the bootloader; when not \
                     set, `mddump` lists the available ports for selection.",
                )
                .short("-t")
                .long("--tty")
                .takes_value(true)
                .require_equals(true),
        )
        .arg(
            Arg::with_name("BAUD_RATE")
                .help("serial port baud rate")
                .short("-b")
                .long("--baud-rate")
                .takes_value(true)
                .default_value("115200")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("STEP")
                .help("number of lines requested per `md` command")
                .long("--step")
                .takes_value(true)
                .default_value("64")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("SIZE")
                .help("length of each line, spaces and line terminator included")
                .long("--size")
                .takes_value(true)
                .default_value("67")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("TIMEOUT")
                .help("serial read timeout in seconds")
                .long("--timeout")
                .takes_value(true)
                .default_value("0.1")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("PREVIOUS_LOG")
                .help("resume log of an interrupted dump to replay first")
                .long("--previous-log")
                .takes_value(true)
                .require_equals(true),
        )
        .arg(
            Arg::with_name("LOG")
                .help("resume log to write accepted lines to")
                .long_help(
                    "resume log to write accepted lines to; defaults to the \
                     image name with a `.log` extension. When it is the \
                     previous log, new lines are appended to it.",
                )
                .long("--log")
                .takes_value(true)
                .require_equals(true),
        )
        .arg(
            Arg::with_name("NO_REPLAY_LOG")
                .help("do not copy replayed lines to the resume log")
                .long("--no-replay-log"),
        )
        .arg(
            Arg::with_name("RESET")
                .help("send `reset` to the device once after the first batch")
                .long("--reset"),
        )
        .arg(
            Arg::with_name("INCREMENTAL")
                .help("write the image file line by line instead of at the end")
                .long("--incremental"),
        )
        .arg(
            Arg::with_name("HOLD_ON_DISCARD")
                .help("lines below the start address do not count for continuity")
                .long("--hold-on-discard"),
        )
        .arg(
            Arg::with_name("NO_PROGRESS")
                .help("do not show a progress bar")
                .long("--no-progress"),
        )
        .arg(
            Arg::with_name("DEBUG")
                .help("trace the serial traffic and dump received batches")
                .long("--debug"),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .get_matches();

    let debug_mode = matches.is_present("DEBUG");

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'mddump -v -v -v' or 'mddump -vvv' vs 'mddump -v'
    let log_level = match (matches.occurrences_of("v"), debug_mode) {
        (0, false) => LevelFilter::Warn,
        (0, true) | (1, false) => LevelFilter::Info,
        (1, true) | (2, _) => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    TermLogger::init(log_level, Config::default(), TerminalMode::Mixed).unwrap();

    trace!("{:#?}", matches);

    // Arguments ===============================================================

    let start = address_arg(&matches, "START");
    let end = address_arg(&matches, "END");
    let baud_rate = numeric_arg::<u32>(&matches, "BAUD_RATE", "baud-rate");
    let step = numeric_arg::<u32>(&matches, "STEP", "step");
    let size = numeric_arg::<usize>(&matches, "SIZE", "size");
    let timeout = numeric_arg::<f64>(&matches, "TIMEOUT", "timeout");
    if !(timeout.is_finite() && timeout > 0.0) {
        usage_error("timeout", matches.value_of("TIMEOUT").unwrap_or_default());
    }

    let mut builder = md::SettingsBuilder::new()
        .baud_rate(baud_rate)
        .timeout(Duration::from_secs_f64(timeout))
        .range(start, end)
        .step(step)
        .line_size(size)
        .suppress_log(matches.is_present("NO_REPLAY_LOG"))
        .send_reset(matches.is_present("RESET"))
        .debug(debug_mode)
        .progress(!matches.is_present("NO_PROGRESS"));
    if let Some(path) = matches.value_of("DEVICE_TTY") {
        builder = builder.path(path);
    }
    if let Some(path) = matches.value_of("PREVIOUS_LOG") {
        builder = builder.previous_log(path);
    }
    if let Some(path) = matches.value_of("LOG") {
        builder = builder.resume_log(path);
    }
    if matches.is_present("INCREMENTAL") {
        builder = builder.output_mode(OutputMode::Incremental);
    }
    if matches.is_present("HOLD_ON_DISCARD") {
        builder = builder.discard_policy(DiscardPolicy::AdvanceOnAccept);
    }
    let mut settings = builder.finalize();

    if let Err(e) = settings.validate() {
        fail(&e.to_string());
    }

    // END - Arguments =========================================================

    // Output files ============================================================

    let now = chrono::Local::now();
    let image_name = md::dump_file_name(start, end, &now);
    let log_name = settings
        .resume_log
        .get_or_insert_with(|| md::log_file_name(start, end, &now))
        .clone();

    // Serial port =============================================================

    if settings.path.is_none() {
        settings.path = loop {
            if let Some(path) = md::select_port() {
                break Some(path);
            }
        };
    }
    let port = md::open_and_setup_port(&settings).unwrap_or_else(|e| fail(&e.to_string()));

    // Run the dump session ====================================================

    let output_mode = settings.output_mode;
    let mut session = DumpSession::new(settings, Box::new(SerialLink::new(port)));
    if output_mode == OutputMode::Incremental {
        let image = File::create(&image_name)
            .unwrap_or_else(|e| fail(&format!("cannot create `{}`: {}", image_name, e)));
        session = session.output_sink(Box::new(image));
    }

    match session.run() {
        Ok(data) => {
            if output_mode == OutputMode::AtCompletion {
                if let Err(e) = fs::write(&image_name, &data) {
                    fail(&format!("cannot write `{}`: {}", image_name, e));
                }
            }
            println!(
                "[MD] ✔️ {} bytes written to {}",
                data.len(),
                style(&image_name).green()
            );
            let _ = std::io::stdout().flush();
            debug!("exit code: 0");
            process::exit(0);
        }
        Err(e) => {
            println!("{}", style(format!("[MD] 💥 {}", e)).red());
            println!(
                "[MD] 🔁 resume with --previous-log=\"{}\"",
                style(&log_name).cyan()
            );
            debug!("exit code: 1");
            process::exit(1);
        }
    }
}

fn fail(message: &str) -> ! {
    println!("{}: {}", style("error").red(), message);
    process::exit(-1);
}

fn usage_error(name: &str, value: &str) -> ! {
    println!(
        "{}: `{}` needs a valid value",
        style("error").red(),
        style(name).cyan()
    );
    println!(
        "   {} `{}` is not a valid value",
        style("-->").cyan(),
        style(value).on_red()
    );
    process::exit(-1);
}

fn numeric_arg<T: std::str::FromStr>(matches: &ArgMatches, arg: &str, name: &str) -> T {
    // It's safe to call unwrap on command line arguments with default values,
    // because the value with either be what the user input at runtime or the
    // default value
    value_t!(matches.value_of(arg), T)
        .unwrap_or_else(|_| usage_error(name, matches.value_of(arg).unwrap_or_default()))
}

/// Addresses are decimal, or hex when prefixed with `0x`.
fn address_arg(matches: &ArgMatches, arg: &str) -> u64 {
    let value = matches.value_of(arg).unwrap_or_default();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed.unwrap_or_else(|_| usage_error(&arg.to_lowercase(), value))
}
