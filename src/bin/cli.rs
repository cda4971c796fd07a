//! tkload command line interface.

use std::process;

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_t, App, AppSettings::*, Arg,
    ErrorKind,
};
use console::style;
use log::{debug, trace, LevelFilter};
use simplelog::*;

use tkload::{self as tk, utils, ProgressObserver, Session};

fn main() {
    println!("[TK] tkload v{}", crate_version!());

    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(1);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let matches = cli()
        .get_matches_safe()
        .unwrap_or_else(|e| match e.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => e.exit(),
            _ => {
                eprintln!("{}", e.message);
                process::exit(2);
            }
        });

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'tkload -v -v -v' or 'tkload -vvv' vs 'tkload -v'
    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if let Err(e) = TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("{}: could not set up logging: {}", style("warning").yellow(), e);
    }

    trace!("{:#?}", matches);

    let baud_rate = value_t!(matches.value_of("BAUD_RATE"), u32).unwrap_or_else(|_| {
        println!(
            "{}: `{}` needs to be a numeric value",
            style("error").red(),
            style("speed").cyan()
        );
        process::exit(2);
    });

    let mut builder = tk::SettingsBuilder::new().baud_rate(baud_rate);
    if let Some(app_file) = matches.value_of("APP_FILE") {
        builder = builder.app_file(app_file);
    }
    match matches.value_of("DEVICE_TTY") {
        Some(path) => builder = builder.path(path),
        None => match utils::select_port() {
            Some(path) => builder = builder.path(path),
            None => {
                println!("{}", style("[TK] ❌ No serial port selected").red());
                process::exit(1);
            }
        },
    }
    let settings = builder.finalize();

    let exit_code = run(&settings, &matches);
    debug!("exit code: {}", exit_code);
    process::exit(exit_code);
}

/// The command line arguments of `tkload`.
fn cli() -> App<'static, 'static> {
    App::new(crate_name!())
        .version(concat!("v", crate_version!()))
        .author(crate_authors!())
        .about(crate_description!())
        .long_about(
            "\n\
            tkload talks to the firmware of the device over the serial port \
            to load and start an app:\n\
               \t* asks the firmware for its name and version \n\
               \t* sends the app size, 4 bytes, lowest order first \n\
               \t* sends the app in chunks of 127 bytes \n\
               \t* compares the BLAKE2s digest computed by the device with \
                   the one of the file \n\
               \t* starts the app if, and only if, both digests are the same \n\
            \n\
            The device must be in firmware mode, i.e. freshly plugged in with \
            no app running.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("DEVICE_TTY")
                .help("the serial port device to use")
                .long_help(
                    "the serial port device to use; when not set, `tkload` \
                     lists the available serial ports for selection.",
                )
                .short("p")
                .long("port")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("BAUD_RATE")
                .help("serial port speed in bits per second")
                .short("b")
                .long("speed")
                .takes_value(true)
                .default_value("62500"),
        )
        .arg(
            Arg::with_name("USS")
                .help("type a phrase for the user supplied secret")
                .long_help(
                    "type a phrase for the user supplied secret. The phrase is \
                     hashed with BLAKE2s and the digest is used by the \
                     firmware, together with other material, to derive the \
                     secrets of the app.",
                )
                .long("uss")
                .conflicts_with("USS_FILE"),
        )
        .arg(
            Arg::with_name("USS_FILE")
                .help("read the user supplied secret from a file, `-` for stdin")
                .long_help(
                    "read the user supplied secret from a file, `-` for \
                     stdin. The full content is hashed unmodified, e.g. \
                     newlines are not stripped.",
                )
                .long("uss-file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("APP_FILE")
                .help("path to the app binary to be loaded and started")
                .required(true)
                .index(1),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
}

/// One session with the device. The serial port is closed when this returns.
fn run(settings: &tk::Settings, matches: &clap::ArgMatches) -> i32 {
    let path = settings.path.as_deref().unwrap_or_default();
    println!("[TK] Connecting to device on serial port {} ...", style(path).cyan());

    let mut session = match Session::open(settings, Box::new(ProgressObserver::new())) {
        Ok(session) => session,
        Err(e) => {
            println!("{} {}", style("[TK] 💥 Could not open the port:").red(), e);
            return 1;
        }
    };

    match session.get_name_version() {
        Ok(name_version) => println!("[TK] Firmware has {}", name_version),
        Err(e) => {
            println!("{} {}", style("[TK] 💥 GetNameVersion failed:").red(), e);
            println!(
                "[TK] 🔌 If the serial port is correct, then the device might not be in firmware\n     \
                 mode, and have an app running already. Please unplug and plug it in again."
            );
            return 1;
        }
    }

    let secret = if matches.is_present("USS") {
        utils::input_secret().map(Some)
    } else if let Some(uss_file) = matches.value_of("USS_FILE") {
        utils::read_secret_file(uss_file).map(Some)
    } else {
        Ok(None)
    };
    let secret = match secret {
        Ok(secret) => secret,
        Err(e) => {
            println!("{} {}", style("[TK] 💥 Could not get the user supplied secret:").red(), e);
            return 1;
        }
    };

    let app_file = settings.app_file.as_deref().unwrap_or_default();
    println!("[TK] Loading app from {} onto device", style(app_file).cyan());
    match session.load_app_from_file(app_file, secret.as_deref()) {
        Ok(digest) => {
            println!("[TK] 👍 App verified and started, digest {}", digest);
            0
        }
        Err(e) => {
            println!("{} {}", style("[TK] 💥 Loading the app failed:").red(), e);
            1
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
