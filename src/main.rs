#[macro_use]
extern crate clap;
extern crate bgp_membership_controller;

use std::process::exit;

use clap::App;
use clap::Arg;

use bgp_membership_controller::config::Config;
use bgp_membership_controller::format_fail;
use bgp_membership_controller::logging;
use bgp_membership_controller::logging::LogFormat;
use bgp_membership_controller::logging::LogLevel;

fn main() {
    let args = App::new("bgp-membership-controller")
        .version(crate_version!())
        .about("Per-host anycast health controller driving BGP announcements from zookeeper membership")
        .arg(
            Arg::with_name("config")
                .help("Path to the controller's YAML configuration file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("log-level")
                .long("log-level")
                .short("l")
                .help("Minimum log level to emit")
                .takes_value(true)
                .possible_values(LogLevel::variants())
                .default_value("Info"),
        )
        .arg(
            Arg::with_name("log-format")
                .long("log-format")
                .short("f")
                .help("Log output encoding")
                .takes_value(true)
                .possible_values(LogFormat::variants())
                .default_value("Term"),
        )
        .get_matches();

    let level = value_t!(args, "log-level", LogLevel).unwrap_or_else(|_| LogLevel::default());
    let format = value_t!(args, "log-format", LogFormat).unwrap_or_else(|_| LogFormat::default());
    let logger = logging::configure(level, format);

    let config_path = args.value_of("config").expect("config is a required argument");
    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{}", format_fail(&error));
            exit(1);
        }
    };

    if let Err(error) = bgp_membership_controller::run(config, logger) {
        eprintln!("{}", format_fail(&error));
        exit(1);
    }
}
