#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate slog;

use std::path;
use std::process;

use failure;
use slog::Drain;
use structopt::StructOpt;

mod clock;
mod config;
mod error;
mod hardware;
mod irrigation;
mod light;
mod orchestrator;
mod sensors;
#[cfg(test)]
mod testing;
mod ventilation;

/// Runs a single greenhouse control pass: grow light, irrigation, then window ventilation.
#[derive(Debug, StructOpt)]
#[structopt(name = "glasshouse")]
struct Options {
    /// TOML configuration file; the built-in table is used when omitted.
    #[structopt(short = "c", long = "config", parse(from_os_str))]
    config: Option<path::PathBuf>,
    /// Exit with a non-zero status when the pass fails instead of only logging it: 2 for a bad
    /// configuration, 3 for an unreadable sensor, 4 for an actuator fault, 1 otherwise.
    #[structopt(long = "strict")]
    strict: bool,
}

fn main() {
    let options = Options::from_args();

    let code = {
        let log = logger();
        let _scope_guard = slog_scope::set_global_logger(log.clone());
        if let Err(e) = slog_stdlog::init() {
            warn!(log, "could not route std log records"; "error" => %e);
        }

        match run(&log, &options) {
            Ok(()) => 0,
            Err(e) => {
                error!(log, "pass failed"; "error" => %e);
                if options.strict {
                    error::exit_code(&e)
                } else {
                    0
                }
            }
        }
    };

    process::exit(code);
}

fn run(log: &slog::Logger, options: &Options) -> Result<(), failure::Error> {
    let config = config::load(options.config.as_ref().map(|p| p.as_path()))?;
    debug!(log, "loaded configuration"; "config" => ?config);

    let hardware = orchestrator::Hardware {
        gpio: hardware::sysfs::SysfsGpio::new(log.new(o!("driver" => "gpio")), &config.gpio),
        adc: hardware::mcp3008::Mcp3008::new(&config.adc),
        climate: hardware::dht::IioDht::new(
            log.new(o!("driver" => "dht")),
            config.climate.device.clone(),
        ),
        rtc: hardware::ds1307::Ds1307::new(&config.rtc),
        delay: hardware::ThreadDelay,
    };

    let summary = orchestrator::run(log, &config, hardware)?;
    info!(log, "pass complete";
          "lighting" => ?summary.lighting,
          "watered" => summary.beds.iter().filter(|bed| bed.watering != irrigation::Watering::Skipped).count(),
          "window_open" => summary.ventilation.open);

    Ok(())
}

fn logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain).ignore_res();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}
