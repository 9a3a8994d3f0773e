use anyhow::Result;
use log::{debug, error, LevelFilter};

use modbus_rtu_master::cli::{build_cli, handle_subcommands};
use modbus_rtu_master::{Config, ModbusError};

fn init_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match verbosity {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.format_target(false).init();
}

fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    init_logging(matches.get_count("verbose"));

    let config = Config::from_matches(&matches)?;
    debug!(
        "🖥️  modbus-rtu {} on {} @ {} baud",
        modbus_rtu_master::VERSION,
        config.serial_port,
        config.baud_rate
    );

    if let Err(e) = handle_subcommands(&matches, &config) {
        if let Some(modbus_error) = e.downcast_ref::<ModbusError>() {
            error!("❌ Modbus error (code {}): {}", modbus_error.code(), modbus_error);
        }
        return Err(e);
    }

    Ok(())
}
