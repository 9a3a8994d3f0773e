use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::info;
use std::time::Duration;

use crate::config::Config;
use crate::devices::{DemoTiming, Smi2Display};
use crate::modbus::crc::crc16_modbus;
use crate::modbus::transport::available_ports;
use crate::modbus::{ModbusClient, ModbusClientTrait};
use crate::output::{format_frame_dump, formatter_for, RegisterReading};

pub fn build_cli() -> Command {
    Command::new("modbus-rtu")
        .version(crate::VERSION)
        .about("Modbus RTU master for half-duplex serial buses")
        .arg(Arg::new("config").short('c').long("config").help("TOML configuration file"))
        .arg(Arg::new("port").short('p').long("port").help("Serial port, e.g. /dev/ttyUSB0"))
        .arg(
            Arg::new("baud")
                .short('b')
                .long("baud")
                .value_parser(value_parser!(u32))
                .help("Baud rate"),
        )
        .arg(
            Arg::new("stop-bits")
                .long("stop-bits")
                .value_parser(value_parser!(u8))
                .help("Stop bits (1 or 2)"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_parser(value_parser!(u64))
                .help("Response timeout in milliseconds"),
        )
        .arg(
            Arg::new("timeout-policy")
                .long("timeout-policy")
                .value_parser(["per-byte", "transaction"])
                .help("Apply the timeout to every byte or to the whole response"),
        )
        .arg(
            Arg::new("no-address-check")
                .long("no-address-check")
                .action(ArgAction::SetTrue)
                .help("Accept responses whose slave address differs from the request"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_parser(["console", "json", "hex"])
                .default_value("console")
                .help("Output format"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("More log output (-v debug, -vv trace)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("read")
                .about("Read holding (0x03) or input (0x04) registers")
                .arg(slave_arg())
                .arg(
                    Arg::new("start")
                        .short('r')
                        .long("start")
                        .required(true)
                        .value_parser(parse_register_value),
                )
                .arg(
                    Arg::new("count")
                        .short('n')
                        .long("count")
                        .default_value("1")
                        .value_parser(value_parser!(u16).range(1..=125)),
                )
                .arg(
                    Arg::new("input")
                        .long("input")
                        .action(ArgAction::SetTrue)
                        .help("Read input registers instead of holding registers"),
                )
                .arg(
                    Arg::new("u32")
                        .long("u32")
                        .action(ArgAction::SetTrue)
                        .help("Also print register pairs as 32-bit values"),
                ),
        )
        .subcommand(
            Command::new("write")
                .about("Write multiple registers (0x10)")
                .arg(slave_arg())
                .arg(
                    Arg::new("start")
                        .short('r')
                        .long("start")
                        .required(true)
                        .value_parser(parse_register_value),
                )
                .arg(
                    Arg::new("values")
                        .required(true)
                        .num_args(1..=123)
                        .value_parser(parse_register_value)
                        .help("Register values, decimal or 0x-prefixed hex"),
                ),
        )
        .subcommand(
            Command::new("crc")
                .about("Compute the Modbus CRC16 of a hex byte string")
                .arg(Arg::new("bytes").required(true).help("e.g. 010300000001")),
        )
        .subcommand(Command::new("ports").about("List available serial ports"))
        .subcommand(
            Command::new("demo")
                .about("Run the SMI2 segment blinking demo")
                .arg(slave_arg())
                .arg(
                    Arg::new("hold-ms")
                        .long("hold-ms")
                        .default_value("10000")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    Arg::new("step-ms")
                        .long("step-ms")
                        .default_value("200")
                        .value_parser(value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("init-config")
                .about("Write a configuration file with default settings")
                .arg(Arg::new("path").required(true)),
        )
}

fn slave_arg() -> Arg {
    Arg::new("slave")
        .short('s')
        .long("slave")
        .value_parser(value_parser!(u8).range(1..=247))
        .help("Slave address (defaults to the configured one)")
}

/// Accepts decimal or `0x`-prefixed hexadecimal register values.
pub fn parse_register_value(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid register value '{}': {}", s, e))
}

fn slave_or_default(matches: &ArgMatches, config: &Config) -> u8 {
    matches
        .get_one::<u8>("slave")
        .copied()
        .unwrap_or(config.slave_address)
}

pub fn handle_subcommands(matches: &ArgMatches, config: &Config) -> Result<()> {
    let format = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("console");
    let formatter = formatter_for(format).ok_or_else(|| anyhow!("Unknown output format: {}", format))?;

    match matches.subcommand() {
        Some(("read", sub)) => {
            let slave = slave_or_default(sub, config);
            let start = *sub.get_one::<u16>("start").context("missing start register")?;
            let count = *sub.get_one::<u16>("count").context("missing register count")?;
            let input = sub.get_flag("input");

            let mut client = ModbusClient::open(config)?;
            let values = if input {
                client.read_input_registers(slave, start, count)?
            } else {
                client.read_holding_registers(slave, start, count)?
            };

            let reading = RegisterReading {
                slave_address: slave,
                function_code: if input { 0x04 } else { 0x03 },
                start_register: start,
                values,
            };
            println!("{}", formatter.format_reading(&reading));
            if sub.get_flag("u32") {
                for (pair, value) in reading.values32().iter().enumerate() {
                    println!(
                        "  Registers {}-{}: {} (0x{:08X})",
                        start as usize + pair * 2,
                        start as usize + pair * 2 + 1,
                        value,
                        value
                    );
                }
            }
        }
        Some(("write", sub)) => {
            let slave = slave_or_default(sub, config);
            let start = *sub.get_one::<u16>("start").context("missing start register")?;
            let values: Vec<u16> = sub
                .get_many::<u16>("values")
                .context("missing register values")?
                .copied()
                .collect();

            let mut client = ModbusClient::open(config)?;
            client.write_multiple_registers(slave, start, &values)?;
            println!("{}", formatter.format_write(slave, start, values.len()));
        }
        Some(("crc", sub)) => {
            let text = sub.get_one::<String>("bytes").context("missing bytes")?;
            let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = hex::decode(&cleaned).with_context(|| format!("'{}' is not a hex byte string", text))?;

            let crc = crc16_modbus(&bytes);
            let mut frame = bytes.clone();
            frame.extend_from_slice(&crc.to_le_bytes());

            println!("🔢 CRC16: 0x{:04X} (low 0x{:02X}, high 0x{:02X})", crc, crc & 0xFF, crc >> 8);
            println!("📋 Frame: {}", hex::encode_upper(&frame));
            println!("{}", format_frame_dump(&frame));
        }
        Some(("ports", _)) => {
            let ports = available_ports()?;
            if ports.is_empty() {
                println!("⚠️  No serial ports found");
            }
            for (index, (name, description)) in ports.iter().enumerate() {
                println!("   {}. {} ({})", index + 1, name, description);
            }
        }
        Some(("demo", sub)) => {
            let slave = slave_or_default(sub, config);
            let timing = DemoTiming {
                hold: Duration::from_millis(*sub.get_one::<u64>("hold-ms").context("missing hold-ms")?),
                step: Duration::from_millis(*sub.get_one::<u64>("step-ms").context("missing step-ms")?),
            };
            let name = config
                .get_device_by_address(slave)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| format!("SMI2 {}", slave));

            let mut client = ModbusClient::open(config)?;
            Smi2Display::new(slave, name).run_demo(&mut client, timing)?;
        }
        Some(("init-config", sub)) => {
            let path = sub.get_one::<String>("path").context("missing path")?;
            config.save_to_file(path)?;
            info!("📝 Configuration written to {}", path);
            println!("✅ Configuration written to {}", path);
        }
        Some((other, _)) => return Err(anyhow!("Unknown command: {}", other)),
        None => return Err(anyhow!("No command given")),
    }

    Ok(())
}
