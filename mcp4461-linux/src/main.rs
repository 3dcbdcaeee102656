use clap::{Parser, Subcommand, ValueEnum};
use embedded_hal::{delay::DelayNs, i2c::I2c};
use mcp4461::{EepromLocation, Mcp4461, Mcp4461Builder, Mcp4461Result, Wiper};

/// Inspect and drive a MCP4461 digital potentiometer
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to I2C bus (e.g., /dev/i2c-1)
    #[arg(short, long)]
    path: String,
    /// 7-bit device address, 0x2c to 0x2f
    #[arg(short, long, default_value = "0x2c", value_parser = parse_address)]
    address: u8,
    /// EEPROM write timeout in milliseconds
    #[arg(long, default_value_t = mcp4461::EEPROM_WRITE_TIMEOUT_MS)]
    eeprom_timeout: u32,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the status register
    Status,
    /// Read a wiper (0-7)
    Get {
        #[arg(value_parser = parse_wiper)]
        wiper: Wiper,
    },
    /// Set a wiper to a tap count (0-256)
    Set {
        #[arg(value_parser = parse_wiper)]
        wiper: Wiper,
        level: u16,
    },
    /// Move a volatile wiper up by one tap
    Inc {
        #[arg(value_parser = parse_wiper)]
        wiper: Wiper,
    },
    /// Move a volatile wiper down by one tap
    Dec {
        #[arg(value_parser = parse_wiper)]
        wiper: Wiper,
    },
    /// Connect or disconnect terminal a, b, w or h of a volatile wiper
    Terminal {
        #[arg(value_parser = parse_wiper)]
        wiper: Wiper,
        id: char,
        state: Switch,
    },
    /// Read a general purpose EEPROM cell (0-4)
    EepromGet {
        #[arg(value_parser = parse_slot)]
        slot: EepromLocation,
    },
    /// Write a general purpose EEPROM cell (0-4) with a value (0-511)
    EepromSet {
        #[arg(value_parser = parse_slot)]
        slot: EepromLocation,
        value: u16,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

fn parse_address(s: &str) -> Result<u8, String> {
    let res = match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    res.map_err(|e| e.to_string())
}

fn parse_wiper(s: &str) -> Result<Wiper, String> {
    let index: u8 = s.parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
    Wiper::try_from(index).map_err(str::to_string)
}

fn parse_slot(s: &str) -> Result<EepromLocation, String> {
    let index: u8 = s.parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
    EepromLocation::try_from(index).map_err(str::to_string)
}

fn run<I: I2c, D: DelayNs>(
    dev: &mut Mcp4461<I, D>,
    command: Command,
) -> Mcp4461Result<(), I::Error> {
    match command {
        Command::Status => {
            let status = dev.status_register()?;
            println!("{:#06x} {:?}", status.into_bits(), status);
        }
        Command::Get { wiper } => println!("{}", dev.get_wiper_level(wiper)?),
        Command::Set { wiper, level } => dev.set_wiper_level(wiper, level)?,
        Command::Inc { wiper } => dev.increase_wiper(wiper)?,
        Command::Dec { wiper } => dev.decrease_wiper(wiper)?,
        Command::Terminal { wiper, id, state } => match state {
            Switch::On => dev.enable_terminal(wiper, id)?,
            Switch::Off => dev.disable_terminal(wiper, id)?,
        },
        Command::EepromGet { slot } => println!("{}", dev.get_eeprom_value(slot)?),
        Command::EepromSet { slot, value } => dev.set_eeprom_value(slot, value)?,
    }
    // flush whatever the command staged
    dev.poll()
}

fn main() {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();
    // Open the I2C bus
    let i2c = linux_embedded_hal::I2cdev::new(&args.path).expect("Failed to open I2C device");
    let delay = linux_embedded_hal::Delay;
    // Create a MCP4461 instance
    let mut dev = Mcp4461Builder::default()
        .with_address(args.address)
        .with_eeprom_timeout(args.eeprom_timeout)
        .build(i2c, delay)
        .expect("Failed to create MCP4461 instance");
    log::info!("MCP4461 ready at {:#04x}", args.address);
    run(&mut dev, args.command).expect("Command failed");
}
