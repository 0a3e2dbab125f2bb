use clap::{Arg, ArgAction, Command};
use ferrum::config::{Config, HardwareModel};
use ferrum::gb::Gameboy;
use log::{error, info};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let matches = Command::new("ferrum")
        .version("0.1.0")
        .author("m0x <https://github.com/m0xsec/ferrum>")
        .about("A Gameboy / Gameboy Color emulation core.")
        .arg(
            Arg::new("rom")
                .short('r')
                .long("rom")
                .value_name("FILE")
                .help("Sets the ROM file to load.")
                .required(true),
        )
        .arg(
            Arg::new("testing")
                .short('t')
                .long("testing")
                .help("Enables testing mode (implies --skip-boot).")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("cgb")
                .long("cgb")
                .help("Emulate a Gameboy Color instead of a DMG-01.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("skip-boot")
                .long("skip-boot")
                .help("Skip the boot ROM and seed post-boot CPU/Bus state directly.")
                .action(ArgAction::SetTrue),
        )
        .arg_required_else_help(true)
        .get_matches();

    let rom_path = matches.get_one::<String>("rom").unwrap();
    let testing = matches.get_flag("testing");
    let skip_boot = matches.get_flag("skip-boot");
    let model = if matches.get_flag("cgb") {
        HardwareModel::Cgb
    } else {
        HardwareModel::Dmg
    };

    let config = Config::new(model, skip_boot, testing);

    let mut gameboy = match Gameboy::init(rom_path, config) {
        Ok(gameboy) => gameboy,
        Err(err) => {
            error!("failed to initialize: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = gameboy.run() {
        error!("emulation halted: {}", err);
        return ExitCode::FAILURE;
    }

    info!("emulation stopped cleanly");
    ExitCode::SUCCESS
}
