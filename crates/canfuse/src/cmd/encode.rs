use std::borrow::Cow;
use std::collections::BTreeMap;

use canfuse_core::ActuatorCommand;
use tracing::debug;

use crate::cmd::replay::{read_log, replay};
use crate::cmd::{load_bus, EncodeArgs};
use crate::exit::{core_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let (config, registry) = load_bus(&args.config)?;

    if let Some(path) = &args.telemetry {
        let records = read_log(path)?;
        let stats = replay(&config.decoder(), &registry, &records, None);
        debug!(frames = stats.frames, "telemetry primed");
    }

    for (name, command) in parse_commands(&args.commands)? {
        registry
            .set_command(&name, command)
            .map_err(|err| core_error("invalid command", err))?;
    }

    let frames = config.encoder().encode(&registry);
    let interface = args.interface.as_deref().unwrap_or(&config.bus_name);
    print_frames(interface, &frames, format);
    Ok(SUCCESS)
}

/// Inline JSON, or `@path` to read it from a file.
fn parse_commands(input: &str) -> CliResult<BTreeMap<String, ActuatorCommand>> {
    let text = match input.strip_prefix('@') {
        Some(path) => Cow::Owned(
            std::fs::read_to_string(path)
                .map_err(|err| io_error(&format!("cannot read {path}"), err))?,
        ),
        None => Cow::Borrowed(input),
    };
    serde_json::from_str(&text)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid commands: {err}")))
}
