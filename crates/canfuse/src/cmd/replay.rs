use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use canfuse_core::{Registry, TelemetryDecoder};
use canfuse_frame::candump::{parse_log, CandumpRecord};
use canfuse_session::ReceiveStats;
use tracing::debug;

use crate::cmd::{load_bus, ReplayArgs};
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_state, OutputFormat, StateReport};

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let (config, registry) = load_bus(&args.config)?;
    let records = read_log(&args.log)?;
    let decoder = config.decoder();

    let stats = replay(&decoder, &registry, &records, args.interface.as_deref());
    debug!(frames = stats.frames, applied = stats.applied, "replay finished");

    print_state(
        &StateReport::capture(&config.bus_name, &registry, Some(stats)),
        format,
    );
    Ok(SUCCESS)
}

pub(crate) fn read_log(path: &Path) -> CliResult<Vec<CandumpRecord>> {
    let file = File::open(path)
        .map_err(|err| io_error(&format!("cannot open {}", path.display()), err))?;
    parse_log(BufReader::new(file)).map_err(|err| frame_error("log parse failed", err))
}

/// Decode records in log order. Records from other interfaces are skipped.
pub(crate) fn replay(
    decoder: &TelemetryDecoder,
    registry: &Registry,
    records: &[CandumpRecord],
    interface: Option<&str>,
) -> ReceiveStats {
    let mut stats = ReceiveStats::default();
    for record in records {
        if interface.is_some_and(|wanted| wanted != record.interface) {
            continue;
        }
        stats.record(&decoder.decode(registry, &record.frame));
    }
    stats
}
