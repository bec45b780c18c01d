use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use canfuse_core::{DecodeOutcome, FrameEncoder, Registry, TelemetryDecoder};
use canfuse_frame::{FrameError, FrameReader, FrameWriter};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// Longest single sleep while waiting, so a cleared `running` flag is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Call `connect` until it succeeds.
///
/// Sleeps `retry_interval` between attempts. Returns
/// [`SessionError::Cancelled`] once `running` is cleared and
/// [`SessionError::RetriesExhausted`] after `max_attempts` failures.
pub fn open_with_retry<T, F>(config: &SessionConfig, mut connect: F, running: &AtomicBool) -> Result<T>
where
    F: FnMut(&str) -> canfuse_transport::Result<T>,
{
    let mut attempts = 0u32;
    loop {
        if !running.load(Ordering::Relaxed) {
            return Err(SessionError::Cancelled);
        }

        attempts = attempts.saturating_add(1);
        match connect(&config.interface) {
            Ok(stream) => {
                info!(interface = %config.interface, attempts, "bus opened");
                return Ok(stream);
            }
            Err(err) => {
                warn!(
                    interface = %config.interface,
                    attempt = attempts,
                    error = %err,
                    "failed to open bus"
                );
                if config.max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(SessionError::RetriesExhausted {
                        attempts,
                        last: err,
                    });
                }
            }
        }

        debug!(retry_in = ?config.retry_interval, "waiting before next open attempt");
        sleep_while_running(config.retry_interval, running);
    }
}

fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::Relaxed) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        std::thread::sleep(remaining.min(SLEEP_SLICE));
    }
}

/// An open bus bound to a registry, before it is split into its two halves.
pub struct Session<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    registry: Arc<Registry>,
    decoder: TelemetryDecoder,
    encoder: FrameEncoder,
}

impl<R: Read, W: Write> Session<R, W> {
    pub fn new(
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        registry: Arc<Registry>,
        decoder: TelemetryDecoder,
        encoder: FrameEncoder,
    ) -> Self {
        Self {
            reader,
            writer,
            registry,
            decoder,
            encoder,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Separate the receive and transmit sides so each can run on its own thread.
    pub fn split(self) -> (SessionReceiver<R>, SessionTransmitter<W>) {
        (
            SessionReceiver {
                reader: self.reader,
                registry: Arc::clone(&self.registry),
                decoder: self.decoder,
                stats: ReceiveStats::default(),
            },
            SessionTransmitter {
                writer: self.writer,
                registry: self.registry,
                encoder: self.encoder,
                ticks: 0,
            },
        )
    }
}

#[cfg(target_os = "linux")]
impl Session<canfuse_transport::BusStream, canfuse_transport::BusStream> {
    /// Open the configured SocketCAN interface, retrying until it comes up.
    pub fn connect(
        config: &SessionConfig,
        registry: Arc<Registry>,
        decoder: TelemetryDecoder,
        encoder: FrameEncoder,
        running: &AtomicBool,
    ) -> Result<Self> {
        let stream = open_with_retry(config, canfuse_transport::CanSocket::open, running)?;
        let reader_stream = stream.try_clone()?;
        let reader = FrameReader::with_config_bus(reader_stream, config.frame.clone())?;
        let writer = FrameWriter::with_config_bus(stream, config.frame.clone())?;
        Ok(Self::new(reader, writer, registry, decoder, encoder))
    }
}

/// Counters kept by a [`SessionReceiver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    /// Frames handed to the decoder.
    pub frames: u64,
    /// Frames that updated an actuator or IMU.
    pub applied: u64,
    /// Frames dropped as implausible IMU samples.
    pub implausible: u64,
    /// Frames that matched no record.
    pub unrecognized: u64,
    /// Wire records rejected before decoding (remote, error, bad length).
    pub rejected: u64,
}

impl ReceiveStats {
    /// Count one decoded frame.
    pub fn record(&mut self, outcome: &DecodeOutcome) {
        self.frames += 1;
        match outcome {
            DecodeOutcome::ImplausibleImu => self.implausible += 1,
            DecodeOutcome::Unrecognized { .. } => self.unrecognized += 1,
            _ => self.applied += 1,
        }
    }
}

/// Receive half: reads frames and folds them into the registry.
pub struct SessionReceiver<R> {
    reader: FrameReader<R>,
    registry: Arc<Registry>,
    decoder: TelemetryDecoder,
    stats: ReceiveStats,
}

impl<R: Read> SessionReceiver<R> {
    /// Read and decode one frame.
    ///
    /// Returns `Ok(None)` when the read timed out or the wire record was
    /// rejected; the caller simply polls again. End of stream surfaces as
    /// `FrameError::ConnectionClosed`.
    pub fn poll_once(&mut self) -> Result<Option<DecodeOutcome>> {
        let frame = match self.reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                return Ok(None);
            }
            Err(err @ (FrameError::UnsupportedFrame { .. } | FrameError::InvalidLength { .. })) => {
                debug!(error = %err, "skipping wire record");
                self.stats.rejected += 1;
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let outcome = self.decoder.decode(&self.registry, &frame);
        self.stats.record(&outcome);
        Ok(Some(outcome))
    }

    /// Poll until `running` is cleared or the stream ends.
    pub fn run(&mut self, running: &AtomicBool) -> Result<ReceiveStats> {
        while running.load(Ordering::Relaxed) {
            match self.poll_once() {
                Ok(_) => {}
                Err(SessionError::Frame(FrameError::ConnectionClosed)) => {
                    info!(bus = self.decoder.bus_name(), "bus stream closed");
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(self.stats)
    }

    pub fn stats(&self) -> ReceiveStats {
        self.stats
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

/// Transmit half: encodes and writes the command frames of each control tick.
pub struct SessionTransmitter<W> {
    writer: FrameWriter<W>,
    registry: Arc<Registry>,
    encoder: FrameEncoder,
    ticks: u64,
}

impl<W: Write> SessionTransmitter<W> {
    /// Encode the current commands and write them. Returns the number of frames written.
    pub fn tick(&mut self) -> Result<usize> {
        let frames = self.encoder.encode(&self.registry);
        let written = self.writer.write_all_frames(&frames)?;
        self.ticks += 1;
        Ok(written)
    }

    /// Tick every `period` until `running` is cleared. Returns the number of ticks.
    ///
    /// A full transmit queue drops the rest of that tick and carries on; the
    /// next tick resends current commands anyway.
    pub fn run(&mut self, period: Duration, running: &AtomicBool) -> Result<u64> {
        let mut next = Instant::now();
        while running.load(Ordering::Relaxed) {
            match self.tick() {
                Ok(_) => {}
                Err(SessionError::Frame(FrameError::Io(err)))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    warn!(error = %err, "transmit queue full, tick dropped");
                }
                Err(err) => return Err(err),
            }

            next += period;
            let now = Instant::now();
            if next > now {
                sleep_while_running(next - now, running);
            } else {
                next = now;
            }
        }
        Ok(self.ticks)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use bytes::{BufMut, BytesMut};
    use canfuse_core::{ActuatorCommand, BusConfig, DecoderConfig, EncoderConfig};
    use canfuse_frame::{decode_frame, encode_frame, half_float, BusFrame, SHARED_GROUP_0};
    use canfuse_transport::TransportError;

    use super::*;

    const CONFIG: &str = r#"{
        "bus_name": "can0",
        "actuator_coefficients": { "rm_3508": { "act2pos": 1.0, "act2vel": 1.0,
                                                "act2effort": 1.0, "effort2act": 1000.0,
                                                "max_out": 16384 } },
        "actuators": [ { "name": "wheel", "address": "0x201", "type": "rm_3508" } ],
        "imus": [ { "name": "imu", "base_id": "0x100" } ]
    }"#;

    fn registry() -> Arc<Registry> {
        Arc::new(
            BusConfig::from_json(CONFIG)
                .expect("config should parse")
                .build_registry()
                .expect("registry should build"),
        )
    }

    fn session<R: Read, W: Write>(reader: R, writer: W) -> Session<R, W> {
        Session::new(
            FrameReader::new(reader),
            FrameWriter::new(writer),
            registry(),
            TelemetryDecoder::new("can0", DecoderConfig::default()),
            FrameEncoder::new(EncoderConfig::default()),
        )
    }

    fn wire(frames: &[BusFrame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            encode_frame(frame, &mut buf);
        }
        buf.to_vec()
    }

    fn fast_retry(max_attempts: Option<u32>) -> SessionConfig {
        SessionConfig {
            retry_interval: Duration::from_millis(1),
            max_attempts,
            ..SessionConfig::new("vcan0")
        }
    }

    fn refused() -> TransportError {
        TransportError::Open {
            interface: "vcan0".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        }
    }

    #[test]
    fn stats_count_each_outcome_once() {
        let mut stats = ReceiveStats::default();
        stats.record(&DecodeOutcome::SharedFrame { address: 0x201 });
        stats.record(&DecodeOutcome::Imu {
            base_id: 0x100,
            offset: 2,
        });
        stats.record(&DecodeOutcome::ImplausibleImu);
        stats.record(&DecodeOutcome::Unrecognized { reported: false });

        assert_eq!(stats.frames, 4);
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.implausible, 1);
        assert_eq!(stats.unrecognized, 1);
        assert_eq!(stats.rejected, 0);
    }

    #[test]
    fn open_succeeds_after_failures() {
        let running = AtomicBool::new(true);
        let mut calls = 0;
        let opened = open_with_retry(
            &fast_retry(None),
            |interface| {
                assert_eq!(interface, "vcan0");
                calls += 1;
                if calls < 3 {
                    Err(refused())
                } else {
                    Ok(calls)
                }
            },
            &running,
        )
        .expect("third attempt should succeed");
        assert_eq!(opened, 3);
    }

    #[test]
    fn open_gives_up_after_max_attempts() {
        let running = AtomicBool::new(true);
        let err = open_with_retry(&fast_retry(Some(2)), |_| Err::<(), _>(refused()), &running)
            .expect_err("should give up");
        assert!(matches!(
            err,
            SessionError::RetriesExhausted { attempts: 2, .. }
        ));
    }

    #[test]
    fn open_stops_when_cancelled() {
        let running = AtomicBool::new(true);
        let err = open_with_retry(
            &fast_retry(None),
            |_| {
                running.store(false, Ordering::Relaxed);
                Err::<(), _>(refused())
            },
            &running,
        )
        .expect_err("should be cancelled");
        assert!(matches!(err, SessionError::Cancelled));
    }

    #[test]
    fn receiver_decodes_until_stream_ends() {
        let frames = [
            BusFrame::new(0x201, [0x00, 0x64, 0, 10, 0, 20, 45, 0]),
            BusFrame::new(0x100, half_float::encode_payload([0.0, 0.0, 1.0, 0.0])),
            BusFrame::new(0x100, half_float::encode_payload([0.0, 0.0, 5000.0, 0.0])),
            BusFrame::zeroed(0x3FF),
        ];
        let (mut receiver, _) = session(Cursor::new(wire(&frames)), Vec::new()).split();

        let running = AtomicBool::new(true);
        let stats = receiver.run(&running).expect("receive loop should end cleanly");
        assert_eq!(
            stats,
            ReceiveStats {
                frames: 4,
                applied: 2,
                implausible: 1,
                unrecognized: 1,
                rejected: 0,
            }
        );

        let wheel = receiver.registry().actuator(0x201).expect("wheel").snapshot();
        assert_eq!(wheel.pos, 100.0);
        assert_eq!(wheel.temp, 45.0);
        let imu = receiver.registry().imu(0x100).expect("imu").state();
        assert!((imu.linear_acc[2] - 9.81).abs() < 1e-6);
    }

    #[test]
    fn receiver_skips_rejected_records() {
        let mut bytes = BytesMut::new();
        // remote request
        bytes.put_u32_ne(0x201 | 0x4000_0000);
        bytes.put_u8(0);
        bytes.put_bytes(0, 11);
        bytes.extend_from_slice(&wire(&[BusFrame::new(0x201, [0, 1, 0, 0, 0, 0, 30, 0])]));

        let (mut receiver, _) = session(Cursor::new(bytes.to_vec()), Vec::new()).split();
        assert_eq!(receiver.poll_once().expect("rejected record is not fatal"), None);
        assert_eq!(
            receiver.poll_once().expect("next frame should decode"),
            Some(DecodeOutcome::SharedFrame { address: 0x201 })
        );
        assert_eq!(receiver.stats().rejected, 1);
        assert!(matches!(
            receiver.poll_once(),
            Err(SessionError::Frame(FrameError::ConnectionClosed))
        ));
    }

    #[test]
    fn receiver_treats_timeouts_as_idle() {
        struct TimeoutThenData {
            timed_out: bool,
            data: Cursor<Vec<u8>>,
        }

        impl Read for TimeoutThenData {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if !self.timed_out {
                    self.timed_out = true;
                    return Err(io::Error::from(io::ErrorKind::WouldBlock));
                }
                self.data.read(buf)
            }
        }

        let reader = TimeoutThenData {
            timed_out: false,
            data: Cursor::new(wire(&[BusFrame::zeroed(0x201)])),
        };
        let (mut receiver, _) = session(reader, Vec::new()).split();
        assert_eq!(receiver.poll_once().expect("timeout is not an error"), None);
        assert!(receiver.poll_once().expect("frame should follow").is_some());
    }

    #[test]
    fn receiver_stops_when_flag_cleared() {
        let (mut receiver, _) =
            session(Cursor::new(wire(&[BusFrame::zeroed(0x201)])), Vec::new()).split();
        let running = AtomicBool::new(false);
        let stats = receiver.run(&running).expect("loop should not start");
        assert_eq!(stats.frames, 0);
    }

    #[test]
    fn transmitter_writes_one_tick() {
        let (_, mut transmitter) = session(Cursor::new(Vec::new()), Vec::new()).split();
        transmitter
            .registry()
            .set_command(
                "wheel",
                ActuatorCommand {
                    effort: 2.0,
                    ..ActuatorCommand::default()
                },
            )
            .expect("wheel exists");

        assert_eq!(transmitter.tick().expect("tick should write"), 1);
        assert_eq!(transmitter.ticks(), 1);

        let mut written = BytesMut::from(transmitter.get_ref().as_slice());
        let frame = decode_frame(&mut written)
            .expect("written bytes should decode")
            .expect("one full frame");
        assert_eq!(frame.id, SHARED_GROUP_0);
        assert_eq!(frame.i16_be(0), 2000);
        assert!(written.is_empty());
    }

    #[test]
    fn transmitter_run_ticks_until_stopped() {
        struct StopAfter<'a> {
            frames: usize,
            running: &'a AtomicBool,
        }

        impl Write for StopAfter<'_> {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.frames += 1;
                if self.frames == 3 {
                    self.running.store(false, Ordering::Relaxed);
                }
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let running = AtomicBool::new(true);
        let writer = StopAfter {
            frames: 0,
            running: &running,
        };
        let (_, mut transmitter) = session(Cursor::new(Vec::new()), writer).split();
        let ticks = transmitter
            .run(Duration::from_millis(1), &running)
            .expect("run should stop cleanly");
        assert_eq!(ticks, 3);
    }
}
