//! Per-sensor behavior behind a session: the start-up handshake, pulling one scan worth of data
//! through the right decoder, and the shutdown commands.

use crate::assembler::{BatchAssembler, RevolutionAssembler};
use crate::config::SensorProfile;
use crate::protocol::a2m8::{self, A2m8Decoder, Command, ResponseDescriptor};
use crate::protocol::stl27l;
use crate::sensors::{SensorResult, Transport};
use crate::{Scan, SensorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub(crate) enum Driver {
    Stl27l(Stl27lDriver),
    A2m8(A2m8Driver),
}

impl Driver {
    pub(crate) fn for_profile(profile: &SensorProfile) -> Self {
        match profile.kind {
            SensorKind::Stl27l => Driver::Stl27l(Stl27lDriver {
                window: profile.batch_window(),
                batch: BatchAssembler::new(profile.kind, profile.min_scan_points),
            }),
            SensorKind::A2m8 => Driver::A2m8(A2m8Driver {
                decoder: A2m8Decoder::new(),
                assembler: RevolutionAssembler::new(profile.kind, profile.min_scan_points),
                motor_pwm: profile.motor_pwm,
                reset_delay: profile.reset_delay(),
                verify: profile.verify_checksum,
            }),
        }
    }

    pub(crate) fn start(&mut self, transport: &mut dyn Transport) -> SensorResult<()> {
        match self {
            // The STL27L streams as soon as it has power
            Driver::Stl27l(_) => Ok(()),
            Driver::A2m8(d) => d.start(transport),
        }
    }

    /// Reads until a scan is ready. If `running` is cleared first, the A2M8 hands back its partial
    /// revolution when that is large enough, and otherwise `None` is returned.
    pub(crate) fn next_scan(
        &mut self,
        transport: &mut dyn Transport,
        running: &AtomicBool,
    ) -> SensorResult<Option<Scan>> {
        match self {
            Driver::Stl27l(d) => d.next_scan(transport, running),
            Driver::A2m8(d) => d.next_scan(transport, running),
        }
    }

    pub(crate) fn shutdown(&mut self, transport: &mut dyn Transport) -> SensorResult<()> {
        match self {
            Driver::Stl27l(_) => Ok(()),
            Driver::A2m8(d) => d.shutdown(transport),
        }
    }

    /// Drops any partially assembled data and decoder carry.
    pub(crate) fn reset(&mut self) {
        match self {
            Driver::Stl27l(d) => d.batch.clear(),
            Driver::A2m8(d) => {
                d.decoder.reset();
                d.assembler.clear();
            }
        }
    }
}

pub(crate) struct Stl27lDriver {
    window: Duration,
    batch: BatchAssembler,
}

impl Stl27lDriver {
    /// Decodes frames for one wall-clock window and hands the batch to the assembler, which
    /// yields an empty scan if the window was too thin.
    fn next_scan(
        &mut self,
        transport: &mut dyn Transport,
        running: &AtomicBool,
    ) -> SensorResult<Option<Scan>> {
        let deadline = Instant::now() + self.window;
        while Instant::now() < deadline {
            if !running.load(Ordering::Relaxed) {
                return Ok(None);
            }
            match stl27l::read_frame(transport) {
                Ok(frame) => self.batch.extend(frame.samples()),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => log::trace!("STL27L frame skipped: {}", e),
            }
        }

        let scan = self.batch.finish();
        log::debug!("STL27L window closed with {} points", scan.len());
        Ok(Some(scan))
    }
}

pub(crate) struct A2m8Driver {
    decoder: A2m8Decoder,
    assembler: RevolutionAssembler,
    motor_pwm: u16,
    reset_delay: Duration,
    verify: bool,
}

impl A2m8Driver {
    fn send(transport: &mut dyn Transport, command: Command) -> SensorResult<()> {
        log::trace!("A2M8 <- {:?}", command);
        transport.write_all(&command.encode())?;
        Ok(())
    }

    fn start(&mut self, transport: &mut dyn Transport) -> SensorResult<()> {
        Self::send(transport, Command::Reset)?;
        std::thread::sleep(self.reset_delay);
        transport.clear_input()?;
        transport.set_dtr(false)?;
        Self::send(transport, Command::SetMotorPwm(self.motor_pwm))?;
        Self::send(transport, Command::ExpressScan)?;
        transport.flush()?;

        match ResponseDescriptor::read(transport) {
            Ok(d) if d.data_type == Command::ExpressScan.code() => {
                log::debug!("A2M8 express scan started, {} byte packets", d.length);
            }
            Ok(d) => log::warn!("A2M8 sent an unexpected response descriptor: {:?}", d),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => log::warn!("A2M8 response descriptor not received: {}", e),
        }
        Ok(())
    }

    fn next_scan(
        &mut self,
        transport: &mut dyn Transport,
        running: &AtomicBool,
    ) -> SensorResult<Option<Scan>> {
        while running.load(Ordering::Relaxed) {
            match a2m8::read_packet(transport, self.verify) {
                Ok(packet) => {
                    let samples = self.decoder.decode(&packet);
                    if let Some(scan) = self.assembler.extend(samples) {
                        log::debug!("A2M8 revolution completed with {} points", scan.len());
                        return Ok(Some(scan));
                    }
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => log::trace!("A2M8 packet skipped: {}", e),
            }
        }

        let partial = self.assembler.take_partial();
        if let Some(scan) = &partial {
            log::debug!("A2M8 stopped mid-revolution with {} points", scan.len());
        }
        Ok(partial)
    }

    fn shutdown(&mut self, transport: &mut dyn Transport) -> SensorResult<()> {
        Self::send(transport, Command::Stop)?;
        Self::send(transport, Command::SetMotorPwm(0))?;
        transport.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::a2m8::encode_packet;
    use crate::sensors::MockTransport;

    fn quick_a2m8() -> SensorProfile {
        SensorProfile {
            reset_delay_ms: 0,
            ..SensorProfile::a2m8()
        }
    }

    #[test]
    fn a2m8_start_sequence() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();
        let mut driver = Driver::for_profile(&quick_a2m8());
        driver.start(&mut transport).unwrap();

        let expected = [
            Command::Reset.encode(),
            Command::SetMotorPwm(660).encode(),
            Command::ExpressScan.encode(),
        ]
        .concat();
        assert_eq!(mock.written(), expected);
        assert_eq!(mock.dtr(), Some(false));
    }

    #[test]
    fn a2m8_shutdown_stops_motor() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();
        let mut driver = Driver::for_profile(&quick_a2m8());
        driver.shutdown(&mut transport).unwrap();

        let expected = [Command::Stop.encode(), Command::SetMotorPwm(0).encode()].concat();
        assert_eq!(mock.written(), expected);
    }

    #[test]
    fn a2m8_scan_from_packets() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();
        let mut driver = Driver::for_profile(&quick_a2m8());

        // Start angles advance 32° per packet, so each packet spans 1° per sample. Twelve packets
        // cover 384°, enough to wrap once after a full revolution.
        let readings = [(1000u16, 0i8); a2m8::SAMPLES_PER_PACKET];
        for k in 0..13u16 {
            let start = (k * 32 % 360) * 64;
            mock.inject_read(&encode_packet(start, &readings));
        }

        let running = AtomicBool::new(true);
        let scan = driver.next_scan(&mut transport, &running).unwrap().unwrap();
        assert_eq!(scan.source(), SensorKind::A2m8);
        assert!(scan.len() > 100);
    }

    #[test]
    fn a2m8_stop_keeps_partial_revolution() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();
        let mut driver = Driver::for_profile(&quick_a2m8());

        // Five packets reach 160°, well short of a wrap
        let readings = [(1000u16, 0i8); a2m8::SAMPLES_PER_PACKET];
        for k in 1..=5u16 {
            mock.inject_read(&encode_packet(k * 32 * 64, &readings));
        }

        let running = AtomicBool::new(true);
        let scan = std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                running.store(false, Ordering::Relaxed);
            });
            driver.next_scan(&mut transport, &running)
        })
        .unwrap()
        .unwrap();
        assert_eq!(scan.len(), 5 * a2m8::SAMPLES_PER_PACKET);
        assert_eq!(mock.unread(), 0);
    }

    #[test]
    fn cleared_flag_ends_read() {
        let mut transport = MockTransport::new();
        let mut driver = Driver::for_profile(&SensorProfile::stl27l());
        let running = AtomicBool::new(false);
        assert!(driver.next_scan(&mut transport, &running).unwrap().is_none());
    }
}
