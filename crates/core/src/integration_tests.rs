//! Integration tests: exercise the full flow using a simulated X2V2 Mini.
//!
//! The simulated mouse keeps a 256-byte settings memory and answers every
//! request the way the firmware does, optionally interleaving unsolicited
//! device events, then the tests drive the whole
//! refresh→validate→write→snapshot pipeline through [`Session`].

#[cfg(test)]
mod tests {
    use crate::codec::{LedEffect, Rgb};
    use crate::comm::{check_device_status, DeviceStatus};
    use crate::config::SessionConfig;
    use crate::device::PollingRate;
    use crate::error::{Error, Result};
    use crate::frame::Frame;
    use crate::payload::{positions, Command, DeviceEvent, Request};
    use crate::register_map::setting_addresses;
    use crate::registers::{self, Setting};
    use crate::session::{Session, SessionState};
    use crate::transport::FrameTransport;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct MouseState {
        memory: [u8; 256],
        profile: u8,
        online: bool,
        /// Profile echoed back on the next profile-set, if not the requested one.
        profile_echo_override: Option<u8>,
        /// Emit a device event ahead of every reply.
        chatty: bool,
        outbox: VecDeque<Vec<u8>>,
        writes: Vec<Vec<u8>>,
    }

    /// A simulated mouse speaking the settings protocol.
    struct SimulatedMouse {
        state: Mutex<MouseState>,
        open: bool,
    }

    fn put(memory: &mut [u8; 256], setting: Setting, values: &[u8]) {
        for (address, value) in setting_addresses(setting, values).unwrap() {
            memory[address as usize] = value;
        }
    }

    fn factory_memory() -> [u8; 256] {
        let mut memory = [0u8; 256];
        let rate = PollingRate::Hz1000.to_raw();
        put(&mut memory, registers::POLLING_RATE, &[rate]);
        put(&mut memory, registers::DPI_MODE_COUNT, &[4]);
        put(&mut memory, registers::DPI_MODE, &[1]);
        put(&mut memory, registers::LOD_MM, &[1]);
        let modes = [
            (400, Rgb::new(0xFF, 0x00, 0x00)),
            (800, Rgb::new(0x00, 0xFF, 0x00)),
            (1600, Rgb::new(0x00, 0x00, 0xFF)),
            (3200, Rgb::new(0xFF, 0xFF, 0x00)),
        ];
        for (mode, (dpi, color)) in modes.into_iter().enumerate() {
            let mode = mode as u8;
            let dpi = crate::codec::dpi_to_raw(dpi).unwrap();
            put(&mut memory, registers::mode_dpi(mode).unwrap(), &dpi);
            let led = registers::mode_led_color(mode).unwrap();
            put(&mut memory, led, &color.to_raw());
        }
        let effect = LedEffect::Steady.to_raw();
        put(&mut memory, registers::LED_EFFECT, &[effect]);
        put(&mut memory, registers::LED_BRIGHTNESS, &[0x80]);
        put(&mut memory, registers::LED_BREATHE_SPEED, &[3]);
        put(&mut memory, registers::LED_ENABLED, &[1]);
        put(&mut memory, registers::DEBOUNCE_TIME, &[2]);
        put(&mut memory, registers::MOTION_SYNC, &[0]);
        put(&mut memory, registers::AUTOSLEEP_TIME, &[6]);
        put(&mut memory, registers::ANGLE_SNAPPING, &[0]);
        put(&mut memory, registers::LOD_RIPPLE, &[1]);
        memory
    }

    impl SimulatedMouse {
        fn new() -> Self {
            Self {
                state: Mutex::new(MouseState {
                    memory: factory_memory(),
                    profile: 0,
                    online: true,
                    profile_echo_override: None,
                    chatty: false,
                    outbox: VecDeque::new(),
                    writes: Vec::new(),
                }),
                open: true,
            }
        }

        fn with<R>(&self, f: impl FnOnce(&mut MouseState) -> R) -> R {
            f(&mut self.state.lock().unwrap())
        }

        fn raw(&self, address: u8) -> u8 {
            self.with(|s| s.memory[address as usize])
        }

        fn inject_event(&self, event: DeviceEvent) {
            let raw = Request::EventAck(event).to_frame().unwrap().as_bytes().to_vec();
            self.with(|s| s.outbox.push_back(raw));
        }

        fn memory_writes(&self) -> usize {
            self.with(|s| {
                s.writes
                    .iter()
                    .filter(|w| w[1] == Command::MemoryWrite.as_byte())
                    .count()
            })
        }

        fn answer(state: &mut MouseState, request: &Frame) -> Option<Frame> {
            let command = Command::from_byte(request.command())?;
            let reply = match command {
                Command::MemoryRead => {
                    let start = request.byte(positions::ADDRESS);
                    let length = request.byte(positions::LENGTH);
                    let mut fields = vec![(positions::ADDRESS, start), (positions::LENGTH, length)];
                    fields.extend((0..length).map(|i| {
                        let value = state.memory[start.wrapping_add(i) as usize];
                        (positions::VALUE + i as usize, value)
                    }));
                    Frame::with_fields(request.command(), &fields)
                }
                Command::MemoryWrite => {
                    let start = request.byte(positions::ADDRESS);
                    let length = request.byte(positions::LENGTH);
                    for i in 0..length {
                        let value = request.byte(positions::VALUE + i as usize);
                        state.memory[start.wrapping_add(i) as usize] = value;
                    }
                    Frame::with_fields(
                        request.command(),
                        &[(positions::ADDRESS, start), (positions::LENGTH, length)],
                    )
                }
                Command::Power => Frame::with_fields(
                    request.command(),
                    &[(6, 87), (7, 1), (8, 0x0F), (9, 0xA0)],
                ),
                Command::Status => {
                    Frame::with_fields(request.command(), &[(6, state.online as u8)])
                }
                Command::ProfileGet => Frame::with_fields(
                    request.command(),
                    &[(positions::LENGTH, 0x01), (positions::VALUE, state.profile)],
                ),
                Command::ProfileSet => {
                    let requested = request.byte(positions::VALUE);
                    let echoed = state.profile_echo_override.take().unwrap_or(requested);
                    state.profile = echoed;
                    Request::ProfileSet { profile: echoed }.to_frame()
                }
                Command::Restore => {
                    state.memory = factory_memory();
                    state.profile = 0;
                    Ok(*request)
                }
                Command::DeviceEvent => return None,
            };
            reply.ok()
        }
    }

    impl FrameTransport for SimulatedMouse {
        fn write_frame(&self, data: &[u8]) -> Result<()> {
            if !self.open {
                return Err(Error::DeviceNotFound("simulated mouse unplugged".into()));
            }
            let request = Frame::decode(data)?;
            self.with(|state| {
                state.writes.push(data.to_vec());
                if let Some(reply) = Self::answer(state, &request) {
                    if state.chatty {
                        let event = Request::EventAck(DeviceEvent::Unknown1).to_frame().unwrap();
                        state.outbox.push_back(event.as_bytes().to_vec());
                    }
                    state.outbox.push_back(reply.as_bytes().to_vec());
                }
            });
            Ok(())
        }

        fn read_frame(&self, timeout: Duration) -> Result<Vec<u8>> {
            self.with(|s| s.outbox.pop_front())
                .ok_or_else(|| Error::Timeout(format!("simulated mouse idle for {timeout:?}")))
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn close(&mut self) {
            self.open = false;
        }
    }

    fn open_session() -> Session<SimulatedMouse> {
        let mut session = Session::new(SimulatedMouse::new(), SessionConfig::default()).unwrap();
        session.refresh().unwrap();
        session
    }

    /// Test: full refresh→read of every typed getter.
    #[test]
    fn refresh_populates_typed_settings() {
        let session = open_session();
        assert_eq!(session.polling_rate().unwrap(), PollingRate::Hz1000);
        assert_eq!(session.dpi_mode_count().unwrap(), 4);
        assert_eq!(session.dpi_mode().unwrap(), 1);
        assert_eq!(session.dpi(0).unwrap(), 400);
        assert_eq!(session.dpi(3).unwrap(), 3200);
        assert_eq!(session.current_dpi().unwrap(), 800);
        assert_eq!(session.led_color(2).unwrap().to_hex(), "#0000ff");
        assert_eq!(session.current_led_color().unwrap().to_hex(), "#00ff00");
        assert_eq!(session.led_effect().unwrap(), LedEffect::Steady);
        assert_eq!(session.led_brightness().unwrap(), 0x80);
        assert!(session.led_enabled().unwrap());
        assert_eq!(session.lod_mm().unwrap(), 1);
        assert!(session.lod_ripple().unwrap());
        assert!(!session.motion_sync().unwrap());
        assert!(!session.angle_snapping().unwrap());
        assert_eq!(session.autosleep_seconds().unwrap(), 60);
        assert_eq!(session.debounce_ms().unwrap(), 2);
    }

    /// Test: DPI write lands on the device with its checksum and the cache
    /// reflects it without another refresh.
    #[test]
    fn full_dpi_cycle() {
        let mut session = open_session();
        session.set_dpi(1, 1600).unwrap();

        assert_eq!(session.dpi(1).unwrap(), 1600);
        let mouse = session.transport();
        assert_eq!(mouse.raw(0x10), 0x1F);
        assert_eq!(mouse.raw(0x11), 0x1F);
        assert_eq!(mouse.raw(0x12), 0x00);
        assert_eq!(mouse.raw(0x13), 0x17);

        session.refresh().unwrap();
        assert_eq!(session.dpi(1).unwrap(), 1600);
    }

    /// Test: every setter round-trips through the simulated memory.
    #[test]
    fn multi_setting_configuration() {
        let mut session = open_session();
        session.set_polling_rate(PollingRate::Hz250).unwrap();
        session.set_dpi_mode(3).unwrap();
        session.set_current_dpi(12000).unwrap();
        session.set_current_led_color(Rgb::from_hex("#12ab9f").unwrap()).unwrap();
        session.set_lod_mm(2).unwrap();
        session.set_lod_ripple(false).unwrap();
        session.set_motion_sync(true).unwrap();
        session.set_angle_snapping(true).unwrap();
        session.set_led_effect(LedEffect::Breathe).unwrap();
        session.set_led_brightness(10).unwrap();
        session.set_led_enabled(true).unwrap();
        assert_eq!(session.transport().memory_writes(), 11);

        session.refresh().unwrap();
        assert_eq!(session.polling_rate().unwrap(), PollingRate::Hz250);
        assert_eq!(session.dpi_mode().unwrap(), 3);
        assert_eq!(session.dpi(3).unwrap(), 12000);
        assert_eq!(session.led_color(3).unwrap(), Rgb::new(0x12, 0xAB, 0x9F));
        assert_eq!(session.lod_mm().unwrap(), 2);
        assert!(!session.lod_ripple().unwrap());
        assert!(session.motion_sync().unwrap());
        assert!(session.angle_snapping().unwrap());
        assert_eq!(session.led_effect().unwrap(), LedEffect::Breathe);
        assert_eq!(session.transport().raw(0x00), 4);
        assert_eq!(session.transport().raw(0x01), 0x51);
    }

    /// Test: snapshot gathers power, profile, and the mode table.
    #[test]
    fn snapshot_reports_everything() {
        let mut session = open_session();
        let snapshot = session.snapshot().unwrap();

        assert_eq!(snapshot.active_profile, 0);
        assert_eq!(snapshot.active_dpi_mode, 1);
        assert_eq!(snapshot.dpi_modes.len(), 4);
        assert_eq!(snapshot.dpi_modes[2].dpi, 1600);
        assert_eq!(snapshot.dpi_modes[0].led_color, "#ff0000");
        assert_eq!(snapshot.led.effect, Some(LedEffect::Steady));
        assert_eq!(snapshot.led.brightness, Some(0x80));
        assert_eq!(snapshot.led.breathe_speed, None);
        assert_eq!(snapshot.power.battery_percent, 87);
        assert_eq!(snapshot.power.battery_millivolts, 4000);
        assert!(snapshot.power.connected);
        assert_eq!(session.state(), SessionState::ProfileKnown(0));

        let json: serde_json::Value =
            serde_json::from_str(&snapshot.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["polling_rate_hz"], 1000);
        assert_eq!(json["led"]["effect"], "steady");
    }

    /// Test: a disabled LED hides the effect details in the snapshot.
    #[test]
    fn snapshot_with_led_disabled() {
        let mut session = open_session();
        session.set_led_enabled(false).unwrap();
        session.set_led_effect(LedEffect::Breathe).unwrap();

        let snapshot = session.snapshot().unwrap();
        assert!(!snapshot.led.enabled);
        assert_eq!(snapshot.led.effect, None);
        assert_eq!(snapshot.led.breathe_speed, None);
    }

    /// Test: snapshot lists only the configured number of modes.
    #[test]
    fn snapshot_respects_mode_count() {
        let mut session = open_session();
        session
            .write_registers(&setting_addresses(registers::DPI_MODE_COUNT, &[2]).unwrap())
            .unwrap();
        let snapshot = session.snapshot().unwrap();
        assert_eq!(snapshot.dpi_modes.len(), 2);
    }

    /// Test: restore resets the device and drops every cached value.
    #[test]
    fn restore_invalidates_cache() {
        let mut session = open_session();
        session.set_dpi(0, 5000).unwrap();
        session.set_profile(2).unwrap();

        session.restore().unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert!(matches!(session.dpi(0), Err(Error::NotPopulated { address: 0x0C })));

        session.refresh().unwrap();
        assert_eq!(session.dpi(0).unwrap(), 400);
        assert_eq!(session.profile().unwrap(), 0);
    }

    /// Test: profile switch is verified against the echo.
    #[test]
    fn full_profile_switch() {
        let mut session = open_session();
        assert_eq!(session.profile().unwrap(), 0);
        session.set_profile(3).unwrap();
        assert_eq!(session.state(), SessionState::ProfileKnown(3));
        assert_eq!(session.read_profile().unwrap(), 3);
    }

    /// Test: a wrong profile echo is a protocol violation and the cached
    /// profile keeps its prior value.
    #[test]
    fn profile_echo_mismatch_is_rejected() {
        let mut session = open_session();
        session.set_profile(3).unwrap();

        session
            .transport()
            .with(|s| s.profile_echo_override = Some(1));
        let result = session.set_profile(2);
        assert!(matches!(result, Err(Error::ProtocolViolation(_))));
        assert_eq!(session.state(), SessionState::ProfileKnown(3));
    }

    /// Test: unsolicited events between replies do not disturb any exchange.
    #[test]
    fn interleaved_events_are_skipped() {
        let mouse = SimulatedMouse::new();
        mouse.with(|s| s.chatty = true);
        let mut session = Session::new(mouse, SessionConfig::default()).unwrap();

        session.refresh().unwrap();
        assert_eq!(session.registers().len(), 200);
        assert_eq!(session.power().unwrap().battery_percent, 87);
        assert_eq!(session.profile().unwrap(), 0);
        session.set_profile(1).unwrap();
        assert!(session.is_online().unwrap());
    }

    /// Test: a DPI-mode event invalidates the cached active mode.
    #[test]
    fn dpi_mode_event_invalidates_active_mode() {
        let mut session = open_session();
        session.transport().with(|s| s.memory[0x04] = 2);
        session.transport().inject_event(DeviceEvent::DpiMode);

        assert_eq!(session.poll_event().unwrap(), Some(DeviceEvent::DpiMode));
        assert!(matches!(
            session.dpi_mode(),
            Err(Error::NotPopulated { address: 0x04 })
        ));
        assert_eq!(session.dpi(0).unwrap(), 400);

        session.refresh().unwrap();
        assert_eq!(session.dpi_mode().unwrap(), 2);
    }

    /// Test: boolean registers holding anything but 0 or 1 are reported,
    /// never coerced.
    #[test]
    fn strict_bool_decoding() {
        let mouse = SimulatedMouse::new();
        mouse.with(|s| s.memory[registers::MOTION_SYNC.address as usize] = 2);
        let mut session = Session::new(mouse, SessionConfig::default()).unwrap();
        session.refresh().unwrap();

        match session.motion_sync() {
            Err(Error::InvalidEncoding { field, .. }) => assert_eq!(field, "motion_sync"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(session.snapshot().is_err());
    }

    /// Test: validation rejects dangerous values before reaching the device.
    #[test]
    fn safety_prevents_invalid_writes() {
        let mut session = open_session();
        assert!(session.set_dpi(0, 30000).is_err());
        assert!(session.set_dpi(0, 1625).is_err());
        assert!(session.set_dpi(4, 800).is_err());
        assert!(session.set_lod_mm(3).is_err());
        assert!(session.set_profile(4).is_err());
        assert_eq!(session.transport().memory_writes(), 0);
    }

    /// Test: status check follows the mouse going out of range and the
    /// handle closing.
    #[test]
    fn device_status_transitions() {
        let mut session = open_session();
        let config = SessionConfig::default();
        assert_eq!(
            check_device_status(session.transport(), &config),
            DeviceStatus::Online
        );

        session.transport().with(|s| s.online = false);
        assert_eq!(
            check_device_status(session.transport(), &config),
            DeviceStatus::Offline
        );
        assert!(!session.is_online().unwrap());

        session.close();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(
            check_device_status(session.transport(), &config),
            DeviceStatus::Disconnected
        );
    }

    /// Test: a session shared across threads behind a mutex stays
    /// consistent.
    #[test]
    fn concurrent_mixed_operations() {
        use std::sync::Arc;
        use std::thread;

        let session = Arc::new(Mutex::new(open_session()));

        let mut handles = vec![];
        for mode in 0..4u8 {
            let session = Arc::clone(&session);
            handles.push(thread::spawn(move || {
                let mut session = session.lock().unwrap();
                let dpi = 1000 + mode as u32 * 500;
                session.set_dpi(mode, dpi).unwrap();
                assert_eq!(session.dpi(mode).unwrap(), dpi);
                session.power().unwrap().battery_percent
            }));
        }
        for h in handles {
            assert_eq!(h.join().expect("thread panicked"), 87);
        }

        let mut session = session.lock().unwrap();
        session.refresh().unwrap();
        for mode in 0..4u8 {
            assert_eq!(session.dpi(mode).unwrap(), 1000 + mode as u32 * 500);
        }
    }
}
