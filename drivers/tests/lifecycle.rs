use drivers::chrdev::command::{CLOSE_CMD, OPEN_CMD, SETPERIOD_CMD};
use drivers::chrdev::{
    ActivationContext, ActivationError, FileError, PeripheralInstance, ReadMode, ScheduleState,
    SchedulerConfig, UserBuffer,
};
use drivers::binder::BindError;
use drivers::device_manager::{DeviceRegistry, RegistryError};
use drivers::hal::timer::TimerError;
use drivers::of::DeviceTree;
use drivers::peripheral::{self, KEY_PRESSED, KEY_RELEASED};
use drivers::platform::virt::VirtualBoard;
use drivers::PinLevel;
use std::num::NonZeroU32;

const LED: u32 = 3;
const BEEP: u32 = 129;
const KEY: u32 = 18;

struct Rig {
    board: VirtualBoard,
    tree: DeviceTree,
    registry: DeviceRegistry,
}

impl Rig {
    fn new() -> Self {
        Self::with_board(VirtualBoard::new())
    }

    fn with_board(board: VirtualBoard) -> Self {
        Self {
            board,
            tree: peripheral::board_tree(),
            registry: DeviceRegistry::new(),
        }
    }

    fn ctx(&self) -> ActivationContext<'_> {
        ActivationContext::new(&self.tree, self.board.board(), &self.registry)
    }

    fn assert_clean(&self) {
        assert!(self.registry.nodes().is_empty());
        assert!(self.registry.classes().is_empty());
        assert_eq!(self.registry.allocated_regions(), 0);
        assert_eq!(self.board.gpio.requested_count(), 0);
        assert_eq!(self.board.clock.claimed(), 0);
    }
}

fn read_i32(file: &drivers::chrdev::File) -> i32 {
    let mut buf = [0u8; 4];
    assert_eq!(file.read(&mut buf), Ok(4));
    i32::from_ne_bytes(buf)
}

#[test]
fn activation_publishes_node_and_binds_line() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let led = PeripheralInstance::activate(peripheral::gpio_led(), &ctx).unwrap();

    assert_eq!(led.path(), "/dev/gpioled");
    assert_eq!(rig.registry.lookup("/dev/gpioled"), Some(led.devt()));
    assert!(rig.registry.is_allocated(led.devt()));
    assert!(led.is_bound());
    assert_eq!(rig.board.gpio.owner(LED).as_deref(), Some("gpioled"));
    // Active-low LED switched on at activation.
    assert_eq!(rig.board.gpio.driven_level(LED), Some(PinLevel::Low));
}

#[test]
fn write_drives_line_through_polarity() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let _led = PeripheralInstance::activate(peripheral::gpio_led(), &ctx).unwrap();
    let file = rig.registry.open("/dev/gpioled").unwrap();

    assert_eq!(file.write(&[0]), Ok(1));
    assert_eq!(rig.board.gpio.driven_level(LED), Some(PinLevel::High));
    assert_eq!(file.write(&[1]), Ok(1));
    assert_eq!(rig.board.gpio.driven_level(LED), Some(PinLevel::Low));

    assert_eq!(file.write(&[2]), Err(FileError::InvalidArgument));
    assert_eq!(file.write(&[]), Err(FileError::InvalidArgument));
    assert_eq!(file.write(&[1, 0]), Err(FileError::InvalidArgument));
    assert_eq!(rig.board.gpio.driven_level(LED), Some(PinLevel::Low));

    let mut buf = [0u8; 4];
    assert_eq!(file.read(&mut buf), Ok(0));
}

#[test]
fn loopback_write_is_seen_by_key() {
    let rig = Rig::new();
    rig.board.gpio.wire(LED, KEY);
    let ctx = rig.ctx();
    let _led = PeripheralInstance::activate(peripheral::exclusive_led(), &ctx).unwrap();
    let _key = PeripheralInstance::activate(peripheral::key(), &ctx).unwrap();

    let led = rig.registry.open("/dev/gpioled").unwrap();
    let key = rig.registry.open("/dev/key").unwrap();

    led.write(&[0]).unwrap();
    assert_eq!(read_i32(&key), KEY_RELEASED);
    led.write(&[1]).unwrap();
    assert_eq!(read_i32(&key), KEY_PRESSED);

    assert_eq!(rig.registry.open("/dev/gpioled").unwrap_err(), FileError::Busy);
    led.close();
    let again = rig.registry.open("/dev/gpioled").unwrap();
    assert_eq!(again.write(&[0]), Ok(1));
    assert_eq!(read_i32(&key), KEY_RELEASED);
}

#[test]
fn output_can_report_its_own_level() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let cfg = peripheral::exclusive_led().with_read(ReadMode::Level { active: 1, inactive: 0 });
    let led = PeripheralInstance::activate(cfg, &ctx).unwrap();

    let file = rig.registry.open("/dev/gpioled").unwrap();
    file.write(&[1]).unwrap();
    assert_eq!(read_i32(&file), 1);
    assert!(led.last_sample());
    file.write(&[0]).unwrap();
    assert_eq!(read_i32(&file), 0);
    assert!(!led.last_sample());
}

#[test]
fn key_reads_external_level() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let _key = PeripheralInstance::activate(peripheral::key(), &ctx).unwrap();
    let file = rig.registry.open("/dev/key").unwrap();

    // Pull-up holds the released level.
    assert_eq!(read_i32(&file), KEY_RELEASED);
    rig.board.gpio.drive_external(KEY, PinLevel::Low);
    assert_eq!(read_i32(&file), KEY_PRESSED);
    rig.board.gpio.drive_external(KEY, PinLevel::High);
    assert_eq!(read_i32(&file), KEY_RELEASED);

    let mut short = [0u8; 2];
    assert_eq!(file.read(&mut short), Err(FileError::TransferFault));
    assert_eq!(file.write(&[1]), Err(FileError::NotSupported));
}

#[test]
fn sampling_key_reports_latest_tick() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let period = NonZeroU32::new(10).unwrap();
    let key = PeripheralInstance::activate(
        peripheral::key().with_scheduler(SchedulerConfig::sample(period)),
        &ctx,
    )
    .unwrap();
    let file = rig.registry.open("/dev/key").unwrap();

    rig.board.gpio.drive_external(KEY, PinLevel::Low);
    // No tick yet: the line is read directly.
    assert_eq!(read_i32(&file), KEY_PRESSED);

    rig.board.clock.advance_ms(10);
    rig.board.gpio.drive_external(KEY, PinLevel::High);
    assert_eq!(read_i32(&file), KEY_PRESSED);
    rig.board.clock.advance_ms(10);
    assert_eq!(read_i32(&file), KEY_RELEASED);

    file.ioctl(CLOSE_CMD, UserBuffer::null()).unwrap();
    assert_eq!(key.schedule_state(), ScheduleState::Stopped);
    rig.board.gpio.drive_external(KEY, PinLevel::Low);
    assert_eq!(read_i32(&file), KEY_PRESSED);
}

#[test]
fn beep_sounds_at_activation_and_stops_on_deactivate() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let mut beep = PeripheralInstance::activate(peripheral::beep(), &ctx).unwrap();
    assert_eq!(rig.board.gpio.driven_level(BEEP), Some(PinLevel::Low));

    let file = rig.registry.open("/dev/beep").unwrap();
    file.write(&[0]).unwrap();
    assert_eq!(rig.board.gpio.driven_level(BEEP), Some(PinLevel::High));
    file.write(&[1]).unwrap();
    drop(file);

    beep.deactivate();
    assert!(!beep.is_bound());
    assert!(!rig.board.gpio.is_requested(BEEP));
    rig.assert_clean();
}

#[test]
fn missing_property_rolls_back_everything() {
    let rig = Rig::new();
    let ctx = rig.ctx();

    let err = PeripheralInstance::activate(peripheral::gpio_led().with_property("nope-gpios"), &ctx).unwrap_err();
    assert_eq!(
        err,
        ActivationError::Binding(BindError::PropertyNotFound("nope-gpios".into()))
    );
    rig.assert_clean();

    let led = PeripheralInstance::activate(peripheral::gpio_led(), &ctx).unwrap();
    assert!(led.is_bound());
}

#[test]
fn busy_line_rolls_back_node_and_identifier() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let _timer = PeripheralInstance::activate(peripheral::timer_led(), &ctx).unwrap();

    let err = PeripheralInstance::activate(peripheral::gpio_led(), &ctx).unwrap_err();
    assert_eq!(err, ActivationError::Binding(BindError::LineBusy(LED)));
    assert_eq!(rig.registry.nodes(), vec!["/dev/timer".to_string()]);
    assert_eq!(rig.registry.allocated_regions(), 1);
}

#[test]
fn fixed_major_in_use_fails_before_publishing() {
    let rig = Rig::new();
    rig.registry.allocate("chrdevbase", 1, Some(200)).unwrap();
    let ctx = rig.ctx();

    let err = PeripheralInstance::activate(peripheral::gpio_led().with_major(200), &ctx).unwrap_err();
    assert_eq!(err, ActivationError::Registry(RegistryError::IdentifierInUse(200)));
    assert!(rig.registry.nodes().is_empty());
    assert_eq!(rig.board.gpio.requested_count(), 0);
}

#[test]
fn duplicate_activation_fails_on_class() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let _led = PeripheralInstance::activate(peripheral::gpio_led(), &ctx).unwrap();

    let err = PeripheralInstance::activate(peripheral::gpio_led(), &ctx).unwrap_err();
    assert_eq!(err, ActivationError::Registry(RegistryError::ClassExists("gpioled".into())));
    assert_eq!(rig.registry.allocated_regions(), 1);
}

#[test]
fn no_free_alarm_releases_line() {
    let rig = Rig::with_board(VirtualBoard::with_channels(0));
    let ctx = rig.ctx();

    let err = PeripheralInstance::activate(peripheral::timer_led(), &ctx).unwrap_err();
    assert_eq!(err, ActivationError::Timer(TimerError::NoFreeChannel));
    rig.assert_clean();
}

#[test]
fn timer_led_toggles_and_obeys_commands() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let timer = PeripheralInstance::activate(peripheral::timer_led(), &ctx).unwrap();
    let gpio = &rig.board.gpio;
    let clock = &rig.board.clock;

    assert_eq!(timer.schedule_state(), ScheduleState::Armed);
    assert_eq!(gpio.driven_level(LED), Some(PinLevel::High));
    clock.advance_ms(499);
    assert_eq!(gpio.driven_level(LED), Some(PinLevel::High));
    clock.advance_ms(1);
    assert_eq!(gpio.driven_level(LED), Some(PinLevel::Low));
    clock.advance_ms(500);
    assert_eq!(gpio.driven_level(LED), Some(PinLevel::High));

    let file = rig.registry.open("/dev/timer").unwrap();
    file.ioctl(CLOSE_CMD, UserBuffer::null()).unwrap();
    clock.advance_ms(2000);
    assert_eq!(gpio.driven_level(LED), Some(PinLevel::High));
    assert_eq!(timer.schedule_state(), ScheduleState::Stopped);

    let zero = 0i32.to_ne_bytes();
    let negative = (-1i32).to_ne_bytes();
    assert_eq!(file.ioctl(SETPERIOD_CMD, UserBuffer::new(&zero)), Err(FileError::InvalidArgument));
    assert_eq!(file.ioctl(SETPERIOD_CMD, UserBuffer::new(&negative)).map_err(FileError::errno), Err(22));
    let scheduler = timer.scheduler().unwrap();
    assert_eq!(scheduler.period_ms().get(), 500);

    let hundred = 100i32.to_ne_bytes();
    file.ioctl(SETPERIOD_CMD, UserBuffer::new(&hundred)).unwrap();
    assert_eq!(timer.schedule_state(), ScheduleState::Stopped);
    file.ioctl(OPEN_CMD, UserBuffer::null()).unwrap();
    clock.advance_ms(100);
    assert_eq!(gpio.driven_level(LED), Some(PinLevel::Low));

    assert_eq!(file.ioctl(0xDEAD, UserBuffer::null()), Ok(()));
    assert_eq!(file.ioctl(SETPERIOD_CMD, UserBuffer::new(&[1])), Err(FileError::TransferFault));
}

#[test]
fn commands_on_plain_led_are_not_supported() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let _led = PeripheralInstance::activate(peripheral::gpio_led(), &ctx).unwrap();
    let file = rig.registry.open("/dev/gpioled").unwrap();
    assert_eq!(file.ioctl(OPEN_CMD, UserBuffer::null()), Err(FileError::NotSupported));
    assert_eq!(file.ioctl(0x1234, UserBuffer::null()), Ok(()));
}

#[test]
fn deactivate_releases_in_reverse_and_is_idempotent() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let mut timer = PeripheralInstance::activate(peripheral::timer_led(), &ctx).unwrap();
    let scheduler = timer.scheduler().unwrap();
    rig.board.clock.advance_ms(500);
    assert_eq!(rig.board.gpio.driven_level(LED), Some(PinLevel::Low));

    let file = rig.registry.open("/dev/timer").unwrap();
    timer.deactivate();
    timer.deactivate();

    assert_eq!(scheduler.state(), ScheduleState::Shutdown);
    assert_eq!(rig.board.clock.pending(), 0);
    rig.assert_clean();
    assert_eq!(rig.board.gpio.faults(), 0);

    // Handles that outlive the device see it gone.
    assert_eq!(file.write(&[1]), Err(FileError::NoDevice));
    assert_eq!(file.ioctl(OPEN_CMD, UserBuffer::null()), Err(FileError::NotSupported));
    drop(file);

    rig.board.clock.advance_ms(5000);
    assert_eq!(rig.board.gpio.faults(), 0);
}

#[test]
fn start_after_deactivate_cannot_rearm() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let mut timer = PeripheralInstance::activate(peripheral::timer_led(), &ctx).unwrap();
    // A handle taken before teardown, as an ioctl in flight would hold.
    let in_flight = timer.scheduler().unwrap();
    let file = rig.registry.open("/dev/timer").unwrap();
    rig.board.clock.advance_ms(1000);
    let fired = in_flight.fired();

    timer.deactivate();
    in_flight.start();
    in_flight.arm(NonZeroU32::new(10).unwrap());
    assert_eq!(file.ioctl(OPEN_CMD, UserBuffer::null()), Err(FileError::NotSupported));
    rig.board.clock.advance_ms(5000);

    assert_eq!(in_flight.state(), ScheduleState::Shutdown);
    assert_eq!(in_flight.fired(), fired);
    assert_eq!(rig.board.clock.pending(), 0);
    assert_eq!(rig.board.clock.claimed(), 0);
    assert_eq!(std::sync::Arc::strong_count(&in_flight), 1);
    drop(file);
    rig.assert_clean();
    assert_eq!(rig.board.gpio.faults(), 0);
}

#[test]
fn stopped_initial_state_waits_for_start() {
    let rig = Rig::new();
    let ctx = rig.ctx();
    let cfg = peripheral::gpio_led()
        .initially_active(false)
        .with_scheduler(SchedulerConfig::default().stopped());
    let led = PeripheralInstance::activate(cfg, &ctx).unwrap();
    rig.board.clock.advance_ms(5000);
    assert_eq!(led.schedule_state(), ScheduleState::Stopped);
    assert_eq!(rig.board.gpio.driven_level(LED), Some(PinLevel::High));

    let file = rig.registry.open("/dev/gpioled").unwrap();
    file.ioctl(OPEN_CMD, UserBuffer::null()).unwrap();
    rig.board.clock.advance_ms(500);
    assert_eq!(rig.board.gpio.driven_level(LED), Some(PinLevel::Low));
}

#[test]
fn drop_deactivates() {
    let rig = Rig::new();
    {
        let ctx = rig.ctx();
        let _key = PeripheralInstance::activate(peripheral::key(), &ctx).unwrap();
        assert!(rig.board.gpio.is_requested(KEY));
    }
    rig.assert_clean();
}
