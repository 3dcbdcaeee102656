mod common;

use common::*;
use embedded_hal::i2c::ErrorKind;
use embedded_hal_mock::eh1::i2c::{Mock, Transaction};
use mcp4461::{
    Addressing, EepromLocation, FailureCause, Mcp4461, Mcp4461Builder, Mcp4461Error, Terminal,
    TerminalConnector, Wiper, encode_write,
};
use rand::Rng;

fn build(expectations: &[Transaction]) -> (Mock, TickDelay, Mcp4461<Mock, TickDelay>) {
    build_with(Mcp4461Builder::default(), expectations)
}

fn build_with(
    builder: Mcp4461Builder,
    expectations: &[Transaction],
) -> (Mock, TickDelay, Mcp4461<Mock, TickDelay>) {
    let i2c = Mock::new(expectations);
    let delay = TickDelay::default();
    let dev = builder
        .build(i2c.clone(), delay.clone())
        .expect("device setup failed");
    (i2c, delay, dev)
}

#[test]
fn setup_seeds_cache_from_device() {
    let levels = [10, 20, 30, 256, 40, 50, 60, 0x100];
    let (mut i2c, _, dev) = build(&setup(STATUS_OK, levels));
    for (wiper, level) in Wiper::ALL.into_iter().zip(levels) {
        assert_eq!(dev.channel(wiper).state, level);
        assert!(!dev.channel(wiper).is_pending());
    }
    assert!(!dev.is_dirty());
    assert!(!dev.is_write_protected());
    i2c.done();
}

#[test]
fn staged_levels_are_flushed_in_order_and_read_back() {
    let expectations = with(
        setup(STATUS_OK, [0; 8]),
        [
            write(&[0x01, 0x00]),
            write(&[0x10, 0x01]),
            write(&[0x60, 0x80]),
            write(&[0x70, 0xc8]),
        ],
    );
    let (mut i2c, _, mut dev) = build(&expectations);
    let levels = [256, 1, 128, 200];
    // staged in reverse, written in index order
    for (wiper, level) in Wiper::ALL[..4].iter().zip(levels).rev() {
        dev.set_wiper_level(*wiper, level).unwrap();
    }
    assert!(dev.is_dirty());
    dev.poll().unwrap();
    assert!(!dev.is_dirty());
    for (wiper, level) in Wiper::ALL[..4].iter().zip(levels) {
        assert_eq!(dev.get_wiper_level(*wiper).unwrap(), level);
    }
    // nothing left to send
    dev.poll().unwrap();
    i2c.done();
}

#[test]
fn every_volatile_wiper_round_trips_any_level() {
    let mut rng = rand::rng();
    let mut rounds = vec![[0, 256, 0, 256], [256, 0, 256, 0]];
    rounds.extend((0..50).map(|_| core::array::from_fn(|_| rng.random_range(0..=256u16))));

    let mut expectations = setup(STATUS_OK, [7; 8]);
    let mut on_device = [7u16; 4];
    for round in &rounds {
        for (i, level) in round.iter().enumerate() {
            if on_device[i] != *level {
                expectations.push(write(&encode_write(Wiper::ALL[i].address(), *level)));
                on_device[i] = *level;
            }
        }
    }
    let (mut i2c, _, mut dev) = build(&expectations);
    for round in &rounds {
        for (wiper, level) in Wiper::ALL[..4].iter().zip(round) {
            dev.set_wiper_level(*wiper, *level).unwrap();
        }
        dev.poll().unwrap();
        for (wiper, level) in Wiper::ALL[..4].iter().zip(round) {
            assert_eq!(dev.get_wiper_level(*wiper).unwrap(), *level);
        }
    }
    i2c.done();
}

#[test]
fn out_of_range_level_leaves_cache_alone() {
    let expectations = with(setup(STATUS_OK, [42; 8]), [status(STATUS_OK)]);
    let (mut i2c, _, mut dev) = build(&expectations);
    assert_eq!(
        dev.set_wiper_level(Wiper::Wiper0, 257),
        Err(Mcp4461Error::ValueOutOfRange)
    );
    assert_eq!(dev.get_wiper_level(Wiper::Wiper0).unwrap(), 42);
    assert!(dev.has_warning());
    assert!(!dev.is_dirty());
    // the warning triggers a status refresh, then clears
    dev.poll().unwrap();
    assert!(!dev.has_warning());
    i2c.done();
}

#[test]
fn locked_network_refuses_every_mutation() {
    let locked = STATUS_OK | 0x04;
    let (mut i2c, _, mut dev) = build(&setup(locked, [77; 8]));
    assert!(dev.channel(Wiper::Wiper0).wiper_lock_active);
    assert!(dev.channel(Wiper::Wiper4).wiper_lock_active);
    assert!(!dev.channel(Wiper::Wiper1).wiper_lock_active);

    assert_eq!(
        dev.set_wiper_level(Wiper::Wiper0, 1),
        Err(Mcp4461Error::WiperLocked)
    );
    assert_eq!(dev.increase_wiper(Wiper::Wiper0), Err(Mcp4461Error::WiperLocked));
    assert_eq!(dev.decrease_wiper(Wiper::Wiper0), Err(Mcp4461Error::WiperLocked));
    assert_eq!(dev.disable_wiper(Wiper::Wiper0), Err(Mcp4461Error::WiperLocked));
    assert_eq!(
        dev.disable_terminal(Wiper::Wiper0, 'a'),
        Err(Mcp4461Error::WiperLocked)
    );
    assert_eq!(
        dev.set_wiper_level(Wiper::Wiper4, 1),
        Err(Mcp4461Error::WiperLocked)
    );
    assert_eq!(dev.channel(Wiper::Wiper0).state, 77);
    assert!(dev.channel(Wiper::Wiper0).terminal_a);
    assert!(!dev.is_dirty());
    i2c.done();
}

#[test]
fn lock_raised_after_staging_holds_the_write() {
    let locked = STATUS_OK | 0x04;
    let expectations = with(setup(STATUS_OK, [0; 8]), [status(locked)]);
    let (mut i2c, _, mut dev) = build(&expectations);
    dev.set_wiper_level(Wiper::Wiper0, 5).unwrap();
    // any refusal makes the next poll re-read the status register
    assert!(dev.set_wiper_level(Wiper::Wiper1, 257).is_err());
    dev.poll().unwrap();
    assert!(!dev.is_failed());
    assert!(dev.has_warning());
    assert!(dev.channel(Wiper::Wiper0).wiper_lock_active);
    assert_eq!(dev.channel(Wiper::Wiper0).state, 5);
    assert!(dev.channel(Wiper::Wiper0).is_pending());
    i2c.done();
}

#[test]
fn increase_then_decrease_restores_level() {
    let mut levels = [50; 8];
    levels[2] = 256;
    let expectations = with(
        setup(STATUS_OK, levels),
        [write(&[0x14]), write(&[0x18]), write(&[0x64]), write(&[0x68])],
    );
    let (mut i2c, _, mut dev) = build(&expectations);
    dev.increase_wiper(Wiper::Wiper1).unwrap();
    assert_eq!(dev.get_wiper_level(Wiper::Wiper1).unwrap(), 51);
    dev.decrease_wiper(Wiper::Wiper1).unwrap();
    assert_eq!(dev.get_wiper_level(Wiper::Wiper1).unwrap(), 50);

    // saturates at full scale
    dev.increase_wiper(Wiper::Wiper2).unwrap();
    assert_eq!(dev.get_wiper_level(Wiper::Wiper2).unwrap(), 256);
    dev.decrease_wiper(Wiper::Wiper2).unwrap();
    assert_eq!(dev.get_wiper_level(Wiper::Wiper2).unwrap(), 255);

    assert_eq!(
        dev.increase_wiper(Wiper::Wiper5),
        Err(Mcp4461Error::VolatileOnly)
    );
    i2c.done();
}

#[test]
fn staged_level_lands_before_a_step() {
    let expectations = with(
        setup(STATUS_OK, [0; 8]),
        [write(&[0x00, 0x0a]), write(&[0x04])],
    );
    let (mut i2c, _, mut dev) = build(&expectations);
    dev.set_wiper_level(Wiper::Wiper0, 10).unwrap();
    dev.increase_wiper(Wiper::Wiper0).unwrap();
    assert_eq!(dev.channel(Wiper::Wiper0).state, 11);
    assert!(!dev.channel(Wiper::Wiper0).is_pending());
    dev.poll().unwrap();
    i2c.done();
}

#[test]
fn eeprom_write_waits_for_running_cycle() {
    let expectations = with(
        setup(STATUS_OK, [0; 8]),
        [
            status(EEPROM_BUSY),
            status(EEPROM_BUSY),
            status(STATUS_OK),
            write(&[0xb1, 0xab]),
        ],
    );
    let (mut i2c, delay, mut dev) = build(&expectations);
    dev.set_eeprom_value(EepromLocation::Eeprom0, 0x1ab).unwrap();
    assert_eq!(delay.elapsed_ms(), 2);
    i2c.done();
}

#[test]
fn eeprom_timeout_is_exact_and_sticky() {
    let mut expectations = setup(STATUS_OK, [0; 8]);
    // one initial reading plus one per millisecond of the timeout
    expectations.extend((0..11).map(|_| status(EEPROM_BUSY)));
    // the next access gives up after one reading
    expectations.push(status(EEPROM_BUSY));
    // a finished cycle clears the timeout
    expectations.push(status(STATUS_OK));
    expectations.push(read(0xec, 0x1ff));
    let (mut i2c, delay, mut dev) = build(&expectations);

    assert_eq!(
        dev.get_eeprom_value(EepromLocation::Eeprom3),
        Err(Mcp4461Error::EepromBusy)
    );
    assert_eq!(delay.elapsed_ms(), 10);
    assert_eq!(dev.is_eeprom_ready(true), Ok(false));
    assert_eq!(delay.elapsed_ms(), 10);
    assert_eq!(dev.get_eeprom_value(EepromLocation::Eeprom3).unwrap(), 0x1ff);
    assert!(!dev.is_failed());
    i2c.done();
}

#[test]
fn custom_eeprom_timeout() {
    let mut expectations = setup(STATUS_OK, [0; 8]);
    expectations.extend((0..4).map(|_| status(EEPROM_BUSY)));
    let i2c = Mock::new(&expectations);
    let delay = TickDelay::default();
    let mut dev = Mcp4461Builder::default()
        .with_eeprom_timeout(3)
        .build(i2c.clone(), delay.clone())
        .unwrap();
    assert_eq!(dev.is_eeprom_ready(true), Ok(false));
    assert_eq!(delay.elapsed_ms(), 3);
    let (mut i2c, _) = dev.release();
    i2c.done();
}

#[test]
fn eeprom_value_range() {
    let (mut i2c, _, mut dev) = build(&setup(STATUS_OK, [0; 8]));
    assert_eq!(
        dev.set_eeprom_value(EepromLocation::Eeprom1, 512),
        Err(Mcp4461Error::ValueOutOfRange)
    );
    i2c.done();
}

#[test]
fn write_protect_blocks_non_volatile_memory() {
    let protected = STATUS_OK | 0x01;
    let (mut i2c, _, mut dev) = build(&setup(protected, [0; 8]));
    assert!(dev.is_write_protected());
    assert_eq!(
        dev.set_wiper_level(Wiper::Wiper6, 5),
        Err(Mcp4461Error::WriteProtected)
    );
    assert_eq!(
        dev.set_eeprom_value(EepromLocation::Eeprom4, 5),
        Err(Mcp4461Error::WriteProtected)
    );
    // volatile wipers are unaffected
    dev.set_wiper_level(Wiper::Wiper2, 5).unwrap();
    i2c.done();
}

#[test]
fn non_volatile_wiper_is_read_from_device() {
    let expectations = with(
        setup(STATUS_OK, [0; 8]),
        [status(STATUS_OK), read(0x3c, 0x00e1)],
    );
    let (mut i2c, _, mut dev) = build(&expectations);
    assert_eq!(dev.get_wiper_level(Wiper::Wiper5).unwrap(), 0xe1);
    i2c.done();
}

#[test]
fn non_volatile_wiper_is_flushed_through_the_gate() {
    let expectations = with(
        setup(STATUS_OK, [0; 8]),
        [status(STATUS_OK), write(&[0x81, 0x00])],
    );
    let (mut i2c, _, mut dev) = build(&expectations);
    dev.set_wiper_level(Wiper::Wiper6, 256).unwrap();
    dev.poll().unwrap();
    assert!(!dev.channel(Wiper::Wiper6).is_pending());
    i2c.done();
}

#[test]
fn invalid_status_fails_device() {
    let expectations = with(setup(STATUS_OK, [0; 8]), [status(0x0180)]);
    let (mut i2c, _, mut dev) = build(&expectations);
    assert_eq!(dev.status_register(), Err(Mcp4461Error::InvalidStatus(0x0180)));
    assert!(dev.is_failed());
    assert_eq!(dev.failure(), Some(FailureCause::InvalidStatus));
    let failed = Err(Mcp4461Error::Failed(FailureCause::InvalidStatus));
    assert_eq!(dev.set_wiper_level(Wiper::Wiper0, 3), failed);
    assert_eq!(dev.increase_wiper(Wiper::Wiper0), failed);
    assert_eq!(dev.poll(), failed);
    assert_eq!(
        dev.get_wiper_level(Wiper::Wiper0),
        Err(Mcp4461Error::Failed(FailureCause::InvalidStatus))
    );
    i2c.done();
}

#[test]
fn invalid_status_at_setup() {
    let mut i2c = Mock::new(&[probe(), status(0x0102)]);
    let res = Mcp4461Builder::default().build(i2c.clone(), TickDelay::default());
    assert!(matches!(res, Err(Mcp4461Error::InvalidStatus(0x0102))));
    i2c.done();
}

#[test]
fn missing_device_fails_probe() {
    let mut i2c = Mock::new(&[
        Transaction::write(0x2f, vec![]).with_error(ErrorKind::Other)
    ]);
    let res = Mcp4461Builder::default()
        .with_address(0x2f)
        .build(i2c.clone(), TickDelay::default());
    assert!(matches!(res, Err(Mcp4461Error::I2c(ErrorKind::Other))));
    i2c.done();
}

#[test]
fn wiper_reading_above_full_scale_fails_setup() {
    let mut i2c = Mock::new(&[probe(), status(STATUS_OK), read(WIPER_READ[0], 0x1ff)]);
    let res = Mcp4461Builder::default().build(i2c.clone(), TickDelay::default());
    assert!(matches!(res, Err(Mcp4461Error::InvalidReading(0x1ff))));
    i2c.done();
}

#[test]
fn wiper_reading_above_full_scale_is_not_cached() {
    let expectations = with(setup(STATUS_OK, [33; 8]), [read(WIPER_READ[2], 0x101)]);
    let (mut i2c, _, mut dev) = build(&expectations);
    assert_eq!(
        dev.update_wiper_level(Wiper::Wiper2),
        Err(Mcp4461Error::InvalidReading(0x101))
    );
    assert_eq!(dev.failure(), Some(FailureCause::InvalidReading));
    assert_eq!(dev.channel(Wiper::Wiper2).state, 33);
    assert_eq!(
        dev.get_wiper_level(Wiper::Wiper2),
        Err(Mcp4461Error::Failed(FailureCause::InvalidReading))
    );
    i2c.done();
}

#[test]
fn bus_error_is_fatal() {
    let expectations = with(
        setup(STATUS_OK, [0; 8]),
        [Transaction::write_read(ADDR, vec![0x0c], vec![0, 0]).with_error(ErrorKind::Other)],
    );
    let (mut i2c, _, mut dev) = build(&expectations);
    assert_eq!(
        dev.update_wiper_level(Wiper::Wiper0),
        Err(Mcp4461Error::I2c(ErrorKind::Other))
    );
    assert_eq!(dev.failure(), Some(FailureCause::Bus));
    assert_eq!(
        dev.get_eeprom_value(EepromLocation::Eeprom0),
        Err(Mcp4461Error::Failed(FailureCause::Bus))
    );
    i2c.done();
}

#[test]
fn disabled_wiper_is_isolated() {
    let expectations = vec![
        probe(),
        status(STATUS_OK),
        read(WIPER_READ[0], 1),
        read(WIPER_READ[2], 2),
        read(WIPER_READ[3], 3),
        status(STATUS_OK),
        read(WIPER_READ[4], 4),
        status(STATUS_OK),
        read(WIPER_READ[5], 5),
        status(STATUS_OK),
        read(WIPER_READ[6], 6),
        status(STATUS_OK),
        read(WIPER_READ[7], 7),
        read(TCON0_READ, 0xff),
        read(TCON1_READ, 0xff),
        // first pass: warning refresh, then wiper 1 disconnected
        status(STATUS_OK),
        write(&[0x40, 0x7f]),
    ];
    let (mut i2c, _, mut dev) = build_with(
        Mcp4461Builder::default().disable_wiper(Wiper::Wiper1),
        &expectations,
    );
    assert!(dev.is_dirty());
    assert_eq!(
        dev.get_wiper_level(Wiper::Wiper1),
        Err(Mcp4461Error::WiperDisabled)
    );
    assert!(dev.has_warning());
    assert_eq!(
        dev.set_wiper_level(Wiper::Wiper1, 9),
        Err(Mcp4461Error::WiperDisabled)
    );
    assert_eq!(dev.enable_wiper(Wiper::Wiper1), Err(Mcp4461Error::WiperDisabled));
    dev.poll().unwrap();
    assert!(!dev.has_warning());
    assert!(!dev.channel(Wiper::Wiper1).terminal_hw);
    assert_eq!(dev.channel(Wiper::Wiper1).state, 0);
    i2c.done();
}

#[test]
fn initial_value_is_written_before_seeding() {
    let mut expectations = setup(STATUS_OK, [0, 0, 64, 0, 0, 0, 0, 0]);
    // probe, status, wiper 0, wiper 1, then the write ahead of reading wiper 2
    expectations.insert(4, write(&[0x60, 0x40]));
    let (mut i2c, _, dev) = build_with(
        Mcp4461Builder::default().with_initial_value(Wiper::Wiper2, 0.25),
        &expectations,
    );
    assert_eq!(dev.channel(Wiper::Wiper2).state, 64);
    i2c.done();
}

#[test]
fn builder_terminal_settings_go_out_on_first_poll() {
    let expectations = with(
        setup(STATUS_OK, [0; 8]),
        [write(&[0x40, 0xfb]), write(&[0xa0, 0x7f])],
    );
    let (mut i2c, _, mut dev) = build_with(
        Mcp4461Builder::default()
            .disable_terminal(Wiper::Wiper0, Terminal::A)
            .disable_terminal(Wiper::Wiper3, Terminal::Hw)
            .disable_terminal(Wiper::Wiper6, Terminal::B),
        &expectations,
    );
    assert!(dev.is_dirty());
    assert!(!dev.channel(Wiper::Wiper0).terminal_a);
    dev.poll().unwrap();
    assert!(!dev.is_dirty());
    // already on the device
    dev.poll().unwrap();
    i2c.done();
}

#[test]
fn terminal_changes_are_packed_per_register() {
    let expectations = with(
        setup(STATUS_OK, [0; 8]),
        [write(&[0xa0, 0xfb]), write(&[0x40, 0x0f]), write(&[0xa0, 0xff])],
    );
    let (mut i2c, _, mut dev) = build(&expectations);
    dev.disable_terminal(Wiper::Wiper2, 'a').unwrap();
    assert_eq!(
        dev.disable_terminal(Wiper::Wiper2, 'x'),
        Err(Mcp4461Error::InvalidTerminal('x'))
    );
    assert_eq!(
        dev.disable_terminal(Wiper::Wiper7, 'a'),
        Err(Mcp4461Error::VolatileOnly)
    );
    dev.poll().unwrap();

    dev.set_terminal_register(TerminalConnector::Tcon0, 0x0f).unwrap();
    assert!(!dev.channel(Wiper::Wiper1).terminal_hw);
    assert!(!dev.channel(Wiper::Wiper1).terminal_a);
    assert!(dev.channel(Wiper::Wiper0).terminal_hw);

    dev.enable_terminal(Wiper::Wiper2, 'a').unwrap();
    dev.poll().unwrap();
    i2c.done();
}

#[test]
fn wiper_connection_toggles_hardware_bit() {
    let expectations = with(setup(STATUS_OK, [0; 8]), [write(&[0xa0, 0xf7])]);
    let (mut i2c, _, mut dev) = build(&expectations);
    dev.enable_wiper(Wiper::Wiper2).unwrap();
    assert!(!dev.is_dirty());
    dev.disable_wiper(Wiper::Wiper2).unwrap();
    dev.disable_wiper(Wiper::Wiper2).unwrap();
    dev.poll().unwrap();
    i2c.done();
}

#[test]
fn terminal_register_is_read_into_cache() {
    let expectations = with(setup(STATUS_OK, [0; 8]), [read(TCON1_READ, 0x00f0)]);
    let (mut i2c, _, mut dev) = build(&expectations);
    let tcon = dev.update_terminal_register(TerminalConnector::Tcon1).unwrap();
    assert_eq!(tcon.into_bits(), 0xf0);
    assert!(!dev.channel(Wiper::Wiper2).terminal_b);
    assert!(dev.channel(Wiper::Wiper3).terminal_hw);
    i2c.done();
}
