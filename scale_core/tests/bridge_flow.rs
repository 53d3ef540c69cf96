//! End-to-end behaviour of the bridge loop against scripted devices.

use rstest::rstest;
use scale_core::decoder::{UNIT_GRAMS, frame};
use scale_core::mocks::ScriptedSource;
use scale_core::status::code;
use scale_core::{
    Availability, Bridge, BridgeCfg, DeviceStatus, OperatorCommand, Phase, PublishEvent, Unit,
    WeightUpdate,
};
use scale_traits::ReadError;
use scale_traits::clock::test_clock::TestClock;
use std::time::Duration;

const ONLINE: PublishEvent = PublishEvent::Availability(Availability::Online);
const OFFLINE: PublishEvent = PublishEvent::Availability(Availability::Offline);

fn grams(status: u8, g: u16) -> [u8; 6] {
    frame(status, UNIT_GRAMS, 0, g)
}

fn weight(g: i32, status: DeviceStatus) -> PublishEvent {
    PublishEvent::Weight(WeightUpdate {
        weight_cg: g * 100,
        unit: Unit::Grams,
        status,
        forced: false,
    })
}

fn build(source: ScriptedSource, cfg: BridgeCfg) -> (Bridge<ScriptedSource, TestClock>, TestClock) {
    let clock = TestClock::new();
    let bridge = Bridge::builder()
        .with_source(source)
        .with_config(cfg)
        .with_clock(clock.clone())
        .try_build()
        .expect("valid bridge");
    (bridge, clock)
}

fn five_gram_cfg() -> BridgeCfg {
    BridgeCfg {
        debounce_cg: 500,
        ..BridgeCfg::default()
    }
}

/// Tick until the script runs dry, advancing the clock by `step` before each read.
fn drain(
    bridge: &mut Bridge<ScriptedSource, TestClock>,
    clock: &TestClock,
    step: Duration,
) -> Vec<PublishEvent> {
    let mut events = Vec::new();
    while bridge.source().remaining() > 0 {
        clock.advance(step);
        events.extend(bridge.tick([]).events);
    }
    events
}

#[rstest]
fn small_changes_are_debounced() {
    let src = ScriptedSource::new()
        .report(grams(code::STABLE, 1000))
        .report(grams(code::STABLE, 1002))
        .report(grams(code::STABLE, 1010))
        .report(grams(code::STABLE, 1010))
        .report(grams(code::STABLE, 1010));
    let (mut bridge, clock) = build(src, five_gram_cfg());
    let events = drain(&mut bridge, &clock, Duration::from_millis(100));
    assert_eq!(
        events,
        vec![
            ONLINE,
            weight(1000, DeviceStatus::Stable),
            weight(1010, DeviceStatus::Stable),
        ]
    );
}

#[rstest]
fn silence_marks_offline_and_next_reading_recovers() {
    let src = ScriptedSource::new()
        .report(grams(code::STABLE, 800))
        .errors(ReadError::Timeout, 31)
        .report(grams(code::STABLE, 500));
    let (mut bridge, clock) = build(src, five_gram_cfg());

    let first = bridge.tick([]).events;
    assert_eq!(first, vec![ONLINE, weight(800, DeviceStatus::Stable)]);

    for second in 1..=30 {
        clock.advance(Duration::from_secs(1));
        let tick = bridge.tick([]);
        assert!(tick.events.is_empty(), "unexpected events at {second}s: {:?}", tick.events);
    }
    clock.advance(Duration::from_secs(1));
    assert_eq!(bridge.tick([]).events, vec![OFFLINE]);
    assert_eq!(bridge.snapshot().phase(), Phase::Idle);
    assert!(bridge.snapshot().last_published.is_none());

    clock.advance(Duration::from_secs(1));
    assert_eq!(
        bridge.tick([]).events,
        vec![ONLINE, weight(500, DeviceStatus::Stable)]
    );
}

#[rstest]
fn status_change_without_weight_change() {
    let src = ScriptedSource::new()
        .report(grams(code::STABLE, 1000))
        .report(grams(code::OVER_WEIGHT, 1000));
    let (mut bridge, clock) = build(src, five_gram_cfg());
    let events = drain(&mut bridge, &clock, Duration::from_millis(100));
    assert_eq!(
        events,
        vec![
            ONLINE,
            weight(1000, DeviceStatus::Stable),
            PublishEvent::Status(DeviceStatus::Overload),
        ]
    );
}

#[rstest]
fn settling_publishes_final_weight_below_threshold() {
    let src = ScriptedSource::new()
        .report(grams(code::IN_MOTION, 1000))
        .report(grams(code::IN_MOTION, 1003))
        .report(grams(code::STABLE, 1003));
    let (mut bridge, clock) = build(src, five_gram_cfg());
    let events = drain(&mut bridge, &clock, Duration::from_millis(100));
    assert_eq!(
        events,
        vec![
            ONLINE,
            weight(1000, DeviceStatus::InMotion),
            PublishEvent::Status(DeviceStatus::Stable),
            weight(1003, DeviceStatus::Stable),
        ]
    );
}

#[rstest]
fn unplug_needs_consecutive_failures() {
    let src = ScriptedSource::new()
        .report(grams(code::STABLE, 100))
        .error(ReadError::Absent)
        .error(ReadError::Absent)
        .report(grams(code::STABLE, 100))
        .errors(ReadError::Absent, 3);
    let (mut bridge, clock) = build(src, five_gram_cfg());
    let events = drain(&mut bridge, &clock, Duration::from_millis(100));
    assert_eq!(
        events,
        vec![ONLINE, weight(100, DeviceStatus::Stable), OFFLINE]
    );
}

#[rstest]
fn timeout_breaks_the_failure_streak() {
    let src = ScriptedSource::new()
        .report(grams(code::STABLE, 100))
        .error(ReadError::Absent)
        .error(ReadError::Absent)
        .error(ReadError::Timeout)
        .error(ReadError::Absent);
    let (mut bridge, clock) = build(src, five_gram_cfg());
    let events = drain(&mut bridge, &clock, Duration::from_millis(100));
    assert_eq!(events, vec![ONLINE, weight(100, DeviceStatus::Stable)]);
}

#[rstest]
fn io_errors_count_like_absence() {
    let src = ScriptedSource::new()
        .report(grams(code::STABLE, 100))
        .errors(ReadError::Io("EIO".into()), 3);
    let (mut bridge, clock) = build(src, five_gram_cfg());
    let events = drain(&mut bridge, &clock, Duration::from_millis(100));
    assert_eq!(events.last(), Some(&OFFLINE));
}

#[rstest]
fn absence_slows_polling_until_device_returns() {
    let src = ScriptedSource::new()
        .error(ReadError::Absent)
        .report(grams(code::STABLE, 100));
    let (mut bridge, _clock) = build(src, five_gram_cfg());
    assert_eq!(bridge.tick([]).next_delay, Duration::from_millis(5000));
    assert_eq!(bridge.tick([]).next_delay, Duration::from_millis(100));
}

#[rstest]
fn recovery_republishes_unchanged_weight() {
    let src = ScriptedSource::new()
        .report(grams(code::STABLE, 250))
        .errors(ReadError::Absent, 3)
        .report(grams(code::STABLE, 250));
    let (mut bridge, clock) = build(src, five_gram_cfg());
    let events = drain(&mut bridge, &clock, Duration::from_millis(100));
    assert_eq!(
        events,
        vec![
            ONLINE,
            weight(250, DeviceStatus::Stable),
            OFFLINE,
            ONLINE,
            weight(250, DeviceStatus::Stable),
        ]
    );
}

#[rstest]
fn send_forces_publish_of_current_reading() {
    let src = ScriptedSource::new()
        .report(grams(code::STABLE, 1000))
        .report(grams(code::STABLE, 1001));
    let (mut bridge, _clock) = build(src, five_gram_cfg());
    bridge.tick([]);
    let tick = bridge.tick([OperatorCommand::Send]);
    assert_eq!(
        tick.events,
        vec![PublishEvent::Weight(WeightUpdate {
            weight_cg: 100_100,
            unit: Unit::Grams,
            status: DeviceStatus::Stable,
            forced: true,
        })]
    );
}

#[rstest]
fn software_tare_when_device_cannot_zero() {
    let src = ScriptedSource::new()
        .report(grams(code::STABLE, 300))
        .report(grams(code::STABLE, 300))
        .report(grams(code::STABLE, 320));
    let (mut bridge, _clock) = build(src, five_gram_cfg());
    bridge.tick([]);
    let tared = bridge.tick([OperatorCommand::Tare]);
    assert_eq!(tared.events.len(), 1);
    assert_eq!(tared.events[0].weight_cg(), Some(0));
    assert_eq!(bridge.snapshot().tare_offset_cg, 30_000);
    let after = bridge.tick([]);
    assert_eq!(after.events, vec![weight(20, DeviceStatus::Stable)]);
}

#[rstest]
fn commands_while_offline_do_nothing() {
    let src = ScriptedSource::new().then(ReadError::Absent);
    let (mut bridge, _clock) = build(src, five_gram_cfg());
    let tick = bridge.tick([OperatorCommand::Send, OperatorCommand::Tare]);
    assert!(tick.events.is_empty());
}
