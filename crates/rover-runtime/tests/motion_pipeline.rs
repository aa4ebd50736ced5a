//! End-to-end scenarios: command source → sync loop → kinematics → simulated
//! hardware.

use std::time::{Duration, Instant};

use rover_hal::servo::angle_to_duty;
use rover_hal::{ActuationConfig, MotorPins, RoverDriver, SimBackend, SimLog};
use rover_kernel::{DriveMode, Kinematics, KinematicsConfig};
use rover_runtime::{CommandStore, MotionContext, SyncConfig, SyncLoop};
use rover_types::{Command, ConnectionState, WatchdogState};
use tokio::sync::watch;

const LEFT_IN1: u8 = 17;
const LEFT_PWM: u8 = 12;
const RIGHT_IN1: u8 = 5;
const RIGHT_PWM: u8 = 13;
const FRONT_LEFT: u8 = 23;
const FRONT_RIGHT: u8 = 24;
const REAR_LEFT: u8 = 25;
const REAR_RIGHT: u8 = 8;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn build(
    backend: &mut SimBackend,
    actuation: &ActuationConfig,
    kinematics: &KinematicsConfig,
    store: &CommandStore,
) -> SyncLoop<CommandStore, RoverDriver> {
    let driver = RoverDriver::new(backend, actuation);
    let config = SyncConfig::default();
    let ctx = MotionContext::new(
        driver,
        Kinematics::new(kinematics),
        config.watchdog_timeout(),
        Instant::now(),
    );
    SyncLoop::new(ctx, store.clone(), config)
}

fn default_rover(store: &CommandStore) -> (SyncLoop<CommandStore, RoverDriver>, SimLog) {
    let mut backend = SimBackend::new();
    let log = backend.log();
    let sync = build(
        &mut backend,
        &ActuationConfig::default(),
        &KinematicsConfig::default(),
        store,
    );
    (sync, log)
}

#[tokio::test]
async fn full_right_turn_spins_and_counter_steers() {
    let store = CommandStore::new();
    let (mut sync, log) = default_rover(&store);

    store.drive(100, 0, 100);
    sync.step(Instant::now()).await;

    assert_eq!(log.level(LEFT_IN1), Some(true));
    assert_eq!(log.last_duty(LEFT_PWM), Some(100.0));
    assert_eq!(log.level(RIGHT_IN1), Some(false));
    assert_eq!(log.last_duty(RIGHT_PWM), Some(100.0));

    assert_eq!(log.last_duty(FRONT_LEFT), Some(angle_to_duty(110.0)));
    assert_eq!(log.last_duty(FRONT_RIGHT), Some(angle_to_duty(110.0)));
    assert_eq!(log.last_duty(REAR_LEFT), Some(angle_to_duty(70.0)));
    assert_eq!(log.last_duty(REAR_RIGHT), Some(angle_to_duty(70.0)));
}

#[tokio::test]
async fn silent_link_stops_once_then_recovers() {
    let store = CommandStore::new();
    let (mut sync, log) = default_rover(&store);
    let t0 = Instant::now();

    store.drive(0, 50, 100);
    sync.step(t0).await;
    store.set_offline(true);

    sync.step(t0 + ms(1100)).await;
    let writes_after_stop = log.len();
    assert_eq!(log.last_duty(LEFT_PWM), Some(0.0));
    assert_eq!(sync.status(t0 + ms(1100)).watchdog, WatchdogState::Stopped);

    // Another second of silence: no further hardware traffic.
    sync.step(t0 + ms(2100)).await;
    assert_eq!(log.len(), writes_after_stop);

    // Link back with a fresh command: watchdog re-armed, motors running.
    store.set_offline(false);
    store.drive(0, 30, 100);
    sync.step(t0 + ms(2200)).await;
    let status = sync.status(t0 + ms(2200));
    assert_eq!(status.watchdog, WatchdogState::Active);
    assert_eq!(status.connection, ConnectionState::Online);
    assert_eq!(log.last_duty(LEFT_PWM), Some(30.0));
}

#[tokio::test]
async fn jittery_servo_override_writes_only_real_moves() {
    let store = CommandStore::new();
    let (mut sync, log) = default_rover(&store);
    let t0 = Instant::now();

    for (i, angle) in [45, 45, 46, 48].into_iter().enumerate() {
        store.submit(Command::new(0, 0, 0, 0).with_servo_angles([angle, 90, 90, 90]));
        sync.step(t0 + ms(50 * i as u64)).await;
    }

    // The repeated 45° is suppressed; 46° is a full degree away and is written.
    assert_eq!(
        log.duty_writes(FRONT_LEFT),
        vec![angle_to_duty(45.0), angle_to_duty(46.0), angle_to_duty(48.0)]
    );
    assert_eq!(log.duty_writes(FRONT_RIGHT).len(), 1);
}

#[tokio::test]
async fn broken_servo_pin_leaves_rest_of_rover_working() {
    let store = CommandStore::new();
    let mut backend = SimBackend::new().with_failing_pin(REAR_LEFT);
    let log = backend.log();
    let mut sync = build(
        &mut backend,
        &ActuationConfig::default(),
        &KinematicsConfig::default(),
        &store,
    );

    store.drive(-50, 50, 100);
    sync.step(Instant::now()).await;

    assert!(log.duty_writes(REAR_LEFT).is_empty());
    assert_eq!(log.last_duty(FRONT_LEFT), Some(angle_to_duty(80.0)));
    assert_eq!(log.last_duty(REAR_RIGHT), Some(angle_to_duty(100.0)));
    assert_eq!(log.last_duty(LEFT_PWM), Some(0.0));
    assert_eq!(log.last_duty(RIGHT_PWM), Some(100.0));
}

#[tokio::test]
async fn unified_single_motor_configuration() {
    let store = CommandStore::new();
    let mut backend = SimBackend::new();
    let log = backend.log();
    let actuation = ActuationConfig {
        motors: MotorPins::SingleChannel { dir: 16, pwm: 12 },
        ..ActuationConfig::default()
    };
    let kinematics = KinematicsConfig {
        mode: DriveMode::Unified,
        ..KinematicsConfig::default()
    };
    let mut sync = build(&mut backend, &actuation, &kinematics, &store);

    store.drive(100, -60, 80);
    sync.step(Instant::now()).await;

    assert_eq!(log.level(16), Some(false));
    assert_eq!(log.last_duty(12), Some(60.0));
    assert_eq!(log.last_duty(FRONT_LEFT), Some(angle_to_duty(110.0)));
}

#[tokio::test]
async fn shutdown_always_halts_the_rover() {
    let store = CommandStore::new();
    let (mut sync, log) = default_rover(&store);
    let mut status_rx = sync.subscribe_status();
    store.drive(20, 80, 100);

    let (tx, rx) = watch::channel(false);
    let producer = store.clone();
    let driver_task = tokio::spawn(async move {
        tokio::time::sleep(ms(100)).await;
        producer.drive(0, -40, 100);
        tokio::time::sleep(ms(100)).await;
        tx.send(true).unwrap();
    });

    sync.run(rx).await;
    driver_task.await.unwrap();

    assert!(log.duty_writes(LEFT_PWM).contains(&100.0));
    assert!(log.duty_writes(LEFT_PWM).contains(&40.0));
    assert_eq!(log.last_duty(LEFT_PWM), Some(0.0));
    assert_eq!(log.last_duty(RIGHT_PWM), Some(0.0));
    for pin in [FRONT_LEFT, FRONT_RIGHT, REAR_LEFT, REAR_RIGHT] {
        assert_eq!(log.last_duty(pin), Some(0.0));
    }
    assert!(status_rx.has_changed().unwrap());
    assert_eq!(status_rx.borrow_and_update().connection, ConnectionState::Online);
}

#[tokio::test]
async fn dropped_shutdown_sender_ends_the_loop() {
    let store = CommandStore::new();
    let (mut sync, log) = default_rover(&store);
    store.drive(0, 50, 100);

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(ms(80)).await;
        drop(tx);
    });
    tokio::time::timeout(Duration::from_secs(2), sync.run(rx))
        .await
        .expect("loop must end when the shutdown sender goes away");
    assert_eq!(log.last_duty(LEFT_PWM), Some(0.0));
}
