#![no_std]
#![no_main]
#![feature(type_alias_impl_trait)]

use domino_draw::{Controller, DrawConfig};
use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Ticker};
use embedded_hal::digital::v2::InputPin;
use esp32c3_hal::{
    clock::{ClockControl, Clocks},
    embassy,
    peripherals::Peripherals,
    prelude::*,
    systimer::{self},
    timer::TimerGroup,
    Rng, IO,
};
use esp_backtrace as _;
use esp_wifi::EspWifiInitFor;
use stepper::{Direction, Stepper};
use wheels::Wheels;

mod ble;
mod stepper;
mod wheels;

macro_rules! singleton {
    ($val:expr, $T:ty) => {{
        static STATIC_CELL: ::static_cell::StaticCell<$T> = ::static_cell::StaticCell::new();
        STATIC_CELL.init($val)
    }};
}

/// The control period. The wheels step at most once per tick, so this also
/// caps their speed.
const TICK: Duration = Duration::from_micros(2500);

#[main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger(log::LevelFilter::Info);

    let peripherals = Peripherals::take();
    let system = peripherals.SYSTEM.split();
    let clocks = singleton!(ClockControl::max(system.clock_control).freeze(), Clocks<'_>);
    embassy::init(clocks, TimerGroup::new(peripherals.TIMG0, clocks).timer0);

    let init = esp_wifi::initialize(
        EspWifiInitFor::Ble,
        systimer::SystemTimer::new(peripherals.SYSTIMER).alarm0,
        Rng::new(peripherals.RNG),
        system.radio_clock_control,
        clocks,
    )
    .unwrap();

    spawner.must_spawn(ble::ble_task(init, peripherals.BT));

    let io = IO::new(peripherals.GPIO, peripherals.IO_MUX);
    let right = Stepper::new(
        Direction::Backward,
        io.pins.gpio0.into_push_pull_output(),
        io.pins.gpio1.into_push_pull_output(),
        io.pins.gpio2.into_push_pull_output(),
        io.pins.gpio3.into_push_pull_output(),
    );
    let left = Stepper::new(
        Direction::Forward,
        io.pins.gpio4.into_push_pull_output(),
        io.pins.gpio5.into_push_pull_output(),
        io.pins.gpio8.into_push_pull_output(),
        io.pins.gpio10.into_push_pull_output(),
    );
    // Closed (pulled low) while there are dominoes in the hopper.
    let hopper = io.pins.gpio9.into_pull_up_input();

    let config = DrawConfig::default();
    let mut wheels = Wheels::new(left, right, &config);
    let mut controller: Controller = Controller::new(&ble::INBOX, &config);

    let mut ticker = Ticker::every(TICK);
    let mut last = Instant::now();
    loop {
        ticker.next().await;
        let now = Instant::now();
        let delta_us = (now - last).as_micros() as u32;
        last = now;

        controller.state_mut().is_empty = hopper.is_high().unwrap_or(false);
        if let Some(status) = controller.run(&mut wheels, delta_us, now.as_millis()) {
            ble::push_status(status);
        } else {
            ble::set_status(controller.state().status().encode());
        }
        wheels.run(delta_us);
    }
}
