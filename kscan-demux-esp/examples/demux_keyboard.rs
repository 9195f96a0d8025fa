#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those     holding buffers for the duration of a data transfer."
)]

//! A 4x8 matrix: rows on GPIO4..=7 with pull-ups, columns behind a 74HC138 whose address
//! inputs sit on GPIO10..=12. The 138's outputs are active low, so the rows read low on a press.
//!
//! Between scans the 138 keeps a single column selected, so the matrix is polled.

use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use esp_hal::{
    clock::CpuClock,
    gpio::{Input, Output, Pin},
    timer::systimer::SystemTimer,
};
use esp_println::println;
use kscan_demux_async::{
    ChannelSink, ControlRequest, KeyEvent, KscanControl, KscanDemux, MatrixConfig, Orientation,
    PinFlags, PinRef, Pull, TriggerMode,
};
use kscan_demux_esp::EspPinResolver;
use log::{info, warn};
use static_cell::StaticCell;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("{}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

const ROW: PinFlags = PinFlags::ACTIVE_LOW.with_pull(Pull::Up);

static ROWS: [PinRef; 4] = [
    PinRef::new(0, 4, ROW),
    PinRef::new(0, 5, ROW),
    PinRef::new(0, 6, ROW),
    PinRef::new(0, 7, ROW),
];

static SELECTS: [PinRef; 3] = [
    PinRef::new(0, 10, PinFlags::ACTIVE_HIGH),
    PinRef::new(0, 11, PinFlags::ACTIVE_HIGH),
    PinRef::new(0, 12, PinFlags::ACTIVE_HIGH),
];

static CONFIG: MatrixConfig =
    MatrixConfig::new(4, 8, Orientation::ColsAreOutputs, &ROWS, &SELECTS)
        .with_debounce_period(Duration::from_millis(5))
        .with_trigger(TriggerMode::polling());

const EVENT_QUEUE: usize = 16;

type Events = Channel<CriticalSectionRawMutex, KeyEvent, EVENT_QUEUE>;
type Keyboard = KscanDemux<
    Input<'static>,
    Output<'static>,
    ChannelSink<'static, CriticalSectionRawMutex, EVENT_QUEUE>,
    4,
    8,
>;

static EVENTS: StaticCell<Events> = StaticCell::new();
static CONTROL: KscanControl<CriticalSectionRawMutex> = Signal::new();

/// The main entry point of the application.
#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    // Init logging
    esp_println::logger::init_logger(log::LevelFilter::Debug);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    info!("Peripherals initialized");

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);

    let mut resolver = EspPinResolver::<'static, 7>::new();
    for (gpio, pin) in [
        (4, peripherals.GPIO4.degrade()),
        (5, peripherals.GPIO5.degrade()),
        (6, peripherals.GPIO6.degrade()),
        (7, peripherals.GPIO7.degrade()),
        (10, peripherals.GPIO10.degrade()),
        (11, peripherals.GPIO11.degrade()),
        (12, peripherals.GPIO12.degrade()),
    ] {
        if resolver.register(gpio, pin).is_err() {
            warn!("No room for GPIO{gpio}");
        }
    }

    let mut keyboard = match Keyboard::new(&CONFIG, &mut resolver) {
        Ok(keyboard) => keyboard,
        Err(err) => panic!("Keyboard init failed: {err:?}"),
    };

    let events: &'static Events = EVENTS.init(Channel::new());
    keyboard.configure(ChannelSink::new(events.sender()));
    CONTROL.signal(ControlRequest::Enable);

    spawner.spawn(scan_keys(keyboard)).unwrap();
    spawner.spawn(log_keys(events.receiver())).unwrap();

    // Pause scanning for a while every minute.
    loop {
        Timer::after(Duration::from_secs(60)).await;
        info!("Pausing keyboard");
        CONTROL.signal(ControlRequest::Disable);
        Timer::after(Duration::from_secs(5)).await;
        info!("Resuming keyboard");
        CONTROL.signal(ControlRequest::Enable);
    }
}

/// Owns the keyboard and scans it.
#[embassy_executor::task]
async fn scan_keys(mut keyboard: Keyboard) {
    keyboard.run_with_control(&CONTROL).await
}

/// A task that logs every key event.
#[embassy_executor::task]
async fn log_keys(events: Receiver<'static, CriticalSectionRawMutex, KeyEvent, EVENT_QUEUE>) {
    loop {
        let event = events.receive().await;
        info!(
            "Key {} at {},{} {}",
            event.key_index(8),
            event.row,
            event.col,
            if event.pressed { "pressed" } else { "released" }
        );
    }
}
