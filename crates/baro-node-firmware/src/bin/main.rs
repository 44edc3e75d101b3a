#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use baro_node_core::bus::{BitBangController, TwiBus};
use baro_node_core::config::{Bmp085Config, BusConfig, Reference};
use baro_node_core::sampling::Sampler;
use baro_node_core::sensors::bmp085::{Bmp085, Oversampling};
use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{DriveMode, Flex, InputConfig, OutputConfig, Pull};
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};

const SAMPLE_PERIOD: Duration = Duration::from_secs(1);
const INIT_RETRY_PERIOD: Duration = Duration::from_secs(5);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Configure a GPIO as an open-drain line with the internal pull-up, released
/// (high) and readable.
fn open_drain(mut pin: Flex<'_>) -> Flex<'_> {
    pin.apply_input_config(&InputConfig::default().with_pull(Pull::Up));
    pin.apply_output_config(&OutputConfig::default().with_drive_mode(DriveMode::OpenDrain));
    pin.set_high();
    pin.set_input_enable(true);
    pin.set_output_enable(true);
    pin
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    // BMP085 breakout on GPIO8 (SDA) / GPIO9 (SCL)
    let sda = open_drain(Flex::new(peripherals.GPIO8));
    let scl = open_drain(Flex::new(peripherals.GPIO9));
    let mut bus = TwiBus::new(BitBangController::new(sda, scl, Delay), BusConfig::default());

    for address in bus.scan_bus() {
        info!("I2C: device at {:#04x}", address);
    }

    let sensor_config = Bmp085Config::new(Oversampling::Standard, Reference::Altitude(0));
    let mut pending = Bmp085::new(bus, Delay);
    if let Err(e) = pending.verify_chip() {
        warn!("BMP085: chip check failed: {:?}", e);
    }

    let mut barometer = loop {
        match pending.initialize(sensor_config) {
            Ok(sensor) => break sensor,
            Err((sensor, e)) => {
                error!("BMP085: {:?}, retrying", e);
                pending = sensor;
                Timer::after(INIT_RETRY_PERIOD).await;
            }
        }
    };

    let mut sampler = Sampler::new();
    loop {
        match sampler.poll(&mut barometer) {
            Some(sample) => {
                let readings = sample.readings;
                let tenths = readings.temperature_dc.unsigned_abs();
                info!(
                    "{}{}.{} C  {} Pa  {} cm{}",
                    if readings.temperature_dc < 0 { "-" } else { "" },
                    tenths / 10,
                    tenths % 10,
                    readings.pressure_pa,
                    readings.altitude_cm,
                    if sample.fresh { "" } else { "  (stale)" }
                );
            }
            None => warn!("No barometer reading yet"),
        }
        Timer::after(SAMPLE_PERIOD).await;
    }
}
