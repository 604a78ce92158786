#![deny(unsafe_code)]
#![no_main]
#![no_std]

use core::sync::atomic::AtomicBool;

use embassy_executor::{task, Spawner};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, pipe::Pipe};
use embassy_time::Timer;
use embedded_io_async::Read;
use esp_hal::{
    gpio::{Input, Level, Output, Pull},
    rng::Rng,
    timer::timg::TimerGroup,
    uart::{Config, Uart, UartRx},
    Async,
};

use defmt::{info, warn};
use esp_backtrace as _;
use esp_println as _;

use lora_tracker::{
    config::{Credentials, Timing, GPS_BAUD_RATE},
    display::NoDisplay,
    lorawan,
    mac::{ChannelMac, CommandChannel, EventChannel},
    pins, runner, Tracker,
};

static GPS_PIPE: Pipe<CriticalSectionRawMutex, 512> = Pipe::new();
static COMMANDS: CommandChannel = CommandChannel::new();
static EVENTS: EventChannel = EventChannel::new();
static TX_PENDING: AtomicBool = AtomicBool::new(false);

#[task]
async fn gps_reader(mut rx: UartRx<'static, Async>) -> ! {
    let mut read_buffer = [0u8; 64];

    loop {
        match Read::read(&mut rx, &mut read_buffer).await {
            Ok(len) => {
                // If the poll job falls behind, newest bytes are dropped and
                // the broken sentence fails its checksum
                let written = GPS_PIPE.try_write(&read_buffer[..len]).unwrap_or(0);
                if written < len {
                    warn!("GPS buffer full, dropped {} bytes", len - written);
                }
            }
            Err(e) => warn!("GPS UART error: {:?}", e),
        }
    }
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    info!("GPS LoRa tracker v1");

    let peripherals = esp_hal::init(esp_hal::Config::default());
    let pins = pins::get_tracker_pins_v001(peripherals);

    let timg0 = TimerGroup::new(pins.timg);
    esp_hal_embassy::init(timg0.timer0);

    // The GPS module needs a moment after power on
    Timer::after_millis(1_500).await;

    let credentials = match Credentials::from_env() {
        Ok(c) => c,
        Err(err) => panic!("Bad LoRaWAN credentials: {}", err),
    };

    // Setup UART for GPS
    let uart_config = Config::default().baudrate(GPS_BAUD_RATE);
    let uart = Uart::new_with_config(pins.uart, uart_config, pins.gps_rx, pins.gps_tx)
        .unwrap()
        .into_async();

    let (rx, _) = uart.split();

    // Note that this task now owns the UART RX line completely
    spawner.spawn(gps_reader(rx)).unwrap();

    // Setup SPI bus for the radio
    let lora_spi = lorawan::spi(
        pins.dma,
        pins.spi,
        pins.lora_clk,
        pins.lora_mosi,
        pins.lora_miso,
        pins.lora_nss,
    );

    let lora_rst = Output::new(pins.lora_rst, Level::High);
    let lora_irq = Input::new(pins.lora_irq, Pull::Up);

    let device = lorawan::init(lora_spi, lora_irq, lora_rst, Rng::new(pins.rng)).await;

    spawner
        .spawn(lorawan::drive(
            device,
            credentials,
            COMMANDS.receiver(),
            EVENTS.sender(),
            &TX_PENDING,
        ))
        .unwrap();

    info!("Initializing complete");

    let mac = ChannelMac::new(COMMANDS.sender(), &TX_PENDING);
    let mut tracker = Tracker::new(mac, &GPS_PIPE, NoDisplay, Timing::default());

    runner::run(&mut tracker, EVENTS.receiver()).await
}
