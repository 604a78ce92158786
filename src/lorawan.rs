//! Task owning the radio and the `lorawan-device` stack.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice;
use embassy_executor::task;
use embassy_sync::{
    blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex},
    channel::{Receiver, Sender},
    mutex::Mutex,
};
use embassy_time::Delay;
use esp_hal::{
    dma::{Dma, DmaPriority, DmaRxBuf, DmaTxBuf},
    dma_buffers,
    gpio::{AnyPin, Input, Level, Output},
    peripherals::{DMA, SPI2},
    rng::Rng,
    spi::{
        master::{Config, Spi, SpiDmaBus},
        SpiMode,
    },
    Async,
};
use fugit::RateExtU32;
use lora_phy::{
    iv::GenericSx127xInterfaceVariant,
    lorawan_radio::LorawanRadio,
    sx127x::{self, Sx1276, Sx127x},
    LoRa,
};
use lorawan_device::{
    async_device::{region, Device, EmbassyTimer, JoinMode, JoinResponse, SendResponse},
    default_crypto::DefaultFactory,
    AppEui, AppKey, DevEui,
};

use static_cell::StaticCell;

use crate::{
    config::{Credentials, DataRate, DATA_RATE, TX_POWER_DBM},
    mac::{join_event, Command, Event, UplinkOutcome, QUEUE_DEPTH},
};

type LoraBus = Mutex<NoopRawMutex, SpiDmaBus<'static, Async>>;

pub type LoraSpi = SpiDevice<'static, NoopRawMutex, SpiDmaBus<'static, Async>, Output<'static>>;

pub type LoraRadio = LorawanRadio<
    Sx127x<LoraSpi, GenericSx127xInterfaceVariant<Output<'static>, Input<'static>>, Sx1276>,
    Delay,
    TX_POWER_DBM,
>;

pub type Lorawan = Device<LoraRadio, DefaultFactory, EmbassyTimer, Rng>;

static LORA_SPI_BUS: StaticCell<LoraBus> = StaticCell::new();

/// Largest frame plus room for register access
const DMA_BUFFER_SIZE: usize = 512;

/// Brings up the DMA SPI bus and hands back the radio's device on it,
/// chip select on `nss`. Callable once.
pub fn spi(
    dma: DMA,
    spi: SPI2,
    sck: AnyPin,
    mosi: AnyPin,
    miso: AnyPin,
    nss: AnyPin,
) -> LoraSpi {
    let dma = Dma::new(dma);

    let (rx_buffer, rx_descriptors, tx_buffer, tx_descriptors) = dma_buffers!(DMA_BUFFER_SIZE);
    let dma_rx_buf = DmaRxBuf::new(rx_descriptors, rx_buffer).unwrap();
    let dma_tx_buf = DmaTxBuf::new(tx_descriptors, tx_buffer).unwrap();

    // SX127x tops out at 10MHz, 200kHz is plenty for 51 byte frames
    let spi_config = Config {
        frequency: 200.kHz(),
        mode: SpiMode::Mode0,
        ..Config::default()
    };

    let bus = Spi::new_with_config(spi, spi_config)
        .with_sck(sck)
        .with_mosi(mosi)
        .with_miso(miso)
        .with_dma(dma.channel0.configure(false, DmaPriority::Priority0))
        .with_buffers(dma_rx_buf, dma_tx_buf)
        .into_async();

    let bus = LORA_SPI_BUS.init(Mutex::new(bus));
    SpiDevice::new(bus, Output::new(nss, Level::High))
}

pub async fn init(
    spi: LoraSpi,
    lora_irq: Input<'static>,
    lora_rst: Output<'static>,
    rng: Rng,
) -> Lorawan {
    // We're using an SX1278, but the SX1276 variant seems to work
    let config = sx127x::Config {
        chip: Sx1276,
        tcxo_used: false,
        rx_boost: false,
        tx_boost: true,
    };

    let interface_variant =
        GenericSx127xInterfaceVariant::new(lora_rst, lora_irq, None, None).unwrap();

    // Public network sync word, LoRaWAN gateways ignore anything else
    let lora = LoRa::new(Sx127x::new(spi, interface_variant, config), true, Delay)
        .await
        .unwrap();

    let radio: LoraRadio = lora.into();

    let mut device = Device::new(
        region::Configuration::new(region::Region::EU868),
        radio,
        EmbassyTimer::new(),
        rng,
    );
    device.set_datarate(data_rate());
    device
}

fn data_rate() -> region::DR {
    match DATA_RATE {
        DataRate::Dr0 => region::DR::_0,
        DataRate::Dr1 => region::DR::_1,
        DataRate::Dr2 => region::DR::_2,
        DataRate::Dr3 => region::DR::_3,
        DataRate::Dr4 => region::DR::_4,
        DataRate::Dr5 => region::DR::_5,
    }
}

#[task]
pub async fn drive(
    mut device: Lorawan,
    credentials: Credentials,
    commands: Receiver<'static, CriticalSectionRawMutex, Command, QUEUE_DEPTH>,
    events: Sender<'static, CriticalSectionRawMutex, Event, QUEUE_DEPTH>,
    pending: &'static AtomicBool,
) -> ! {
    let join_mode = JoinMode::OTAA {
        deveui: DevEui::from(credentials.dev_eui),
        appeui: AppEui::from(credentials.join_eui),
        appkey: AppKey::from(credentials.app_key),
    };

    loop {
        match commands.receive().await {
            Command::Join => {
                events.send(Event::Joining).await;

                let accepted = match device.join(&join_mode).await {
                    Ok(JoinResponse::JoinSuccess) => true,
                    Ok(JoinResponse::NoJoinAccept) => {
                        info!("No join accept");
                        false
                    }
                    Err(err) => {
                        warn!("Join error: {:?}", err);
                        false
                    }
                };
                events.send(join_event(accepted)).await;
            }
            Command::Send {
                port,
                payload,
                confirmed,
            } => {
                let outcome = device.send(&payload, port, confirmed).await;
                pending.store(false, Ordering::Release);

                // lorawan-device does not expose rx quality, only what came back
                let outcome = match outcome {
                    Ok(SendResponse::DownlinkReceived(fcnt_down)) => {
                        info!("Downlink with fcnt {}", fcnt_down);
                        let len = device.take_downlink().map_or(0, |d| d.data.len());
                        UplinkOutcome::Downlink { len }
                    }
                    Ok(SendResponse::RxComplete) | Ok(SendResponse::NoAck) => {
                        UplinkOutcome::Quiet
                    }
                    Ok(SendResponse::SessionExpired) => UplinkOutcome::SessionExpired,
                    Err(err) => {
                        warn!("Uplink error: {:?}", err);
                        UplinkOutcome::Failed
                    }
                };

                events.send(outcome.event(confirmed)).await;

                if outcome.needs_rejoin() {
                    events.send(Event::Joining).await;
                    let accepted = matches!(
                        device.join(&join_mode).await,
                        Ok(JoinResponse::JoinSuccess)
                    );
                    events.send(join_event(accepted)).await;
                }
            }
        }
    }
}
