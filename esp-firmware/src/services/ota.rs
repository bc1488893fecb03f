// OTA Listener - nimmt Firmware-Images per TCP entgegen
//
// Ablauf einer Übertragung:
// 1. Kopfzeile `<password> <size>\n` lesen und prüfen
// 2. Nächste App-Partition öffnen
// 3. Löschen, `OK\n` senden, genau `size` Bytes schreiben (esp_core::write_image)
// 4. Partition aktivieren, `OK\n` senden, Reset
//
// Bei jedem Fehler: `ERR <code>\n`, Verbindung schließen, alte Firmware bleibt.

use defmt::{Debug2Format, debug, error, info, warn};
use embassy_futures::poll_once;
use embassy_net::Stack;
use embassy_net::tcp::{State, TcpSocket};
use embassy_time::{Duration, Timer};
use esp_bootloader_esp_idf::ota::OtaImageState;
use esp_bootloader_esp_idf::ota_updater::OtaUpdater;
use esp_bootloader_esp_idf::partitions::PARTITION_TABLE_MAX_LEN;
use esp_storage::FlashStorage;

use esp_core::{
    OtaConfig, OtaError, REPLY_OK, UpdateObserver, UpdateService, progress_percent, read_header,
    send_reply, write_image,
};

use crate::config::OTA_READ_TIMEOUT_SECS;
use crate::hal::EmbassyDelay;

/// Wartezeit vor dem Reset, damit die letzte Antwort rausgeht
const RESET_DELAY_MS: u64 = 1_000;

/// OTA-Dienst auf einem TCP-Port
pub struct OtaListener<'a, O: UpdateObserver> {
    socket: TcpSocket<'a>,
    flash: FlashStorage<'a>,
    table_buffer: &'a mut [u8; PARTITION_TABLE_MAX_LEN],
    config: Option<OtaConfig>,
    observer: O,
}

impl<'a, O: UpdateObserver> OtaListener<'a, O> {
    pub fn new(
        stack: Stack<'static>,
        socket_rx: &'a mut [u8],
        socket_tx: &'a mut [u8],
        flash: FlashStorage<'a>,
        table_buffer: &'a mut [u8; PARTITION_TABLE_MAX_LEN],
        observer: O,
    ) -> Self {
        let mut socket = TcpSocket::new(stack, socket_rx, socket_tx);
        socket.set_timeout(Some(Duration::from_secs(OTA_READ_TIMEOUT_SECS)));

        Self {
            socket,
            flash,
            table_buffer,
            config: None,
            observer,
        }
    }

    /// Eine komplette Übertragung (Kopfzeile bis Aktivierung)
    async fn transfer(&mut self, password: &str) -> Result<(), OtaError> {
        let size = read_header(&mut self.socket, password).await?;
        info!("OTA: Update announced ({} bytes)", size);

        let mut ota = OtaUpdater::new(&mut self.flash, &mut *self.table_buffer)
            .map_err(|_| OtaError::Begin)?;
        let (mut partition, _) = ota.next_partition().map_err(|_| OtaError::Begin)?;

        write_image(
            &mut self.socket,
            &mut partition,
            size,
            &mut self.observer,
            &mut EmbassyDelay,
        )
        .await?;

        ota.activate_next_partition().map_err(|_| OtaError::End)?;
        ota.set_current_ota_state(OtaImageState::New)
            .map_err(|_| OtaError::End)?;

        self.observer.on_end();
        Ok(())
    }

    /// Fehler melden und Verbindung verwerfen (Listener wird neu aufgesetzt)
    async fn reject(&mut self, error: OtaError) {
        self.observer.on_error(error);
        send_reply(&mut self.socket, &error.reply()).await.ok();
        self.socket.abort();
    }
}

impl<O: UpdateObserver> UpdateService for OtaListener<'_, O> {
    /// Übernimmt die Konfiguration und bestätigt die laufende Firmware
    fn begin(&mut self, config: &OtaConfig) -> Result<(), OtaError> {
        let mut ota = OtaUpdater::new(&mut self.flash, &mut *self.table_buffer)
            .map_err(|_| OtaError::Begin)?;
        // Ohne OTA-Partitionen (Factory-Image) gibt es keinen Zustand zu setzen
        if ota.set_current_ota_state(OtaImageState::Valid).is_err() {
            warn!("OTA: Could not mark running image as valid");
        }

        self.config = Some(*config);
        Ok(())
    }

    async fn handle(&mut self) {
        let Some(config) = self.config else {
            return;
        };

        match self.socket.state() {
            State::Closed => {
                // Listener aufsetzen: der erste Poll von accept() ruft listen()
                if let core::task::Poll::Ready(Err(e)) = poll_once(self.socket.accept(config.port))
                {
                    warn!(
                        "OTA: Listen on port {} failed: {}",
                        config.port,
                        Debug2Format(&e)
                    );
                }
            }
            State::Listen | State::SynReceived => {}
            State::Established => {
                info!("OTA: Client connected");
                match self.transfer(config.password).await {
                    Ok(()) => {
                        send_reply(&mut self.socket, REPLY_OK).await.ok();
                        info!("OTA: Update complete, rebooting...");
                        Timer::after(Duration::from_millis(RESET_DELAY_MS)).await;
                        esp_hal::system::software_reset();
                    }
                    Err(e) => self.reject(e).await,
                }
            }
            _ => {
                // Gegenseite hat geschlossen oder Verbindung hängt
                self.socket.abort();
            }
        }
    }
}

/// Loggt den Update-Lifecycle über defmt
#[derive(Default)]
pub struct LogObserver {
    last_percent: u8,
}

impl UpdateObserver for LogObserver {
    fn on_start(&mut self) {
        self.last_percent = 0;
        info!("OTA: Start");
    }

    fn on_end(&mut self) {
        info!("OTA: End");
    }

    fn on_progress(&mut self, progress: u32, total: u32) {
        let percent = progress_percent(progress, total);
        // Nur alle 10% loggen
        if percent / 10 != self.last_percent / 10 {
            debug!("OTA: Progress {}%", percent);
        }
        self.last_percent = percent;
    }

    fn on_error(&mut self, error: OtaError) {
        error!("OTA: {}", error);
    }
}
