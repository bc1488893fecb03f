//! OTA Push-Protokoll
//!
//! Ein Client verbindet sich auf den OTA-Port und sendet eine Kopfzeile
//! `<password> <size>\n`. Danach folgen genau `size` Bytes Firmware-Image.
//! Das Gerät antwortet jeweils mit `OK\n` oder `ERR <code>\n`.
//!
//! Der Transfer ist generisch über `embedded_io_async` (TcpSocket auf dem
//! Target) und eine `NorFlash`-Region (nächste App-Partition). Auswahl und
//! Aktivierung der Partition bleiben in esp-firmware.

use embedded_io_async::{Read, Write};
use embedded_storage::nor_flash::NorFlash;

use crate::traits::{Delay, UpdateObserver};

/// Maximale Länge der Kopfzeile inkl. `\n`
pub const MAX_HEADER_LEN: usize = 96;

/// Antwort bei Erfolg
pub const REPLY_OK: &[u8] = b"OK\n";

/// Empfangs-Buffer; geschrieben wird, sobald ein aligned Block vorliegt
pub const IMAGE_CHUNK_SIZE: usize = 2048;

/// Erase-Schrittweite (zwischen den Schritten laufen andere Tasks weiter)
pub const ERASE_CHUNK_SIZE: u32 = 64 * 1024;

/// Pause nach jedem Erase-Schritt
pub const ERASE_YIELD_MS: u64 = 10;

/// Fehlerklassen eines Updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// Falsches Passwort
    Auth,
    /// Kopfzeile ungültig oder Flash-Partition nicht vorbereitet
    Begin,
    /// Verbindung nicht nutzbar
    Connect,
    /// Abbruch oder Schreibfehler während der Übertragung
    Receive,
    /// Image unvollständig oder Partition nicht aktivierbar
    End,
}

impl OtaError {
    /// Protokoll-Code (0..=4)
    pub fn code(self) -> u8 {
        match self {
            OtaError::Auth => 0,
            OtaError::Begin => 1,
            OtaError::Connect => 2,
            OtaError::Receive => 3,
            OtaError::End => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OtaError::Auth => "Auth Failed",
            OtaError::Begin => "Begin Failed",
            OtaError::Connect => "Connect Failed",
            OtaError::Receive => "Receive Failed",
            OtaError::End => "End Failed",
        }
    }

    /// Antwortzeile für den Client, z.B. `ERR 0\n`
    pub fn reply(self) -> [u8; 6] {
        let mut line = *b"ERR 0\n";
        line[4] = b'0' + self.code();
        line
    }
}

/// Prüft die Kopfzeile und liefert die angekündigte Image-Größe
///
/// ```
/// # use esp_core::{parse_update_header, OtaError};
/// assert_eq!(parse_update_header(b"secret 4096\n", "secret"), Ok(4096));
/// assert_eq!(parse_update_header(b"wrong 4096\n", "secret"), Err(OtaError::Auth));
/// ```
pub fn parse_update_header(line: &[u8], password: &str) -> Result<u32, OtaError> {
    let line = core::str::from_utf8(line).map_err(|_| OtaError::Begin)?;
    let line = line.trim_end_matches(['\r', '\n']);

    let (given, size) = line.split_once(' ').ok_or(OtaError::Begin)?;
    if given != password {
        return Err(OtaError::Auth);
    }

    match size.trim().parse::<u32>() {
        Ok(0) | Err(_) => Err(OtaError::Begin),
        Ok(size) => Ok(size),
    }
}

/// Fortschritt in Prozent (0..=100)
pub fn progress_percent(progress: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = u64::from(progress.min(total)) * 100 / u64::from(total);
    percent as u8
}

/// Zählt empfangene Bytes gegen die angekündigte Größe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateProgress {
    total: u32,
    received: u32,
}

impl UpdateProgress {
    pub fn new(total: u32) -> Self {
        Self { total, received: 0 }
    }

    /// Verbucht einen Chunk; mehr als angekündigt ist ein Empfangsfehler
    pub fn advance(&mut self, len: usize) -> Result<(), OtaError> {
        let len = u32::try_from(len).map_err(|_| OtaError::Receive)?;
        let received = self.received.checked_add(len).ok_or(OtaError::Receive)?;
        if received > self.total {
            return Err(OtaError::Receive);
        }
        self.received = received;
        Ok(())
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn remaining(&self) -> u32 {
        self.total - self.received
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.total
    }

    pub fn percent(&self) -> u8 {
        progress_percent(self.received, self.total)
    }
}

/// Liest die Kopfzeile byteweise und prüft sie
///
/// Der Client wartet danach auf `OK`, es wird also nichts über das `\n`
/// hinaus gelesen.
pub async fn read_header<S: Read>(socket: &mut S, password: &str) -> Result<u32, OtaError> {
    let mut line = [0u8; MAX_HEADER_LEN];
    let mut len = 0;

    loop {
        if len == line.len() {
            return Err(OtaError::Begin);
        }
        let n = socket
            .read(&mut line[len..len + 1])
            .await
            .map_err(|_| OtaError::Connect)?;
        if n == 0 {
            return Err(OtaError::Connect);
        }
        len += 1;
        if line[len - 1] == b'\n' {
            break;
        }
    }

    parse_update_header(&line[..len], password)
}

/// Schreibt ein angekündigtes Image in die Flash-Region
///
/// 1. Größe gegen die Region prüfen
/// 2. Benötigten Bereich in `ERASE_CHUNK_SIZE`-Schritten löschen
/// 3. `OK\n` senden (Client beginnt erst dann mit dem Image)
/// 4. Genau `size` Bytes empfangen und schreiben
///
/// Die Partition wird hier nicht aktiviert.
pub async fn write_image<S, F, O, D>(
    socket: &mut S,
    region: &mut F,
    size: u32,
    observer: &mut O,
    delay: &mut D,
) -> Result<(), OtaError>
where
    S: Read + Write,
    F: NorFlash,
    O: UpdateObserver,
    D: Delay,
{
    observer.on_start();

    if size as usize > region.capacity() {
        #[cfg(feature = "defmt")]
        defmt::error!(
            "OTA: Image too large ({} > {} bytes)",
            size,
            region.capacity()
        );
        return Err(OtaError::Begin);
    }

    erase_region(region, size, delay).await?;
    send_reply(socket, REPLY_OK).await?;
    receive_image(socket, region, size, observer).await
}

/// Löscht die ersten `size` Bytes (auf `ERASE_SIZE` aufgerundet)
pub async fn erase_region<F: NorFlash, D: Delay>(
    region: &mut F,
    size: u32,
    delay: &mut D,
) -> Result<(), OtaError> {
    let erase_len = size.next_multiple_of(F::ERASE_SIZE as u32);
    #[cfg(feature = "defmt")]
    defmt::info!("OTA: Erasing partition ({} bytes)...", erase_len);

    let mut erased: u32 = 0;
    while erased < erase_len {
        let chunk = ERASE_CHUNK_SIZE.min(erase_len - erased);
        region
            .erase(erased, erased + chunk)
            .map_err(|_| OtaError::Begin)?;
        erased += chunk;
        delay.delay_ms(ERASE_YIELD_MS).await;
    }
    Ok(())
}

/// Empfängt genau `size` Bytes und schreibt sie aligned in die Region
///
/// Schreibzugriffe erfolgen in Vielfachen von `F::WRITE_SIZE`, ein Rest
/// wird in den nächsten Block übernommen. Der letzte Block wird mit `0xFF`
/// (gelöschter Flash-Zustand) aufgefüllt. Bytes nach dem Image werden
/// nicht gelesen.
pub async fn receive_image<S, F, O>(
    socket: &mut S,
    region: &mut F,
    size: u32,
    observer: &mut O,
) -> Result<(), OtaError>
where
    S: Read,
    F: NorFlash,
    O: UpdateObserver,
{
    let align = F::WRITE_SIZE.max(1);
    let mut progress = UpdateProgress::new(size);
    let mut write_buf = [0u8; IMAGE_CHUNK_SIZE];
    let mut buffered: usize = 0;
    let mut written: u32 = 0;

    while !progress.is_complete() {
        let space = IMAGE_CHUNK_SIZE - buffered;
        let want = space.min(progress.remaining() as usize);
        let n = socket
            .read(&mut write_buf[buffered..buffered + want])
            .await
            .map_err(|_| OtaError::Receive)?;
        if n == 0 {
            #[cfg(feature = "defmt")]
            defmt::error!(
                "OTA: Connection closed after {} of {} bytes",
                progress.received(),
                size
            );
            return Err(OtaError::Receive);
        }
        progress.advance(n)?;
        buffered += n;

        let aligned = buffered - buffered % align;
        if aligned > 0 {
            region
                .write(written, &write_buf[..aligned])
                .map_err(|_| OtaError::Receive)?;
            written += aligned as u32;
            write_buf.copy_within(aligned..buffered, 0);
            buffered -= aligned;
        }

        observer.on_progress(progress.received(), size);
    }

    if buffered > 0 {
        let padded = buffered.next_multiple_of(align);
        write_buf[buffered..padded].fill(0xFF);
        region
            .write(written, &write_buf[..padded])
            .map_err(|_| OtaError::Receive)?;
    }

    Ok(())
}

/// Antwortzeile senden und flushen
pub async fn send_reply<S: Write>(socket: &mut S, reply: &[u8]) -> Result<(), OtaError> {
    socket.write_all(reply).await.map_err(|_| OtaError::Connect)?;
    socket.flush().await.map_err(|_| OtaError::Connect)
}

#[cfg(feature = "defmt")]
impl defmt::Format for OtaError {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Error[{}]: {}", self.code(), self.as_str())
    }
}
