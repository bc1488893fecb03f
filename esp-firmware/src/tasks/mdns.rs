// mDNS Responder Task - Advertised Hostname via Multicast DNS
//
// Dieser Task implementiert einen mDNS (Multicast DNS) Responder nach RFC 6762.
// Der ESP32-C6 wird damit unter dem OTA-Hostnamen (z.B. "MEDIALIGHT.local")
// im lokalen Netzwerk erreichbar, ohne dass ein DNS-Server benötigt wird.
//
// Technische Details:
// - Protokoll: mDNS (RFC 6762)
// - Transport: UDP Multicast auf 224.0.0.251:5353
// - Unterstützt: A-Records (IPv4 Hostname-Auflösung)
// - Library: edge-mdns 0.6.1 (no_std)
// - Adapter: edge-nal-embassy 0.7.0 (embassy-net Integration)

use defmt::{Debug2Format, error, info, warn};
use embassy_net::Stack;
use embassy_time::{Duration, Timer};

use core::net::{Ipv4Addr, SocketAddr};
use core::sync::atomic::{AtomicU32, Ordering};

use edge_mdns::{HostAnswersMdnsHandler, buf::VecBufAccess, domain::base::Ttl, host::Host, io};
use edge_nal::{MulticastV4, UdpBind, UdpSplit};
use edge_nal_embassy::{Udp, UdpBuffers};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use static_cell::StaticCell;

use crate::config::{
    MDNS_MULTICAST_ADDR, MDNS_PACKET_BUFFER_SIZE, MDNS_PORT, MDNS_RECONNECT_DELAY_SECS,
    MDNS_TTL_SECS, MDNS_UDP_BUFFER_SIZE, OTA_HOSTNAME,
};

/// UDP-Buffer für genau einen Socket (edge-nal-embassy)
type MdnsUdpBuffers = UdpBuffers<1, MDNS_UDP_BUFFER_SIZE, MDNS_UDP_BUFFER_SIZE>;

/// UDP-Adapter über embassy-net, lebt so lange wie der Task
type MdnsUdp = Udp<'static, 1, MDNS_UDP_BUFFER_SIZE, MDNS_UDP_BUFFER_SIZE>;

/// Counter für mDNS Transaction IDs (Eindeutigkeit reicht, keine Kryptographie)
static RNG_COUNTER: AtomicU32 = AtomicU32::new(0);

fn mdns_rng(buf: &mut [u8]) {
    let mut counter = RNG_COUNTER.fetch_add(1, Ordering::Relaxed);
    for chunk in buf.chunks_mut(4) {
        let bytes = counter.to_le_bytes();
        let len = chunk.len().min(4);
        chunk[..len].copy_from_slice(&bytes[..len]);
        counter = counter.wrapping_add(1);
    }
}

/// mDNS Responder Task
///
/// Advertised den ESP32-C6 unter `<OTA_HOSTNAME>.local`, damit OTA-Clients
/// das Gerät per Name statt per IP-Adresse finden.
///
/// # Funktionsweise
///
/// 1. Wartet auf WiFi-Link und DHCP-Adresse
/// 2. Bindet UDP auf `0.0.0.0:5353` und joined `224.0.0.251`
/// 3. Beantwortet A-Record Queries (Hostname → IP), TTL `MDNS_TTL_SECS`
/// 4. Bei Fehlern: Neustart nach `MDNS_RECONNECT_DELAY_SECS`
///
/// Die UDP-Buffer werden einmal vor der Schleife angelegt und bei jedem
/// Neustart wiederverwendet (`StaticCell` lässt sich nur einmal befüllen).
///
/// # Beispiel-Nutzung
///
/// ```bash
/// avahi-resolve -n medialight.local
/// ping medialight.local
/// ```
#[embassy_executor::task]
pub async fn mdns_responder_task(stack: Stack<'static>) {
    info!("mDNS: Task started, waiting for network...");
    wait_for_network(stack).await;
    info!("mDNS: Network ready");

    static UDP_BUFFERS: StaticCell<MdnsUdpBuffers> = StaticCell::new();
    let udp_stack = Udp::new(stack, UDP_BUFFERS.init_with(UdpBuffers::new));

    loop {
        match run_mdns_responder(stack, &udp_stack).await {
            Ok(_) => warn!("mDNS: Responder stopped normally"),
            Err(e) => error!("mDNS: Error: {}", e),
        }
        info!("mDNS: Reconnecting in {}s...", MDNS_RECONNECT_DELAY_SECS);
        Timer::after(Duration::from_secs(MDNS_RECONNECT_DELAY_SECS)).await;
    }
}

/// Wartet bis Netzwerk-Verbindung verfügbar ist (Link + DHCP)
async fn wait_for_network(stack: Stack<'static>) {
    loop {
        if stack.is_link_up() && stack.config_v4().is_some() {
            break;
        }
        Timer::after(Duration::from_millis(500)).await;
    }
}

/// Führt mDNS Responder Loop aus
///
/// Bindet den Socket über den UDP-Adapter, Multicast-Join, dann blockiert
/// `Mdns::run()` bis ein Fehler auftritt. Der Socket wird beim Verlassen
/// freigegeben, die Buffer bleiben für den nächsten Versuch.
async fn run_mdns_responder(
    stack: Stack<'static>,
    udp_stack: &MdnsUdp,
) -> Result<(), MdnsError> {
    // IP-Adresse vom DHCP holen (kann zwischenzeitlich wieder weg sein)
    let our_ip = stack
        .config_v4()
        .ok_or(MdnsError::NoAddress)?
        .address
        .address();
    info!("mDNS: Using IP {}", Debug2Format(&our_ip));

    // Multicast Socket auf 0.0.0.0:MDNS_PORT binden
    // UNSPECIFIED = alle Interfaces (WiFi in unserem Fall)
    let mut socket = udp_stack
        .bind(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), MDNS_PORT))
        .await
        .map_err(|_| MdnsError::SocketBindFailed)?;

    // Join Multicast-Gruppe (mDNS IPv4)
    // Ermöglicht Empfang von mDNS-Queries auf 224.0.0.251
    socket
        .join_v4(Ipv4Addr::from(MDNS_MULTICAST_ADDR), Ipv4Addr::UNSPECIFIED)
        .await
        .map_err(|_| MdnsError::MulticastJoinFailed)?;

    // Socket in RX/TX splitten für edge-mdns API
    let (recv, send) = socket.split();

    // Host-Konfiguration für mDNS Responses
    let host = Host {
        hostname: OTA_HOSTNAME,
        ipv4: our_ip.into(),
        ipv6: [0u8; 16].into(), // kein proto-ipv6 in smoltcp
        ttl: Ttl::from_secs(MDNS_TTL_SECS),
    };

    // mDNS Packet Buffers (stack-allocated)
    // Größe: MDNS_PACKET_BUFFER_SIZE (1500 Bytes = Standard MTU)
    let recv_buf = VecBufAccess::<NoopRawMutex, MDNS_PACKET_BUFFER_SIZE>::new();
    let send_buf = VecBufAccess::<NoopRawMutex, MDNS_PACKET_BUFFER_SIZE>::new();

    // Signal für Broadcast-Notifications (nicht verwendet, aber von API benötigt)
    let signal = Signal::<NoopRawMutex, ()>::new();

    // mDNS Responder erstellen
    let mdns = io::Mdns::new(
        Some(our_ip), // IPv4 Interface
        None,         // Kein IPv6
        recv,         // UDP RX
        send,         // UDP TX
        recv_buf,     // RX Buffer
        send_buf,     // TX Buffer
        mdns_rng,     // RNG für Transaction IDs
        &signal,      // Broadcast Signal
    );

    info!(
        "mDNS: Responder running, advertising '{}.local'",
        OTA_HOSTNAME
    );

    // Blocking: Läuft bis Fehler auftritt
    // HostAnswersMdnsHandler implementiert einfache A-Record Responses
    // (nur Hostname → IP, kein Service Discovery)
    mdns.run(HostAnswersMdnsHandler::new(&host))
        .await
        .map_err(|_| MdnsError::ResponderFailed)?;

    Ok(())
}

/// mDNS Fehler-Typen (jeder Fehler führt zu einem Neustart des Responders)
#[derive(Debug)]
enum MdnsError {
    /// Keine IPv4-Adresse (DHCP-Lease verloren)
    NoAddress,
    SocketBindFailed,
    MulticastJoinFailed,
    /// Netzwerk weg oder UDP-Fehler während `Mdns::run()`
    ResponderFailed,
}

impl defmt::Format for MdnsError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            MdnsError::NoAddress => defmt::write!(fmt, "No IPv4 address"),
            MdnsError::SocketBindFailed => defmt::write!(fmt, "Socket bind failed"),
            MdnsError::MulticastJoinFailed => defmt::write!(fmt, "Multicast join failed"),
            MdnsError::ResponderFailed => defmt::write!(fmt, "Responder failed"),
        }
    }
}
