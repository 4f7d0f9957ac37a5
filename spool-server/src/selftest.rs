//! Startup self-test ticket
//!
//! Prints a short welcome ticket with a QR code pointing at the web
//! interface, validating transport connectivity before the worker loop
//! starts. Failure here is logged, never fatal.

use crate::config::Config;
use crate::printer::PrinterLink;
use spool_printer::{EscPosBuilder, PrintResult};
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Print the welcome/self-test ticket
pub async fn print_welcome_ticket(link: &PrinterLink, config: &Config) -> PrintResult<()> {
    let url = service_url(config.http_port);

    let mut b = EscPosBuilder::new();
    b.center()
        .double_size()
        .line("PRINT SPOOLER")
        .reset_size()
        .line("ESC/POS print service")
        .newline()
        .left()
        .line("[OK] printer connected")
        .line("[OK] server started")
        .newline()
        .line(&format!(
            "Date: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ))
        .newline()
        .center()
        .line("Scan to open the web interface:")
        .newline()
        .qr_code(&url, 12)
        .newline()
        .line(&url)
        .feed(3)
        .cut();

    link.send(&b.build()).await
}

fn service_url(port: u16) -> String {
    format!("http://{}:{}/", primary_ip(), port)
}

/// Best-effort primary interface address
///
/// Connecting a UDP socket selects the outbound interface without sending
/// any packet; falls back to loopback on hosts with no route.
fn primary_ip() -> IpAddr {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|sock| {
            sock.connect("8.8.8.8:80")?;
            sock.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
