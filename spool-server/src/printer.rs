//! Printer link selection
//!
//! Builds the concrete transport from configuration once at startup and
//! dispatches sends/probes to it.

use crate::config::{Config, PrinterInterface};
use spool_printer::{PrintResult, ProbeReport, TcpTransport, Transport, UsbTransport};

/// The configured path to the physical printer
pub enum PrinterLink {
    Tcp(TcpTransport),
    Usb(UsbTransport),
}

impl PrinterLink {
    /// Build the transport described by the configuration
    pub fn from_config(config: &Config) -> PrintResult<Self> {
        match config.interface {
            PrinterInterface::Tcp => {
                let transport = TcpTransport::new(&config.tcp_host, config.tcp_port)?;
                Ok(Self::Tcp(transport))
            }
            PrinterInterface::Usb => {
                let mut transport = UsbTransport::new();
                if config.usb_vendor_id != 0 && config.usb_product_id != 0 {
                    transport =
                        transport.with_ids(config.usb_vendor_id, config.usb_product_id);
                }
                if let Some(path) = &config.usb_device_path {
                    transport = transport.with_device_path(path);
                }
                Ok(Self::Usb(transport))
            }
        }
    }

    /// Send a complete job buffer to the printer
    pub async fn send(&self, data: &[u8]) -> PrintResult<()> {
        match self {
            Self::Tcp(t) => t.send(data).await,
            Self::Usb(t) => t.send(data).await,
        }
    }

    /// Reachability probe for health reporting
    pub async fn probe(&self) -> ProbeReport {
        match self {
            Self::Tcp(t) => t.probe().await,
            Self::Usb(t) => t.probe().await,
        }
    }
}
