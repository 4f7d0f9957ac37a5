//! USB transport with ordered backend fallback
//!
//! Backends are tried in fixed priority order for every send:
//!
//! 1. Direct device claim via libusb: explicit vendor/product ids if
//!    configured, otherwise a table of known thermal printers, otherwise any
//!    device exposing the USB printer class. The buffer is bulk-written to
//!    the printer's OUT endpoint.
//! 2. Kernel printer device file (`/dev/usb/lp*`), treated as an append-only
//!    byte sink. This covers hosts where libusb cannot claim the device
//!    because the usblp driver owns it.
//!
//! Like the TCP transport, a failed send is surfaced, never retried.

use crate::error::{PrintError, PrintResult};
use crate::transport::{ProbeReport, Transport};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// USB transport
///
/// Cheap to clone; each send opens and tears down its own device handle.
#[derive(Debug, Clone)]
pub struct UsbTransport {
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    device_path: Option<PathBuf>,
    timeout: Duration,
}

impl UsbTransport {
    /// Create a transport that autodetects the printer
    pub fn new() -> Self {
        Self {
            vendor_id: None,
            product_id: None,
            device_path: None,
            timeout: Duration::from_secs(5),
        }
    }

    /// Restrict the direct backend to an explicit vendor/product id
    pub fn with_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = Some(vendor_id);
        self.product_id = Some(product_id);
        self
    }

    /// Override the device file used by the fallback backend
    pub fn with_device_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_path = Some(path.into());
        self
    }

    /// Set the bulk-write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn send_blocking(&self, data: &[u8]) -> PrintResult<()> {
        let device_err = match device::send(self.vendor_id, self.product_id, data, self.timeout) {
            Ok(()) => {
                info!(bytes = data.len(), "sent via direct USB backend");
                return Ok(());
            }
            Err(e) => e,
        };

        warn!(error = %device_err, "direct USB backend unavailable, trying device file");

        match file::send(self.device_path.as_deref(), data) {
            Ok(path) => {
                info!(bytes = data.len(), device = %path.display(), "sent via device file backend");
                Ok(())
            }
            Err(file_err) => Err(PrintError::UsbFile(format!(
                "{} (direct backend: {})",
                file_err, device_err
            ))),
        }
    }

    fn probe_blocking(&self) -> ProbeReport {
        match device::find(self.vendor_id, self.product_id) {
            Ok(Some((vid, pid))) => {
                return ProbeReport::reachable(format!("usb device {:04x}:{:04x} present", vid, pid));
            }
            Ok(None) => debug!("no matching USB device enumerated"),
            Err(e) => debug!(error = %e, "USB enumeration failed"),
        }

        match file::resolve(self.device_path.as_deref()) {
            Some(path) if file::is_writable(&path) => {
                ProbeReport::reachable(format!("device file {} writable", path.display()))
            }
            Some(path) => {
                ProbeReport::unreachable(format!("device file {} not writable", path.display()))
            }
            None => ProbeReport::unreachable("no USB printer device or device file found"),
        }
    }
}

impl Default for UsbTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UsbTransport {
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    async fn send(&self, data: &[u8]) -> PrintResult<()> {
        // libusb and file IO are synchronous, run in a blocking task
        let transport = self.clone();
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || transport.send_blocking(&data))
            .await
            .map_err(|e| PrintError::UsbDevice(format!("Task join failed: {}", e)))?
    }

    async fn probe(&self) -> ProbeReport {
        let transport = self.clone();
        match tokio::task::spawn_blocking(move || transport.probe_blocking()).await {
            Ok(report) => report,
            Err(e) => ProbeReport::unreachable(format!("probe task failed: {}", e)),
        }
    }
}

/// Direct libusb backend
mod device {
    use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};
    use std::time::Duration;

    /// USB base class for printers
    const PRINTER_CLASS: u8 = 7;

    /// Common thermal printers, checked when no explicit ids are configured
    const KNOWN_PRINTERS: &[(u16, u16)] = &[
        (0x04b8, 0x0202), // Epson TM series
        (0x04b8, 0x0e03), // Epson TM-T20
        (0x04b8, 0x0e15), // Epson TM-T82
        (0x0fe6, 0x811e), // Star TSP650
        (0x1504, 0x0006), // Citizen CT-S310
        (0x2d84, 0x0011), // Generic
    ];

    /// A host without usbfs (or with libusb missing) must read as "backend
    /// unavailable", not a crash, so the device-file fallback still runs
    fn context() -> Result<Context, String> {
        Context::new().map_err(|e| format!("libusb init: {}", e))
    }

    fn has_printer_interface(device: &Device<Context>) -> bool {
        let Ok(config) = device.config_descriptor(0) else {
            return false;
        };
        config
            .interfaces()
            .flat_map(|i| i.descriptors())
            .any(|d| d.class_code() == PRINTER_CLASS)
    }

    fn matches(
        device: &Device<Context>,
        vendor_id: Option<u16>,
        product_id: Option<u16>,
    ) -> Option<(u16, u16)> {
        let desc = device.device_descriptor().ok()?;
        let ids = (desc.vendor_id(), desc.product_id());

        if let (Some(vid), Some(pid)) = (vendor_id, product_id) {
            // Explicit configuration restricts the backend to that device
            return (ids == (vid, pid)).then_some(ids);
        }
        if KNOWN_PRINTERS.contains(&ids) {
            return Some(ids);
        }
        if desc.class_code() == PRINTER_CLASS || has_printer_interface(device) {
            return Some(ids);
        }
        None
    }

    /// Enumerate and return the ids of the first matching printer
    pub fn find(vendor_id: Option<u16>, product_id: Option<u16>) -> Result<Option<(u16, u16)>, String> {
        let ctx = context()?;
        let devices = ctx.devices().map_err(|e| format!("enumeration failed: {}", e))?;
        Ok(devices
            .iter()
            .find_map(|d| matches(&d, vendor_id, product_id)))
    }

    fn open(
        vendor_id: Option<u16>,
        product_id: Option<u16>,
    ) -> Result<(DeviceHandle<Context>, u8, usize), String> {
        let ctx = context()?;
        let devices = ctx.devices().map_err(|e| format!("enumeration failed: {}", e))?;
        let device = devices
            .iter()
            .find(|d| matches(d, vendor_id, product_id).is_some())
            .ok_or_else(|| "no matching USB printer found".to_string())?;

        let config = device
            .config_descriptor(0)
            .map_err(|e| format!("config descriptor: {}", e))?;

        // Locate the printer interface and its bulk OUT endpoint
        let (iface_num, ep_addr, max_packet) = config
            .interfaces()
            .flat_map(|i| i.descriptors())
            .find_map(|iface| {
                iface
                    .endpoint_descriptors()
                    .find(|ep| {
                        ep.direction() == Direction::Out
                            && ep.transfer_type() == TransferType::Bulk
                    })
                    .map(|ep| {
                        (
                            iface.interface_number(),
                            ep.address(),
                            ep.max_packet_size() as usize,
                        )
                    })
            })
            .ok_or_else(|| "no bulk OUT endpoint on printer".to_string())?;

        let mut handle = device.open().map_err(|e| format!("open failed: {}", e))?;

        // The usblp kernel driver may hold the interface
        if matches!(handle.kernel_driver_active(iface_num), Ok(true)) {
            let _ = handle.detach_kernel_driver(iface_num);
        }

        handle
            .claim_interface(iface_num)
            .map_err(|e| format!("claim interface {}: {}", iface_num, e))?;

        Ok((handle, ep_addr, max_packet.max(64)))
    }

    /// Claim the printer and bulk-write the whole buffer
    pub fn send(
        vendor_id: Option<u16>,
        product_id: Option<u16>,
        data: &[u8],
        timeout: Duration,
    ) -> Result<(), String> {
        let (handle, ep_addr, max_packet) = open(vendor_id, product_id)?;

        for chunk in data.chunks(max_packet) {
            handle
                .write_bulk(ep_addr, chunk, timeout)
                .map_err(|e| format!("bulk write: {}", e))?;
        }
        Ok(())
    }
}

/// Device-file backend (`/dev/usb/lp*`)
mod file {
    use std::io::Write;
    use std::path::{Path, PathBuf};

    /// Common kernel printer device nodes, in probe order
    const CANDIDATES: &[&str] = &["/dev/usb/lp0", "/dev/usb/lp1", "/dev/lp0", "/dev/lp1"];

    /// Resolve the device file to write to: the configured override if it
    /// exists, otherwise the first present candidate
    pub fn resolve(override_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = override_path
            && path.exists()
        {
            return Some(path.to_path_buf());
        }
        CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    pub fn is_writable(path: &Path) -> bool {
        std::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .is_ok()
    }

    /// Write the whole buffer to the device file; returns the path used
    pub fn send(override_path: Option<&Path>, data: &[u8]) -> Result<PathBuf, String> {
        let path = resolve(override_path)
            .ok_or_else(|| "no printer device file found".to_string())?;

        let mut handle = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| format!("open {}: {}", path.display(), e))?;

        handle
            .write_all(data)
            .map_err(|e| format!("write {}: {}", path.display(), e))?;
        handle
            .flush()
            .map_err(|e| format!("flush {}: {}", path.display(), e))?;

        Ok(path)
    }
}
