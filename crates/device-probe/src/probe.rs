//! Probe client driving a device through any 4-byte read/write stream.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use device_core::{
    ControlFlags, DeviceConfig, DeviceHost, HostError, NodeRegistry, Session, REGISTER_BYTES,
};
use log::{debug, info};
use thiserror::Error;

use crate::script::{ScriptError, ScriptStep};

/// Errors surfaced by probe runs.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The underlying stream failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// A transfer moved something other than one whole register.
    #[error("short {direction} transfer: {actual} of 4 bytes")]
    ShortTransfer {
        /// `"read"` or `"write"`.
        direction: &'static str,
        /// Bytes actually moved.
        actual: usize,
    },
    /// The script file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    ReadScript {
        /// Script path as given.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// The script did not parse.
    #[error(transparent)]
    Script(#[from] ScriptError),
    /// The hosted node could not be brought up or opened.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Client for the register contract over a byte stream.
#[derive(Debug)]
pub struct Probe<T> {
    port: T,
}

impl<T: Read + Write> Probe<T> {
    /// Wraps an open stream.
    pub const fn new(port: T) -> Self {
        Self { port }
    }

    /// Reads one status word.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Io`] when the stream fails, or
    /// [`ProbeError::ShortTransfer`] when fewer than four bytes arrive.
    pub fn read_status(&mut self) -> Result<u32, ProbeError> {
        let mut buf = [0_u8; REGISTER_BYTES];
        let actual = self.port.read(&mut buf)?;
        if actual != REGISTER_BYTES {
            return Err(ProbeError::ShortTransfer {
                direction: "read",
                actual,
            });
        }
        let value = u32::from_ne_bytes(buf);
        debug!("status -> {value:#010x}");
        Ok(value)
    }

    /// Writes one command word.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Io`] when the stream fails, or
    /// [`ProbeError::ShortTransfer`] when it consumes fewer than four bytes.
    pub fn write_command(&mut self, word: u32) -> Result<(), ProbeError> {
        let actual = self.port.write(&word.to_ne_bytes())?;
        if actual != REGISTER_BYTES {
            return Err(ProbeError::ShortTransfer {
                direction: "write",
                actual,
            });
        }
        debug!("control <= {word:#010x}");
        Ok(())
    }

    /// Runs the bring-up check: read, enable, read, reset, read.
    ///
    /// Returns the three status values in order.
    ///
    /// # Errors
    ///
    /// Propagates the first transfer or output failure.
    pub fn run_smoke<W: Write>(&mut self, out: &mut W) -> Result<[u32; 3], ProbeError> {
        writeln!(out, "=== Reading initial status ===")?;
        let initial = self.read_status()?;
        writeln!(out, "Status: {initial:#010x}\n")?;

        writeln!(out, "=== Enabling device ===")?;
        self.write_command(ControlFlags::ENABLE.bits())?;

        writeln!(out, "=== Reading status after enable ===")?;
        let enabled = self.read_status()?;
        writeln!(out, "Status: {enabled:#010x}\n")?;

        writeln!(out, "=== Resetting device ===")?;
        self.write_command(ControlFlags::RESET.bits())?;

        writeln!(out, "=== Reading status after reset ===")?;
        let reset = self.read_status()?;
        writeln!(out, "Status: {reset:#010x}\n")?;

        Ok([initial, enabled, reset])
    }

    /// Replays scripted steps, printing the status after each one.
    ///
    /// # Errors
    ///
    /// Propagates the first transfer or output failure.
    pub fn run_script<W: Write>(
        &mut self,
        steps: &[ScriptStep],
        out: &mut W,
    ) -> Result<(), ProbeError> {
        for step in steps {
            if let ScriptStep::Write(word) = *step {
                writeln!(out, "=== Writing {word:#010x} ===")?;
                self.write_command(word)?;
            }
            let status = self.read_status()?;
            writeln!(out, "Status: {status:#010x}")?;
        }
        Ok(())
    }
}

/// Brings up an in-process node, opens one session, and hands it to `body`.
///
/// The session closes and the node is torn down before this returns.
///
/// # Errors
///
/// Returns [`ProbeError::Host`] when bring-up or open fails, otherwise
/// whatever `body` returns.
pub fn with_hosted_probe<R>(
    config: DeviceConfig,
    body: impl FnOnce(&mut Probe<Session>) -> Result<R, ProbeError>,
) -> Result<R, ProbeError> {
    let registry = NodeRegistry::default();
    let host = DeviceHost::bring_up(&registry, config)?;
    let session = host.open()?;
    info!(
        "opened {} (session {})",
        host.config().node_path(),
        session.id()
    );

    let mut probe = Probe::new(session);
    body(&mut probe)
}

#[cfg(test)]
mod tests {
    use super::{with_hosted_probe, Probe, ProbeError};
    use crate::script::ScriptStep;
    use device_core::DeviceConfig;
    use std::io::{self, Read, Write};

    /// Stream that accepts at most `limit` bytes per transfer.
    struct NarrowStream {
        limit: usize,
    }

    impl Read for NarrowStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            buf[..n].fill(0);
            Ok(n)
        }
    }

    impl Write for NarrowStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len().min(self.limit))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn smoke_run_reproduces_reference_sequence() {
        let mut out = Vec::new();
        let statuses = with_hosted_probe(DeviceConfig::default(), |probe| probe.run_smoke(&mut out))
            .expect("smoke run succeeds");

        assert_eq!(statuses, [0x1, 0x2, 0x1]);
        let text = String::from_utf8(out).expect("utf-8 output");
        assert!(text.starts_with("=== Reading initial status ===\nStatus: 0x00000001\n"));
        assert!(text.contains("=== Reading status after enable ===\nStatus: 0x00000002\n"));
        assert!(text.ends_with("=== Reading status after reset ===\nStatus: 0x00000001\n\n"));
    }

    #[test]
    fn script_run_prints_status_after_each_step() {
        let steps = [ScriptStep::Read, ScriptStep::Write(3), ScriptStep::Write(1)];
        let mut out = Vec::new();
        with_hosted_probe(DeviceConfig::default(), |probe| probe.run_script(&steps, &mut out))
            .expect("script run succeeds");

        assert_eq!(
            String::from_utf8(out).expect("utf-8 output"),
            "Status: 0x00000001\n\
             === Writing 0x00000003 ===\n\
             Status: 0x00000001\n\
             === Writing 0x00000001 ===\n\
             Status: 0x00000002\n"
        );
    }

    #[test]
    fn short_transfers_are_reported() {
        let mut probe = Probe::new(NarrowStream { limit: 2 });
        assert!(matches!(
            probe.read_status(),
            Err(ProbeError::ShortTransfer {
                direction: "read",
                actual: 2
            })
        ));
        assert!(matches!(
            probe.write_command(1),
            Err(ProbeError::ShortTransfer {
                direction: "write",
                actual: 2
            })
        ));
    }

    #[test]
    fn host_failures_surface_as_probe_errors() {
        let config = DeviceConfig::default().with_session_limit(0);
        let result = with_hosted_probe(config, |probe| probe.read_status());
        assert!(matches!(result, Err(ProbeError::Host(_))));
    }
}
