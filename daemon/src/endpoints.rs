/// Remote TCP port sampling per process.
///
/// On Windows the IPv4 and IPv6 connection tables come from the IP Helper API
/// (`GetTcpTable2` / `GetTcp6Table2`). Both calls use the probe-then-allocate
/// pattern, which lives in [`query_with_adaptive_buffer`].
///
/// On other platforms the sampler compiles but reports no ports.
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

/// Returns the remote ports of a process's open TCP connections.
pub trait EndpointSampler {
    fn remote_ports(&mut self, pid: u32) -> BTreeSet<u16>;
}

// ── Adaptive buffer ───────────────────────────────────────────────────────────

/// Outcome of one OS table query into a caller-supplied buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// The table was written into the buffer.
    Complete,
    /// The buffer was too small; `required` is the size in bytes the OS reported.
    BufferTooSmall { required: usize },
    /// Any other failure, with the raw OS status code.
    Failed(u32),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableQueryError {
    #[error("table query failed with status {code}")]
    Failed { code: u32 },
    #[error("table did not fit in a resized buffer of {required} bytes")]
    StillTooSmall { required: usize },
}

/// Byte buffer with 8-byte alignment, suitable for the OS table structs.
pub struct TableBuffer {
    words: Vec<u64>,
    byte_len: usize,
}

impl TableBuffer {
    pub fn with_byte_len(byte_len: usize) -> Self {
        Self {
            words: vec![0; byte_len.div_ceil(8).max(1)],
            byte_len,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr().cast()
    }
}

/// Runs `query` against a buffer of `probe_len` bytes. If the OS reports the
/// buffer is too small, reallocates to the reported size and retries exactly
/// once. Any other failure, or a second "too small", is returned as an error.
pub fn query_with_adaptive_buffer<F>(
    probe_len: usize,
    mut query: F,
) -> Result<TableBuffer, TableQueryError>
where
    F: FnMut(&mut TableBuffer) -> QueryStatus,
{
    let mut buf = TableBuffer::with_byte_len(probe_len);
    let required = match query(&mut buf) {
        QueryStatus::Complete => return Ok(buf),
        QueryStatus::Failed(code) => return Err(TableQueryError::Failed { code }),
        QueryStatus::BufferTooSmall { required } => required,
    };

    let mut buf = TableBuffer::with_byte_len(required);
    match query(&mut buf) {
        QueryStatus::Complete => Ok(buf),
        QueryStatus::Failed(code) => Err(TableQueryError::Failed { code }),
        QueryStatus::BufferTooSmall { required } => {
            Err(TableQueryError::StillTooSmall { required })
        }
    }
}

// ── Row filtering ─────────────────────────────────────────────────────────────

/// The two fields of a TCP table row the sampler cares about.
#[derive(Debug, Clone, Copy)]
pub struct TcpRow {
    pub owning_pid: u32,
    /// Remote port as stored by the OS: network byte order in the low 16 bits.
    pub remote_port_raw: u32,
}

/// Collects the host-order remote ports of every row owned by `pid` into `ports`.
pub fn collect_ports_for_pid(
    rows: impl IntoIterator<Item = TcpRow>,
    pid: u32,
    ports: &mut BTreeSet<u16>,
) {
    ports.extend(
        rows.into_iter()
            .filter(|row| row.owning_pid == pid)
            .map(|row| u16::from_be(row.remote_port_raw as u16)),
    );
}

// ── Platform sampler ──────────────────────────────────────────────────────────

/// [`EndpointSampler`] over the host's own connection tables.
pub struct SystemEndpointSampler;

impl EndpointSampler for SystemEndpointSampler {
    fn remote_ports(&mut self, pid: u32) -> BTreeSet<u16> {
        #[cfg(windows)]
        let families = [("ipv4", imp::tcp4_rows()), ("ipv6", imp::tcp6_rows())];
        #[cfg(not(windows))]
        let families: [(&'static str, Result<Vec<TcpRow>, TableQueryError>); 0] = [];
        ports_from_families(pid, families)
    }
}

/// Unions the ports of `pid` across address families. A family whose table
/// query failed contributes nothing; the others are still used.
fn ports_from_families(
    pid: u32,
    families: impl IntoIterator<Item = (&'static str, Result<Vec<TcpRow>, TableQueryError>)>,
) -> BTreeSet<u16> {
    let mut ports = BTreeSet::new();
    for (family, rows) in families {
        match rows {
            Ok(rows) => collect_ports_for_pid(rows, pid, &mut ports),
            Err(e) => debug!(pid, family, error = %e, "TCP table unavailable"),
        }
    }
    ports
}

// ── Windows implementation ────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use std::mem::{offset_of, size_of};

    use windows::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, NO_ERROR};
    use windows::Win32::NetworkManagement::IpHelper::{
        GetTcp6Table2, GetTcpTable2, MIB_TCP6ROW2, MIB_TCP6TABLE2, MIB_TCPROW2, MIB_TCPTABLE2,
    };

    use super::{query_with_adaptive_buffer, QueryStatus, TableBuffer, TableQueryError, TcpRow};

    fn status(rc: u32, size: u32) -> QueryStatus {
        if rc == NO_ERROR.0 {
            QueryStatus::Complete
        } else if rc == ERROR_INSUFFICIENT_BUFFER.0 {
            QueryStatus::BufferTooSmall { required: size as usize }
        } else {
            QueryStatus::Failed(rc)
        }
    }

    /// Number of rows actually readable from `buf`, capped by the buffer size
    /// in case the reported count and the allocation disagree.
    fn readable_rows(buf: &TableBuffer, reported: u32, rows_offset: usize, row_size: usize) -> usize {
        let capacity = buf.byte_len().saturating_sub(rows_offset) / row_size;
        (reported as usize).min(capacity)
    }

    pub fn tcp4_rows() -> Result<Vec<TcpRow>, TableQueryError> {
        let buf = query_with_adaptive_buffer(size_of::<MIB_TCPTABLE2>(), |buf| {
            let mut size = buf.byte_len() as u32;
            let rc = unsafe {
                GetTcpTable2(Some(buf.as_mut_ptr().cast::<MIB_TCPTABLE2>()), &mut size, false)
            };
            status(rc, size)
        })?;

        let table = buf.as_ptr().cast::<MIB_TCPTABLE2>();
        // SAFETY: the buffer is 8-byte aligned and was filled by GetTcpTable2;
        // the row count is bounded by the allocation.
        let rows = unsafe {
            let reported = (*table).dwNumEntries;
            let count = readable_rows(
                &buf,
                reported,
                offset_of!(MIB_TCPTABLE2, table),
                size_of::<MIB_TCPROW2>(),
            );
            std::slice::from_raw_parts((*table).table.as_ptr(), count)
        };
        Ok(rows
            .iter()
            .map(|row| TcpRow { owning_pid: row.dwOwningPid, remote_port_raw: row.dwRemotePort })
            .collect())
    }

    pub fn tcp6_rows() -> Result<Vec<TcpRow>, TableQueryError> {
        let buf = query_with_adaptive_buffer(size_of::<MIB_TCP6TABLE2>(), |buf| {
            let mut size = buf.byte_len() as u32;
            let rc = unsafe {
                GetTcp6Table2(buf.as_mut_ptr().cast::<MIB_TCP6TABLE2>(), &mut size, false)
            };
            status(rc, size)
        })?;

        let table = buf.as_ptr().cast::<MIB_TCP6TABLE2>();
        // SAFETY: as above, for the IPv6 table layout.
        let rows = unsafe {
            let reported = (*table).dwNumEntries;
            let count = readable_rows(
                &buf,
                reported,
                offset_of!(MIB_TCP6TABLE2, table),
                size_of::<MIB_TCP6ROW2>(),
            );
            std::slice::from_raw_parts((*table).table.as_ptr(), count)
        };
        Ok(rows
            .iter()
            .map(|row| TcpRow { owning_pid: row.dwOwningPid, remote_port_raw: row.dwRemotePort })
            .collect())
    }
}
