//! Thin façade over intra-process (simulated ranks) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: the exchange stages call
//! `.wait()` before they trust that the buffer is ready.
//!
//! Delivery contract: byte buffers arrive reliably and in FIFO order per
//! `(source, destination, tag)`.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Non-blocking point-to-point transport.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of `buf.len()` bytes; the data is returned by `wait`.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Rank of this process.
    fn rank(&self) -> usize;
    /// Number of processes.
    fn size(&self) -> usize;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    /// `None` on a receive handle means the transport failed.
    fn wait(self) -> Option<Vec<u8>>;
}

/// Typed message tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    #[inline]
    pub const fn base(self) -> u16 {
        self.0
    }
    /// Derived tag `base + n`, wrapping on overflow.
    #[inline]
    pub const fn offset(self, n: u16) -> CommTag {
        CommTag(self.0.wrapping_add(n))
    }
}

/// Compile-time no-op comm for single-process runs and pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
}

// --- LocalComm: several ranks inside one process ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Mailbox {
    queues: DashMap<Key, VecDeque<Bytes>>,
    lock: Mutex<()>,
    arrived: Condvar,
}

/// Default time a [`LocalComm`] receive waits before reporting failure.
pub const LOCAL_RECV_TIMEOUT: Duration = Duration::from_secs(60);

/// Simulated ranks sharing one in-process mailbox.
///
/// Build the whole world with [`LocalComm::world`] and hand one handle to each
/// thread that plays a process.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
    timeout: Duration,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl LocalComm {
    /// One communicator per rank, all wired to the same mailbox.
    pub fn world(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: mailbox.clone(),
                timeout: LOCAL_RECV_TIMEOUT,
            })
            .collect()
    }

    /// Override how long a receive blocks before it fails.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    len: usize,
    timeout: Duration,
}

impl LocalHandle {
    fn take(&self) -> Option<Vec<u8>> {
        let mut queue = self.mailbox.queues.get_mut(&self.key)?;
        let bytes = queue.pop_front()?;
        let n = self.len.min(bytes.len());
        Some(bytes[..n].to_vec())
    }
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let deadline = Instant::now() + self.timeout;
        let mut guard = self.mailbox.lock.lock();
        loop {
            if let Some(data) = self.take() {
                return Some(data);
            }
            if self
                .mailbox
                .arrived
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                return self.take();
            }
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        {
            let _guard = self.mailbox.lock.lock();
            self.mailbox
                .queues
                .entry(key)
                .or_default()
                .push_back(Bytes::copy_from_slice(buf));
        }
        self.mailbox.arrived.notify_all();
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: self.mailbox.clone(),
            key: (peer, self.rank, tag),
            len: buf.len(),
            timeout: self.timeout,
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;
    use std::sync::Arc;

    struct MpiWorld {
        // keeps MPI initialized for as long as a handle exists
        _universe: Universe,
        world: SimpleCommunicator,
    }

    #[derive(Clone)]
    pub struct MpiComm {
        inner: Arc<MpiWorld>,
        rank: usize,
        size: usize,
    }

    // All MPI calls are issued from the thread that drives the rounds; the
    // worker pool only runs block callbacks.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        /// Initialize MPI; `None` if it was already initialized.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                inner: Arc::new(MpiWorld {
                    _universe: universe,
                    world,
                }),
                rank,
                size,
            })
        }
    }

    pub struct MpiSendHandle {
        req: Request<'static, [u8], StaticScope>,
        data: *mut [u8],
    }

    impl Wait for MpiSendHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.req.wait();
            // the request is complete, so the leaked send buffer can be reclaimed
            drop(unsafe { Box::from_raw(self.data) });
            None
        }
    }

    pub struct MpiRecvHandle {
        inner: Arc<MpiWorld>,
        peer: i32,
        tag: i32,
        len: usize,
    }

    impl Wait for MpiRecvHandle {
        fn wait(self) -> Option<Vec<u8>> {
            let (mut data, _status) = self
                .inner
                .world
                .process_at_rank(self.peer)
                .receive_vec_with_tag::<u8>(self.tag);
            data.truncate(self.len);
            Some(data)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSendHandle {
            let data: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let ptr: *mut [u8] = data;
            let req = self
                .inner
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, &*data, tag as i32);
            MpiSendHandle { req, data: ptr }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiRecvHandle {
            MpiRecvHandle {
                inner: self.inner.clone(),
                peer: peer as i32,
                tag: tag as i32,
                len: buf.len(),
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_roundtrip_two_ranks() {
        let world = LocalComm::world(2);
        let (comm0, comm1) = (&world[0], &world[1]);

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, 7, &mut recv_buf);
        let send_handle = comm0.isend(1, 7, &[1, 2, 3, 4]);
        send_handle.wait();

        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn receive_blocks_until_sender_runs() {
        let world = LocalComm::world(2);
        let receiver = world[1].clone();
        let sender = world[0].clone();
        let h = std::thread::spawn(move || {
            let mut b = [0u8; 3];
            receiver.irecv(0, 1, &mut b).wait()
        });
        std::thread::sleep(Duration::from_millis(20));
        sender.isend(1, 1, b"abc");
        assert_eq!(h.join().unwrap().unwrap(), b"abc".to_vec());
    }

    #[test]
    fn receive_times_out_without_sender() {
        let world = LocalComm::world(2);
        let comm = world[1].clone().with_timeout(Duration::from_millis(10));
        let mut b = [0u8; 1];
        assert!(comm.irecv(0, 3, &mut b).wait().is_none());
    }

    #[test]
    fn commtag_offset_wraps() {
        assert_eq!(CommTag::new(u16::MAX).offset(2).as_u16(), 1);
    }
}
