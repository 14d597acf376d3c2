//! Command/acknowledgment link to the drone.
//!
//! Commands are plain ASCII datagrams. The drone answers some of them with a
//! single datagram and there is no sequencing, so a reply can only be matched
//! to a request by timing. The channel therefore allows one send at a time: an
//! acknowledged send installs a one-shot waiter before transmitting, the
//! receive task hands the next datagram to that waiter, and anything arriving
//! with no waiter installed is dropped. Datagrams still queued when a send
//! starts are drained first, since they answer earlier commands.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex as SendLock};
use tokio::time::{sleep, timeout, Duration};
use tokio::{spawn, task};

use crate::command::Response;
use crate::errors::{Result, TelloError};

/// Largest reply datagram read from the drone.
pub const MAX_RESPONSE_SIZE: usize = 3000;

const CONNECT_ATTEMPTS: u32 = 10;

type Waiter = Arc<Mutex<Option<oneshot::Sender<Response>>>>;

#[derive(Debug)]
struct Endpoint {
    sock: Arc<UdpSocket>,
    // nonblocking handle on the same socket, read directly so the drain
    // never depends on the runtime having seen the socket become readable
    stale: std::net::UdpSocket,
}

#[derive(Debug)]
pub struct CommandChannel {
    endpoint: Mutex<Option<Arc<Endpoint>>>,
    waiter: Waiter,
    // held for the whole of every send, so at most one acknowledged
    // command is ever outstanding
    send_lock: SendLock<()>,
    task: task::JoinHandle<()>,
}

impl CommandChannel {
    /// Binds `local_address`, connects to `drone_address` and starts the
    /// receive task.
    pub async fn open(local_address: &str, drone_address: &str) -> Result<Self> {
        info!("[Command] OPEN {local_address} → {drone_address}");
        let sock = UdpSocket::bind(local_address).await?;

        let mut i = 0;
        loop {
            i += 1;
            match sock.connect(drone_address).await {
                Ok(_) => break,
                Err(err) if i < CONNECT_ATTEMPTS => {
                    warn!("[Command] connection attempt #{i} failed ({err}), retrying...");
                    sleep(Duration::from_millis(100)).await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        let std_sock = sock.into_std()?;
        let stale = std_sock.try_clone()?;
        stale.set_nonblocking(true)?;
        let sock = Arc::new(UdpSocket::from_std(std_sock)?);

        let waiter = Waiter::default();
        let task = spawn(receive_responses(sock.clone(), waiter.clone()));

        Ok(Self {
            endpoint: Mutex::new(Some(Arc::new(Endpoint { sock, stale }))),
            waiter,
            send_lock: SendLock::new(()),
            task,
        })
    }

    /// Sends `command` and waits up to `wait` for the reply.
    ///
    /// Returns [`Response::NoResponse`] if nothing arrives in time. Concurrent
    /// callers queue behind each other, so each reply is attributed to the
    /// command that was outstanding when it arrived.
    pub async fn send_acknowledged(&self, command: &str, wait: Duration) -> Result<Response> {
        let _serial = self.send_lock.lock().await;
        let endpoint = self.endpoint()?;
        drain_stale(&endpoint.stale);

        let (tx, rx) = oneshot::channel();
        lock(&self.waiter).replace(tx);

        debug!("[Command] SEND {command}");
        if let Err(err) = transmit(&endpoint.sock, command).await {
            lock(&self.waiter).take();
            return Err(err);
        }

        match timeout(wait, rx).await {
            Ok(Ok(response)) => {
                debug!("[Command] {command} → {response}");
                Ok(response)
            }
            // waiter dropped by close()
            Ok(Err(_)) => Err(TelloError::ChannelClosed),
            Err(_) => {
                lock(&self.waiter).take();
                debug!("[Command] no response to {command} within {wait:?}");
                Ok(Response::NoResponse)
            }
        }
    }

    /// Sends `command` without waiting. A reply, if the drone sends one, is
    /// discarded.
    pub async fn send_without_response(&self, command: &str) -> Result<()> {
        let _serial = self.send_lock.lock().await;
        let endpoint = self.endpoint()?;
        drain_stale(&endpoint.stale);
        debug!("[Command] SEND {command} (no response)");
        transmit(&endpoint.sock, command).await
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.endpoint()?.sock.local_addr()?)
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.endpoint).is_none()
    }

    /// Stops the receive task and releases the socket. Closing twice, or
    /// sending after close, fails with [`TelloError::ChannelClosed`].
    pub fn close(&self) -> Result<()> {
        let endpoint = lock(&self.endpoint).take().ok_or(TelloError::ChannelClosed)?;
        info!("[Command] CLOSE");
        self.task.abort();
        lock(&self.waiter).take();
        drop(endpoint);
        Ok(())
    }

    fn endpoint(&self) -> Result<Arc<Endpoint>> {
        lock(&self.endpoint).clone().ok_or(TelloError::ChannelClosed)
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn receive_responses(sock: Arc<UdpSocket>, waiter: Waiter) {
    let mut buf = vec![0; MAX_RESPONSE_SIZE];
    loop {
        let n = match sock.recv(&mut buf).await {
            Ok(n) => n,
            Err(err) => {
                warn!("[Command] receive failed: {err}");
                continue;
            }
        };

        let response = Response::from_datagram(buf[..n].to_vec());
        let pending = lock(&waiter).take();
        match pending {
            Some(tx) => {
                if let Err(response) = tx.send(response) {
                    debug!("[Command] waiter gone, dropped {response}");
                }
            }
            None => debug!("[Command] unsolicited response dropped: {response}"),
        }
    }
}

/// Discards datagrams already queued on the socket; they answer earlier
/// commands.
fn drain_stale(sock: &std::net::UdpSocket) {
    let mut buf = [0; MAX_RESPONSE_SIZE];
    loop {
        match sock.recv(&mut buf) {
            Ok(n) => {
                let response = Response::from_datagram(buf[..n].to_vec());
                debug!("[Command] stale response dropped: {response}");
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => break,
            // pending ICMP errors from earlier sends
            Err(err) => debug!("[Command] stale receive error dropped: {err}"),
        }
    }
}

/// Sends one datagram. A refused send means nothing listens at the drone
/// address right now, which is a lost datagram rather than a failure.
async fn transmit(sock: &UdpSocket, command: &str) -> Result<()> {
    for attempt in 1..=2 {
        match sock.send(command.as_bytes()).await {
            Ok(_) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::ConnectionRefused => {
                warn!("[Command] send of {command} refused (attempt #{attempt})");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
