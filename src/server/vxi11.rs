//! VXI-11 core channel responder.
//!
//! One TCP listener, one connection at a time. A session runs Idle → Linked
//! → Closed: CREATE_LINK opens a link, DEVICE_WRITE feeds the SCPI
//! dispatcher (queueing at most one query response per link), DEVICE_READ
//! drains the queued response, DESTROY_LINK ends the session. After every
//! served connection the listener hops to the other port of the
//! [`PortCycle`] — the Siglent scope re-resolves the port through Portmap
//! before each session and will not reconnect without the hop.

use std::{
    collections::HashMap,
    io::{self, Cursor},
    net::{IpAddr, SocketAddr},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_std::net::TcpListener;
use futures::lock::Mutex;

use crate::common::{
    onc_rpc::prelude::*,
    vxi11::{self, xdr},
    xdr::prelude::*,
};
use crate::scpi::ScpiDispatcher;

use super::PortCycle;

pub mod prelude {
    pub use super::VxiCoreServer;
    pub use crate::common::vxi11::{
        DEVICE_CORE, DEVICE_CORE_VERSION, VXI11_PORT_A, VXI11_PORT_B,
    };
}

/// A link handle produced by CREATE_LINK. The only state worth keeping is
/// the device name and the one pending query response.
struct Link {
    device: String,
    pending: Option<Vec<u8>>,
}

impl Link {
    fn new(device: String) -> Self {
        Self {
            device,
            pending: None,
        }
    }
}

/// State shared across sessions: the link id counter and the dispatcher
/// owning the AWG driver. Sessions run one at a time, the mutex only
/// bridges the session boundary.
struct VxiInner {
    link_id: u32,
    dispatcher: ScpiDispatcher,
}

impl VxiInner {
    fn next_link_id(&mut self) -> u32 {
        self.link_id += 1;
        self.link_id
    }
}

/// Core RPC service owning the hopping listener.
pub struct VxiCoreServer {
    inner: Arc<Mutex<VxiInner>>,
    ports: Arc<PortCycle>,
    max_recv_size: u32,
}

impl VxiCoreServer {
    pub fn new(dispatcher: ScpiDispatcher, ports: Arc<PortCycle>) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(Mutex::new(VxiInner {
                link_id: 0,
                dispatcher,
            })),
            ports,
            max_recv_size: MAX_RECORD_SIZE as u32,
        })
    }

    /// Accept and serve sessions forever, flipping ports between them.
    pub async fn serve(self: Arc<Self>, addr: IpAddr) -> io::Result<()> {
        let mut listener = TcpListener::bind((addr, self.ports.current())).await?;
        loop {
            log::info!("VXI-11 listening on TCP port {}", self.ports.current());
            let (stream, peer) = listener.accept().await?;
            log::info!("Incoming connection from {}", peer);

            let session = Arc::new(VxiCoreSession {
                peer,
                inner: self.inner.clone(),
                max_recv_size: self.max_recv_size,
                links: Mutex::new(HashMap::new()),
                finished: AtomicBool::new(false),
            });
            match session.serve_tcp_stream(stream).await {
                Ok(()) => log::debug!(peer = peer.to_string(); "Session closed"),
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    log::debug!(peer = peer.to_string(); "Client disconnected")
                }
                Err(err) => log::debug!("Error processing client: {}", err),
            }

            // Bind the alternate port before advertising it; Portmap must
            // never point at an unbound port.
            listener = TcpListener::bind((addr, self.ports.next())).await?;
            let port = self.ports.advance();
            log::info!("VXI-11 moving to TCP port {}", port);
        }
    }
}

/// Per-connection session state.
pub(crate) struct VxiCoreSession {
    peer: SocketAddr,
    inner: Arc<Mutex<VxiInner>>,
    max_recv_size: u32,
    links: Mutex<HashMap<u32, Link>>,
    finished: AtomicBool,
}

impl VxiCoreSession {
    #[cfg(test)]
    pub(crate) fn for_tests(dispatcher: ScpiDispatcher) -> Arc<Self> {
        Arc::new(Self {
            peer: ([127, 0, 0, 1], 0).into(),
            inner: Arc::new(Mutex::new(VxiInner {
                link_id: 0,
                dispatcher,
            })),
            max_recv_size: MAX_RECORD_SIZE as u32,
            links: Mutex::new(HashMap::new()),
            finished: AtomicBool::new(false),
        })
    }

    /// A body that would not decode: reply GARBAGE_ARGS, then drop the
    /// connection once the reply is out.
    fn garbage_args(&self) -> RpcError {
        self.finished.store(true, Ordering::Relaxed);
        RpcError::GarbageArgs
    }
}

#[async_trait::async_trait]
impl RpcService for VxiCoreSession {
    fn session_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    async fn call(
        self: Arc<Self>,
        prog: u32,
        vers: u32,
        proc: u32,
        args: &mut Cursor<Vec<u8>>,
        ret: &mut Cursor<Vec<u8>>,
    ) -> Result<(), RpcError>
    where
        Self: Sync,
    {
        // An abort aimed at the (never-bound) async channel is tolerated
        // if it shows up on the core connection.
        if prog == vxi11::DEVICE_ASYNC {
            return match proc {
                0 => Ok(()),
                vxi11::DEVICE_ABORT => {
                    xdr::DeviceError::default().write_xdr(ret)?;
                    Ok(())
                }
                _ => Err(RpcError::ProcUnavail),
            };
        }

        if prog != vxi11::DEVICE_CORE {
            return Err(RpcError::ProgUnavail);
        }

        if vers != vxi11::DEVICE_CORE_VERSION {
            return Err(RpcError::ProgMismatch(MismatchInfo {
                low: vxi11::DEVICE_CORE_VERSION,
                high: vxi11::DEVICE_CORE_VERSION,
            }));
        }

        match proc {
            0 => Ok(()),
            vxi11::CREATE_LINK => {
                let mut parms = xdr::CreateLinkParms::default();
                parms.read_xdr(args).map_err(|_| self.garbage_args())?;

                let mut resp = xdr::CreateLinkResp {
                    error: xdr::DeviceErrorCode::NoError,
                    lid: 0.into(),
                    abort_port: 0,
                    max_recv_size: self.max_recv_size,
                };

                if parms.device.is_empty() {
                    log::debug!(peer = self.peer.to_string(); "Empty device name");
                    resp.error = xdr::DeviceErrorCode::InvalidAddress;
                } else {
                    let lid = {
                        let mut inner = self.inner.lock().await;
                        inner.next_link_id()
                    };
                    resp.lid = lid.into();
                    log::info!("VXI-11 CREATE_LINK, SCPI command: {}", parms.device);
                    log::debug!(peer = self.peer.to_string(), link = lid;
                        "New link: {}, client_id={}", parms.device, parms.client_id);
                    self.links.lock().await.insert(lid, Link::new(parms.device));
                }

                resp.write_xdr(ret)?;
                Ok(())
            }
            vxi11::DEVICE_WRITE => {
                let mut parms = xdr::DeviceWriteParms::default();
                parms.read_xdr(args).map_err(|_| self.garbage_args())?;

                let payload = String::from_utf8_lossy(&parms.data);
                let payload = payload.trim_end();
                log::info!("VXI-11 DEVICE_WRITE, SCPI command: {}", payload);
                log::debug!(peer = self.peer.to_string(), link = parms.lid.0,
                    flags = parms.flags.to_string(); "Write {} bytes", parms.data.len());

                let response = {
                    let mut inner = self.inner.lock().await;
                    inner.dispatcher.execute(payload)
                };

                // Any link id the client presents is accepted; a query
                // response replaces whatever was still queued on it.
                let mut links = self.links.lock().await;
                let link = links
                    .entry(parms.lid.0)
                    .or_insert_with(|| Link::new(String::new()));
                if let Some(response) = response {
                    link.pending = Some(format!("{}\n", response).into_bytes());
                }

                let resp = xdr::DeviceWriteResp {
                    error: xdr::DeviceErrorCode::NoError,
                    size: parms.data.len() as u32,
                };
                resp.write_xdr(ret)?;
                Ok(())
            }
            vxi11::DEVICE_READ => {
                let mut parms = xdr::DeviceReadParms::default();
                parms.read_xdr(args).map_err(|_| self.garbage_args())?;

                log::info!("VXI-11 DEVICE_READ, SCPI command: None");
                log::debug!(peer = self.peer.to_string(), link = parms.lid.0;
                    "Read request_size={}", parms.request_size);

                let data = {
                    let mut links = self.links.lock().await;
                    links
                        .get_mut(&parms.lid.0)
                        .and_then(|link| link.pending.take())
                        .unwrap_or_default()
                };

                let resp = xdr::DeviceReadResp {
                    error: xdr::DeviceErrorCode::NoError,
                    reason: vxi11::READ_REASON_END,
                    data: data.into(),
                };
                resp.write_xdr(ret)?;
                Ok(())
            }
            vxi11::DESTROY_LINK => {
                let mut parms = xdr::DeviceLink::default();
                parms.read_xdr(args).map_err(|_| self.garbage_args())?;

                log::info!("VXI-11 DESTROY_LINK, SCPI command: None");
                if let Some(link) = self.links.lock().await.remove(&parms.0) {
                    log::debug!(peer = self.peer.to_string(), link = parms.0;
                        "Link closed: {}", link.device);
                }

                xdr::DeviceError::default().write_xdr(ret)?;

                // Reply first, then let the connection wind down; the port
                // flip happens once the socket is gone.
                self.finished.store(true, Ordering::Relaxed);
                Ok(())
            }
            vxi11::DEVICE_READSTB => {
                log::debug!(peer = self.peer.to_string(); "Tolerated READSTB");
                xdr::DeviceReadStbResp::default().write_xdr(ret)?;
                Ok(())
            }
            vxi11::DEVICE_TRIGGER
            | vxi11::DEVICE_CLEAR
            | vxi11::DEVICE_REMOTE
            | vxi11::DEVICE_LOCAL
            | vxi11::DEVICE_LOCK
            | vxi11::DEVICE_UNLOCK
            | vxi11::DEVICE_ENABLE_SRQ => {
                log::debug!(peer = self.peer.to_string(); "Tolerated procedure {}", proc);
                xdr::DeviceError::default().write_xdr(ret)?;
                Ok(())
            }
            vxi11::DEVICE_DOCMD => {
                log::debug!(peer = self.peer.to_string(); "Docmd not supported");
                let resp = xdr::DeviceDocmdResp {
                    error: xdr::DeviceErrorCode::OperationNotSupported,
                    data_out: Default::default(),
                };
                resp.write_xdr(ret)?;
                Ok(())
            }
            _ => Err(RpcError::ProcUnavail),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::awg::dummy::DummyAwg;
    use crate::common::onc_rpc::xdr::{AcceptStat, MsgType, ReplyStat, RpcMessage};

    fn session() -> Arc<VxiCoreSession> {
        VxiCoreSession::for_tests(ScpiDispatcher::new(Box::new(DummyAwg::new())))
    }

    fn encode_call<A: XdrEncode>(proc: u32, args: A) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        RpcMessage::call(99, vxi11::DEVICE_CORE, vxi11::DEVICE_CORE_VERSION, proc)
            .write_xdr(&mut cursor)
            .unwrap();
        args.write_xdr(&mut cursor).unwrap();
        cursor.into_inner()
    }

    async fn roundtrip<A, R>(session: &Arc<VxiCoreSession>, proc: u32, args: A) -> R
    where
        A: XdrEncode,
        R: XdrDecode + Default,
    {
        let reply = session
            .clone()
            .handle_message(encode_call(proc, args))
            .await
            .unwrap();
        let mut cursor = Cursor::new(reply);
        let mut msg = RpcMessage::default();
        msg.read_xdr(&mut cursor).unwrap();
        match msg.mtype {
            MsgType::Reply(body) => match body.stat {
                ReplyStat::Accepted(accepted) => assert_eq!(accepted.stat, AcceptStat::Success),
                other => panic!("denied: {:?}", other),
            },
            other => panic!("not a reply: {:?}", other),
        }
        let mut ret: R = Default::default();
        ret.read_xdr(&mut cursor).unwrap();
        ret
    }

    fn write_parms(lid: u32, payload: &str) -> xdr::DeviceWriteParms {
        xdr::DeviceWriteParms {
            lid: lid.into(),
            io_timeout: 2000,
            lock_timeout: 2000,
            flags: Default::default(),
            data: payload.as_bytes().into(),
        }
    }

    fn read_parms(lid: u32) -> xdr::DeviceReadParms {
        xdr::DeviceReadParms {
            lid: lid.into(),
            request_size: 256,
            io_timeout: 2000,
            lock_timeout: 2000,
            flags: Default::default(),
            term_char: 0,
        }
    }

    #[async_std::test]
    async fn idn_handshake_session() {
        let session = session();

        let link: xdr::CreateLinkResp = roundtrip(
            &session,
            vxi11::CREATE_LINK,
            xdr::CreateLinkParms {
                client_id: 1,
                lock_device: false,
                lock_timeout: 0,
                device: "inst0".to_string(),
            },
        )
        .await;
        assert_eq!(link.error, xdr::DeviceErrorCode::NoError);
        assert_eq!(link.abort_port, 0);

        let written: xdr::DeviceWriteResp = roundtrip(
            &session,
            vxi11::DEVICE_WRITE,
            write_parms(link.lid.0, "IDN-SGLT-PRI?\n"),
        )
        .await;
        assert_eq!(written.error, xdr::DeviceErrorCode::NoError);
        assert_eq!(written.size, "IDN-SGLT-PRI?\n".len() as u32);

        let read: xdr::DeviceReadResp =
            roundtrip(&session, vxi11::DEVICE_READ, read_parms(link.lid.0)).await;
        assert_eq!(read.reason, vxi11::READ_REASON_END);
        assert!(read.data.starts_with(b"IDN-SGLT-PRI,"));
        assert!(read.data.ends_with(b"\n"));

        // The pending slot was consumed by the read.
        let empty: xdr::DeviceReadResp =
            roundtrip(&session, vxi11::DEVICE_READ, read_parms(link.lid.0)).await;
        assert_eq!(empty.reason, vxi11::READ_REASON_END);
        assert!(empty.data.is_empty());

        assert!(!session.session_finished());
        let _: xdr::DeviceError =
            roundtrip(&session, vxi11::DESTROY_LINK, link.lid).await;
        assert!(session.session_finished());
    }

    #[async_std::test]
    async fn write_without_query_leaves_read_empty() {
        let session = session();
        let link: xdr::CreateLinkResp = roundtrip(
            &session,
            vxi11::CREATE_LINK,
            xdr::CreateLinkParms {
                device: "inst0".to_string(),
                ..Default::default()
            },
        )
        .await;

        let _: xdr::DeviceWriteResp = roundtrip(
            &session,
            vxi11::DEVICE_WRITE,
            write_parms(link.lid.0, "C1:BSWV FRQ,100"),
        )
        .await;
        let read: xdr::DeviceReadResp =
            roundtrip(&session, vxi11::DEVICE_READ, read_parms(link.lid.0)).await;
        assert!(read.data.is_empty());
    }

    #[async_std::test]
    async fn unknown_link_id_is_accepted() {
        let session = session();
        let written: xdr::DeviceWriteResp = roundtrip(
            &session,
            vxi11::DEVICE_WRITE,
            write_parms(4711, "C1:BSWV?"),
        )
        .await;
        assert_eq!(written.error, xdr::DeviceErrorCode::NoError);

        let read: xdr::DeviceReadResp =
            roundtrip(&session, vxi11::DEVICE_READ, read_parms(4711)).await;
        assert!(read.data.starts_with(b"C1:BSWV WVTP,SINE"));
    }

    #[async_std::test]
    async fn tolerated_procedures_keep_the_link() {
        let session = session();
        let trigger: xdr::DeviceError = roundtrip(
            &session,
            vxi11::DEVICE_TRIGGER,
            xdr::DeviceGenericParms::default(),
        )
        .await;
        assert_eq!(trigger.error, xdr::DeviceErrorCode::NoError);
        assert!(!session.session_finished());
    }

    #[async_std::test]
    async fn malformed_body_replies_garbage_args_and_closes() {
        let session = session();
        // CREATE_LINK with a truncated body.
        let mut cursor = Cursor::new(Vec::new());
        RpcMessage::call(1, vxi11::DEVICE_CORE, 1, vxi11::CREATE_LINK)
            .write_xdr(&mut cursor)
            .unwrap();
        7u32.write_xdr(&mut cursor).unwrap();

        let reply = session
            .clone()
            .handle_message(cursor.into_inner())
            .await
            .unwrap();
        let mut cursor = Cursor::new(reply);
        let mut msg = RpcMessage::default();
        msg.read_xdr(&mut cursor).unwrap();
        match msg.mtype {
            MsgType::Reply(body) => match body.stat {
                ReplyStat::Accepted(accepted) => {
                    assert_eq!(accepted.stat, AcceptStat::GarbageArgs)
                }
                other => panic!("denied: {:?}", other),
            },
            other => panic!("not a reply: {:?}", other),
        }
        assert!(session.session_finished());
    }
}
