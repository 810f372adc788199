//! Portmap/Rpcbind responder advertising the hopping VXI-11 port.
//!
//! The SDS1000X-E family resolves the core channel over TCP/111, the
//! SDS800X-HD family over UDP/111; both listeners share one GETPORT
//! resolver backed by the live [`PortCycle`]. Everything beyond NULL and
//! GETPORT is answered PROC_UNAVAIL.

use std::{io, sync::Arc, time::Duration};

use async_listen::ListenExt;
use async_std::net::{TcpListener, UdpSocket};
use futures::StreamExt;

use crate::common::{
    onc_rpc::prelude::*,
    portmapper::{
        PMAPPROC_GETPORT, PMAPPROC_NULL, PORTMAPPER_PROG, PORTMAPPER_PROT_TCP,
        PORTMAPPER_VERS_MAX, PORTMAPPER_VERS_MIN,
    },
    vxi11::DEVICE_CORE,
    xdr::prelude::*,
};

use super::PortCycle;

pub mod prelude {
    pub use super::PortMapServer;
    pub use crate::common::portmapper::{
        xdr::Mapping, PORTMAPPER_PORT, PORTMAPPER_PROT_TCP, PORTMAPPER_PROT_UDP,
    };
}

use crate::common::portmapper::xdr;

pub struct PortMapServer {
    vxi11_port: Arc<PortCycle>,
}

impl PortMapServer {
    pub fn new(vxi11_port: Arc<PortCycle>) -> Arc<Self> {
        Arc::new(Self { vxi11_port })
    }

    /// Serve TCP queries, one connection at a time.
    pub async fn serve_tcp(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        log::info!("Portmap listening on TCP {}", listener.local_addr()?);
        let mut incoming = listener
            .incoming()
            .log_warnings(|warn| log::warn!("Listening error: {}", warn))
            .handle_errors(Duration::from_millis(100))
            .backpressure(1);

        while let Some((token, stream)) = incoming.next().await {
            let peer = stream.peer_addr()?;
            log::info!("Incoming connection from {}", peer);

            if let Err(err) = self.clone().serve_tcp_stream(stream).await {
                // The scope closing its side after a reply lands here.
                if err.kind() != io::ErrorKind::UnexpectedEof {
                    log::debug!("Error processing client: {}", err);
                }
            }
            drop(token);
        }
        log::info!("Stopped");
        Ok(())
    }

    /// Serve UDP queries, one datagram per message.
    pub async fn serve_udp(self: Arc<Self>, socket: UdpSocket) -> io::Result<()> {
        log::info!("Portmap listening on UDP {}", socket.local_addr()?);
        loop {
            let mut buf = vec![0; 1500];
            let (n, peer) = socket.recv_from(&mut buf).await?;
            buf.truncate(n);
            log::info!("Incoming connection from {}", peer);

            match self.clone().handle_message(buf).await {
                Ok(reply) => {
                    socket.send_to(&reply, peer).await?;
                }
                Err(err) => log::debug!("Error processing datagram: {}", err),
            }
        }
    }
}

#[async_trait::async_trait]
impl RpcService for PortMapServer {
    async fn call(
        self: Arc<Self>,
        prog: u32,
        vers: u32,
        proc: u32,
        args: &mut io::Cursor<Vec<u8>>,
        ret: &mut io::Cursor<Vec<u8>>,
    ) -> Result<(), RpcError> {
        if prog != PORTMAPPER_PROG {
            return Err(RpcError::ProgUnavail);
        }
        // rpcbind v3/v4 clients fall back to plain GETPORT, so every version
        // in the window is answered the same way.
        if !(PORTMAPPER_VERS_MIN..=PORTMAPPER_VERS_MAX).contains(&vers) {
            return Err(RpcError::ProgMismatch(MismatchInfo {
                low: PORTMAPPER_VERS_MIN,
                high: PORTMAPPER_VERS_MAX,
            }));
        }
        match proc {
            PMAPPROC_NULL => Ok(()),
            PMAPPROC_GETPORT => {
                let mut mapping = xdr::Mapping::default();
                mapping.read_xdr(args).map_err(|_| RpcError::GarbageArgs)?;

                // The only mapping that resolves is the VXI-11 core channel
                // over TCP; everything else (including UDP protocol 17)
                // reports port 0.
                let port = if mapping.prog == DEVICE_CORE && mapping.prot == PORTMAPPER_PROT_TCP {
                    self.vxi11_port.current()
                } else {
                    0
                };
                log::info!("Portmap: sending TCP port {}", port);
                port.write_xdr(ret)?;
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
    use crate::common::onc_rpc::xdr::{
        AcceptStat, MsgType, ReplyStat, RpcMessage,
    };
    use crate::common::vxi11::DEVICE_CORE_VERSION;

    fn getport_call(mapping: xdr::Mapping) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        RpcMessage::call(7, PORTMAPPER_PROG, 2, PMAPPROC_GETPORT)
            .write_xdr(&mut cursor)
            .unwrap();
        mapping.write_xdr(&mut cursor).unwrap();
        cursor.into_inner()
    }

    async fn resolve(server: &Arc<PortMapServer>, mapping: xdr::Mapping) -> u16 {
        let reply = server
            .clone()
            .handle_message(getport_call(mapping))
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
        let mut port: u16 = 0;
        port.read_xdr(&mut cursor).unwrap();
        port
    }

    #[async_std::test]
    async fn getport_tracks_the_port_cycle() {
        let cycle = PortCycle::new([9009, 9010]);
        let server = PortMapServer::new(cycle.clone());

        let core_tcp = xdr::Mapping::new(DEVICE_CORE, DEVICE_CORE_VERSION, PORTMAPPER_PROT_TCP, 0);
        assert_eq!(resolve(&server, core_tcp).await, 9009);

        cycle.advance();
        assert_eq!(resolve(&server, core_tcp).await, 9010);
    }

    #[async_std::test]
    async fn getport_for_udp_or_foreign_programs_is_zero() {
        let server = PortMapServer::new(PortCycle::new([9009, 9010]));

        let core_udp = xdr::Mapping::new(
            DEVICE_CORE,
            DEVICE_CORE_VERSION,
            crate::common::portmapper::PORTMAPPER_PROT_UDP,
            0,
        );
        assert_eq!(resolve(&server, core_udp).await, 0);

        let nfs = xdr::Mapping::new(100003, 3, PORTMAPPER_PROT_TCP, 0);
        assert_eq!(resolve(&server, nfs).await, 0);
    }

    #[async_std::test]
    async fn other_procedures_are_unavailable() {
        let server = PortMapServer::new(PortCycle::new([9009, 9010]));

        // PMAPPROC_SET
        let mut cursor = Cursor::new(Vec::new());
        RpcMessage::call(1, PORTMAPPER_PROG, 2, 1)
            .write_xdr(&mut cursor)
            .unwrap();
        xdr::Mapping::new(DEVICE_CORE, 1, PORTMAPPER_PROT_TCP, 12345)
            .write_xdr(&mut cursor)
            .unwrap();

        let reply = server.handle_message(cursor.into_inner()).await.unwrap();
        let mut cursor = Cursor::new(reply);
        let mut msg = RpcMessage::default();
        msg.read_xdr(&mut cursor).unwrap();
        match msg.mtype {
            MsgType::Reply(body) => match body.stat {
                ReplyStat::Accepted(accepted) => {
                    assert_eq!(accepted.stat, AcceptStat::ProcUnavail)
                }
                other => panic!("denied: {:?}", other),
            },
            other => panic!("not a reply: {:?}", other),
        }
    }
}
