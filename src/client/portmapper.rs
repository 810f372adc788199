use std::io;

use async_std::net::{TcpStream, ToSocketAddrs, UdpSocket};

use crate::common::{
    onc_rpc::prelude::*,
    portmapper::{xdr::Mapping, PMAPPROC_GETPORT, PMAPPROC_NULL, PORTMAPPER_PROG},
    xdr::prelude::*,
};

pub mod prelude {
    pub use super::PortMapperClient;
    pub use crate::common::portmapper::{
        xdr::Mapping, PORTMAPPER_PORT, PORTMAPPER_PROT_TCP, PORTMAPPER_PROT_UDP,
    };
    pub use crate::common::vxi11::{DEVICE_CORE, DEVICE_CORE_VERSION};
}

enum Transport {
    Tcp(StreamRpcClient<TcpStream>),
    Udp(UdpRpcClient),
}

/// Queries the portmapper the way the scope does: v2 GETPORT, over either
/// transport.
pub struct PortMapperClient(Transport);

impl PortMapperClient {
    pub async fn connect_tcp(addrs: impl ToSocketAddrs) -> io::Result<Self> {
        let io = TcpStream::connect(addrs).await?;
        Ok(Self(Transport::Tcp(StreamRpcClient::new(
            io,
            PORTMAPPER_PROG,
            2,
        ))))
    }

    pub async fn connect_udp(addrs: impl ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        socket.connect(addrs).await?;
        Ok(Self(Transport::Udp(UdpRpcClient::new(
            PORTMAPPER_PROG,
            2,
            socket,
        ))))
    }

    pub async fn null(&mut self) -> Result<(), RpcError> {
        self.call(PMAPPROC_NULL, ()).await
    }

    pub async fn getport(&mut self, mapping: Mapping) -> Result<u16, RpcError> {
        self.call(PMAPPROC_GETPORT, mapping).await
    }

    async fn call<ARGS, RET>(&mut self, proc: u32, args: ARGS) -> Result<RET, RpcError>
    where
        ARGS: XdrEncode + Send,
        RET: XdrDecode + Default,
    {
        match &mut self.0 {
            Transport::Tcp(client) => client.call(proc, args).await,
            Transport::Udp(client) => client.call(proc, args).await,
        }
    }
}
