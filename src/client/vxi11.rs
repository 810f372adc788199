use std::io;

use async_std::net::{TcpStream, ToSocketAddrs};

use crate::common::{
    onc_rpc::prelude::*,
    vxi11::{
        xdr::{
            CreateLinkParms, CreateLinkResp, DeviceError, DeviceGenericParms, DeviceLink,
            DeviceReadParms, DeviceReadResp, DeviceWriteParms, DeviceWriteResp,
        },
        CREATE_LINK, DESTROY_LINK, DEVICE_CLEAR, DEVICE_CORE, DEVICE_CORE_VERSION, DEVICE_READ,
        DEVICE_TRIGGER, DEVICE_WRITE,
    },
    xdr::prelude::*,
};

pub mod prelude {
    pub use super::CoreChannelClient;
    pub use crate::common::vxi11::xdr::{
        CreateLinkParms, CreateLinkResp, DeviceError, DeviceErrorCode, DeviceGenericParms,
        DeviceLink, DeviceReadParms, DeviceReadResp, DeviceWriteParms, DeviceWriteResp,
    };
}

/// Core channel client issuing the calls a scope issues within one session.
pub struct CoreChannelClient(StreamRpcClient<TcpStream>);

impl CoreChannelClient {
    pub async fn connect(addrs: impl ToSocketAddrs) -> io::Result<Self> {
        let io = TcpStream::connect(addrs).await?;
        Ok(Self(StreamRpcClient::new(
            io,
            DEVICE_CORE,
            DEVICE_CORE_VERSION,
        )))
    }

    pub async fn create_link(
        &mut self,
        parms: CreateLinkParms,
    ) -> Result<CreateLinkResp, RpcError> {
        self.0.call(CREATE_LINK, parms).await
    }

    pub async fn device_write(
        &mut self,
        parms: DeviceWriteParms,
    ) -> Result<DeviceWriteResp, RpcError> {
        self.0.call(DEVICE_WRITE, parms).await
    }

    pub async fn device_read(
        &mut self,
        parms: DeviceReadParms,
    ) -> Result<DeviceReadResp, RpcError> {
        self.0.call(DEVICE_READ, parms).await
    }

    pub async fn device_trigger(
        &mut self,
        parms: DeviceGenericParms,
    ) -> Result<DeviceError, RpcError> {
        self.0.call(DEVICE_TRIGGER, parms).await
    }

    pub async fn device_clear(
        &mut self,
        parms: DeviceGenericParms,
    ) -> Result<DeviceError, RpcError> {
        self.0.call(DEVICE_CLEAR, parms).await
    }

    pub async fn destroy_link(&mut self, parms: DeviceLink) -> Result<DeviceError, RpcError> {
        self.0.call(DESTROY_LINK, parms).await
    }
}
