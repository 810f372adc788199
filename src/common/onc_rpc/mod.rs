//! ONC RPC plumbing shared by the Portmap and VXI-11 responders: the
//! [`RpcService`] dispatch trait and the stream/datagram clients the
//! integration tests drive the responders with.

use std::{
    io::{self, Cursor, Error, ErrorKind, Write},
    sync::Arc,
};

use async_std::net::{TcpStream, UdpSocket};
use async_trait::async_trait;

use self::record::{read_record, write_record};
use futures::{AsyncRead, AsyncWrite};

pub(crate) mod record;
pub(crate) mod xdr;

pub use self::xdr::{AuthStat, MismatchInfo};

pub(crate) mod prelude {
    pub(crate) use super::xdr::{AuthStat, MismatchInfo};
    pub(crate) use super::{RpcService, StreamRpcClient, UdpRpcClient, MAX_RECORD_SIZE};
    pub use super::RpcError;
}

use self::prelude::*;
use crate::common::xdr::prelude::*;

/// Upper bound on a reassembled RPC record; anything larger tears the
/// connection down.
pub(crate) const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// An error which occurred during an RPC call
#[derive(Debug)]
pub enum RpcError {
    /// Program not available
    ProgUnavail,
    /// Program version not available (accepted versions in [MismatchInfo])
    ProgMismatch(MismatchInfo),
    /// Procedure not available
    ProcUnavail,
    /// Arguments have too many or too few bytes to deserialize
    GarbageArgs,
    /// Internal error
    SystemErr,
    /// RPC version not supported
    RpcMismatch(MismatchInfo),
    /// Error during RPC authentication
    AuthError(AuthStat),
    /// (De-)serialization error on the RPC channel
    Io(Error),
}

impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        Self::Io(err)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::ProgUnavail => write!(f, "program unavailable"),
            RpcError::ProgMismatch(m) => {
                write!(f, "program version mismatch (supported {}..{})", m.low, m.high)
            }
            RpcError::ProcUnavail => write!(f, "procedure unavailable"),
            RpcError::GarbageArgs => write!(f, "garbage arguments"),
            RpcError::SystemErr => write!(f, "system error"),
            RpcError::RpcMismatch(m) => {
                write!(f, "rpc version mismatch (supported {}..{})", m.low, m.high)
            }
            RpcError::AuthError(stat) => write!(f, "authentication error ({:?})", stat),
            RpcError::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for RpcError {}

/// One RPC program served over record-marked TCP or raw UDP datagrams.
///
/// Implementors provide [`RpcService::call`]; the provided methods take care
/// of message framing, header validation and reply construction. Connections
/// are served to completion, one at a time, which is all the scope ever asks
/// for.
#[async_trait]
pub(crate) trait RpcService {
    async fn serve_tcp_stream(self: Arc<Self>, mut stream: TcpStream) -> io::Result<()>
    where
        Self: Sync,
    {
        loop {
            let fragment = read_record(&mut stream, MAX_RECORD_SIZE).await?;

            let reply = self.clone().handle_message(fragment).await?;

            write_record(&mut stream, reply).await?;

            if self.session_finished() {
                break Ok(());
            }
        }
    }

    /// Checked after every reply; a true return closes the connection once
    /// the reply has been flushed.
    fn session_finished(&self) -> bool {
        false
    }

    async fn handle_message(self: Arc<Self>, data_in: Vec<u8>) -> Result<Vec<u8>, Error>
    where
        Self: Sync,
    {
        let mut ret = Cursor::new(Vec::new());
        let mut data_in = Cursor::new(data_in);
        let mut msg = xdr::RpcMessage::default();
        msg.read_xdr(&mut data_in)?;
        log::trace!("-> {:?}", msg);

        let xid = msg.xid;

        let stat = if let xdr::MsgType::Call(call) = msg.mtype {
            if call.rpc_vers != 2 {
                log::debug!("Bad RPC version: {}", call.rpc_vers);
                xdr::ReplyStat::rpc_vers_mismatch(2, 2)
            } else if call.cred.flavour != xdr::AuthFlavour::None {
                log::debug!("Unknown cred flavour: {:?}", call.cred.flavour);
                xdr::ReplyStat::auth_error(AuthStat::RejectedCred)
            } else if call.verf.flavour != xdr::AuthFlavour::None {
                log::debug!("Unknown verf flavour: {:?}", call.verf.flavour);
                xdr::ReplyStat::auth_error(AuthStat::RejectedVerf)
            } else {
                let res = self
                    .call(call.prog, call.vers, call.proc, &mut data_in, &mut ret)
                    .await;
                let stat = match res {
                    Ok(()) => xdr::AcceptStat::Success,
                    Err(RpcError::ProgUnavail) => xdr::AcceptStat::ProgUnavail,
                    Err(RpcError::ProgMismatch(m)) => xdr::AcceptStat::ProgMismatch(m),
                    Err(RpcError::ProcUnavail) => xdr::AcceptStat::ProcUnavail,
                    Err(RpcError::GarbageArgs) => xdr::AcceptStat::GarbageArgs,
                    Err(RpcError::SystemErr) => xdr::AcceptStat::SystemErr,
                    Err(RpcError::Io(err)) => return Err(err),
                    Err(RpcError::RpcMismatch(_)) | Err(RpcError::AuthError(_)) => unreachable!(),
                };

                xdr::ReplyStat::Accepted(xdr::AcceptedReply {
                    verf: Default::default(),
                    stat,
                })
            }
        } else {
            return Err(ErrorKind::Unsupported.into());
        };
        let reply = xdr::RpcMessage::reply(xid, stat);
        log::trace!("<- {:?}", reply);

        let mut data_out = Cursor::new(Vec::new());
        reply.write_xdr(&mut data_out)?;
        data_out.write_all(&ret.into_inner()[..])?;

        Ok(data_out.into_inner())
    }

    async fn call(
        self: Arc<Self>,
        _prog: u32,
        _vers: u32,
        _proc: u32,
        _args: &mut Cursor<Vec<u8>>,
        _ret: &mut Cursor<Vec<u8>>,
    ) -> Result<(), RpcError>
    where
        Self: Sync,
    {
        Err(RpcError::ProgUnavail)
    }
}

/// RPC client over a connected UDP socket, one call per datagram.
pub(crate) struct UdpRpcClient {
    xid: u32,
    prog: u32,
    vers: u32,
    socket: UdpSocket,
}

impl UdpRpcClient {
    pub(crate) fn new(prog: u32, vers: u32, socket: UdpSocket) -> Self {
        Self {
            xid: 0,
            prog,
            vers,
            socket,
        }
    }

    pub(crate) async fn call<ARGS, RET>(&mut self, proc: u32, args: ARGS) -> Result<RET, RpcError>
    where
        ARGS: XdrEncode + Send,
        RET: XdrDecode + Default,
    {
        self.xid += 1;

        let mut args_cursor = Cursor::new(Vec::new());
        let msg = xdr::RpcMessage::call(self.xid, self.prog, self.vers, proc);
        msg.write_xdr(&mut args_cursor)?;
        args.write_xdr(&mut args_cursor)?;
        self.socket.send(&args_cursor.into_inner()).await?;

        let mut buf = vec![0; 1500];
        let n = self.socket.recv(&mut buf).await?;
        buf.truncate(n);
        parse_reply(buf)
    }
}

/// RPC client over a record-marked byte stream.
pub(crate) struct StreamRpcClient<IO> {
    xid: u32,
    prog: u32,
    vers: u32,
    io: IO,
}

impl<IO> StreamRpcClient<IO> {
    pub(crate) fn new(io: IO, prog: u32, vers: u32) -> Self {
        Self {
            xid: 0,
            io,
            prog,
            vers,
        }
    }
}

impl<IO> StreamRpcClient<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub(crate) async fn call<ARGS, RET>(&mut self, proc: u32, args: ARGS) -> Result<RET, RpcError>
    where
        ARGS: XdrEncode + Send,
        RET: XdrDecode + Default,
    {
        self.xid += 1;

        let mut args_cursor = Cursor::new(Vec::new());
        let msg = xdr::RpcMessage::call(self.xid, self.prog, self.vers, proc);
        msg.write_xdr(&mut args_cursor)?;
        args.write_xdr(&mut args_cursor)?;
        write_record(&mut self.io, args_cursor.into_inner()).await?;

        let fragment = read_record(&mut self.io, MAX_RECORD_SIZE).await?;
        parse_reply(fragment)
    }
}

fn parse_reply<RET>(data: Vec<u8>) -> Result<RET, RpcError>
where
    RET: XdrDecode + Default,
{
    let mut ret_cursor = Cursor::new(data);
    let mut reply = xdr::RpcMessage::default();
    reply.read_xdr(&mut ret_cursor)?;

    match reply.mtype {
        xdr::MsgType::Reply(xdr::ReplyBody {
            stat: xdr::ReplyStat::Accepted(accepted),
        }) => match accepted.stat {
            xdr::AcceptStat::Success => {
                let mut ret: RET = Default::default();
                ret.read_xdr(&mut ret_cursor)?;
                Ok(ret)
            }
            xdr::AcceptStat::ProgUnavail => Err(RpcError::ProgUnavail),
            xdr::AcceptStat::ProgMismatch(m) => Err(RpcError::ProgMismatch(m)),
            xdr::AcceptStat::ProcUnavail => Err(RpcError::ProcUnavail),
            xdr::AcceptStat::GarbageArgs => Err(RpcError::GarbageArgs),
            xdr::AcceptStat::SystemErr => Err(RpcError::SystemErr),
        },
        xdr::MsgType::Reply(xdr::ReplyBody {
            stat: xdr::ReplyStat::Denied(xdr::RejectedReply { stat }),
        }) => match stat {
            xdr::RejectStat::RpcMismatch(m) => Err(RpcError::RpcMismatch(m)),
            xdr::RejectStat::AuthError(err) => Err(RpcError::AuthError(err)),
        },
        xdr::MsgType::Call(..) => Err(RpcError::Io(ErrorKind::Unsupported.into())),
    }
}
