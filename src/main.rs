use std::io;
use std::net::IpAddr;

use async_std::net::{TcpListener, UdpSocket};
use clap::Parser;
use futures::try_join;

use sds_bode::awg::factory::{AwgFactory, AwgSettings};
use sds_bode::common::portmapper::PORTMAPPER_PORT;
use sds_bode::common::vxi11::{VXI11_PORT_A, VXI11_PORT_B};
use sds_bode::scpi::ScpiDispatcher;
use sds_bode::server::{portmapper::PortMapServer, vxi11::VxiCoreServer, PortCycle};

/// Pose as a Siglent AWG so a Siglent scope's Bode plot can drive a
/// third-party generator
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// AWG driver to use (`dummy` needs no hardware)
    driver: String,

    /// Serial device path or VISA resource string of the generator
    port: Option<String>,

    /// Baud rate for serial drivers with a configurable rate
    baud_rate: Option<u32>,

    /// Also answer Portmap queries on UDP/111 (required for SDS800X-HD
    /// scopes; the SDS1000X-E family queries over TCP)
    #[clap(short, long)]
    udp: bool,

    /// Address to bind the listeners to
    #[clap(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Log protocol-level detail
    #[clap(short, long)]
    verbose: bool,
}

#[async_std::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    femme::with_level(if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    let factory = AwgFactory::new();
    let settings = AwgSettings {
        port: args.port.clone(),
        baud: args.baud_rate,
    };
    let mut driver = match factory.build(&args.driver, &settings) {
        Some(Ok(driver)) => driver,
        Some(Err(err)) => {
            log::error!("Driver {} failed to initialize: {}", args.driver, err);
            std::process::exit(1);
        }
        None => {
            let known = factory.names().collect::<Vec<_>>().join(", ");
            log::error!("Unknown driver {:?}; known drivers: {}", args.driver, known);
            std::process::exit(2);
        }
    };
    if let Err(err) = driver.connect() {
        log::error!("Cannot connect to the AWG: {}", err);
        std::process::exit(1);
    }

    // The dispatcher owns the driver from here on and disconnects it when it
    // goes out of scope.
    let mut dispatcher = ScpiDispatcher::new(driver);
    dispatcher.initialize();

    log::info!("Starting AWG server...");

    let ports = PortCycle::new([VXI11_PORT_A, VXI11_PORT_B]);
    let portmap = PortMapServer::new(ports.clone());
    let vxi11 = VxiCoreServer::new(dispatcher, ports);

    let portmap_tcp = TcpListener::bind((args.bind, PORTMAPPER_PORT))
        .await
        .map_err(|err| bind_error("TCP", PORTMAPPER_PORT, err))?;
    let portmap_udp = match args.udp {
        true => Some(
            UdpSocket::bind((args.bind, PORTMAPPER_PORT))
                .await
                .map_err(|err| bind_error("UDP", PORTMAPPER_PORT, err))?,
        ),
        false => None,
    };

    try_join!(
        portmap.clone().serve_tcp(portmap_tcp),
        async {
            match portmap_udp {
                Some(socket) => portmap.clone().serve_udp(socket).await,
                None => Ok(()),
            }
        },
        vxi11.serve(args.bind),
    )
    .map(|_| ())
}

fn bind_error(proto: &str, port: u16, err: io::Error) -> io::Error {
    io::Error::new(
        err.kind(),
        format!("cannot open {} port {} for listening: {}", proto, port, err),
    )
}
