//! Full VXI-11 sessions over real sockets: the handshake, a Bode setup
//! write, a frequency step and the BSWV readback, with the port rotation the
//! scope depends on between them.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_std::net::TcpListener;
use async_std::task;

use sds_bode::awg::{Awg, DriverError, OutputLoad, WaveformType};
use sds_bode::client::portmapper::prelude::*;
use sds_bode::client::vxi11::prelude::*;
use sds_bode::scpi::ScpiDispatcher;
use sds_bode::server::{portmapper::PortMapServer, vxi11::VxiCoreServer, PortCycle};

// Off the standard 9009/9010 pair so a test run does not collide with a
// locally running emulator.
const PORT_A: u16 = 39009;
const PORT_B: u16 = 39010;

#[derive(Clone, Default)]
struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut self.0.lock().unwrap())
    }
}

struct RecordingAwg {
    calls: CallLog,
}

impl RecordingAwg {
    fn boxed() -> (Box<dyn Awg + Send>, CallLog) {
        let calls = CallLog::default();
        (
            Box::new(RecordingAwg {
                calls: calls.clone(),
            }),
            calls,
        )
    }

    fn push(&self, entry: String) {
        self.calls.0.lock().unwrap().push(entry);
    }
}

impl Awg for RecordingAwg {
    fn connect(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn initialize_channel(&mut self, channel: usize) -> Result<(), DriverError> {
        self.push(format!("initialize_channel({})", channel));
        Ok(())
    }

    fn set_output_load(&mut self, channel: usize, load: OutputLoad) -> Result<(), DriverError> {
        self.push(format!("set_output_load({}, {})", channel, load));
        Ok(())
    }

    fn set_output_on(&mut self, channel: usize, on: bool) -> Result<(), DriverError> {
        self.push(format!("set_output_on({}, {})", channel, on));
        Ok(())
    }

    fn set_waveform_type(
        &mut self,
        channel: usize,
        waveform: WaveformType,
    ) -> Result<(), DriverError> {
        self.push(format!("set_waveform_type({}, {:?})", channel, waveform));
        Ok(())
    }

    fn set_frequency(&mut self, channel: usize, hz: f64) -> Result<(), DriverError> {
        self.push(format!("set_frequency({}, {})", channel, hz));
        Ok(())
    }

    fn set_amplitude(&mut self, channel: usize, vpp: f64) -> Result<(), DriverError> {
        self.push(format!("set_amplitude({}, {})", channel, vpp));
        Ok(())
    }

    fn set_offset(&mut self, channel: usize, volts: f64) -> Result<(), DriverError> {
        self.push(format!("set_offset({}, {})", channel, volts));
        Ok(())
    }

    fn set_phase(&mut self, channel: usize, degrees: f64) -> Result<(), DriverError> {
        self.push(format!("set_phase({}, {})", channel, degrees));
        Ok(())
    }
}

async fn connect_core(port: u16) -> CoreChannelClient {
    for _ in 0..200 {
        if let Ok(client) = CoreChannelClient::connect((Ipv4Addr::LOCALHOST, port)).await {
            return client;
        }
        task::sleep(Duration::from_millis(10)).await;
    }
    panic!("VXI-11 listener never came up on port {}", port)
}

async fn resolve_until(pm: &mut PortMapperClient, expected: u16) {
    for _ in 0..200 {
        let port = pm
            .getport(Mapping::new(
                DEVICE_CORE,
                DEVICE_CORE_VERSION,
                PORTMAPPER_PROT_TCP,
                0,
            ))
            .await
            .unwrap();
        if port == expected {
            return;
        }
        task::sleep(Duration::from_millis(10)).await;
    }
    panic!("Portmap never advertised port {}", expected)
}

fn write_parms(lid: DeviceLink, payload: &str) -> DeviceWriteParms {
    DeviceWriteParms {
        lid,
        io_timeout: 2000,
        lock_timeout: 2000,
        flags: Default::default(),
        data: payload.as_bytes().into(),
    }
}

fn read_parms(lid: DeviceLink, request_size: u32) -> DeviceReadParms {
    DeviceReadParms {
        lid,
        request_size,
        io_timeout: 2000,
        lock_timeout: 2000,
        flags: Default::default(),
        term_char: 0,
    }
}

#[async_std::test]
async fn bode_sweep_sessions_with_port_rotation() {
    let cycle = PortCycle::new([PORT_A, PORT_B]);

    let (driver, calls) = RecordingAwg::boxed();
    let vxi11 = VxiCoreServer::new(ScpiDispatcher::new(driver), cycle.clone());
    task::spawn(vxi11.serve(Ipv4Addr::LOCALHOST.into()));

    let portmap = PortMapServer::new(cycle.clone());
    let pm_listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let pm_port = pm_listener.local_addr().unwrap().port();
    task::spawn(portmap.serve_tcp(pm_listener));

    let mut pm = PortMapperClient::connect_tcp((Ipv4Addr::LOCALHOST, pm_port))
        .await
        .unwrap();

    // S1: initial resolution points at port A.
    resolve_until(&mut pm, PORT_A).await;

    // S2: IDN handshake session.
    let mut core = connect_core(PORT_A).await;
    let link = core
        .create_link(CreateLinkParms {
            client_id: 1,
            lock_device: false,
            lock_timeout: 0,
            device: "inst0".to_string(),
        })
        .await
        .unwrap();

    core.device_write(write_parms(link.lid, "IDN-SGLT-PRI?"))
        .await
        .unwrap();
    let read = core.device_read(read_parms(link.lid, 256)).await.unwrap();
    assert!(read.data.starts_with(b"IDN-SGLT-PRI,"));

    core.destroy_link(link.lid).await.unwrap();
    drop(core);

    // After the session the listener must be on the other port.
    resolve_until(&mut pm, PORT_B).await;
    calls.take();

    // S3 + S5: Bode setup write, then the BSWV readback.
    let mut core = connect_core(PORT_B).await;
    let link = core
        .create_link(CreateLinkParms {
            device: "inst0".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let written = core
        .device_write(write_parms(
            link.lid,
            "C1:OUTP LOAD,50;BSWV WVTP,SINE,PHSE,0,FRQ,15000,AMP,2,OFST,0;OUTP ON",
        ))
        .await
        .unwrap();
    assert_eq!(written.size as usize, "C1:OUTP LOAD,50;BSWV WVTP,SINE,PHSE,0,FRQ,15000,AMP,2,OFST,0;OUTP ON".len());
    assert_eq!(
        calls.take(),
        vec![
            "set_output_load(1, 50)",
            "set_waveform_type(1, Sine)",
            "set_phase(1, 0)",
            "set_frequency(1, 15000)",
            "set_amplitude(1, 2)",
            "set_offset(1, 0)",
            "set_output_on(1, true)",
        ]
    );

    core.device_write(write_parms(link.lid, "C1:BSWV?"))
        .await
        .unwrap();
    let read = core.device_read(read_parms(link.lid, 512)).await.unwrap();
    let reply = String::from_utf8(read.data.0.clone()).unwrap();
    assert!(reply.starts_with("C1:BSWV WVTP,SINE"), "{}", reply);
    assert!(reply.contains("FRQ,15000"), "{}", reply);
    assert!(reply.contains("AMP,2"), "{}", reply);

    core.destroy_link(link.lid).await.unwrap();
    drop(core);

    // Strict alternation brings the listener back to port A.
    resolve_until(&mut pm, PORT_A).await;
    calls.take();

    // S4: a frequency step touches only the frequency.
    let mut core = connect_core(PORT_A).await;
    let link = core
        .create_link(CreateLinkParms {
            device: "inst0".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    core.device_write(write_parms(link.lid, "C1:BSWV FRQ,10"))
        .await
        .unwrap();
    assert_eq!(calls.take(), vec!["set_frequency(1, 10)"]);

    // Tolerated call inside a live session.
    let trigger = core
        .device_trigger(DeviceGenericParms {
            lid: link.lid,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(trigger.error, Default::default());

    core.destroy_link(link.lid).await.unwrap();
    drop(core);

    // A connection that dies without DESTROY_LINK still flips the port.
    let core = connect_core(PORT_B).await;
    drop(core);
    resolve_until(&mut pm, PORT_A).await;
}
