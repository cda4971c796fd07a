//! Loading apps into a simulated device firmware.

use std::cell::RefCell;
use std::cmp;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use tkload::frame::{self, Endpoint, FrameHeader, LengthClass, EXCHANGE_ID};
use tkload::{
    Command, Digest, Error, NameVersion, NoopObserver, ProtocolError, SessionEvent,
    SessionObserver, SizeError, Step, Transport, TransportError, MAX_APP_SIZE, STATUS_BAD,
    STATUS_OK,
};

type Session = tkload::Session<Firmware>;

// =============================================================================
// Simulated firmware
// =============================================================================

/// Answers command frames the way the device firmware does, with knobs to make
/// it misbehave.
#[derive(Default)]
struct Firmware {
    /// Every frame written by the host, in order.
    written: Vec<Vec<u8>>,
    to_read: VecDeque<u8>,
    timeouts: Vec<Option<Duration>>,

    size: usize,
    left: usize,
    app: Vec<u8>,
    secret_digest: Option<Vec<u8>>,
    chunks: usize,

    reject_size: bool,
    reject_chunk: Option<usize>,
    corrupt_digest: bool,
    reject_run: bool,
    wrong_response_code: bool,
    silent: bool,
}
impl Firmware {
    fn commands(&self) -> Vec<u8> {
        self.written.iter().map(|f| f[1]).collect()
    }

    fn sent(&self, command: Command) -> usize {
        self.written.iter().filter(|f| f[1] == command.code()).count()
    }

    fn reply(&mut self, class: LengthClass, body: &[u8]) {
        let mut rx = frame::encode(EXCHANGE_ID, Endpoint::Firmware, class);
        rx[1..1 + body.len()].copy_from_slice(body);
        if self.wrong_response_code {
            rx[1] = 0x7f;
        }
        self.to_read.extend(rx);
    }

    fn status(ok: bool) -> u8 {
        if ok {
            STATUS_OK
        } else {
            STATUS_BAD
        }
    }

    fn handle(&mut self, tx: &[u8]) {
        let header = FrameHeader::parse(tx[0]).unwrap();
        assert_eq!(header.endpoint, Endpoint::Firmware);
        assert_eq!(tx.len(), 1 + header.length.byte_len());

        let command = Command::from_code(tx[1]).expect("unknown command code");
        let rsp = command.response();
        let payload = &tx[2..];
        match command {
            Command::GetNameVersion => {
                let mut body = vec![rsp.code()];
                body.extend_from_slice(b"fdkmngis");
                body.extend_from_slice(&2u32.to_le_bytes());
                self.reply(rsp.length_class(), &body);
            }
            Command::LoadAppSize => {
                self.size = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]])
                    as usize;
                self.left = self.size;
                self.app.clear();
                if payload[4] == 1 {
                    self.secret_digest = Some(payload[5..37].to_vec());
                }
                let ok = !self.reject_size;
                self.reply(rsp.length_class(), &[rsp.code(), Self::status(ok)]);
            }
            Command::LoadAppData => {
                self.chunks += 1;
                let ok = self.reject_chunk != Some(self.chunks);
                if ok {
                    let n = cmp::min(self.left, 127);
                    self.app.extend_from_slice(&payload[..n]);
                    self.left -= n;
                }
                self.reply(rsp.length_class(), &[rsp.code(), Self::status(ok)]);
            }
            Command::GetAppDigest => {
                let mut digest = *Digest::compute(&self.app).as_bytes();
                if self.corrupt_digest {
                    digest[0] ^= 0xff;
                }
                let mut body = vec![rsp.code()];
                body.extend_from_slice(&digest);
                self.reply(rsp.length_class(), &body);
            }
            Command::RunApp => {
                let ok = !self.reject_run;
                self.reply(rsp.length_class(), &[rsp.code(), Self::status(ok)]);
            }
        }
    }
}
impl Transport for Firmware {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.written.push(bytes.to_vec());
        if !self.silent {
            self.handle(bytes);
        }
        Ok(())
    }

    fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        if self.to_read.len() < n {
            return Err(TransportError::Timeout { expected: n });
        }
        Ok(self.to_read.drain(..n).collect())
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.timeouts.push(timeout);
        Ok(())
    }
}

/// Keeps a short description of every event.
#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<String>>>);
impl Recorder {
    fn events(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}
impl SessionObserver for Recorder {
    fn notify(&self, event: &SessionEvent<'_>) {
        let line = match event {
            SessionEvent::FrameSent { .. } | SessionEvent::FrameReceived { .. } => return,
            SessionEvent::Identified(nv) => format!("identified {}", nv.name1),
            SessionEvent::SizeDeclared { size, with_secret } => {
                format!("size {} {}", size, with_secret)
            }
            SessionEvent::ChunkSent { offset, len, .. } => format!("chunk {} {}", len, offset),
            SessionEvent::DigestsCompared { host, device } => {
                format!("digests equal {}", host == device)
            }
            SessionEvent::AppStarted => "started".to_string(),
            SessionEvent::Failed { step, .. } => format!("failed {}", step),
        };
        self.0.borrow_mut().push(line);
    }
}

fn app(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

fn session(firmware: Firmware) -> Session {
    tkload::Session::new(firmware, Box::new(NoopObserver), None)
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn load_300_bytes() {
    let recorder = Recorder::default();
    let mut session =
        tkload::Session::new(Firmware::default(), Box::new(recorder.clone()), None);
    let binary = app(300);

    let digest = session.load_app(&binary, None).unwrap();
    assert_eq!(digest, Digest::compute(&binary));

    let firmware = session.into_transport();
    assert_eq!(
        firmware.commands(),
        vec![
            Command::LoadAppSize.code(),
            Command::LoadAppData.code(),
            Command::LoadAppData.code(),
            Command::LoadAppData.code(),
            Command::GetAppDigest.code(),
            Command::RunApp.code(),
        ]
    );
    assert_eq!(firmware.app, binary);
    assert_eq!(firmware.size, 300);
    assert_eq!(
        recorder.events(),
        vec![
            "size 300 false",
            "chunk 127 127",
            "chunk 127 254",
            "chunk 46 300",
            "digests equal true",
            "started",
        ]
    );
}

#[test]
fn frames_on_the_wire() {
    let mut session = session(Firmware::default());
    session.load_app(&app(300), None).unwrap();
    let firmware = session.into_transport();

    // Size: 4 bytes, lowest order first, in a 32 byte frame.
    let size = &firmware.written[0];
    assert_eq!(size.len(), 33);
    assert_eq!(size[0], 0x52);
    assert_eq!(&size[2..6], &[0x2c, 0x01, 0x00, 0x00]);
    assert!(size[6..].iter().all(|b| *b == 0));

    // The last chunk carries 46 bytes and is zero padded.
    let last = &firmware.written[3];
    assert_eq!(last.len(), 129);
    assert_eq!(last[0], 0x53);
    assert_eq!(&last[2..48], &app(300)[254..]);
    assert!(last[48..].iter().all(|b| *b == 0));

    // No payload for digest and run.
    assert_eq!(firmware.written[4], vec![0x50, Command::GetAppDigest.code()]);
    assert_eq!(firmware.written[5], vec![0x50, Command::RunApp.code()]);
}

#[test]
fn exact_multiple_of_chunk() {
    let mut session = session(Firmware::default());
    let binary = app(254);
    session.load_app(&binary, None).unwrap();

    let firmware = session.into_transport();
    assert_eq!(firmware.sent(Command::LoadAppData), 2);
    assert_eq!(firmware.app, binary);
}

#[test]
fn single_byte_and_largest() {
    for len in &[1, MAX_APP_SIZE] {
        let mut session = session(Firmware::default());
        let binary = app(*len);
        session.load_app(&binary, None).unwrap();

        let firmware = session.into_transport();
        assert_eq!(firmware.sent(Command::LoadAppData), (len + 126) / 127);
        assert_eq!(firmware.app, binary);
    }
}

#[test]
fn empty_app_sends_nothing() {
    let mut session = session(Firmware::default());
    let err = session.load_app(&[], None).unwrap_err();

    assert_eq!(err.step, Step::DeclareSize);
    assert!(matches!(err.source, Error::Size(SizeError::Empty)));
    assert!(session.into_transport().written.is_empty());
}

#[test]
fn too_large_app_sends_nothing() {
    let mut session = session(Firmware::default());
    let err = session.load_app(&app(MAX_APP_SIZE + 1), None).unwrap_err();

    assert_eq!(err.step, Step::DeclareSize);
    assert!(matches!(
        err.source,
        Error::Size(SizeError::TooLarge {
            size: 65537,
            max: 65536
        })
    ));
    assert!(session.into_transport().written.is_empty());
}

#[test]
fn size_rejected() {
    let recorder = Recorder::default();
    let firmware = Firmware {
        reject_size: true,
        ..Firmware::default()
    };
    let mut session = tkload::Session::new(firmware, Box::new(recorder.clone()), None);
    let err = session.load_app(&app(300), None).unwrap_err();

    assert_eq!(err.step, Step::DeclareSize);
    assert!(matches!(
        err.source,
        Error::Protocol(ProtocolError::Rejected {
            command: Command::LoadAppSize,
            status: STATUS_BAD
        })
    ));
    assert_eq!(session.into_transport().commands(), vec![Command::LoadAppSize.code()]);
    assert_eq!(recorder.events(), vec!["failed declare size"]);
}

#[test]
fn chunk_rejected() {
    let firmware = Firmware {
        reject_chunk: Some(2),
        ..Firmware::default()
    };
    let mut session = session(firmware);
    let err = session.load_app(&app(300), None).unwrap_err();

    assert_eq!(err.step, Step::Transfer);
    assert!(matches!(
        err.source,
        Error::Protocol(ProtocolError::Rejected {
            command: Command::LoadAppData,
            ..
        })
    ));
    let firmware = session.into_transport();
    assert_eq!(firmware.sent(Command::LoadAppData), 2);
    assert_eq!(firmware.sent(Command::GetAppDigest), 0);
}

#[test]
fn digest_mismatch_never_runs() {
    let recorder = Recorder::default();
    let firmware = Firmware {
        corrupt_digest: true,
        ..Firmware::default()
    };
    let mut session = tkload::Session::new(firmware, Box::new(recorder.clone()), None);
    let binary = app(300);
    let err = session.load_app(&binary, None).unwrap_err();

    assert_eq!(err.step, Step::Digest);
    match err.source {
        Error::Verification { host, device } => {
            assert_eq!(host, Digest::compute(&binary));
            assert_ne!(host, device);
        }
        e => panic!("unexpected error {:?}", e),
    }
    assert_eq!(session.into_transport().sent(Command::RunApp), 0);
    assert!(recorder.events().contains(&"digests equal false".to_string()));
    assert_eq!(recorder.events().last().unwrap(), "failed digest");
}

#[test]
fn run_rejected() {
    let recorder = Recorder::default();
    let firmware = Firmware {
        reject_run: true,
        ..Firmware::default()
    };
    let mut session = tkload::Session::new(firmware, Box::new(recorder.clone()), None);
    let err = session.load_app(&app(300), None).unwrap_err();

    assert_eq!(err.step, Step::Run);
    assert!(matches!(
        err.source,
        Error::Protocol(ProtocolError::Rejected {
            command: Command::RunApp,
            status: STATUS_BAD
        })
    ));
    let events = recorder.events();
    assert!(!events.contains(&"started".to_string()));
    assert!(events.contains(&"digests equal true".to_string()));
    assert_eq!(events.last().unwrap(), "failed run");
    assert_eq!(session.into_transport().sent(Command::RunApp), 1);
}

#[test]
fn wrong_response_code() {
    let firmware = Firmware {
        wrong_response_code: true,
        ..Firmware::default()
    };
    let mut session = session(firmware);
    let err = session.load_app(&app(10), None).unwrap_err();

    assert_eq!(err.step, Step::DeclareSize);
    assert!(matches!(
        err.source,
        Error::Protocol(ProtocolError::UnexpectedResponse {
            command: Command::LoadAppSize,
            actual: 0x7f,
            ..
        })
    ));
    assert_eq!(session.into_transport().written.len(), 1);
}

#[test]
fn secret_is_sent_with_size() {
    let recorder = Recorder::default();
    let mut session =
        tkload::Session::new(Firmware::default(), Box::new(recorder.clone()), None);
    session.load_app(&app(300), Some(&b"correct horse"[..])).unwrap();

    let firmware = session.into_transport();
    let size = &firmware.written[0];
    assert_eq!(size.len(), 129);
    assert_eq!(size[0], 0x53);
    assert_eq!(&size[2..6], &300u32.to_le_bytes());
    assert_eq!(size[6], 1);
    assert_eq!(
        firmware.secret_digest.as_deref(),
        Some(&Digest::compute(b"correct horse").as_bytes()[..])
    );
    assert_eq!(recorder.events()[0], "size 300 true");
}

#[test]
fn empty_secret_is_still_a_secret() {
    let mut session = session(Firmware::default());
    session.load_app(&app(5), Some(&[][..])).unwrap();

    let firmware = session.into_transport();
    assert_eq!(firmware.written[0].len(), 129);
    assert_eq!(
        firmware.secret_digest.as_deref(),
        Some(&Digest::compute(&[]).as_bytes()[..])
    );
}

#[test]
fn name_version() {
    let recorder = Recorder::default();
    let mut session =
        tkload::Session::new(Firmware::default(), Box::new(recorder.clone()), None);
    let nv = session.get_name_version().unwrap();

    assert_eq!(
        nv,
        NameVersion {
            name0: "mkdf".to_string(),
            name1: "sign".to_string(),
            version: 2,
        }
    );
    assert_eq!(recorder.events(), vec!["identified sign"]);
    assert_eq!(session.into_transport().written[0], vec![0x50, 0x01]);
}

#[test]
fn probe_timeout_only_on_first_exchange() {
    let timeout = Some(Duration::from_secs(2));
    let mut session = tkload::Session::new(Firmware::default(), Box::new(NoopObserver), timeout);
    session.get_name_version().unwrap();
    session.load_app(&app(300), None).unwrap();

    assert_eq!(session.into_transport().timeouts, vec![timeout, None]);
}

#[test]
fn silent_device_times_out() {
    let firmware = Firmware {
        silent: true,
        ..Firmware::default()
    };
    let mut session = tkload::Session::new(
        firmware,
        Box::new(NoopObserver),
        Some(Duration::from_millis(10)),
    );
    let err = session.get_name_version().unwrap_err();

    assert!(matches!(err, Error::Transport(TransportError::Timeout { .. })));
}

#[test]
fn missing_file() {
    let mut session = session(Firmware::default());
    let err = session
        .load_app_from_file("/nonexistent/tkload/app.bin", None)
        .unwrap_err();

    assert_eq!(err.step, Step::DeclareSize);
    assert!(matches!(err.source, Error::File { .. }));
    assert!(session.into_transport().written.is_empty());
}

#[test]
fn load_from_file() {
    let path = std::env::temp_dir().join(format!("tkload-app-{}.bin", std::process::id()));
    let binary = app(1000);
    std::fs::write(&path, &binary).unwrap();

    let mut session = session(Firmware::default());
    let result = session.load_app_from_file(&path, None);
    std::fs::remove_file(&path).unwrap();

    assert_eq!(result.unwrap(), Digest::compute(&binary));
    assert_eq!(session.into_transport().app, binary);
}
