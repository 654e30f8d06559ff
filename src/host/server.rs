use super::{ObjectTable, Registry};
use crate::{
    boundary::protocol::{self, ClientFrame, ServerFrame, PROTOCOL_VERSION},
    errors::{HostError, WireError},
    message::Message,
    sink::MessageSink,
};
use std::{
    collections::HashMap,
    io::{self, BufRead, BufReader, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex, PoisonError,
    },
    thread,
};

type Shared<W> = Arc<Mutex<W>>;

fn write_frame<W: Write>(writer: &Shared<W>, frame: &ServerFrame) -> Result<(), HostError> {
    let mut line = protocol::encode(frame)?;
    line.push('\n');
    let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
    writer.write_all(line.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Relays the messages of one call back to the host.
struct RemoteSink<W> {
    id: u64,
    writer: Shared<W>,
    cancelled: Arc<AtomicBool>,
}

impl<W: Write + Send> MessageSink for RemoteSink<W> {
    fn on_message(&self, message: &Message) -> bool {
        let frame = ServerFrame::Message {
            id: self.id,
            message: message.clone(),
        };
        if let Err(err) = write_frame(&self.writer, &frame) {
            log::warn!("cannot relay {} message: {}", message.kind(), err);
            return false;
        }
        !self.cancelled.load(Ordering::SeqCst)
    }
}

/// Serve a host over this process's stdin and stdout. A framework host
/// executable calls this when started with
/// [SERVE_FLAG](crate::boundary::protocol::SERVE_FLAG). Nothing else may
/// write to stdout while it runs.
pub fn serve_stdio(registry: Arc<Registry>) -> Result<(), HostError> {
    serve(registry, BufReader::new(io::stdin()).lines(), io::stdout())
}

/// Serve frames read from `incoming`, writing replies to `outgoing`.
///
/// Calls run one at a time, in order. A separate reader thread keeps
/// consuming frames so that a cancellation for the running call is seen
/// while it runs. Returns after a shutdown frame or the end of input,
/// releasing every object still hosted.
pub fn serve<I, W>(registry: Arc<Registry>, incoming: I, outgoing: W) -> Result<(), HostError>
where
    I: Iterator<Item = io::Result<String>> + Send + 'static,
    W: Write + Send + 'static,
{
    let writer = Arc::new(Mutex::new(outgoing));
    write_frame(
        &writer,
        &ServerFrame::Hello {
            protocol: PROTOCOL_VERSION,
        },
    )?;

    let in_flight: Arc<Mutex<HashMap<u64, Arc<AtomicBool>>>> = Arc::default();
    let (work_tx, work_rx) = mpsc::channel();

    let reader = {
        let in_flight = Arc::clone(&in_flight);
        thread::Builder::new()
            .name("runt-host-reader".to_string())
            .spawn(move || {
                for line in incoming {
                    let line = match line {
                        Ok(line) => line,
                        Err(err) => {
                            log::warn!("cannot read from host: {}", err);
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match protocol::decode::<ClientFrame>(&line) {
                        Ok(ClientFrame::Call { id, call }) => {
                            let flag = Arc::new(AtomicBool::new(false));
                            in_flight
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .insert(id, Arc::clone(&flag));
                            if work_tx.send((id, call, flag)).is_err() {
                                break;
                            }
                        }
                        Ok(ClientFrame::Cancel { id }) => {
                            if let Some(flag) = in_flight
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .get(&id)
                            {
                                flag.store(true, Ordering::SeqCst);
                            }
                        }
                        Ok(ClientFrame::Shutdown) => break,
                        Err(err) => log::warn!("{}", err),
                    }
                }
            })?
    };

    let objects = ObjectTable::new(registry);
    let mut result = Ok(());
    for (id, call, cancelled) in work_rx {
        let sink = RemoteSink {
            id,
            writer: Arc::clone(&writer),
            cancelled,
        };
        let frame = match objects.dispatch(call, &sink) {
            Ok(reply) => ServerFrame::Reply { id, reply },
            Err(err) => ServerFrame::Failure {
                id,
                error: WireError::from(&err),
            },
        };
        in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Err(err) = write_frame(&writer, &frame) {
            result = Err(err);
            break;
        }
    }

    objects.clear();
    if reader.join().is_err() {
        log::warn!("frame reader panicked");
    }
    result
}
