//! Isolation boundaries: where a framework is loaded and how the host
//! reaches it.
//!
//! A [Boundary] owns one framework host. Objects are instantiated inside it
//! by module and type name with [Boundary::create_object], which returns a
//! local proxy implementing the requested [Capability]. Every call on such a
//! proxy is synchronous from the caller's point of view.
//!
//! Three realizations share the same object table on the far side:
//! - [Isolation::Process]: a child process speaking frames over its pipes.
//! - [Isolation::Domain]: a dedicated thread that only exchanges serialized
//!   frames with the host.
//! - [Isolation::Direct]: in-process dispatch, used when isolation is
//!   disabled or unavailable.
//!
//! Calls are serialized per boundary. Sinks passed to a call must not call
//! back into the same boundary.

pub mod options;
pub mod protocol;
mod shadow;
mod transport;

pub use options::{BoundaryOptions, IsolationPolicy};

use crate::{
    errors::{HostError, RichResult},
    host::{ObjectTable, Registry},
    sink::{MessageSink, NullSink},
};
use protocol::{Call, ClientFrame, Handle, Reply, ServerFrame, Value};
use shadow::ShadowCopy;
use std::{
    fmt, mem,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};
use transport::{DomainTransport, ProcessTransport, Transport};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// How a boundary hosts its framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    Process,
    Domain,
    Direct,
}

/// Identity of an object created through a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    session: u64,
    handle: Handle,
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.session, self.handle)
    }
}

/// A constructor argument. Only values and objects owned by the same
/// boundary can be carried across it.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Object(ObjectId),
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Int(i)
    }
}

impl<C: Capability> From<&C> for Arg {
    fn from(capability: &C) -> Self {
        Arg::Object(capability.object().id())
    }
}

/// A local proxy for an object living inside a boundary.
pub trait Capability: Sized {
    /// Interface the far-side object must implement.
    const INTERFACE: &'static str;

    fn bind(object: RemoteObject) -> Self;

    fn object(&self) -> &RemoteObject;
}

enum Link {
    Remote(Box<dyn Transport>),
    Direct(Arc<ObjectTable>),
    /// The channel failed mid-call; nothing more can be sent.
    Broken(String),
    Closed,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by a boundary and every proxy created through it.
pub(crate) struct Session {
    id: u64,
    isolation: Isolation,
    link: Mutex<Link>,
    owned: Mutex<Vec<Handle>>,
    disposed: AtomicBool,
    next_call: AtomicU64,
    shadow: Mutex<Option<ShadowCopy>>,
}

impl Session {
    fn new(isolation: Isolation, link: Link, shadow: Option<ShadowCopy>) -> Self {
        Self {
            id: NEXT_SESSION.fetch_add(1, Ordering::SeqCst),
            isolation,
            link: Mutex::new(link),
            owned: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            next_call: AtomicU64::new(1),
            shadow: Mutex::new(shadow),
        }
    }

    fn ensure_live(&self) -> Result<(), HostError> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(HostError::Disposed)
        } else {
            Ok(())
        }
    }

    fn ensure_owned(&self, id: ObjectId) -> Result<(), HostError> {
        self.ensure_live()?;
        if id.session != self.id {
            return Err(HostError::InvalidArgument(format!(
                "object {} belongs to another boundary",
                id
            )));
        }
        if !lock(&self.owned).contains(&id.handle) {
            return Err(HostError::InvalidArgument(format!(
                "object {} has been released",
                id
            )));
        }
        Ok(())
    }

    fn lower(&self, args: Vec<Arg>) -> Result<Vec<Value>, HostError> {
        args.into_iter()
            .map(|arg| {
                Ok(match arg {
                    Arg::Null => Value::Null,
                    Arg::Bool(b) => Value::Bool(b),
                    Arg::Int(i) => Value::Int(i),
                    Arg::Str(s) => Value::Str(s),
                    Arg::Object(id) => {
                        self.ensure_owned(id)?;
                        Value::Handle(id.handle)
                    }
                })
            })
            .collect()
    }

    /// Record an object the far side created for us.
    fn adopt(&self, handle: Handle) -> ObjectId {
        lock(&self.owned).push(handle);
        ObjectId {
            session: self.id,
            handle,
        }
    }

    pub(crate) fn call(
        &self,
        call: Call,
        sink: Option<&dyn MessageSink>,
    ) -> Result<Reply, HostError> {
        self.ensure_live()?;
        let mut link = lock(&self.link);
        self.ensure_live()?;
        self.call_locked(&mut link, call, sink)
    }

    fn call_locked(
        &self,
        link: &mut Link,
        call: Call,
        sink: Option<&dyn MessageSink>,
    ) -> Result<Reply, HostError> {
        match link {
            Link::Direct(objects) => objects.dispatch(call, sink.unwrap_or(&NullSink)),
            Link::Remote(transport) => {
                let id = self.next_call.fetch_add(1, Ordering::SeqCst);
                let outcome = exchange(transport.as_mut(), id, call, sink);
                match &outcome {
                    Err(err) if err.breaks_session() => {
                        log::warn!("boundary session {} is broken: {}", self.id, err);
                        transport.close();
                        *link = Link::Broken(err.to_string());
                    }
                    _ => {}
                }
                outcome.collapse()
            }
            Link::Broken(reason) => Err(HostError::Boundary(format!(
                "session failed earlier: {}",
                reason
            ))),
            Link::Closed => Err(HostError::Disposed),
        }
    }

    /// Release one object. Releasing an object twice is a no-op.
    fn release(&self, id: ObjectId) -> Result<(), HostError> {
        if id.session != self.id {
            return Err(HostError::InvalidArgument(format!(
                "object {} belongs to another boundary",
                id
            )));
        }
        let mut link = lock(&self.link);
        {
            let mut owned = lock(&self.owned);
            match owned.iter().position(|h| *h == id.handle) {
                Some(pos) => {
                    owned.remove(pos);
                }
                None => return Ok(()),
            }
        }
        if self.disposed.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.call_locked(&mut link, Call::Release { object: id.handle }, None)?
            .into_unit()
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut link = lock(&self.link);
        let owned = mem::take(&mut *lock(&self.owned));
        for handle in owned.into_iter().rev() {
            let released = self
                .call_locked(&mut link, Call::Release { object: handle }, None)
                .and_then(Reply::into_unit);
            if let Err(err) = released {
                log::warn!("failed to release object {}:{}: {}", self.id, handle, err);
            }
        }
        if let Link::Remote(mut transport) = mem::replace(&mut *link, Link::Closed) {
            transport.close();
        }
        drop(link);

        if let Some(shadow) = lock(&self.shadow).take() {
            shadow.remove();
        }
        log::debug!("boundary session {} disposed", self.id);
    }
}

/// Send one call and relay its messages until the call completes.
/// The outer result is the channel, the inner one the call itself.
fn exchange(
    transport: &mut dyn Transport,
    id: u64,
    call: Call,
    sink: Option<&dyn MessageSink>,
) -> Result<Result<Reply, HostError>, HostError> {
    log::debug!("call {}: {}", id, call.name());
    transport.send(&ClientFrame::Call { id, call })?;
    let mut cancelled = false;
    loop {
        match transport.recv()? {
            ServerFrame::Message { id: msg_id, message } if msg_id == id => {
                let keep_going = sink.map_or(true, |sink| sink.on_message(&message));
                if !keep_going && !cancelled {
                    cancelled = true;
                    transport.send(&ClientFrame::Cancel { id })?;
                }
            }
            ServerFrame::Reply { id: reply_id, reply } if reply_id == id => {
                return Ok(Ok(reply))
            }
            ServerFrame::Failure {
                id: failure_id,
                error,
            } if failure_id == id => return Ok(Err(error.into())),
            other => {
                log::warn!("protocol violation: unexpected frame {:?}", other)
            }
        }
    }
}

/// Handle to an object inside a boundary.
#[derive(Clone)]
pub struct RemoteObject {
    id: ObjectId,
    session: Arc<Session>,
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RemoteObject({})", self.id)
    }
}

impl RemoteObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub(crate) fn handle(&self) -> Handle {
        self.id.handle
    }

    pub(crate) fn call(
        &self,
        call: Call,
        sink: Option<&dyn MessageSink>,
    ) -> Result<Reply, HostError> {
        self.session.ensure_owned(self.id)?;
        self.session.call(call, sink)
    }

    /// Bind an object handle returned by a call.
    pub(crate) fn adopt<C: Capability>(&self, reply: Reply) -> Result<C, HostError> {
        let handle = reply.into_object()?;
        Ok(C::bind(RemoteObject {
            id: self.session.adopt(handle),
            session: Arc::clone(&self.session),
        }))
    }

    /// Release the far-side object. Safe to call more than once.
    pub fn release(&self) -> Result<(), HostError> {
        self.session.release(self.id)
    }
}

/// An isolated execution context hosting one framework.
pub struct Boundary {
    session: Arc<Session>,
}

impl Boundary {
    /// Create a boundary from `options`, falling back to in-process
    /// instantiation against `registry` when isolation is disabled or
    /// cannot be established (unless it is required).
    pub fn create(
        options: &BoundaryOptions,
        registry: Arc<Registry>,
    ) -> Result<Self, HostError> {
        if !options.use_boundary {
            log::debug!("isolation disabled, loading framework in-process");
            return Ok(Self::direct(registry));
        }

        let target = match options.target_module.as_deref() {
            Some(target) if target.is_file() => target,
            Some(target) => {
                return Self::fall_back(
                    options,
                    registry,
                    format!("{} does not exist", target.display()),
                )
            }
            None => {
                return Self::fall_back(
                    options,
                    registry,
                    "no framework host executable".to_string(),
                )
            }
        };

        let shadow = if options.shadow_copy {
            Some(ShadowCopy::create(
                target,
                options.shadow_copy_folder.as_deref(),
            )?)
        } else {
            None
        };
        let program = shadow
            .as_ref()
            .map(ShadowCopy::module)
            .unwrap_or(target)
            .to_path_buf();

        let mut transport =
            match ProcessTransport::spawn(&program, options.config_path.as_deref()) {
                Ok(transport) => transport,
                Err(err) => {
                    if let Some(shadow) = shadow {
                        shadow.remove();
                    }
                    return Self::fall_back(
                        options,
                        registry,
                        format!("cannot start {}: {}", program.display(), err),
                    );
                }
            };
        if let Err(err) = transport.handshake() {
            transport.close();
            if let Some(shadow) = shadow {
                shadow.remove();
            }
            return Err(err);
        }

        log::debug!("framework host {} started", program.display());
        Ok(Self::from_session(Session::new(
            Isolation::Process,
            Link::Remote(Box::new(transport)),
            shadow,
        )))
    }

    fn fall_back(
        options: &BoundaryOptions,
        registry: Arc<Registry>,
        reason: String,
    ) -> Result<Self, HostError> {
        if options.require_boundary {
            return Err(HostError::Boundary(format!(
                "isolation is required but unavailable: {}",
                reason
            )));
        }
        log::warn!("isolation unavailable ({}), loading framework in-process", reason);
        Ok(Self::direct(registry))
    }

    /// Host objects on a dedicated thread behind a serializing channel.
    pub fn in_domain(registry: Arc<Registry>) -> Result<Self, HostError> {
        let transport = DomainTransport::spawn(registry)?;
        Ok(Self::from_session(Session::new(
            Isolation::Domain,
            Link::Remote(Box::new(transport)),
            None,
        )))
    }

    /// Instantiate objects in-process.
    pub fn direct(registry: Arc<Registry>) -> Self {
        Self::from_session(Session::new(
            Isolation::Direct,
            Link::Direct(Arc::new(ObjectTable::new(registry))),
            None,
        ))
    }

    fn from_session(session: Session) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    pub fn isolation(&self) -> Isolation {
        self.session.isolation
    }

    /// Instantiate `type_name` from `module` inside the boundary and return
    /// a proxy for it.
    pub fn create_object<C: Capability>(
        &self,
        module: &str,
        type_name: &str,
        args: Vec<Arg>,
    ) -> Result<C, HostError> {
        self.session.ensure_live()?;
        let args = self.session.lower(args)?;
        let reply = self.session.call(
            Call::Create {
                module: module.to_string(),
                type_name: type_name.to_string(),
                interface: C::INTERFACE.to_string(),
                args,
            },
            None,
        )?;
        let handle = reply.into_object()?;
        Ok(C::bind(RemoteObject {
            id: self.session.adopt(handle),
            session: Arc::clone(&self.session),
        }))
    }

    /// Number of objects created through this boundary and not yet
    /// released.
    pub fn live_objects(&self) -> usize {
        lock(&self.session.owned).len()
    }

    pub fn is_disposed(&self) -> bool {
        self.session.disposed.load(Ordering::SeqCst)
    }

    /// Release every object created through this boundary and shut the
    /// framework host down. Later calls are no-ops.
    pub fn dispose(&self) {
        self.session.dispose()
    }
}

impl Drop for Boundary {
    fn drop(&mut self) {
        self.dispose();
    }
}
