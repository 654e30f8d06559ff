use super::Registry;
use crate::{
    boundary::protocol::{Call, Handle, Reply, Value},
    codec,
    errors::HostError,
    framework::{interfaces, TestFramework, TestFrameworkDiscoverer, TestFrameworkExecutor},
    sink::MessageSink,
};
use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

/// An object living inside a framework host.
#[derive(Clone)]
pub enum Hosted {
    Framework(Arc<dyn TestFramework>),
    Discoverer(Arc<dyn TestFrameworkDiscoverer>),
    Executor(Arc<dyn TestFrameworkExecutor>),
}

impl Hosted {
    /// Name of the capability this object provides.
    pub fn interface(&self) -> &'static str {
        match self {
            Hosted::Framework(_) => interfaces::FRAMEWORK,
            Hosted::Discoverer(_) => interfaces::DISCOVERER,
            Hosted::Executor(_) => interfaces::EXECUTOR,
        }
    }
}

impl fmt::Debug for Hosted {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Hosted({})", self.interface())
    }
}

/// Constructor arguments, with object handles already resolved.
pub struct CreateArgs<'a> {
    values: &'a [Value],
    objects: Vec<Option<Hosted>>,
}

impl<'a> CreateArgs<'a> {
    pub(crate) fn resolve(
        values: &'a [Value],
        table: &ObjectTable,
    ) -> Result<Self, HostError> {
        let objects = values
            .iter()
            .map(|value| match value {
                Value::Handle(handle) => table.get(*handle).map(Some),
                _ => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { values, objects })
    }

    /// Arguments without handles, for factories invoked directly.
    pub fn plain(values: &'a [Value]) -> Result<Self, HostError> {
        if values.iter().any(|v| matches!(v, Value::Handle(_))) {
            return Err(HostError::InvalidArgument(
                "object handles need an object table to resolve".to_string(),
            ));
        }
        Ok(Self {
            values,
            objects: vec![None; values.len()],
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn value(&self, idx: usize) -> Result<&'a Value, HostError> {
        self.values.get(idx).ok_or_else(|| {
            HostError::InvalidArgument(format!(
                "expected at least {} constructor arguments, got {}",
                idx + 1,
                self.values.len()
            ))
        })
    }

    fn mismatch(idx: usize, expected: &str, got: &Value) -> HostError {
        HostError::InvalidArgument(format!(
            "argument {} should be {}, got {:?}",
            idx, expected, got
        ))
    }

    pub fn str(&self, idx: usize) -> Result<&'a str, HostError> {
        match self.value(idx)? {
            Value::Str(s) => Ok(s),
            other => Err(Self::mismatch(idx, "a string", other)),
        }
    }

    pub fn bool(&self, idx: usize) -> Result<bool, HostError> {
        match self.value(idx)? {
            Value::Bool(b) => Ok(*b),
            other => Err(Self::mismatch(idx, "a bool", other)),
        }
    }

    pub fn int(&self, idx: usize) -> Result<i64, HostError> {
        match self.value(idx)? {
            Value::Int(i) => Ok(*i),
            other => Err(Self::mismatch(idx, "an integer", other)),
        }
    }

    pub fn object(&self, idx: usize) -> Result<Hosted, HostError> {
        let value = self.value(idx)?;
        self.objects
            .get(idx)
            .cloned()
            .flatten()
            .ok_or_else(|| Self::mismatch(idx, "an object", value))
    }
}

/// Objects instantiated inside one boundary session, keyed by handle.
pub struct ObjectTable {
    registry: Arc<Registry>,
    objects: Mutex<HashMap<Handle, Hosted>>,
    next: AtomicU64,
}

impl ObjectTable {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            objects: Mutex::new(HashMap::new()),
            next: AtomicU64::new(1),
        }
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<Handle, Hosted>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, object: Hosted) -> Handle {
        let handle = self.next.fetch_add(1, Ordering::SeqCst);
        log::debug!("hosting {:?} as object {}", object, handle);
        self.objects().insert(handle, object);
        handle
    }

    pub fn get(&self, handle: Handle) -> Result<Hosted, HostError> {
        self.objects().get(&handle).cloned().ok_or_else(|| {
            HostError::InvalidArgument(format!("unknown object handle {}", handle))
        })
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    /// Drop every object still hosted.
    pub fn clear(&self) {
        let drained: Vec<_> = self.objects().drain().collect();
        if !drained.is_empty() {
            log::debug!("releasing {} objects left in the table", drained.len());
        }
    }

    fn wrong_interface(handle: Handle, object: &Hosted, expected: &str) -> HostError {
        HostError::InvalidArgument(format!(
            "object {} is a {}, not a {}",
            handle,
            object.interface(),
            expected
        ))
    }

    fn framework(&self, handle: Handle) -> Result<Arc<dyn TestFramework>, HostError> {
        match self.get(handle)? {
            Hosted::Framework(f) => Ok(f),
            other => Err(Self::wrong_interface(handle, &other, interfaces::FRAMEWORK)),
        }
    }

    fn discoverer(
        &self,
        handle: Handle,
    ) -> Result<Arc<dyn TestFrameworkDiscoverer>, HostError> {
        match self.get(handle)? {
            Hosted::Discoverer(d) => Ok(d),
            other => Err(Self::wrong_interface(handle, &other, interfaces::DISCOVERER)),
        }
    }

    fn executor(&self, handle: Handle) -> Result<Arc<dyn TestFrameworkExecutor>, HostError> {
        match self.get(handle)? {
            Hosted::Executor(e) => Ok(e),
            other => Err(Self::wrong_interface(handle, &other, interfaces::EXECUTOR)),
        }
    }

    /// Service one call. Messages the framework produces go to `sink`.
    pub fn dispatch(&self, call: Call, sink: &dyn MessageSink) -> Result<Reply, HostError> {
        log::debug!("dispatching {}", call.name());
        match call {
            Call::Create {
                module,
                type_name,
                interface,
                args,
            } => {
                let args = CreateArgs::resolve(&args, self)?;
                let object = self.registry.instantiate(&module, &type_name, &args)?;
                if object.interface() != interface {
                    return Err(HostError::Boundary(format!(
                        "{}::{} is a {}, not a {}",
                        module,
                        type_name,
                        object.interface(),
                        interface
                    )));
                }
                Ok(Reply::Object(self.insert(object)))
            }
            Call::Describe { framework } => {
                Ok(Reply::Framework(self.framework(framework)?.info()))
            }
            Call::GetDiscoverer {
                framework,
                assembly,
            } => {
                let discoverer = self.framework(framework)?.discoverer(&assembly)?;
                Ok(Reply::Object(self.insert(Hosted::Discoverer(discoverer))))
            }
            Call::GetExecutor {
                framework,
                assembly,
            } => {
                let executor = self.framework(framework)?.executor(&assembly)?;
                Ok(Reply::Object(self.insert(Hosted::Executor(executor))))
            }
            Call::TargetFramework { discoverer } => {
                Ok(Reply::Text(self.discoverer(discoverer)?.target_framework()?))
            }
            Call::DisplayName { discoverer } => {
                Ok(Reply::Text(self.discoverer(discoverer)?.display_name()?))
            }
            Call::Find {
                discoverer,
                type_name,
                include_source_info,
                options,
            } => {
                let discoverer = self.discoverer(discoverer)?;
                match type_name {
                    Some(type_name) => discoverer.find_in_type(
                        &type_name,
                        include_source_info,
                        sink,
                        &options,
                    )?,
                    None => discoverer.find(include_source_info, sink, &options)?,
                }
                Ok(Reply::Unit)
            }
            Call::RunAll {
                executor,
                discovery_options,
                execution_options,
            } => {
                self.executor(executor)?
                    .run_all(sink, &discovery_options, &execution_options)?;
                Ok(Reply::Unit)
            }
            Call::RunTests {
                executor,
                test_cases,
                execution_options,
            } => {
                self.executor(executor)?
                    .run_tests(&test_cases, sink, &execution_options)?;
                Ok(Reply::Unit)
            }
            Call::Serialize {
                discoverer,
                test_case,
            } => Ok(Reply::Text(self.discoverer(discoverer)?.serialize(&test_case)?)),
            Call::Deserialize { executor, value } => {
                Ok(Reply::TestCase(self.executor(executor)?.deserialize(&value)?))
            }
            Call::BulkDeserialize { executor, values } => {
                let executor = self.executor(executor)?;
                let pairs = codec::bulk_deserialize_with(values, |value| {
                    executor.deserialize(value)
                })?;
                Ok(Reply::TestCases(pairs))
            }
            Call::Release { object } => match self.objects().remove(&object) {
                Some(released) => {
                    log::debug!("released {:?} (object {})", released, object);
                    Ok(Reply::Unit)
                }
                None => Err(HostError::InvalidArgument(format!(
                    "unknown object handle {}",
                    object
                ))),
            },
        }
    }
}
