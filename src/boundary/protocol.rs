//! Frames exchanged with a framework host, one JSON document per line.
use crate::{
    errors::{HostError, WireError},
    framework::{AssemblyInfo, AssemblyName, FrameworkInfo, Options},
    message::Message,
    test_case::TestCase,
};
use serde::{Deserialize, Deserializer, Serialize};

/// Bumped whenever a frame changes shape.
pub const PROTOCOL_VERSION: u32 = 1;

/// Argument passed to a framework host process so it serves frames.
pub const SERVE_FLAG: &str = "--runt-host-serve";

/// Environment variable carrying the assembly configuration path.
pub const CONFIG_ENV: &str = "RUNT_HOST_CONFIG";

/// Identifies an object inside a framework host.
pub type Handle = u64;

/// A constructor argument as it crosses the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Handle(Handle),
}

/// A request to the framework host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Call {
    Create {
        module: String,
        type_name: String,
        interface: String,
        args: Vec<Value>,
    },
    Describe {
        framework: Handle,
    },
    GetDiscoverer {
        framework: Handle,
        assembly: AssemblyInfo,
    },
    GetExecutor {
        framework: Handle,
        assembly: AssemblyName,
    },
    TargetFramework {
        discoverer: Handle,
    },
    DisplayName {
        discoverer: Handle,
    },
    Find {
        discoverer: Handle,
        type_name: Option<String>,
        include_source_info: bool,
        options: Options,
    },
    RunAll {
        executor: Handle,
        discovery_options: Options,
        execution_options: Options,
    },
    RunTests {
        executor: Handle,
        test_cases: Vec<TestCase>,
        execution_options: Options,
    },
    Serialize {
        discoverer: Handle,
        test_case: TestCase,
    },
    Deserialize {
        executor: Handle,
        value: String,
    },
    BulkDeserialize {
        executor: Handle,
        values: Vec<String>,
    },
    Release {
        object: Handle,
    },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::Create { .. } => "create",
            Call::Describe { .. } => "describe",
            Call::GetDiscoverer { .. } => "get_discoverer",
            Call::GetExecutor { .. } => "get_executor",
            Call::TargetFramework { .. } => "target_framework",
            Call::DisplayName { .. } => "display_name",
            Call::Find { .. } => "find",
            Call::RunAll { .. } => "run_all",
            Call::RunTests { .. } => "run_tests",
            Call::Serialize { .. } => "serialize",
            Call::Deserialize { .. } => "deserialize",
            Call::BulkDeserialize { .. } => "bulk_deserialize",
            Call::Release { .. } => "release",
        }
    }
}

/// The result of a successful call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Reply {
    Unit,
    Object(Handle),
    Text(String),
    Framework(FrameworkInfo),
    TestCase(TestCase),
    TestCases(Vec<(String, TestCase)>),
}

fn unexpected(expected: &str, got: &Reply) -> HostError {
    HostError::Protocol(format!("expected {} reply, got {:?}", expected, got))
}

impl Reply {
    pub fn into_unit(self) -> Result<(), HostError> {
        match self {
            Reply::Unit => Ok(()),
            other => Err(unexpected("unit", &other)),
        }
    }

    pub fn into_object(self) -> Result<Handle, HostError> {
        match self {
            Reply::Object(handle) => Ok(handle),
            other => Err(unexpected("object", &other)),
        }
    }

    pub fn into_text(self) -> Result<String, HostError> {
        match self {
            Reply::Text(text) => Ok(text),
            other => Err(unexpected("text", &other)),
        }
    }

    pub fn into_framework(self) -> Result<FrameworkInfo, HostError> {
        match self {
            Reply::Framework(info) => Ok(info),
            other => Err(unexpected("framework", &other)),
        }
    }

    pub fn into_test_case(self) -> Result<TestCase, HostError> {
        match self {
            Reply::TestCase(test_case) => Ok(test_case),
            other => Err(unexpected("test case", &other)),
        }
    }

    pub fn into_test_cases(self) -> Result<Vec<(String, TestCase)>, HostError> {
        match self {
            Reply::TestCases(pairs) => Ok(pairs),
            other => Err(unexpected("test cases", &other)),
        }
    }
}

/// Host to framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum ClientFrame {
    Call { id: u64, call: Call },
    /// Advisory: the sink for call `id` asked to stop.
    Cancel { id: u64 },
    Shutdown,
}

/// Framework to host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum ServerFrame {
    Hello { protocol: u32 },
    Message {
        id: u64,
        #[serde(deserialize_with = "lenient_message")]
        message: Message,
    },
    Reply { id: u64, reply: Reply },
    Failure { id: u64, error: WireError },
}

/// A message that does not decode is a protocol violation of that message
/// alone. It is logged and delivered as [Message::Unknown] so the call
/// carrying it can still complete.
fn lenient_message<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Message, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(Message::deserialize(&value).unwrap_or_else(|err| {
        log::warn!("protocol violation: undecodable message {}: {}", value, err);
        Message::Unknown
    }))
}

pub fn encode<T: Serialize>(frame: &T) -> Result<String, HostError> {
    serde_json::to_string(frame)
        .map_err(|err| HostError::Protocol(format!("cannot encode frame: {}", err)))
}

pub fn decode<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T, HostError> {
    serde_json::from_str(line)
        .map_err(|err| HostError::Protocol(format!("malformed frame: {}", err)))
}
