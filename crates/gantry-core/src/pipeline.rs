//! Pipeline definition types.
//!
//! These types represent the user-authored pipeline configuration. They are
//! produced by the definition source and consumed read-only by the scheduler.

use crate::trigger::TriggerKind;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    pub jobs: Vec<JobTemplate>,
}

impl PipelineDefinition {
    pub fn job(&self, name: &str) -> Option<&JobTemplate> {
        self.jobs.iter().find(|job| job.name == name)
    }
}

/// Watched branches for one trigger kind. An empty branch list watches
/// every branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    #[serde(default)]
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTemplate {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub commands: Vec<CommandSpec>,
    #[serde(default)]
    pub matrix: Option<MatrixConfig>,
    #[serde(default)]
    pub policy: FailurePolicy,
    #[serde(default)]
    pub cache: Option<CacheSpec>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub timeout_minutes: Option<u32>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// Whether a job's failure fails the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Blocking,
    Tolerant,
}

/// One command of a job.
///
/// Written either as a bare string or as a mapping with `run` and an
/// optional `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCommand")]
pub struct CommandSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub run: String,
    #[serde(default)]
    pub kind: CommandKind,
}

impl CommandSpec {
    pub fn verify(run: impl Into<String>) -> Self {
        Self {
            name: None,
            run: run.into(),
            kind: CommandKind::Verify,
        }
    }

    pub fn build(run: impl Into<String>) -> Self {
        Self {
            name: None,
            run: run.into(),
            kind: CommandKind::Build,
        }
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.run)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCommand {
    Plain(String),
    Detailed {
        #[serde(default)]
        name: Option<String>,
        run: String,
        #[serde(default)]
        kind: CommandKind,
    },
}

impl From<RawCommand> for CommandSpec {
    fn from(raw: RawCommand) -> Self {
        match raw {
            RawCommand::Plain(run) => CommandSpec::verify(run),
            RawCommand::Detailed { name, run, kind } => CommandSpec { name, run, kind },
        }
    }
}

/// `build` commands produce cacheable artifacts and are skipped on a cache
/// hit; `verify` commands always run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Build,
    #[default]
    Verify,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub axes: MatrixAxes,
    /// Partial assignments removed from the product.
    #[serde(default)]
    pub exclude: Vec<AxisFilter>,
    /// Partial assignments whose instances are tolerant.
    #[serde(default)]
    pub tolerate: Vec<AxisFilter>,
}

/// A partial axis assignment, matched against expanded instances.
pub type AxisFilter = BTreeMap<String, AxisValue>;

/// A named dimension of variation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixAxis {
    pub name: String,
    pub values: Vec<AxisValue>,
}

/// Matrix axes in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixAxes(pub Vec<MatrixAxis>);

impl MatrixAxes {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_axis<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AxisValue>,
    {
        self.0.push(MatrixAxis {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatrixAxis> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|axis| axis.name == name)
    }
}

impl Serialize for MatrixAxes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for axis in &self.0 {
            map.serialize_entry(&axis.name, &axis.values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MatrixAxes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AxesVisitor;

        impl<'de> Visitor<'de> for AxesVisitor {
            type Value = MatrixAxes;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of axis name to a list of values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut axes = Vec::new();
                while let Some((name, values)) = access.next_entry::<String, Vec<AxisValue>>()? {
                    axes.push(MatrixAxis { name, values });
                }
                Ok(MatrixAxes(axes))
            }
        }

        deserializer.deserialize_map(AxesVisitor)
    }
}

/// A matrix value. Scalars of any type are kept as their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AxisValue(String);

impl AxisValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AxisValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AxisValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for AxisValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AxisValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl Visitor<'_> for ValueVisitor {
            type Value = AxisValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, number or boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(AxisValue(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(AxisValue(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(AxisValue(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(AxisValue(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(AxisValue(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(AxisValue(v.to_string()))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Declared cache inputs of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Human-readable key prefix, e.g. `cargo`.
    pub key: String,
    /// Files whose contents feed the key, relative to the workspace.
    #[serde(default)]
    pub files: Vec<String>,
    /// Extra literal inputs (toolchain identifiers and the like).
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Paths the artifact set covers.
    #[serde(default)]
    pub paths: Vec<String>,
}
