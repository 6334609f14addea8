//! Typed model of the `akri.sh/v0` Configuration resource.
//!
//! The model is deliberately partial: unknown fields are ignored on
//! deserialization, which is why admission never trusts it alone. The
//! fidelity check compares a serialize/re-parse round trip of this model
//! against the untyped document to catch fields the model does not cover.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, PodSpec, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// API group/version of the Configuration resource
pub const API_VERSION: &str = "akri.sh/v0";
/// Kind of the Configuration resource
pub const KIND: &str = "Configuration";

/// Limits key the Akri agent substitutes with a device capacity slot
/// when it schedules a broker pod.
pub const PLACEHOLDER: &str = "{{PLACEHOLDER}}";

/// Configuration is the custom resource describing how Akri discovers a
/// class of leaf devices and which broker pods it deploys for them.
///
/// Example:
/// ```yaml
/// apiVersion: akri.sh/v0
/// kind: Configuration
/// metadata:
///   name: zeroconf
/// spec:
///   brokerPodSpec:
///     containers:
///     - name: zeroconf-broker
///       image: ghcr.io/example/zeroconf-broker
///       resources:
///         limits:
///           "{{PLACEHOLDER}}": "1"
///   capacity: 1
///   protocol:
///     zeroconf:
///       kind: _rust._tcp
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,

    #[serde(default)]
    pub spec: ConfigurationSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSpec {
    /// Pod template for the broker deployed next to each discovered device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_pod_spec: Option<PodSpec>,

    /// Number of nodes that may use a discovered device at once.
    #[serde(default)]
    pub capacity: i32,

    /// Service exposing all brokers of this Configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_service_spec: Option<ServiceSpec>,

    /// Service created per discovered device instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_service_spec: Option<ServiceSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,

    /// Discovery protocol settings keyed by protocol name.
    ///
    /// Kept opaque: new protocols must not require a new webhook build.
    #[serde(default)]
    pub protocol: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub units: String,
}

impl Configuration {
    /// Broker containers, empty when no broker pod spec is set.
    pub fn containers(&self) -> &[Container] {
        self.spec
            .broker_pod_spec
            .as_ref()
            .map(|pod| pod.containers.as_slice())
            .unwrap_or_default()
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.name.as_deref())
    }
}

/// Broker pod fields holding container lists
const CONTAINER_LISTS: [&str; 3] = ["containers", "initContainers", "ephemeralContainers"];

/// Rewrite numeric resource quantities in the broker pod spec as strings.
///
/// The API server accepts `cpu: 1` as well as `cpu: "1"`, while the typed
/// `Quantity` only reads strings. Covers container `resources.limits` and
/// `resources.requests` and the pod `overhead`; everything else is left
/// untouched.
pub fn normalize_quantities(object: &mut Value) {
    let Some(pod) = object.pointer_mut("/spec/brokerPodSpec") else {
        return;
    };

    for list in CONTAINER_LISTS {
        let Some(Value::Array(containers)) = pod.get_mut(list) else {
            continue;
        };
        for container in containers {
            let Some(resources) = container.get_mut("resources") else {
                continue;
            };
            for field in ["limits", "requests"] {
                if let Some(Value::Object(quantities)) = resources.get_mut(field) {
                    stringify_numbers(quantities);
                }
            }
        }
    }

    if let Some(Value::Object(overhead)) = pod.get_mut("overhead") {
        stringify_numbers(overhead);
    }
}

fn stringify_numbers(quantities: &mut Map<String, Value>) {
    for value in quantities.values_mut() {
        let rendered = match value {
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        *value = Value::String(rendered);
    }
}
