//! Default HTTP liveness probe (`getHealth`)

use super::client::JsonRpcClient;
use super::health::EndpointProbe;
use super::types::RpcEndpoint;
use crate::errors::UpstreamError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub struct HttpProbe {
    client: JsonRpcClient,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: JsonRpcClient::new(timeout)?,
        })
    }
}

#[async_trait]
impl EndpointProbe for HttpProbe {
    async fn probe(&self, endpoint: &RpcEndpoint) -> Result<(), UpstreamError> {
        let result = self.client.call(endpoint, "getHealth", Value::Null).await?;
        check_health_result(&endpoint.name, &result)
    }
}

/// Nodes answer `getHealth` with `"ok"`; anything else counts as unhealthy
fn check_health_result(endpoint_name: &str, result: &Value) -> Result<(), UpstreamError> {
    match result.as_str() {
        Some("ok") => Ok(()),
        _ => Err(UpstreamError::malformed(
            endpoint_name,
            format!("Unexpected getHealth result: {}", result),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_health_result() {
        assert!(check_health_result("a", &json!("ok")).is_ok());
        assert!(check_health_result("a", &json!("behind")).is_err());
        assert!(check_health_result("a", &json!(null)).is_err());
    }
}
