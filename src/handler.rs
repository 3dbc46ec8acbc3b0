//! Entry point for serverless invocations.
//!
//! Events arrive either as the request itself (a direct invocation) or wrapped by an HTTP
//! gateway, with the request JSON encoded as a string in `body`. The reply is wrapped to match.

use crate::{
    errors::WaveformErr,
    processor::{DecimateRequest, NoRespRequest, Processor, WindowBatch},
};
use log::info;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// The products an event can ask for.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, IntoStaticStr, EnumIter, Hash)]
pub enum Endpoint {
    /// Decimate a day file.
    #[strum(to_string = "decimate")]
    Decimate,
    /// Remove the instrument response from a day file.
    #[strum(to_string = "noresp", serialize = "response")]
    NoResp,
    /// Fetch time windows as structured data.
    #[strum(to_string = "timewindow", serialize = "window")]
    TimeWindow,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name: &'static str = self.into();
        write!(f, "{}", name)
    }
}

/// How an event was delivered.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Invocation {
    /// The event is the request.
    Direct,
    /// The request is a JSON string in the event's `body`.
    Gateway,
}

impl Invocation {
    /// Gateway events carry a `routeKey`.
    pub fn detect(event: &Value) -> Self {
        if event.get("routeKey").is_some() {
            Invocation::Gateway
        } else {
            Invocation::Direct
        }
    }

    /// The request carried by `event`.
    pub fn unwrap_request(self, event: Value) -> Result<Value, WaveformErr> {
        match self {
            Invocation::Direct => Ok(event),
            Invocation::Gateway => match event.get("body") {
                Some(Value::String(body)) => Ok(serde_json::from_str(body)?),
                Some(body @ Value::Object(_)) => Ok(body.clone()),
                _ => Err(WaveformErr::Validation(
                    "gateway event has no request body".to_owned(),
                )),
            },
        }
    }

    /// Wrap a response the way the caller expects it.
    pub fn wrap_response(
        self,
        endpoint: Endpoint,
        response: Value,
    ) -> Result<Value, WaveformErr> {
        match self {
            Invocation::Direct => Ok(response),
            Invocation::Gateway => {
                let body = serde_json::to_string(&response)?;
                Ok(match endpoint {
                    Endpoint::TimeWindow => json!({
                        "statusCode": 200,
                        "headers": { "Content-Type": "application/json" },
                        "body": body,
                    }),
                    _ => json!({
                        "statusCode": 200,
                        "body": body,
                    }),
                })
            }
        }
    }
}

/// Answer one event.
pub fn handle(
    endpoint: Endpoint,
    event: Value,
    processor: &Processor,
) -> Result<Value, WaveformErr> {
    let invocation = Invocation::detect(&event);
    info!("{} request, {:?} invocation: {}", endpoint, invocation, event);

    let request = invocation.unwrap_request(event)?;

    let response = match endpoint {
        Endpoint::Decimate => {
            serde_json::to_value(processor.decimated(&parse::<DecimateRequest>(request)?)?)?
        }
        Endpoint::NoResp => {
            serde_json::to_value(processor.noresp(&parse::<NoRespRequest>(request)?)?)?
        }
        Endpoint::TimeWindow => {
            serde_json::to_value(processor.time_windows(&parse::<WindowBatch>(request)?)?)?
        }
    };

    info!("{} response: {}", endpoint, response);
    invocation.wrap_response(endpoint, response)
}

fn parse<T: DeserializeOwned>(request: Value) -> Result<T, WaveformErr> {
    serde_json::from_value(request)
        .map_err(|err| WaveformErr::Validation(format!("malformed request: {}", err)))
}
