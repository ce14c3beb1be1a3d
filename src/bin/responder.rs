//! Minimal responder binary, the Rust counterpart of the reference
//! repository's `cmd/server/main.go`: serves `Calculator.Add` over a
//! serial link until the port fails.

use serde::{Deserialize, Serialize};

use kuda::{JsonRpcRequest, JsonRpcResponse, LinkEndpointBuilder, ResponseSink, RpcResponder};

#[derive(Debug, Deserialize)]
struct AdditionArgs {
    add: i64,
    added: i64,
}

#[derive(Debug, Serialize)]
struct AdditionResult {
    computation: i64,
}

fn dispatch(request: JsonRpcRequest, sink: &mut ResponseSink) {
    let response = match request.method.as_str() {
        "Calculator.Add" => match serde_json::from_value::<AdditionArgs>(request.params) {
            Ok(args) => JsonRpcResponse::success(AdditionResult { computation: args.add + args.added })
                .unwrap_or_else(|e| JsonRpcResponse::failure(-32603, e.to_string())),
            Err(e) => JsonRpcResponse::failure(-32602, format!("invalid params: {e}")),
        },
        other => JsonRpcResponse::failure(-32601, format!("method not found: {other}")),
    };
    sink.respond(&response).unwrap_or_else(|e| eprintln!("failed to encode response: {e}"));
}

fn main() {
    tracing_subscriber::fmt::init();

    let port_name = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let endpoint = match LinkEndpointBuilder::new().with_serial(&port_name).build() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            eprintln!("could not open {port_name}: {e}");
            std::process::exit(1);
        }
    };

    let mut responder = RpcResponder::new(endpoint);
    if let Err(e) = responder.serve(&dispatch) {
        eprintln!("responder stopped: {e}");
        std::process::exit(1);
    }
}
