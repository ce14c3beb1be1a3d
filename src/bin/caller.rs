//! Minimal caller binary, the Rust counterpart of the reference
//! repository's `cmd/client/main.go`: calls `Calculator.Add` over a
//! serial link and prints the result.

use serde::{Deserialize, Serialize};

use kuda::RpcCaller;

#[derive(Debug, Serialize)]
struct AdditionArgs {
    add: i64,
    added: i64,
}

#[derive(Debug, Deserialize)]
struct AdditionResult {
    computation: i64,
}

fn main() {
    tracing_subscriber::fmt::init();

    let port_name = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let caller = RpcCaller::new(port_name, 115_200);

    let args = AdditionArgs { add: 12, added: 10 };
    match caller.call_into::<AdditionResult>("Calculator.Add", &args) {
        Ok(result) => println!("{} + {} = {}", args.added, args.add, result.computation),
        Err(e) => {
            eprintln!("call failed: {e}");
            std::process::exit(1);
        }
    }
}
