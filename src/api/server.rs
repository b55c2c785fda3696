use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use anyhow::{Context, Result};
use serde_json::json;

use crate::api::dto::{CodeParams, CommandReq};
use crate::application;
use crate::infrastructure::config::EngineConfig;

/// Step budget applied to traces when the config does not set one. The
/// engine itself never limits execution; the server, being the caller,
/// must, or a single `while True` would pin a worker thread forever.
const SERVER_STEP_BUDGET: u64 = 200_000;

pub fn start_server(port: u16, config: EngineConfig) -> Result<()> {
    let address = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&address)
        .with_context(|| format!("Failed to bind to {}", address))?;

    println!("[Glassbox] API Server listening on {}", address);

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let config = config.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &config) {
                        eprintln!("[API] Connection error: {}", e);
                    }
                });
            }
            Err(e) => eprintln!("[API] Accept error: {}", e),
        }
    }

    Ok(())
}

fn handle_connection(mut stream: TcpStream, config: &EngineConfig) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            break; // Connection closed
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match process_command(trimmed, config) {
            Ok(data) => json!({
                "status": "success",
                "data": data
            }),
            Err(e) => json!({
                "status": "error",
                "message": e.to_string()
            }),
        };

        let response_str = serde_json::to_string(&response)?;
        stream.write_all(response_str.as_bytes())?;
        stream.write_all(b"\n")?;

        if let Ok(req) = serde_json::from_str::<CommandReq>(trimmed) {
            if req.command == "SHUTDOWN" {
                println!("[API] Shutdown requested.");
                std::process::exit(0);
            }
        }
    }
    Ok(())
}

fn process_command(json_str: &str, config: &EngineConfig) -> Result<serde_json::Value> {
    let req: CommandReq = serde_json::from_str(json_str).context("Invalid JSON format")?;

    match req.command.as_str() {
        "PING" => Ok(json!("PONG")),
        "STRUCTURE" => handle_structure(req.params, config),
        "TRACE" => handle_trace(req.params, config),
        "SHUTDOWN" => Ok(json!("Shutting down...")),
        _ => anyhow::bail!("Unknown command: {}", req.command),
    }
}

fn code_params(params: Option<serde_json::Value>) -> Result<CodeParams> {
    let params = params.ok_or_else(|| anyhow::anyhow!("Missing params"))?;
    serde_json::from_value(params).context("Missing 'code' param")
}

fn handle_structure(
    params: Option<serde_json::Value>,
    config: &EngineConfig,
) -> Result<serde_json::Value> {
    let params = code_params(params)?;
    let graph = application::compile_structure(&params.code, config);
    Ok(serde_json::to_value(graph)?)
}

fn handle_trace(
    params: Option<serde_json::Value>,
    config: &EngineConfig,
) -> Result<serde_json::Value> {
    let params = code_params(params)?;
    let mut config = config.clone();
    config.max_steps = config.max_steps.or(Some(SERVER_STEP_BUDGET));
    let trace = application::trace_execution(&params.code, &config);
    Ok(serde_json::to_value(trace)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping() {
        let config = EngineConfig::default();
        let result = process_command(r#"{"command": "PING"}"#, &config).unwrap();
        assert_eq!(result, json!("PONG"));
    }

    #[test]
    fn test_structure_command() {
        let config = EngineConfig::default();
        let result = process_command(
            r#"{"command": "STRUCTURE", "params": {"code": "x = 10"}}"#,
            &config,
        )
        .unwrap();
        assert_eq!(result["nodes"][0]["label"], "Assign: x");
        assert!(result.get("error").is_none());
    }

    #[test]
    fn test_trace_command_respects_configured_budget() {
        // A config-provided budget wins over the server default, and an
        // unbounded loop terminates with the terminal error entry.
        let config = EngineConfig { max_steps: Some(100), ..EngineConfig::default() };
        let result = process_command(
            r#"{"command": "TRACE", "params": {"code": "while True:\n    pass"}}"#,
            &config,
        )
        .unwrap();
        let entries = result.as_array().unwrap();
        let last = entries.last().unwrap();
        assert_eq!(last["line"], -1);
        assert_eq!(
            last["error"].as_str().unwrap(),
            "execution step budget exceeded"
        );
    }

    #[test]
    fn test_unknown_command_rejected() {
        let config = EngineConfig::default();
        let result = process_command(r#"{"command": "NOPE"}"#, &config);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_code_param() {
        let config = EngineConfig::default();
        let result = process_command(r#"{"command": "TRACE"}"#, &config);
        assert!(result.is_err());
    }
}
