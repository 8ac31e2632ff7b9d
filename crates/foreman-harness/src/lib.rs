// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Child-side IPC surface linked by Foreman job binaries.
//!
//! A job process talks to its supervisor by writing newline-delimited JSON
//! envelopes to stdout; everything here frames and flushes those envelopes
//! so the parent's relay sees complete lines. Plain `println!` output still
//! reaches the supervisor, relayed as passthrough log text.

use serde::Serialize;
use std::io::{self, Write};
use thiserror::Error;

use foreman_jobs_core::ipc::Envelope;

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that can occur while emitting envelopes.
#[derive(Debug, Error)]
pub enum HarnessError {
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("write error: {0}")]
	Io(#[from] io::Error),
}

/// Send an application-defined message to the supervisor, relayed to bus
/// subscribers as a `process.message` event.
pub fn send_message(name: &str, payload: &impl Serialize) -> Result<()> {
	let envelope = Envelope::Message {
		message_name: name.to_string(),
		message: serde_json::to_value(payload)?,
	};
	write_line(&encode(&envelope)?)
}

/// Emit a structured log record, relayed as a `process.log` event.
pub fn log(level: &str, message: impl Into<String>) -> Result<()> {
	let envelope = Envelope::Log {
		level: level.to_string(),
		message: message.into(),
	};
	write_line(&encode(&envelope)?)
}

pub fn log_info(message: impl Into<String>) -> Result<()> {
	log("info", message)
}

pub fn log_error(message: impl Into<String>) -> Result<()> {
	log("error", message)
}

/// Cooperative shutdown: flush pending envelopes so they are delivered,
/// then terminate with the given code.
///
/// Diverges, so repeated calls cannot double-fire; the supervisor emits
/// `process.exit` exactly once per instance termination either way.
pub fn exit(code: i32) -> ! {
	let _ = io::stdout().lock().flush();
	let _ = io::stderr().lock().flush();
	std::process::exit(code);
}

fn encode(envelope: &Envelope) -> Result<String> {
	Ok(serde_json::to_string(envelope)?)
}

fn write_line(line: &str) -> Result<()> {
	let stdout = io::stdout();
	let mut handle = stdout.lock();
	handle.write_all(line.as_bytes())?;
	handle.write_all(b"\n")?;
	handle.flush()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use foreman_jobs_core::{LogRecord, ParsedLine};
	use serde_json::json;

	#[test]
	fn test_message_envelope_roundtrips_through_relay_parser() {
		let envelope = Envelope::Message {
			message_name: "progress".to_string(),
			message: json!({"done": 3, "total": 10}),
		};
		let line = encode(&envelope).unwrap();

		assert_eq!(
			ParsedLine::parse(&line),
			ParsedLine::Message {
				name: "progress".to_string(),
				payload: json!({"done": 3, "total": 10}),
			}
		);
	}

	#[test]
	fn test_log_envelope_roundtrips_through_relay_parser() {
		let envelope = Envelope::Log {
			level: "warn".to_string(),
			message: "low disk".to_string(),
		};
		let line = encode(&envelope).unwrap();

		assert_eq!(
			ParsedLine::parse(&line),
			ParsedLine::Log(LogRecord::new("warn", "low disk"))
		);
	}

	#[test]
	fn test_envelopes_are_single_lines() {
		let envelope = Envelope::Message {
			message_name: "multi".to_string(),
			message: json!({"text": "line one\nline two"}),
		};
		let line = encode(&envelope).unwrap();

		// Newlines in payloads stay escaped; the frame is one line.
		assert!(!line.contains('\n'));
	}
}
