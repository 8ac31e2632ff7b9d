// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stdout IPC envelope protocol between job processes and the supervisor.
//!
//! Job processes write newline-delimited JSON envelopes to stdout. Each
//! envelope carries a required `type` discriminator:
//!
//! - `{"type":"JOB_MESSAGE","messageName":"...","message":{...}}` for
//!   application-defined messages
//! - `{"type":"JOB_LOG","level":"...","message":"..."}` for log records
//!
//! The parent parses each line independently. For compatibility with jobs
//! that predate the discriminator, a bare `{"level":...,"message":...}`
//! object is still accepted as a log record. Anything else, including
//! malformed JSON, is relayed as passthrough log text rather than failing
//! the relay.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::LogRecord;

/// Discriminator value for application messages.
pub const ENVELOPE_MESSAGE: &str = "JOB_MESSAGE";
/// Discriminator value for log records.
pub const ENVELOPE_LOG: &str = "JOB_LOG";

/// A framed envelope on a job process's stdout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Envelope {
	/// An application-defined message, relayed as a `process.message`
	/// event.
	#[serde(rename = "JOB_MESSAGE")]
	Message {
		#[serde(rename = "messageName")]
		message_name: String,
		message: Value,
	},

	/// A structured log record, relayed as a `process.log` event.
	#[serde(rename = "JOB_LOG")]
	Log { level: String, message: String },
}

/// Bare log-record shape accepted without the `type` discriminator.
#[derive(Debug, Deserialize)]
struct BareLogRecord {
	level: String,
	message: String,
}

/// The relay decision for one stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
	/// An application message to relay as `process.message`.
	Message { name: String, payload: Value },
	/// A structured log record to relay as `process.log`.
	Log(LogRecord),
	/// Passthrough text to relay as an info-level log record.
	Raw(String),
}

impl ParsedLine {
	/// Classify one line of job process stdout.
	///
	/// Never fails: lines that are not recognized envelopes degrade to
	/// [`ParsedLine::Raw`].
	pub fn parse(line: &str) -> Self {
		let trimmed = line.trim_end_matches(['\r', '\n']);

		match serde_json::from_str::<Envelope>(trimmed) {
			Ok(Envelope::Message {
				message_name,
				message,
			}) => {
				return Self::Message {
					name: message_name,
					payload: message,
				}
			}
			Ok(Envelope::Log { level, message }) => {
				return Self::Log(LogRecord::new(level, message))
			}
			Err(_) => {}
		}

		// Compatibility: a bare {"level":...,"message":...} object is a log
		// record.
		if let Ok(record) = serde_json::from_str::<BareLogRecord>(trimmed) {
			return Self::Log(LogRecord::new(record.level, record.message));
		}

		Self::Raw(trimmed.to_string())
	}
}
